//! Pending values stashed on an element while its placeholder is shown.

use super::Markers;
use crate::host::Dom;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// `url(` prefix, `)` suffix and any quote inside a background value.
static RE_CSS_URL_WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(^url\()|(\)$|["'])"#).unwrap());

/// Snapshot of the lazy attributes carried by one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sidecar {
    /// Real `src`.
    pub resource: Option<String>,
    /// Real `srcset`.
    pub resource_set: Option<String>,
    /// Real `background-image` value.
    pub background: Option<String>,
    /// Fragment URL to splice in on reveal.
    pub include: Option<String>,
    /// Tag of the element replacing the original on reveal.
    pub wrapper: Option<String>,
    /// Module specifier to import on reveal.
    pub module: Option<String>,
    /// Binding imported from the module.
    pub import: Option<String>,
    /// Script delay in milliseconds, unparsed.
    pub delay: Option<String>,
}

impl Sidecar {
    /// Read every lazy attribute of `el`.
    pub fn read<D: Dom + ?Sized>(dom: &D, el: &D::Element, markers: &Markers) -> Self {
        let get = |name: &str| dom.attribute(el, name);
        Self {
            resource: get(&markers.base),
            resource_set: get(&markers.srcset),
            background: get(&markers.bkg),
            include: get(&markers.include),
            wrapper: get(&markers.wrapper),
            module: get(&markers.module),
            import: get(&markers.import),
            delay: get(&markers.delay),
        }
    }

    /// Write the snapshot back, restoring markers removed by a failed reveal.
    pub fn restore<D: Dom + ?Sized>(&self, dom: &D, el: &D::Element, markers: &Markers) {
        let pairs = [
            (&markers.base, &self.resource),
            (&markers.srcset, &self.resource_set),
            (&markers.bkg, &self.background),
            (&markers.include, &self.include),
            (&markers.wrapper, &self.wrapper),
            (&markers.module, &self.module),
            (&markers.import, &self.import),
            (&markers.delay, &self.delay),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                dom.set_attribute(el, name, value);
            }
        }
    }

    /// Non-empty real resource URL.
    pub fn pending_resource(&self) -> Option<&str> {
        non_empty(&self.resource)
    }

    /// Non-empty real background value.
    pub fn pending_background(&self) -> Option<&str> {
        non_empty(&self.background)
    }

    /// Whether reveal has to materialize a module or an include.
    pub fn has_deferred_content(&self) -> bool {
        non_empty(&self.module).is_some() || non_empty(&self.include).is_some()
    }

    /// Background URL stripped of its `url(...)` wrapper and quotes.
    pub fn background_url(&self) -> Option<String> {
        self.pending_background()
            .map(|value| RE_CSS_URL_WRAPPER.replace_all(value.trim(), "").into_owned())
            .filter(|url| !url.is_empty())
    }

    /// Script delay; missing or unparsable values mean no delay.
    pub fn delay(&self) -> Duration {
        self.delay
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| Duration::from_micros((ms * 1000.0).round() as u64))
            .unwrap_or_default()
    }
}

#[inline]
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_background(value: &str) -> Sidecar {
        Sidecar {
            background: Some(value.to_string()),
            ..Sidecar::default()
        }
    }

    #[test]
    fn test_background_url_strips_wrapper() {
        assert_eq!(with_background("url(y.jpg)").background_url().as_deref(), Some("y.jpg"));
        assert_eq!(
            with_background("url(\"/img/a b.png\")").background_url().as_deref(),
            Some("/img/a b.png")
        );
        assert_eq!(with_background("url('x.webp')").background_url().as_deref(), Some("x.webp"));
        assert_eq!(with_background("").background_url(), None);
    }

    #[test]
    fn test_delay_parsing() {
        let delay = |raw: Option<&str>| {
            Sidecar {
                delay: raw.map(str::to_string),
                ..Sidecar::default()
            }
            .delay()
        };
        assert_eq!(delay(Some("200")), Duration::from_millis(200));
        assert_eq!(delay(Some(" 50 ")), Duration::from_millis(50));
        assert_eq!(delay(None), Duration::ZERO);
        assert_eq!(delay(Some("soon")), Duration::ZERO);
        assert_eq!(delay(Some("-20")), Duration::ZERO);
    }

    #[test]
    fn test_deferred_content_needs_non_empty_marker() {
        let sidecar = Sidecar {
            include: Some(String::new()),
            wrapper: Some("section".to_string()),
            ..Sidecar::default()
        };
        assert!(!sidecar.has_deferred_content());

        let sidecar = Sidecar {
            module: Some("/js/chart.js".to_string()),
            ..Sidecar::default()
        };
        assert!(sidecar.has_deferred_content());
    }
}
