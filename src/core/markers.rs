//! Data-attribute names derived from the configured prefix.
//!
//! With the default prefix `lazy`:
//!
//! | Attribute           | Meaning                          |
//! |---------------------|----------------------------------|
//! | `data-lazy`         | real resource URL                |
//! | `data-lazy-srcset`  | real `srcset`                    |
//! | `data-lazy-bkg`     | real `background-image` value    |
//! | `data-lazy-delay`   | script delay in milliseconds     |
//! | `data-lazy-wrapper` | wrapper tag for include/module   |
//! | `data-lazy-include` | HTML fragment URL                |
//! | `data-lazy-module`  | module specifier                 |
//! | `data-lazy-import`  | import binding for the module    |

/// Escape-hatch class that opts an element out of lazy loading.
pub const NO_LAZY_CLASS: &str = "no-lazy";

/// Attribute names for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// `data-<prefix>`
    pub base: String,
    pub srcset: String,
    pub bkg: String,
    pub delay: String,
    pub wrapper: String,
    pub include: String,
    pub module: String,
    pub import: String,
}

impl Markers {
    pub fn new(prefix: &str) -> Self {
        let base = format!("data-{prefix}");
        let suffixed = |suffix: &str| format!("{base}-{suffix}");
        Self {
            srcset: suffixed("srcset"),
            bkg: suffixed("bkg"),
            delay: suffixed("delay"),
            wrapper: suffixed("wrapper"),
            include: suffixed("include"),
            module: suffixed("module"),
            import: suffixed("import"),
            base,
        }
    }

    /// Whether `name` belongs to the lazy attribute family
    /// (`data-<prefix>` or `data-<prefix>-*`).
    pub fn is_lazy_attribute(&self, name: &str) -> bool {
        name.strip_prefix(self.base.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    }

    /// Selector matching every element carrying the base marker.
    pub fn default_selector(&self) -> String {
        format!("[{}]", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_prefix() {
        let markers = Markers::new("defer");
        assert_eq!(markers.base, "data-defer");
        assert_eq!(markers.bkg, "data-defer-bkg");
        assert_eq!(markers.import, "data-defer-import");
        assert_eq!(markers.default_selector(), "[data-defer]");
    }

    #[test]
    fn test_lazy_attribute_family() {
        let markers = Markers::new("lazy");
        assert!(markers.is_lazy_attribute("data-lazy"));
        assert!(markers.is_lazy_attribute("data-lazy-delay"));
        assert!(!markers.is_lazy_attribute("data-lazyness"));
        assert!(!markers.is_lazy_attribute("data-other"));
        assert!(!markers.is_lazy_attribute("src"));
    }
}
