//! Page-wide lazy loading options.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error      # ConfigError, ConfigDiagnostics
//! ├── field      # FieldPath (option key used in diagnostics)
//! ├── margin     # rootMargin shorthand parsing
//! └── mod.rs     # Options (this file)
//! ```
//!
//! # Keys
//!
//! | Key             | Purpose                                           |
//! |-----------------|---------------------------------------------------|
//! | `loading`       | Class added while the real resource loads         |
//! | `failed`        | Class added when the resource fails to load       |
//! | `on`            | Class added when the element is revealed          |
//! | `loaded`        | Class added once the resource has loaded          |
//! | `attribute`     | Data-attribute prefix (`lazy` → `data-lazy-*`)    |
//! | `nativeSupport` | Leave `loading="lazy"` elements to the browser    |
//! | `proxy`         | Placeholder data URI for non-image media          |
//! | `observer`      | `root`, `rootMargin`, `threshold` for visibility  |
//!
//! The host page supplies any subset of these keys; missing keys fall back
//! to the defaults below and unknown keys are reported and ignored.
//!
//! # Example
//!
//! ```json
//! { "loaded": "is-visible", "observer": { "rootMargin": "200px 0px" } }
//! ```

mod error;
mod field;
mod margin;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use field::FieldPath;
pub use margin::{Length, RootMargin};

use crate::log;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 1x1 transparent gif used as placeholder source and poster.
pub const DEFAULT_PROXY: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

// ============================================================================
// Options
// ============================================================================

/// Options merged from defaults and host overrides, fixed at bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Class for an element whose resource is in flight.
    pub loading: String,

    /// Class for an element whose resource failed to load.
    pub failed: String,

    /// Class for an element that entered the viewport and was revealed.
    pub on: String,

    /// Class for an element whose resource loaded.
    pub loaded: String,

    /// Data-attribute prefix without the `data-` part.
    pub attribute: String,

    /// Trust the browser for elements that already carry `loading="lazy"`.
    pub native_support: bool,

    /// Placeholder data URI.
    pub proxy: String,

    /// Visibility observer tuning.
    pub observer: ObserverOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            loading: "lazy-loading".to_string(),
            failed: "lazy-failed".to_string(),
            on: "autolazy".to_string(),
            loaded: "lazy-loaded".to_string(),
            attribute: "lazy".to_string(),
            native_support: false,
            proxy: DEFAULT_PROXY.to_string(),
            observer: ObserverOptions::default(),
        }
    }
}

/// Visibility observer tuning (mirrors `IntersectionObserverInit`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserverOptions {
    /// Selector of the scroll container; `None` means the viewport.
    pub root: Option<String>,

    /// Margin around the root box, CSS shorthand.
    pub root_margin: String,

    /// Visible fraction of the target required to count as intersecting.
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root: None,
            root_margin: "0px 0px 0px 0px".to_string(),
            threshold: 0.0,
        }
    }
}

impl ObserverOptions {
    /// Parsed `root_margin`, falling back to zero margins when invalid.
    ///
    /// Validation rejects invalid margins up front, so the fallback only
    /// applies to options that skipped [`Options::validate`].
    pub fn margin(&self) -> RootMargin {
        self.root_margin.parse().unwrap_or_default()
    }
}

/// Field paths of every option key.
pub struct OptionsFields {
    pub loading: FieldPath,
    pub failed: FieldPath,
    pub on: FieldPath,
    pub loaded: FieldPath,
    pub attribute: FieldPath,
    pub proxy: FieldPath,
    pub observer_root: FieldPath,
    pub observer_root_margin: FieldPath,
    pub observer_threshold: FieldPath,
}

impl Options {
    pub const FIELDS: OptionsFields = OptionsFields {
        loading: FieldPath::new("loading"),
        failed: FieldPath::new("failed"),
        on: FieldPath::new("on"),
        loaded: FieldPath::new("loaded"),
        attribute: FieldPath::new("attribute"),
        proxy: FieldPath::new("proxy"),
        observer_root: FieldPath::new("observer.root"),
        observer_root_margin: FieldPath::new("observer.rootMargin"),
        observer_threshold: FieldPath::new("observer.threshold"),
    };

    // ========================================================================
    // loading
    // ========================================================================

    /// Parse host options from JSON, merged over the defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut ignored = Vec::new();
        let mut deserializer = serde_json::Deserializer::from_str(content);
        let options: Self = serde_ignored::deserialize(&mut deserializer, |path| {
            ignored.push(path.to_string());
        })?;
        deserializer.end()?;

        Self::finish(options, &ignored, "host options")
    }

    /// Parse options from TOML, merged over the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let options: Self = serde_ignored::deserialize(deserializer, |path| {
            ignored.push(path.to_string());
        })?;

        Self::finish(options, &ignored, "options file")
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Ok(Self::from_toml(&content)?)
    }

    /// Report ignored keys, then validate.
    fn finish(options: Self, ignored: &[String], source: &str) -> Result<Self, ConfigError> {
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(ignored, source);
        }
        options.validate()?;
        Ok(options)
    }

    /// Print warning about unknown keys.
    fn print_unknown_fields_warning(fields: &[String], source: &str) {
        log!("warning"; "unknown keys in {}, ignoring: {}", source, fields.join(", "));
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Check every option, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        Self::validate_prefix(&mut diag, &self.attribute);

        for (field, class) in [
            (Self::FIELDS.loading, &self.loading),
            (Self::FIELDS.failed, &self.failed),
            (Self::FIELDS.on, &self.on),
            (Self::FIELDS.loaded, &self.loaded),
        ] {
            Self::validate_class(&mut diag, field, class);
        }

        if self.proxy.trim().is_empty() {
            diag.error(Self::FIELDS.proxy, "placeholder URI must not be empty");
        }

        let observer = &self.observer;
        if let Some(root) = &observer.root
            && root.trim().is_empty()
        {
            diag.error_with_hint(
                Self::FIELDS.observer_root,
                "root selector must not be empty",
                "use null to observe against the viewport",
            );
        }
        if let Err(err) = observer.root_margin.parse::<RootMargin>() {
            diag.error_with_hint(
                Self::FIELDS.observer_root_margin,
                err,
                "use 1 to 4 lengths in px or %, e.g. \"200px 0px\"",
            );
        }
        if !(0.0..=1.0).contains(&observer.threshold) {
            diag.error(
                Self::FIELDS.observer_threshold,
                format!("threshold {} must be within [0, 1]", observer.threshold),
            );
        }

        diag.into_result()
    }

    fn validate_prefix(diag: &mut ConfigDiagnostics, prefix: &str) {
        let valid_chars = prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if prefix.is_empty() {
            diag.error_with_hint(
                Self::FIELDS.attribute,
                "attribute prefix must not be empty",
                "the default is \"lazy\"",
            );
        } else if !valid_chars || prefix.starts_with('-') || prefix.ends_with('-') {
            diag.error_with_hint(
                Self::FIELDS.attribute,
                format!("`{prefix}` is not a valid data attribute name"),
                "use lowercase letters, digits and inner dashes",
            );
        }
    }

    fn validate_class(diag: &mut ConfigDiagnostics, field: FieldPath, class: &str) {
        if class.is_empty() {
            diag.error(field, "class name must not be empty");
        } else if class.chars().any(char::is_whitespace) {
            diag.error(field, format!("class name `{class}` must not contain whitespace"));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.loading, "lazy-loading");
        assert_eq!(options.failed, "lazy-failed");
        assert_eq!(options.on, "autolazy");
        assert_eq!(options.loaded, "lazy-loaded");
        assert_eq!(options.attribute, "lazy");
        assert!(!options.native_support);
        assert!(options.proxy.starts_with("data:image/gif;base64,"));
        assert_eq!(options.observer.root, None);
        assert_eq!(options.observer.margin(), RootMargin::default());
        assert_eq!(options.observer.threshold, 0.0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_json_merges_over_defaults() {
        let options = Options::from_json(
            r#"{"loaded": "is-visible", "nativeSupport": true, "observer": {"rootMargin": "200px"}}"#,
        )
        .unwrap();

        assert_eq!(options.loaded, "is-visible");
        assert!(options.native_support);
        assert_eq!(options.loading, "lazy-loading");
        assert_eq!(options.observer.margin(), RootMargin::uniform(Length::Px(200.0)));
        assert_eq!(options.observer.threshold, 0.0);
    }

    #[test]
    fn test_json_unknown_keys_are_ignored_and_reported() {
        crate::logger::capture::start();
        let options = Options::from_json(r#"{"fancy": 1, "observer": {"delay": 3}}"#).unwrap();
        let lines = crate::logger::capture::take();

        assert_eq!(options, Options::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, "warning");
        assert!(lines[0].1.contains("fancy"));
        assert!(lines[0].1.contains("observer.delay"));
    }

    #[test]
    fn test_json_syntax_error() {
        let err = Options::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let err = Options::from_json(
            r#"{"attribute": "Lazy Load", "on": "", "observer": {"threshold": 1.5, "rootMargin": "1em"}}"#,
        )
        .unwrap_err();

        let ConfigError::Diagnostics(diag) = err else {
            panic!("expected diagnostics");
        };
        let fields: Vec<_> = diag.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["attribute", "on", "observer.rootMargin", "observer.threshold"]
        );
    }

    #[test]
    fn test_prefix_rules() {
        for ok in ["lazy", "my-lazy", "l2"] {
            let options = Options {
                attribute: ok.to_string(),
                ..Options::default()
            };
            assert!(options.validate().is_ok(), "{ok} should be valid");
        }
        for bad in ["", "-lazy", "lazy-", "la zy", "LAZY"] {
            let options = Options {
                attribute: bad.to_string(),
                ..Options::default()
            };
            assert!(options.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "attribute = \"defer\"\nloaded = \"done\"\n\n[observer]\nthreshold = 0.25\nroot = \"#feed\""
        )
        .unwrap();

        let options = Options::load(file.path()).unwrap();
        assert_eq!(options.attribute, "defer");
        assert_eq!(options.loaded, "done");
        assert_eq!(options.observer.threshold, 0.25);
        assert_eq!(options.observer.root.as_deref(), Some("#feed"));
    }

    #[test]
    fn test_missing_file() {
        let err = Options::load(Path::new("/definitely/not/here/autolazy.toml")).unwrap_err();
        assert!(err.to_string().contains("IO error"));
    }
}
