//! Type-safe option field path.

use owo_colors::OwoColorize;
use std::fmt;

/// A type-safe wrapper for option field paths.
///
/// Used by validation so every diagnostic names the exact key the host
/// page has to fix.
///
/// # Example
///
/// ```ignore
/// diag.error(Options::FIELDS.threshold, "must be within [0, 1]");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(pub &'static str);

impl FieldPath {
    #[inline]
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_args!("`{}`", self.0).bright_blue())
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        self.0
    }
}
