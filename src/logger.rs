//! Logging utilities with a module prefix.
//!
//! This module provides:
//! - `log!` macro for formatted output with a colored `[module]` prefix
//! - `debug!` macro that only prints in verbose mode
//!
//! Native builds write to stderr. With the `web` backend on wasm32 the
//! message goes to the browser console, routed by module name:
//! `error` uses `console.error`, `warning` uses `console.warn`.
//!
//! # Example
//!
//! ```ignore
//! log!("warning"; "no IntersectionObserver, lazy loading disabled");
//! debug!("reveal"; "unveiled {:?}", element);
//! ```

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global verbose flag
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when verbose mode is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    #[cfg(test)]
    capture::record(module, message);

    write_line(module, message);
}

#[cfg(not(all(feature = "web", target_arch = "wasm32")))]
fn write_line(module: &str, message: &str) {
    use std::io::Write;

    let prefix = colorize_prefix(module, &module.to_ascii_lowercase());
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{prefix} {message}").ok();
}

#[cfg(all(feature = "web", target_arch = "wasm32"))]
fn write_line(module: &str, message: &str) {
    let line = wasm_bindgen::JsValue::from_str(&format!("[{module}] {message}"));
    match module.to_ascii_lowercase().as_str() {
        "error" => web_sys::console::error_1(&line),
        "warning" => web_sys::console::warn_1(&line),
        _ => web_sys::console::log_1(&line),
    }
}

/// Apply color to a module prefix based on module type
#[inline]
#[cfg_attr(all(feature = "web", target_arch = "wasm32"), allow(dead_code))]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "error" => prefix.bright_red().bold().to_string(),
        "warning" => prefix.bright_yellow().bold().to_string(),
        _ => prefix.bright_blue().bold().to_string(),
    }
}

// ============================================================================
// Capture (tests only)
// ============================================================================

/// Per-thread log capture so tests can assert on emitted messages.
#[cfg(test)]
pub(crate) mod capture {
    use std::cell::RefCell;

    thread_local! {
        static LINES: RefCell<Option<Vec<(String, String)>>> = const { RefCell::new(None) };
    }

    pub(crate) fn record(module: &str, message: &str) {
        LINES.with(|lines| {
            if let Some(lines) = lines.borrow_mut().as_mut() {
                lines.push((module.to_string(), message.to_string()));
            }
        });
    }

    /// Start capturing log lines on the current thread.
    pub(crate) fn start() {
        LINES.with(|lines| *lines.borrow_mut() = Some(Vec::new()));
    }

    /// Stop capturing and return `(module, message)` pairs.
    pub(crate) fn take() -> Vec<(String, String)> {
        LINES.with(|lines| lines.borrow_mut().take().unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_records_module_and_message() {
        capture::start();
        crate::log!("error"; "fetch failed: {}", 404);
        let lines = capture::take();
        assert_eq!(lines, vec![("error".to_string(), "fetch failed: 404".to_string())]);
    }

    #[test]
    fn test_capture_inactive_by_default() {
        crate::log!("reveal"; "nothing to see");
        assert!(capture::take().is_empty());
    }

    #[test]
    fn test_colorize_prefix_keeps_module_name() {
        assert!(colorize_prefix("Error", "error").contains("[Error]"));
        assert!(colorize_prefix("watch", "watch").contains("[watch]"));
    }
}
