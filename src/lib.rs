//! Autolazy - lazy loading for images, media, backgrounds, fragments and scripts.
//!
//! Elements are discovered as they enter the document, classified once by
//! their position, and revealed when they approach the viewport. Scripts
//! marked lazy run only after the page has loaded.
//!
//! # Module Structure
//!
//! ```text
//! src/
//! ├── logger.rs      # log! / debug! macros
//! ├── config/        # Options, validation diagnostics
//! ├── core/          # geometry, element kinds, markers, sidecar, cancel token
//! ├── host/          # Dom / Host traits, in-memory page, web backend
//! ├── pipeline/      # dispatch → locator → watcher → unveil, script loader
//! ├── controller.rs  # bootstrap() and Controller
//! └── utils/         # html helpers
//! ```

#[macro_use]
pub mod logger;

pub mod config;
pub mod controller;
pub mod core;
pub mod host;
mod pipeline;
pub mod utils;

pub use config::Options;
pub use controller::{Controller, bootstrap};
