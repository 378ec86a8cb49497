//! Core types - pure abstractions shared across the pipeline.

mod cancel;
mod geometry;
mod kind;
mod markers;
mod sidecar;

pub use cancel::{CancelToken, HookId};
pub use geometry::{Rect, Viewport, in_viewport, intersection_ratio, intersection_state};
pub use kind::LazyKind;
pub use markers::{Markers, NO_LAZY_CLASS};
pub use sidecar::Sidecar;
