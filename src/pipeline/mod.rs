//! Lazy loading pipeline.
//!
//! Elements flow one way through the stages:
//!
//! ```text
//!  mutation batch
//!       │
//!  ┌────▼─────┐  script   ┌────────┐
//!  │ dispatch ├──────────►│ script │  page load + delay, then materialize
//!  └────┬─────┘           └────────┘
//!       │ img / video / audio / div
//!  ┌────▼─────┐
//!  │ locator  │  transient observer per batch: on screen or stash
//!  └────┬─────┘
//!       │ offscreen
//!  ┌────▼─────┐
//!  │ watcher  │  page-wide observer: classes, load listeners
//!  └────┬─────┘
//!       │ intersecting
//!  ┌────▼─────┐
//!  │  unveil  │  restore src / background, include, module
//!  └──────────┘
//! ```
//!
//! All stages share one [`Shared`] record. Host callbacks hold a `Weak`
//! reference to it, so dropping the controller stops the pipeline.

pub(crate) mod dispatch;
pub(crate) mod locator;
pub(crate) mod script;
pub(crate) mod unveil;
pub(crate) mod watcher;


use crate::config::Options;
use crate::core::{CancelToken, Markers};
use crate::host::Host;
use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// Shared state
// =============================================================================

/// Everything the stages need: the host, read-only options, and the
/// mutable subscription state.
pub(crate) struct Shared<H: Host> {
    pub host: Rc<H>,
    pub options: Options,
    pub markers: Markers,
    /// Cancelled on unmount; aborts in-flight fetches and imports.
    pub cancel: CancelToken,
    pub state: RefCell<State<H>>,
}

/// A transient placement subscription for one discovery batch.
pub(crate) struct Placement<H: Host> {
    pub id: u64,
    pub observer: H::Intersection,
    /// Elements of the batch not classified yet.
    pub pending: Vec<H::Element>,
}

pub(crate) struct State<H: Host> {
    pub discovery: Option<H::Mutations>,
    /// Page-wide visibility subscription.
    pub watcher: Option<H::Intersection>,
    /// Members of the watcher's watch set.
    pub watched: Vec<H::Element>,
    pub placements: Vec<Placement<H>>,
    /// Finished placement observers, dropped on the next batch so no
    /// observer is released from inside its own callback.
    pub retired: Vec<H::Intersection>,
    pub next_placement: u64,
    pub mounted: bool,
}

impl<H: Host> Default for State<H> {
    fn default() -> Self {
        Self {
            discovery: None,
            watcher: None,
            watched: Vec::new(),
            placements: Vec::new(),
            retired: Vec::new(),
            next_placement: 0,
            mounted: false,
        }
    }
}

impl<H: Host> Shared<H> {
    pub fn new(host: Rc<H>, options: Options) -> Self {
        let markers = Markers::new(&options.attribute);
        Self {
            host,
            options,
            markers,
            cancel: CancelToken::new(),
            state: RefCell::new(State::default()),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.state.borrow().mounted
    }
}
