//! Bootstrap and the control handle.
//!
//! [`bootstrap`] wires the pipeline onto a host and returns the only
//! [`Controller`] for it. Callers keep the controller; dropping it stops
//! every subscription callback from doing work.
//!
//! # Example
//!
//! ```ignore
//! let page = SimPage::new();
//! let lazy = bootstrap(page.clone(), Options::default())?;
//! page.parse_body(html);
//! page.settle();
//! lazy.update(None);
//! lazy.unmount();
//! ```

use crate::config::{ConfigError, Options};
use crate::host::{Capabilities, Dom, Host, IntersectionWatch, MutationWatch};
use crate::pipeline::{Shared, dispatch, unveil, watcher};
use crate::{debug, log};
use std::rc::Rc;

/// Start lazy loading on `host`.
///
/// Invalid options are an error. A host lacking an observer primitive
/// yields an inert controller: nothing is processed automatically, and
/// [`Controller::watch`] and [`Controller::update`] reveal on the spot.
pub fn bootstrap<H: Host + 'static>(host: Rc<H>, options: Options) -> Result<Controller<H>, ConfigError> {
    options.validate()?;

    let shared = Rc::new(Shared::new(host, options));
    let capabilities = shared.host.capabilities();
    if !capabilities.is_complete() {
        log!("warning"; "no {}, automatic lazy loading disabled", missing(capabilities));
        return Ok(Controller { shared, inert: true });
    }
    if shared.host.body().is_none() {
        log!("warning"; "document has no body, automatic lazy loading disabled");
        return Ok(Controller { shared, inert: true });
    }

    let started = watcher::start(&shared) && dispatch::start(&shared);
    let controller = Controller {
        shared,
        inert: !started,
    };
    if started {
        controller.shared.state.borrow_mut().mounted = true;
        debug!("mount"; "watching the document body");
    } else {
        log!("warning"; "observers unavailable, automatic lazy loading disabled");
        controller.disconnect();
    }
    Ok(controller)
}

fn missing(capabilities: Capabilities) -> &'static str {
    match (capabilities.mutations, capabilities.intersections) {
        (false, false) => "MutationObserver and IntersectionObserver",
        (false, true) => "MutationObserver",
        _ => "IntersectionObserver",
    }
}

/// Handle to a running (or inert) pipeline.
pub struct Controller<H: Host> {
    shared: Rc<Shared<H>>,
    inert: bool,
}

impl<H: Host + 'static> Controller<H> {
    pub fn options(&self) -> &Options {
        &self.shared.options
    }

    pub fn host(&self) -> &Rc<H> {
        &self.shared.host
    }

    /// Whether automatic processing is running.
    pub fn is_active(&self) -> bool {
        self.shared.is_mounted()
    }

    /// Whether bootstrap found the host lacking.
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// Register `el` for visibility tracking.
    ///
    /// Returns whether the element joined the watch set. On an inert
    /// controller the element is revealed immediately instead.
    pub fn watch(&self, el: &H::Element) -> bool {
        if self.inert {
            unveil::fallback(&self.shared, el);
            return false;
        }
        self.shared.is_mounted() && watcher::watch(&self.shared, el)
    }

    /// Reveal `el` now, whatever its position.
    pub fn unveil(&self, el: &H::Element) {
        unveil::reveal(&self.shared, el);
    }

    /// Route every element matching `selector` (default `[data-<prefix>]`)
    /// through discovery again; returns how many were taken in.
    pub fn update(&self, selector: Option<&str>) -> usize {
        if !self.inert && !self.shared.is_mounted() {
            return 0;
        }
        let selector = selector
            .map(str::to_string)
            .unwrap_or_else(|| self.shared.markers.default_selector());
        let elements = self.shared.host.query_selector_all(&selector);
        debug!("update"; "`{}` matched {} element(s)", selector, elements.len());
        dispatch::route(&self.shared, elements)
    }

    /// Stop all automatic processing and abort pending includes.
    pub fn unmount(&self) {
        if !self.shared.is_mounted() {
            return;
        }
        self.disconnect();
        self.shared.cancel.cancel();
        debug!("mount"; "unmounted");
    }

    fn disconnect(&self) {
        let (discovery, watcher, placements, retired) = {
            let mut state = self.shared.state.borrow_mut();
            state.mounted = false;
            state.watched.clear();
            (
                state.discovery.take(),
                state.watcher.take(),
                std::mem::take(&mut state.placements),
                std::mem::take(&mut state.retired),
            )
        };
        if let Some(discovery) = discovery {
            discovery.disconnect();
        }
        if let Some(watcher) = watcher {
            watcher.disconnect();
        }
        for placement in placements {
            placement.observer.disconnect();
        }
        drop(retired);
    }
}
