//! Page-wide visibility watcher.
//!
//! Holds the watch set of off-screen elements. The first intersecting
//! notification for a member engages it: state classes, a load/error
//! listener on the resource being restored, then reveal. Members leave the
//! set before they are revealed, so each registration reveals at most once.

use super::{Shared, unveil};
use crate::core::Sidecar;
use crate::host::{Dom, Host, IntersectionEntry, IntersectionWatch, ObserverConfig, ResourceEvent};
use crate::log;
use std::rc::Rc;

/// Create the page-wide subscription from the observer options.
pub(crate) fn start<H: Host + 'static>(shared: &Rc<Shared<H>>) -> bool {
    let config = observer_config(shared);
    let weak = Rc::downgrade(shared);
    let observer = shared.host.observe_intersections(
        &config,
        Box::new(move |entries| {
            if let Some(shared) = weak.upgrade() {
                on_entries(&shared, entries);
            }
        }),
    );
    match observer {
        Some(observer) => {
            shared.state.borrow_mut().watcher = Some(observer);
            true
        }
        None => false,
    }
}

fn observer_config<H: Host>(shared: &Shared<H>) -> ObserverConfig<H::Element> {
    let options = &shared.options.observer;
    let root = options.root.as_deref().and_then(|selector| {
        let root = shared.host.query_selector_all(selector).into_iter().next();
        if root.is_none() {
            log!("warning"; "observer root `{}` matches nothing, using the viewport", selector);
        }
        root
    });
    ObserverConfig {
        root,
        margin: options.margin(),
        threshold: options.threshold,
    }
}

/// Add `el` to the watch set; false when it is a member already or the
/// watcher is not running.
pub(crate) fn watch<H: Host>(shared: &Shared<H>, el: &H::Element) -> bool {
    prune(shared);
    let mut state = shared.state.borrow_mut();
    if state.watched.contains(el) {
        return false;
    }
    let Some(watcher) = state.watcher.as_ref() else {
        return false;
    };
    watcher.observe(el);
    state.watched.push(el.clone());
    true
}

fn on_entries<H: Host + 'static>(shared: &Rc<Shared<H>>, entries: Vec<IntersectionEntry<H::Element>>) {
    prune(shared);
    for entry in entries.into_iter().filter(|entry| entry.is_intersecting) {
        if release(shared, &entry.target) {
            engage(shared, &entry.target);
        }
    }
}

/// Drop members that left the document before they ever intersected.
fn prune<H: Host>(shared: &Shared<H>) {
    let mut state = shared.state.borrow_mut();
    let state = &mut *state;
    let watcher = state.watcher.as_ref();
    state.watched.retain(|el| {
        let connected = shared.host.is_connected(el);
        if !connected && let Some(watcher) = watcher {
            watcher.unobserve(el);
        }
        connected
    });
}

/// Remove `el` from the watch set and stop observing it.
fn release<H: Host>(shared: &Shared<H>, el: &H::Element) -> bool {
    let mut state = shared.state.borrow_mut();
    let Some(index) = state.watched.iter().position(|member| member == el) else {
        return false;
    };
    state.watched.swap_remove(index);
    if let Some(watcher) = state.watcher.as_ref() {
        watcher.unobserve(el);
    }
    true
}

/// Mark `el` as revealing, monitor its resource and reveal it.
///
/// Listeners go in before reveal assigns the real URL.
pub(crate) fn engage<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element) {
    let host = &*shared.host;
    let options = &shared.options;
    host.add_class(el, &options.on);
    host.add_class(el, &options.loading);

    let sidecar = Sidecar::read(host, el, &shared.markers);
    if sidecar.pending_resource().is_some() {
        let weak = Rc::downgrade(shared);
        let target = el.clone();
        host.on_resource_event(
            el,
            Box::new(move |event| {
                if let Some(shared) = weak.upgrade() {
                    apply_outcome(&shared, &target, event);
                }
            }),
        );
    } else if let Some(url) = sidecar.background_url() {
        // Off-document probe, only to learn when the background arrives
        let weak = Rc::downgrade(shared);
        let target = el.clone();
        host.probe_image(
            &url,
            Box::new(move |event| {
                if let Some(shared) = weak.upgrade() {
                    apply_outcome(&shared, &target, event);
                }
            }),
        );
    } else {
        // Nothing to wait for
        apply_outcome(shared, el, ResourceEvent::Load);
    }

    unveil::reveal(shared, el);
}

fn apply_outcome<H: Host>(shared: &Shared<H>, el: &H::Element, event: ResourceEvent) {
    let host = &*shared.host;
    let options = &shared.options;
    match event {
        ResourceEvent::Load => {
            host.add_class(el, &options.loaded);
            host.remove_class(el, &options.loading);
        }
        ResourceEvent::Error => host.add_class(el, &options.failed),
    }
}
