//! Placement: decide once whether a discovered element is already visible.
//!
//! Each discovery batch gets a transient visibility subscription. Its first
//! notification per element carries the element's bounding rectangle:
//!
//! - on screen: images get a high fetch priority and a preload hint,
//!   pending content is revealed right away
//! - off screen: the real `src`, `srcset` or background moves into the
//!   sidecar attributes and the element joins the page-wide watch set
//!
//! The subscription is disconnected once every element of its batch has
//! been placed.

use super::{Placement, Shared, unveil, watcher};
use crate::core::{LazyKind, NO_LAZY_CLASS, Sidecar, in_viewport};
use crate::debug;
use crate::host::{Dom, Host, IntersectionEntry, IntersectionWatch, ObserverConfig};
use std::rc::Rc;

// ============================================================================
// Subscription
// ============================================================================

/// Start placing `elements` as one batch.
pub(crate) fn place<H: Host + 'static>(shared: &Rc<Shared<H>>, elements: Vec<H::Element>) {
    if elements.is_empty() {
        return;
    }

    // Observers finished by earlier batches are released here, outside of
    // their own callbacks
    let retired = std::mem::take(&mut shared.state.borrow_mut().retired);
    drop(retired);

    let id = {
        let mut state = shared.state.borrow_mut();
        state.next_placement += 1;
        state.next_placement
    };

    let weak = Rc::downgrade(shared);
    let observer = shared.host.observe_intersections(
        &ObserverConfig::default(),
        Box::new(move |entries| {
            if let Some(shared) = weak.upgrade() {
                locate(&shared, id, entries);
            }
        }),
    );
    let Some(observer) = observer else {
        for el in &elements {
            unveil::fallback(shared, el);
        }
        return;
    };

    for el in &elements {
        observer.observe(el);
    }
    shared.state.borrow_mut().placements.push(Placement {
        id,
        observer,
        pending: elements,
    });
}

fn locate<H: Host + 'static>(shared: &Rc<Shared<H>>, id: u64, entries: Vec<IntersectionEntry<H::Element>>) {
    let viewport = shared.host.viewport();

    for entry in entries {
        if !claim(shared, id, &entry.target) {
            continue;
        }
        let el = &entry.target;
        if shared.host.has_class(el, NO_LAZY_CLASS) {
            debug!("locate"; "{:?} opted out", el);
            continue;
        }
        let Some(kind) = LazyKind::from_tag(&shared.host.tag_name(el)) else {
            continue;
        };
        if in_viewport(&entry.bounding_rect, viewport) {
            on_screen(shared, el, kind);
        } else {
            off_screen(shared, el, kind);
        }
    }

    finish(shared, id);
}

/// Take `target` out of batch `id`; false when it was placed already.
fn claim<H: Host>(shared: &Shared<H>, id: u64, target: &H::Element) -> bool {
    let mut state = shared.state.borrow_mut();
    let Some(placement) = state.placements.iter_mut().find(|p| p.id == id) else {
        return false;
    };
    let Some(index) = placement.pending.iter().position(|el| el == target) else {
        return false;
    };
    placement.pending.swap_remove(index);
    placement.observer.unobserve(target);
    true
}

/// Disconnect batch `id` once all of its elements are placed.
fn finish<H: Host>(shared: &Shared<H>, id: u64) {
    let mut state = shared.state.borrow_mut();
    let Some(index) = state
        .placements
        .iter()
        .position(|p| p.id == id && p.pending.is_empty())
    else {
        return;
    };
    let placement = state.placements.swap_remove(index);
    placement.observer.disconnect();
    state.retired.push(placement.observer);
}

// ============================================================================
// Decisions
// ============================================================================

fn on_screen<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element, kind: LazyKind) {
    let host = &*shared.host;
    let sidecar = Sidecar::read(host, el, &shared.markers);

    if kind == LazyKind::Image {
        host.set_attribute(el, "fetchpriority", "high");
        host.set_attribute(el, "decoding", "async");
        let href = host
            .attribute(el, "src")
            .filter(|src| !src.is_empty())
            .or_else(|| sidecar.pending_resource().map(str::to_string));
        if let Some(href) = href {
            preload(host, &href);
        }
    }

    if sidecar.has_deferred_content() {
        host.add_class(el, &shared.options.loaded);
        unveil::reveal(shared, el);
    } else if sidecar.pending_resource().is_some() || sidecar.pending_background().is_some() {
        watcher::engage(shared, el);
    }
    debug!("locate"; "{} {:?} on screen", kind.name(), el);
}

/// Append a `<link rel=preload as=image>` hint for `href` to the head.
fn preload<D: Dom + ?Sized>(dom: &D, href: &str) {
    let Some(head) = dom.head() else {
        return;
    };
    let Some(link) = dom.create_element("link") else {
        return;
    };
    dom.set_attribute(&link, "rel", "preload");
    dom.set_attribute(&link, "as", "image");
    dom.set_attribute(&link, "href", href);
    dom.set_attribute(&link, "fetchpriority", "high");
    dom.append_child(&head, &link);
}

fn off_screen<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element, kind: LazyKind) {
    let host = &*shared.host;
    let markers = &shared.markers;
    let options = &shared.options;

    if kind == LazyKind::Container {
        let background = host.style_property(el, "background-image");
        if !background.is_empty() && background != "none" {
            host.set_attribute(el, &markers.bkg, &background);
            host.set_style_property(el, "background-image", "none");
        }
        // Plain containers have nothing to defer
        let sidecar = Sidecar::read(host, el, markers);
        let pending = sidecar.pending_background().is_some()
            || sidecar.pending_resource().is_some()
            || sidecar.has_deferred_content()
            || sidecar.wrapper.as_deref().is_some_and(|tag| !tag.is_empty());
        if !pending {
            return;
        }
    } else {
        let native = host.attribute(el, "loading").as_deref() == Some("lazy");
        if options.native_support && native {
            debug!("locate"; "{:?} left to native lazy loading", el);
            return;
        }
        if kind.is_media() && host.attribute(el, "poster").is_none_or(|poster| poster.is_empty()) {
            host.set_attribute(el, "poster", &options.proxy);
        }
        stash(host, el, kind, "src", &markers.base, &options.proxy);
        stash(host, el, kind, "srcset", &markers.srcset, &options.proxy);
    }

    debug!("locate"; "{} {:?} off screen", kind.name(), el);
    watcher::watch(shared, el);
}

/// Move a live attribute into its sidecar marker and blank it.
///
/// Images drop the attribute so no request goes out; media get the
/// placeholder URI.
fn stash<D: Dom + ?Sized>(dom: &D, el: &D::Element, kind: LazyKind, name: &str, marker: &str, proxy: &str) {
    let Some(value) = dom.attribute(el, name).filter(|value| !value.is_empty()) else {
        return;
    };
    if value == proxy {
        return;
    }
    dom.set_attribute(el, marker, &value);
    if kind == LazyKind::Image {
        dom.remove_attribute(el, name);
    } else {
        dom.set_attribute(el, name, proxy);
    }
}
