//! Deferred scripts.
//!
//! A `<script data-lazy="...">` never runs on its own. After the page load
//! event, and after its optional `data-lazy-delay`, a fresh script element
//! with the real `src` takes its place. The loader outlives `unmount`.

use super::{Shared, unveil};
use crate::core::{Markers, Sidecar};
use crate::debug;
use crate::host::{Dom, Host};
use std::rc::Rc;

/// Schedule `el` to be materialized once the page has loaded.
pub(crate) fn defer<H: Host + 'static>(shared: &Shared<H>, el: &H::Element) {
    let delay = Sidecar::read(&*shared.host, el, &shared.markers).delay();
    let host = Rc::downgrade(&shared.host);
    let markers = shared.markers.clone();
    let original = el.clone();
    debug!("script"; "deferred {:?} by {:?} after load", el, delay);

    shared.host.on_page_load(Box::new(move || {
        let Some(page) = host.upgrade() else {
            return;
        };
        // Always a fresh task, even without a delay
        page.set_timeout(
            delay,
            Box::new(move || {
                if let Some(page) = host.upgrade() {
                    materialize(&*page, &original, &markers);
                }
            }),
        );
    }));
}

/// Swap the inert original for an executable copy.
pub(crate) fn materialize<D: Dom + ?Sized>(dom: &D, original: &D::Element, markers: &Markers) {
    if !dom.is_connected(original) {
        debug!("script"; "{:?} left the document, not loading", original);
        return;
    }
    let Some(src) = dom
        .attribute(original, &markers.base)
        .filter(|src| !src.is_empty())
    else {
        return;
    };

    let Some(script) = dom.create_element("script") else {
        return;
    };
    unveil::copy_attributes(dom, original, &script, markers);
    dom.set_attribute(&script, "src", &src);
    if dom.insert_before(&script, original) {
        dom.remove(original);
        debug!("script"; "loading `{}`", src);
    }
}
