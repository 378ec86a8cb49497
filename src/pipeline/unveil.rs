//! Reveal: swap placeholders for the real content of one element.
//!
//! Steps, each gated on its own marker:
//!
//! 1. background, or `src` and `srcset`, restored from the sidecar
//! 2. wrapper: replace the element with a new one of the wrapper tag whose
//!    content is the fetched include or the element's own markup
//! 3. module: import the module, then replace the element with an inline
//!    module script importing from it
//! 4. base marker removed
//!
//! Every marker is consumed as its step starts, so a second call finds
//! nothing left to do. A failed include or import puts its markers back
//! and keeps the original element.

use super::Shared;
use crate::core::{Markers, Sidecar};
use crate::host::{Dom, Host, HostError};
use crate::{debug, log};
use std::rc::Rc;

/// Reveal `el`. Safe to call any number of times.
pub(crate) fn reveal<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element) {
    let host = &*shared.host;
    let markers = &shared.markers;
    let sidecar = Sidecar::read(host, el, markers);

    if let Some(background) = &sidecar.background {
        host.set_style_property(el, "background-image", background);
        host.remove_attribute(el, &markers.bkg);
    } else {
        if let Some(resource) = sidecar.pending_resource() {
            host.set_attribute(el, "src", resource);
        }
        if let Some(resource_set) = &sidecar.resource_set {
            host.set_attribute(el, "srcset", resource_set);
            host.remove_attribute(el, &markers.srcset);
        }
    }

    if let Some(tag) = wrapper_tag(host, el, &sidecar) {
        wrap(shared, el, &sidecar, tag);
    }

    if let Some(specifier) = sidecar.module.as_deref().filter(|m| !m.is_empty()) {
        import(shared, el, &sidecar, specifier);
    }

    if sidecar.resource.is_some() {
        host.remove_attribute(el, &markers.base);
    }
    debug!("reveal"; "{:?}", el);
}

/// Reveal without a watcher: unveil and mark as loaded.
pub(crate) fn fallback<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element) {
    reveal(shared, el);
    shared.host.add_class(el, &shared.options.loaded);
}

/// Tag of the replacement element: the wrapper marker, or the element's own
/// tag for an include without one.
fn wrapper_tag<D: Dom + ?Sized>(dom: &D, el: &D::Element, sidecar: &Sidecar) -> Option<String> {
    match sidecar.wrapper.as_deref() {
        Some(tag) if !tag.trim().is_empty() => Some(tag.trim().to_ascii_lowercase()),
        _ if sidecar.include.as_deref().is_some_and(|url| !url.is_empty()) => Some(dom.tag_name(el)),
        _ => None,
    }
}

// ============================================================================
// Include
// ============================================================================

fn wrap<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element, sidecar: &Sidecar, tag: String) {
    let host = &*shared.host;
    let markers = &shared.markers;
    host.remove_attribute(el, &markers.wrapper);
    host.remove_attribute(el, &markers.include);

    let Some(url) = sidecar.include.as_deref().filter(|url| !url.is_empty()) else {
        let inner = host.inner_html(el);
        replace(shared, el, &tag, &inner);
        return;
    };

    let weak = Rc::downgrade(shared);
    let original = el.clone();
    let restore = Sidecar {
        wrapper: sidecar.wrapper.clone(),
        include: sidecar.include.clone(),
        ..Sidecar::default()
    };
    let url_owned = url.to_string();
    host.fetch_text(
        url,
        &shared.cancel,
        Box::new(move |result| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match result {
                Ok(body) => {
                    if shared.host.is_connected(&original) {
                        replace(&shared, &original, &tag, &body);
                        debug!("include"; "spliced `{}`", url_owned);
                    }
                }
                Err(HostError::Aborted) => debug!("include"; "fetch of `{}` aborted", url_owned),
                Err(err) => {
                    log!("error"; "include {}", err);
                    restore.restore(&*shared.host, &original, &shared.markers);
                }
            }
        }),
    );
}

// ============================================================================
// Module
// ============================================================================

fn import<H: Host + 'static>(shared: &Rc<Shared<H>>, el: &H::Element, sidecar: &Sidecar, specifier: &str) {
    let host = &*shared.host;
    let markers = &shared.markers;
    host.remove_attribute(el, &markers.module);
    host.remove_attribute(el, &markers.import);

    let weak = Rc::downgrade(shared);
    let original = el.clone();
    let binding = sidecar.import.clone().filter(|name| !name.trim().is_empty());
    let restore = Sidecar {
        module: sidecar.module.clone(),
        import: sidecar.import.clone(),
        ..Sidecar::default()
    };
    let specifier_owned = specifier.to_string();
    host.import_module(
        specifier,
        Box::new(move |result| {
            let specifier = specifier_owned;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if shared.cancel.is_cancelled() {
                debug!("module"; "import of `{}` dropped after unmount", specifier);
                return;
            }
            match result {
                Ok(()) => {
                    let host = &*shared.host;
                    if !host.is_connected(&original) {
                        return;
                    }
                    host.set_attribute(&original, "type", "module");
                    let body = module_body(&specifier, binding.as_deref(), &host.inner_html(&original));
                    replace(&shared, &original, "script", &body);
                    debug!("module"; "loaded `{}`", specifier);
                }
                Err(err) => {
                    log!("error"; "module {}", err);
                    restore.restore(&*shared.host, &original, &shared.markers);
                }
            }
        }),
    );
}

/// Inline module body: the import line, then the element's own code.
pub(crate) fn module_body(specifier: &str, binding: Option<&str>, inner: &str) -> String {
    match binding {
        Some(binding) => format!("import {binding} from '{specifier}';\n{inner}"),
        None => format!("import '{specifier}';\n{inner}"),
    }
}

// ============================================================================
// Replacement
// ============================================================================

/// Copy every attribute outside the lazy family from `from` to `to`.
pub(crate) fn copy_attributes<D: Dom + ?Sized>(dom: &D, from: &D::Element, to: &D::Element, markers: &Markers) {
    for name in dom.attribute_names(from) {
        if markers.is_lazy_attribute(&name) {
            continue;
        }
        if let Some(value) = dom.attribute(from, &name) {
            dom.set_attribute(to, &name, &value);
        }
    }
}

/// Put a new `tag` element holding `inner` right after `original`, then
/// drop the original.
fn replace<H: Host>(shared: &Shared<H>, original: &H::Element, tag: &str, inner: &str) {
    let host = &*shared.host;
    let Some(replacement) = host.create_element(tag) else {
        log!("error"; "cannot create a `{}` element", tag);
        return;
    };
    host.set_inner_html(&replacement, inner);
    copy_attributes(host, original, &replacement, &shared.markers);
    if host.insert_after(&replacement, original) {
        host.remove(original);
    }
}
