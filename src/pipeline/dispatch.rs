//! Discovery: route elements added under the body.
//!
//! Scripts carrying the base marker go to the script loader. Images, media
//! and containers go to placement as one batch per mutation delivery.
//! Everything else, including `no-lazy` elements, is ignored.

use super::{Shared, locator, script, unveil};
use crate::core::{LazyKind, Markers, NO_LAZY_CLASS};
use crate::debug;
use crate::host::{AddedNode, Dom, Host, MutationRecord};
use std::rc::Rc;

/// Where a discovered element goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    Skip,
    Script,
    Place,
}

/// Decide the destination of one element.
///
/// Script and placement routing are mutually exclusive.
pub(crate) fn classify<D: Dom + ?Sized>(dom: &D, el: &D::Element, markers: &Markers) -> Destination {
    if dom.has_class(el, NO_LAZY_CLASS) {
        return Destination::Skip;
    }
    match LazyKind::from_tag(&dom.tag_name(el)) {
        Some(LazyKind::Script) => {
            let marked = dom
                .attribute(el, &markers.base)
                .is_some_and(|src| !src.is_empty());
            if marked {
                Destination::Script
            } else {
                Destination::Skip
            }
        }
        Some(kind) if kind.is_placeable() => Destination::Place,
        _ => Destination::Skip,
    }
}

/// Subscribe to node additions under the body.
pub(crate) fn start<H: Host + 'static>(shared: &Rc<Shared<H>>) -> bool {
    let Some(body) = shared.host.body() else {
        return false;
    };
    let weak = Rc::downgrade(shared);
    let discovery = shared.host.observe_mutations(
        &body,
        Box::new(move |records| {
            if let Some(shared) = weak.upgrade() {
                on_mutations(&shared, records);
            }
        }),
    );
    match discovery {
        Some(discovery) => {
            shared.state.borrow_mut().discovery = Some(discovery);
            true
        }
        None => false,
    }
}

fn on_mutations<H: Host + 'static>(shared: &Rc<Shared<H>>, records: Vec<MutationRecord<H::Element>>) {
    if !shared.is_mounted() {
        return;
    }
    let added = records
        .into_iter()
        .flat_map(|record| record.added)
        .filter_map(|node| match node {
            AddedNode::Element(el) => Some(el),
            AddedNode::Other => None,
        });
    route(shared, added);
}

/// Route `elements` and return how many were taken in.
///
/// Without a running pipeline, placeable elements are revealed on the
/// spot instead of being placed.
pub(crate) fn route<H: Host + 'static>(
    shared: &Rc<Shared<H>>,
    elements: impl IntoIterator<Item = H::Element>,
) -> usize {
    let mut batch: Vec<H::Element> = Vec::new();
    let mut routed = 0;

    for el in elements {
        match classify(&*shared.host, &el, &shared.markers) {
            Destination::Script => {
                script::defer(shared, &el);
                routed += 1;
            }
            Destination::Place if !batch.contains(&el) => {
                batch.push(el);
                routed += 1;
            }
            Destination::Place | Destination::Skip => {}
        }
    }

    if batch.is_empty() {
        return routed;
    }
    debug!("discover"; "{} element(s) to place", batch.len());
    if shared.is_mounted() {
        locator::place(shared, batch);
    } else {
        for el in &batch {
            unveil::fallback(shared, el);
        }
    }
    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimPage;

    #[test]
    fn test_classify() {
        let page = SimPage::new();
        let markers = Markers::new("lazy");
        let nodes = page.append_html(
            page.body_id(),
            concat!(
                r#"<script data-lazy="/js/a.js"></script>"#,
                r#"<script src="/js/b.js"></script>"#,
                r#"<img src="a.jpg">"#,
                r#"<video></video>"#,
                r#"<div></div>"#,
                r#"<p></p>"#,
                r#"<img class="hero no-lazy" src="b.jpg">"#,
                r#"<script class="no-lazy" data-lazy="/js/c.js"></script>"#,
            ),
        );
        let destinations: Vec<Destination> = nodes
            .iter()
            .map(|node| classify(&*page, node, &markers))
            .collect();
        assert_eq!(
            destinations,
            vec![
                Destination::Script,
                Destination::Skip,
                Destination::Place,
                Destination::Place,
                Destination::Place,
                Destination::Skip,
                Destination::Skip,
                Destination::Skip,
            ]
        );
    }

    #[test]
    fn test_empty_script_marker_is_skipped() {
        let page = SimPage::new();
        let markers = Markers::new("lazy");
        let nodes = page.append_html(page.body_id(), r#"<script data-lazy=""></script>"#);
        assert_eq!(classify(&*page, &nodes[0], &markers), Destination::Skip);
    }
}
