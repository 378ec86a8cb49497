//! Deterministic in-memory page.
//!
//! `SimPage` implements [`Host`] without a browser: an arena document,
//! block layout, observers evaluated in a rendering step, and a virtual
//! clock driving timers, resource loads, fetches and imports.
//!
//! # Module Structure
//!
//! ```text
//! sim/
//! ├── tree        # arena Document, serialization
//! ├── parse       # HTML fragments via tl
//! ├── style       # inline style declarations
//! ├── selector    # minimal selector engine
//! ├── layout      # block layout
//! ├── event_loop  # microtasks and timers on a virtual clock
//! ├── network     # canned responses and request log
//! └── mod.rs      # SimPage (this file)
//! ```
//!
//! # Running the loop
//!
//! Nothing happens until the page is driven: [`SimPage::settle`] runs
//! microtasks, rendering steps and every timer due now; [`SimPage::advance`]
//! also moves the clock. Scrolling and resizing take effect at the next
//! rendering step.
//!
//! ```ignore
//! let page = SimPage::new();
//! page.append_html(page.body_id(), r#"<div height="2000"></div><img src="a.jpg">"#);
//! page.scroll_to(1500.0);
//! page.settle();
//! ```

mod event_loop;
mod layout;
mod network;
mod parse;
mod selector;
mod style;
mod tree;

pub use network::DEFAULT_BASE_URL;
pub use tree::NodeId;

use super::{
    AddedNode, Capabilities, Dom, Host, HostError, IntersectionCallback, IntersectionEntry,
    IntersectionWatch, MutationCallback, MutationRecord, MutationWatch, ObserverConfig,
    ResourceEvent, Task,
};
use crate::core::{CancelToken, Rect, Viewport, intersection_state};
use crate::{debug, log};
use event_loop::EventLoop;
use network::{Network, Route};
use rustc_hash::FxHashMap;
use selector::SelectorList;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tree::Document;
use url::Url;

/// Loop iterations after which `settle` gives up on a page that never
/// quiesces.
const MAX_TURNS: usize = 100_000;

type ResourceListener = Box<dyn FnOnce(ResourceEvent)>;

// ============================================================================
// Builder
// ============================================================================

/// Configuration for a [`SimPage`].
#[derive(Debug, Clone)]
pub struct SimPageBuilder {
    viewport: Viewport,
    capabilities: Capabilities,
    base_url: Option<Url>,
    resource_latency: Duration,
    fetch_latency: Duration,
    module_latency: Duration,
}

impl Default for SimPageBuilder {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1024.0, 768.0),
            capabilities: Capabilities::ALL,
            base_url: Url::parse(DEFAULT_BASE_URL).ok(),
            resource_latency: Duration::from_millis(10),
            fetch_latency: Duration::from_millis(30),
            module_latency: Duration::from_millis(20),
        }
    }
}

impl SimPageBuilder {
    pub fn viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Simulate a host without `MutationObserver`.
    pub fn without_mutation_observer(mut self) -> Self {
        self.capabilities.mutations = false;
        self
    }

    /// Simulate a host without `IntersectionObserver`.
    pub fn without_intersection_observer(mut self) -> Self {
        self.capabilities.intersections = false;
        self
    }

    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Delay before an image, script or preload finishes loading.
    pub fn resource_latency(mut self, latency: Duration) -> Self {
        self.resource_latency = latency;
        self
    }

    /// Delay before a text fetch settles.
    pub fn fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    /// Delay before a dynamic import settles.
    pub fn module_latency(mut self, latency: Duration) -> Self {
        self.module_latency = latency;
        self
    }

    pub fn build(self) -> Rc<SimPage> {
        Rc::new_cyclic(|this| SimPage {
            this: this.clone(),
            doc: RefCell::new(Document::new()),
            event_loop: RefCell::new(EventLoop::default()),
            network: RefCell::new(Network::new(self.base_url)),
            capabilities: self.capabilities,
            viewport: Cell::new(self.viewport),
            scroll_y: Cell::new(0.0),
            loaded: Cell::new(false),
            load_listeners: RefCell::new(Vec::new()),
            mutation_observers: RefCell::new(Vec::new()),
            intersection_observers: RefCell::new(Vec::new()),
            resource_listeners: RefCell::new(FxHashMap::default()),
            resource_latency: self.resource_latency,
            fetch_latency: self.fetch_latency,
            module_latency: self.module_latency,
        })
    }
}

// ============================================================================
// Observers
// ============================================================================

struct MutationState {
    root: NodeId,
    records: RefCell<Vec<MutationRecord<NodeId>>>,
    callback: RefCell<Option<MutationCallback<NodeId>>>,
    connected: Cell<bool>,
    scheduled: Cell<bool>,
}

impl MutationState {
    /// Deliver queued records, run as a microtask.
    fn deliver(&self) {
        self.scheduled.set(false);
        let records = std::mem::take(&mut *self.records.borrow_mut());
        if records.is_empty() || !self.connected.get() {
            return;
        }
        let callback = self.callback.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback(records);
            let mut slot = self.callback.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}

/// Mutation subscription handle of a [`SimPage`].
pub struct SimMutations {
    page: Weak<SimPage>,
    state: Rc<MutationState>,
}

impl MutationWatch for SimMutations {
    fn disconnect(&self) {
        self.state.connected.set(false);
        self.state.records.borrow_mut().clear();
        if let Some(page) = self.page.upgrade() {
            page.mutation_observers
                .borrow_mut()
                .retain(|state| !Rc::ptr_eq(state, &self.state));
        }
    }
}

struct IntersectionState {
    config: ObserverConfig<NodeId>,
    /// Observed targets with the last delivered intersecting state.
    targets: RefCell<Vec<(NodeId, Option<bool>)>>,
    callback: RefCell<Option<IntersectionCallback<NodeId>>>,
    registered: Cell<bool>,
}

/// Visibility subscription handle of a [`SimPage`].
pub struct SimIntersection {
    page: Weak<SimPage>,
    state: Rc<IntersectionState>,
}

impl IntersectionWatch<NodeId> for SimIntersection {
    fn observe(&self, el: &NodeId) {
        {
            let mut targets = self.state.targets.borrow_mut();
            if targets.iter().any(|(target, _)| target == el) {
                return;
            }
            targets.push((*el, None));
        }
        if !self.state.registered.replace(true)
            && let Some(page) = self.page.upgrade()
        {
            page.intersection_observers
                .borrow_mut()
                .push(self.state.clone());
        }
    }

    fn unobserve(&self, el: &NodeId) {
        self.state
            .targets
            .borrow_mut()
            .retain(|(target, _)| target != el);
    }

    fn disconnect(&self) {
        self.state.targets.borrow_mut().clear();
        if self.state.registered.replace(false)
            && let Some(page) = self.page.upgrade()
        {
            page.intersection_observers
                .borrow_mut()
                .retain(|state| !Rc::ptr_eq(state, &self.state));
        }
    }
}

// ============================================================================
// SimPage
// ============================================================================

/// A single-threaded in-memory page implementing [`Host`].
pub struct SimPage {
    this: Weak<SimPage>,
    doc: RefCell<Document>,
    event_loop: RefCell<EventLoop>,
    network: RefCell<Network>,
    capabilities: Capabilities,
    viewport: Cell<Viewport>,
    scroll_y: Cell<f64>,
    loaded: Cell<bool>,
    load_listeners: RefCell<Vec<Task>>,
    mutation_observers: RefCell<Vec<Rc<MutationState>>>,
    intersection_observers: RefCell<Vec<Rc<IntersectionState>>>,
    resource_listeners: RefCell<FxHashMap<NodeId, Vec<ResourceListener>>>,
    resource_latency: Duration,
    fetch_latency: Duration,
    module_latency: Duration,
}

impl SimPage {
    /// A 1024x768 page with every capability.
    pub fn new() -> Rc<Self> {
        Self::builder().build()
    }

    pub fn builder() -> SimPageBuilder {
        SimPageBuilder::default()
    }

    pub fn body_id(&self) -> NodeId {
        self.doc.borrow().body()
    }

    pub fn head_id(&self) -> NodeId {
        self.doc.borrow().head()
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Parse `html` and append it to `parent` as whole subtrees, one
    /// mutation record per top-level node.
    pub fn append_html(&self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let nodes = parse::parse_fragment(&mut self.doc.borrow_mut(), html);
        for node in &nodes {
            self.doc.borrow_mut().append(parent, *node);
            self.inserted(parent, &[*node]);
        }
        nodes
    }

    /// Stream `html` into the body node by node, the way the HTML parser
    /// inserts a document: every element and text node gets its own record.
    pub fn parse_body(&self, html: &str) -> Vec<NodeId> {
        let body = self.body_id();
        let nodes = parse::parse_fragment(&mut self.doc.borrow_mut(), html);
        for node in &nodes {
            self.stream_into(body, *node);
        }
        nodes
    }

    fn stream_into(&self, parent: NodeId, node: NodeId) {
        let children = {
            let mut doc = self.doc.borrow_mut();
            let children = doc.children(node).to_vec();
            doc.clear_children(node);
            doc.append(parent, node);
            children
        };
        self.inserted(parent, &[node]);
        for child in children {
            self.stream_into(node, child);
        }
    }

    /// First element matching `selector`.
    pub fn first(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    pub fn outer_html(&self, el: NodeId) -> String {
        self.doc.borrow().outer_html(el)
    }

    pub fn body_html(&self) -> String {
        let doc = self.doc.borrow();
        doc.inner_html(doc.body())
    }

    pub fn head_html(&self) -> String {
        let doc = self.doc.borrow();
        doc.inner_html(doc.head())
    }

    // ========================================================================
    // Driving
    // ========================================================================

    pub fn now(&self) -> Duration {
        self.event_loop.borrow().now()
    }

    /// Run everything that is due without moving the clock.
    pub fn settle(&self) {
        let now = self.now();
        self.run_until(now);
    }

    /// Move the clock by `by`, running everything due on the way.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.run_until(target);
    }

    pub fn scroll_to(&self, y: f64) {
        self.scroll_y.set(y.max(0.0));
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y.get()
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.viewport.set(Viewport::new(width, height));
    }

    /// Fire the window `load` event; listeners run synchronously.
    pub fn dispatch_load(&self) {
        if self.loaded.replace(true) {
            return;
        }
        let listeners = std::mem::take(&mut *self.load_listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    fn run_until(&self, limit: Duration) {
        for _ in 0..MAX_TURNS {
            if self.run_microtasks() || self.render() {
                continue;
            }
            let task = self.event_loop.borrow_mut().pop_due(limit);
            match task {
                Some(task) => task(),
                None => {
                    self.event_loop.borrow_mut().advance_to(limit);
                    return;
                }
            }
        }
        log!("warning"; "page did not settle after {} turns", MAX_TURNS);
    }

    fn run_microtasks(&self) -> bool {
        let mut ran = false;
        loop {
            let task = self.event_loop.borrow_mut().pop_microtask();
            let Some(task) = task else {
                return ran;
            };
            task();
            ran = true;
        }
    }

    /// Rendering step: evaluate every intersection observer and deliver
    /// entries for targets seen for the first time or whose state changed.
    fn render(&self) -> bool {
        let observers = self.intersection_observers.borrow().clone();
        let mut delivered = false;

        for observer in observers {
            if !observer.registered.get() {
                continue;
            }
            let entries = self.intersection_entries(&observer);
            if entries.is_empty() {
                continue;
            }
            delivered = true;
            let callback = observer.callback.borrow_mut().take();
            if let Some(mut callback) = callback {
                callback(entries);
                let mut slot = observer.callback.borrow_mut();
                if slot.is_none() {
                    *slot = Some(callback);
                }
            }
        }
        delivered
    }

    fn intersection_entries(&self, observer: &IntersectionState) -> Vec<IntersectionEntry<NodeId>> {
        let doc = self.doc.borrow();
        let viewport = self.viewport.get();
        let rects = layout::layout(&doc, viewport.width);

        let root = match observer.config.root {
            Some(root) => self.view_rect(&doc, &rects, root),
            None => viewport.rect(),
        }
        .expand(&observer.config.margin);

        let mut entries = Vec::new();
        for (target, last) in observer.targets.borrow_mut().iter_mut() {
            let rect = self.view_rect(&doc, &rects, *target);
            let (is_intersecting, ratio) =
                intersection_state(&rect, &root, observer.config.threshold);
            if *last == Some(is_intersecting) {
                continue;
            }
            *last = Some(is_intersecting);
            entries.push(IntersectionEntry {
                target: *target,
                is_intersecting,
                intersection_ratio: ratio,
                bounding_rect: rect,
            });
        }
        entries
    }

    /// Viewport-relative rectangle; zero for detached or hidden nodes.
    fn view_rect(&self, doc: &Document, rects: &FxHashMap<NodeId, Rect>, node: NodeId) -> Rect {
        if !doc.is_connected(node) {
            return Rect::default();
        }
        let scroll = self.scroll_y.get();
        rects
            .get(&node)
            .map(|rect| Rect {
                top: rect.top - scroll,
                bottom: rect.bottom - scroll,
                ..*rect
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // Network
    // ========================================================================

    /// Serve `body` for fetches of `url`.
    pub fn route(&self, url: &str, body: &str) {
        self.network
            .borrow_mut()
            .route(url, Route::Body(body.to_string()));
    }

    /// Answer fetches of `url` with an HTTP error status.
    pub fn route_status(&self, url: &str, status: u16) {
        self.network.borrow_mut().route(url, Route::Status(status));
    }

    /// Fail fetches of `url` at the network level.
    pub fn route_failure(&self, url: &str, reason: &str) {
        self.network
            .borrow_mut()
            .route(url, Route::Failure(reason.to_string()));
    }

    /// Make `specifier` importable.
    pub fn define_module(&self, specifier: &str) {
        self.network.borrow_mut().define_module(specifier);
    }

    /// Make image and script loads of `url` fail.
    pub fn break_resource(&self, url: &str) {
        self.network.borrow_mut().break_resource(url);
    }

    /// Absolute URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.network.borrow().requests().to_vec()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.network.borrow().was_requested(url)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn mutation_observer_count(&self) -> usize {
        self.mutation_observers.borrow().len()
    }

    pub fn intersection_observer_count(&self) -> usize {
        self.intersection_observers.borrow().len()
    }

    /// Targets of every live intersection observer.
    pub fn observed_targets(&self) -> Vec<NodeId> {
        self.intersection_observers
            .borrow()
            .iter()
            .flat_map(|state| {
                state
                    .targets
                    .borrow()
                    .iter()
                    .map(|(target, _)| *target)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn queue_microtask(&self, task: Task) {
        self.event_loop.borrow_mut().queue_microtask(task);
    }

    fn schedule(&self, delay: Duration, task: Task) {
        self.event_loop.borrow_mut().schedule(delay, task);
    }

    /// Queue mutation records and resource loads for nodes just inserted
    /// under `parent`.
    fn inserted(&self, parent: NodeId, nodes: &[NodeId]) {
        let (observers, added, resources) = {
            let doc = self.doc.borrow();
            if !doc.is_connected(parent) {
                return;
            }
            let added: Vec<AddedNode<NodeId>> = nodes
                .iter()
                .map(|node| {
                    if doc.is_element(*node) {
                        AddedNode::Element(*node)
                    } else {
                        AddedNode::Other
                    }
                })
                .collect();
            let resources: Vec<(NodeId, String)> = nodes
                .iter()
                .flat_map(|node| std::iter::once(*node).chain(doc.descendants(*node)))
                .filter_map(|node| resource_url(&doc, node).map(|url| (node, url)))
                .collect();
            let observers: Vec<Rc<MutationState>> = self
                .mutation_observers
                .borrow()
                .iter()
                .filter(|state| state.connected.get() && doc.is_inclusive_ancestor(state.root, parent))
                .cloned()
                .collect();
            (observers, added, resources)
        };

        for state in observers {
            state.records.borrow_mut().push(MutationRecord {
                added: added.clone(),
            });
            if !state.scheduled.replace(true) {
                self.queue_microtask(Box::new(move || state.deliver()));
            }
        }
        for (node, url) in resources {
            self.schedule_resource(node, url);
        }
    }

    /// Apply an attribute change and start a load if it changed the
    /// element's resource URL.
    fn change_attributes(&self, el: NodeId, change: impl FnOnce(&mut Document)) {
        let started = {
            let mut doc = self.doc.borrow_mut();
            let before = resource_url(&doc, el);
            change(&mut doc);
            let after = resource_url(&doc, el);
            // Images load while detached, everything else once connected
            let eligible = doc.is_connected(el) || doc.tag(el) == Some("img");
            after.filter(|url| eligible && before.as_deref() != Some(url.as_str()))
        };
        if let Some(url) = started {
            self.schedule_resource(el, url);
        }
    }

    fn schedule_resource(&self, el: NodeId, url: String) {
        let page = self.this.clone();
        self.schedule(
            self.resource_latency,
            Box::new(move || {
                if let Some(page) = page.upgrade() {
                    page.complete_resource(el, &url);
                }
            }),
        );
    }

    fn complete_resource(&self, el: NodeId, url: &str) {
        let fires_events = {
            let doc = self.doc.borrow();
            // A newer URL superseded this load
            if resource_url(&doc, el).as_deref() != Some(url) {
                return;
            }
            // Media report their first frame (`loadeddata`) as a load
            matches!(doc.tag(el), Some("img" | "video" | "audio" | "script" | "link"))
        };

        let event = {
            let mut network = self.network.borrow_mut();
            network.log_request(url);
            network.resource_outcome(url)
        };
        if fires_events {
            self.dispatch_resource_event(el, event);
        }
    }

    fn dispatch_resource_event(&self, el: NodeId, event: ResourceEvent) {
        // Listeners are one-shot
        let listeners = self
            .resource_listeners
            .borrow_mut()
            .remove(&el)
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }
}

/// URL an element is loading: media/script `src`, preload `href`, or an
/// inline `background-image`.
fn resource_url(doc: &Document, node: NodeId) -> Option<String> {
    let tag = doc.tag(node)?;
    let own = match tag {
        "img" | "video" | "audio" | "script" => doc.attr(node, "src"),
        "link" if doc.attr(node, "rel") == Some("preload") => doc.attr(node, "href"),
        _ => None,
    };
    own.filter(|url| !url.trim().is_empty())
        .map(str::to_string)
        .or_else(|| css_url(&doc.style(node, "background-image")))
}

/// Target of the first `url(...)` in a CSS value.
fn css_url(value: &str) -> Option<String> {
    let start = value.find("url(")? + 4;
    let end = start + value[start..].find(')')?;
    let url = value[start..end].trim().trim_matches(['"', '\'']);
    (!url.is_empty()).then(|| url.to_string())
}

// ============================================================================
// Dom
// ============================================================================

impl Dom for SimPage {
    type Element = NodeId;

    fn body(&self) -> Option<NodeId> {
        Some(self.body_id())
    }

    fn head(&self) -> Option<NodeId> {
        Some(self.head_id())
    }

    fn tag_name(&self, el: &NodeId) -> String {
        self.doc.borrow().tag(*el).unwrap_or_default().to_string()
    }

    fn attribute(&self, el: &NodeId, name: &str) -> Option<String> {
        self.doc.borrow().attr(*el, name).map(str::to_string)
    }

    fn set_attribute(&self, el: &NodeId, name: &str, value: &str) {
        self.change_attributes(*el, |doc| doc.set_attr(*el, name, value));
    }

    fn remove_attribute(&self, el: &NodeId, name: &str) {
        self.doc.borrow_mut().remove_attr(*el, name);
    }

    fn attribute_names(&self, el: &NodeId) -> Vec<String> {
        self.doc.borrow().attr_names(*el)
    }

    fn has_class(&self, el: &NodeId, class: &str) -> bool {
        self.doc.borrow().has_class(*el, class)
    }

    fn add_class(&self, el: &NodeId, class: &str) {
        self.doc.borrow_mut().add_class(*el, class);
    }

    fn remove_class(&self, el: &NodeId, class: &str) {
        self.doc.borrow_mut().remove_class(*el, class);
    }

    fn style_property(&self, el: &NodeId, property: &str) -> String {
        self.doc.borrow().style(*el, property)
    }

    fn set_style_property(&self, el: &NodeId, property: &str, value: &str) {
        self.change_attributes(*el, |doc| doc.set_style(*el, property, value));
    }

    fn inner_html(&self, el: &NodeId) -> String {
        self.doc.borrow().inner_html(*el)
    }

    fn set_inner_html(&self, el: &NodeId, html: &str) {
        let nodes = {
            let mut doc = self.doc.borrow_mut();
            doc.clear_children(*el);
            let nodes = parse::parse_fragment(&mut doc, html);
            for node in &nodes {
                doc.append(*el, *node);
            }
            nodes
        };
        if !nodes.is_empty() {
            self.inserted(*el, &nodes);
        }
    }

    fn create_element(&self, tag: &str) -> Option<NodeId> {
        let tag = tag.trim();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        Some(self.doc.borrow_mut().create_element(&tag.to_ascii_lowercase()))
    }

    fn insert_before(&self, node: &NodeId, reference: &NodeId) -> bool {
        self.insert_relative(*node, *reference, 0)
    }

    fn insert_after(&self, node: &NodeId, reference: &NodeId) -> bool {
        self.insert_relative(*node, *reference, 1)
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) {
        self.doc.borrow_mut().append(*parent, *child);
        self.inserted(*parent, &[*child]);
    }

    fn remove(&self, el: &NodeId) {
        self.doc.borrow_mut().detach(*el);
    }

    fn is_connected(&self, el: &NodeId) -> bool {
        self.doc.borrow().is_connected(*el)
    }

    fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let selector: SelectorList = match selector.parse() {
            Ok(selector) => selector,
            Err(err) => {
                debug!("sim"; "invalid selector: {}", err);
                return Vec::new();
            }
        };
        let doc = self.doc.borrow();
        doc.descendants(doc.root())
            .into_iter()
            .filter(|node| selector.matches(&doc, *node))
            .collect()
    }

    fn bounding_rect(&self, el: &NodeId) -> Rect {
        let doc = self.doc.borrow();
        let rects = layout::layout(&doc, self.viewport.get().width);
        self.view_rect(&doc, &rects, *el)
    }

    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }
}

impl SimPage {
    fn insert_relative(&self, node: NodeId, reference: NodeId, offset: usize) -> bool {
        let parent = {
            let mut doc = self.doc.borrow_mut();
            if node == reference || doc.parent(reference).is_none() {
                return false;
            }
            doc.detach(node);
            let Some((parent, index)) = doc.index_in_parent(reference) else {
                return false;
            };
            doc.insert_at(parent, index + offset, node);
            parent
        };
        self.inserted(parent, &[node]);
        true
    }
}

// ============================================================================
// Host
// ============================================================================

impl Host for SimPage {
    type Mutations = SimMutations;
    type Intersection = SimIntersection;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn observe_mutations(
        &self,
        root: &NodeId,
        callback: MutationCallback<NodeId>,
    ) -> Option<SimMutations> {
        if !self.capabilities.mutations {
            return None;
        }
        let state = Rc::new(MutationState {
            root: *root,
            records: RefCell::new(Vec::new()),
            callback: RefCell::new(Some(callback)),
            connected: Cell::new(true),
            scheduled: Cell::new(false),
        });
        self.mutation_observers.borrow_mut().push(state.clone());
        Some(SimMutations {
            page: self.this.clone(),
            state,
        })
    }

    fn observe_intersections(
        &self,
        config: &ObserverConfig<NodeId>,
        callback: IntersectionCallback<NodeId>,
    ) -> Option<SimIntersection> {
        if !self.capabilities.intersections {
            return None;
        }
        Some(SimIntersection {
            page: self.this.clone(),
            state: Rc::new(IntersectionState {
                config: config.clone(),
                targets: RefCell::new(Vec::new()),
                callback: RefCell::new(Some(callback)),
                registered: Cell::new(false),
            }),
        })
    }

    fn on_page_load(&self, task: Task) {
        if self.loaded.get() {
            self.schedule(Duration::ZERO, task);
        } else {
            self.load_listeners.borrow_mut().push(task);
        }
    }

    fn set_timeout(&self, delay: Duration, task: Task) {
        self.schedule(delay, task);
    }

    fn on_resource_event(&self, el: &NodeId, callback: Box<dyn FnOnce(ResourceEvent)>) {
        self.resource_listeners
            .borrow_mut()
            .entry(*el)
            .or_default()
            .push(callback);
    }

    fn probe_image(&self, url: &str, callback: Box<dyn FnOnce(ResourceEvent)>) {
        let page = self.this.clone();
        let url = url.to_string();
        self.schedule(
            self.resource_latency,
            Box::new(move || {
                let Some(page) = page.upgrade() else {
                    return;
                };
                let event = {
                    let mut network = page.network.borrow_mut();
                    network.log_request(&url);
                    network.resource_outcome(&url)
                };
                callback(event);
            }),
        );
    }

    fn fetch_text(
        &self,
        url: &str,
        cancel: &CancelToken,
        callback: Box<dyn FnOnce(Result<String, HostError>)>,
    ) {
        self.network.borrow_mut().log_request(url);
        let slot = Rc::new(RefCell::new(Some(callback)));

        let on_abort = slot.clone();
        let page = self.this.clone();
        let hook = cancel.on_cancel(move || {
            let Some(callback) = on_abort.borrow_mut().take() else {
                return;
            };
            if let Some(page) = page.upgrade() {
                page.queue_microtask(Box::new(move || callback(Err(HostError::Aborted))));
            }
        });

        let page = self.this.clone();
        let cancel = cancel.clone();
        let url = url.to_string();
        self.schedule(
            self.fetch_latency,
            Box::new(move || {
                cancel.release(hook);
                let Some(callback) = slot.borrow_mut().take() else {
                    return;
                };
                let Some(page) = page.upgrade() else {
                    return;
                };
                let result = page.network.borrow().fetch_outcome(&url);
                callback(result);
            }),
        );
    }

    fn import_module(&self, specifier: &str, callback: Box<dyn FnOnce(Result<(), HostError>)>) {
        self.network.borrow_mut().log_request(specifier);
        let page = self.this.clone();
        let specifier = specifier.to_string();
        self.schedule(
            self.module_latency,
            Box::new(move || {
                let Some(page) = page.upgrade() else {
                    return;
                };
                let result = page.network.borrow().import_outcome(&specifier);
                callback(result);
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_html_reports_top_level_nodes() {
        let page = SimPage::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _watch = page
            .observe_mutations(
                &page.body_id(),
                Box::new(move |records| sink.borrow_mut().extend(records)),
            )
            .unwrap();

        let nodes = page.append_html(page.body_id(), "<section><img></section><p></p>");
        assert!(seen.borrow().is_empty(), "records arrive as a microtask");

        page.settle();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].added, vec![AddedNode::Element(nodes[0])]);
        assert_eq!(seen[1].added, vec![AddedNode::Element(nodes[1])]);
    }

    #[test]
    fn test_parse_body_reports_every_node() {
        let page = SimPage::new();
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        let _watch = page
            .observe_mutations(
                &page.body_id(),
                Box::new(move |records| sink.set(sink.get() + records.len())),
            )
            .unwrap();

        page.parse_body("<section><img>text</section>");
        page.settle();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_disconnected_mutation_observer_is_silent() {
        let page = SimPage::new();
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        let watch = page
            .observe_mutations(&page.body_id(), Box::new(move |_| sink.set(sink.get() + 1)))
            .unwrap();

        page.append_html(page.body_id(), "<p></p>");
        watch.disconnect();
        page.settle();
        assert_eq!(count.get(), 0);
        assert_eq!(page.mutation_observer_count(), 0);
    }

    #[test]
    fn test_intersection_entries_follow_scroll() {
        let page = SimPage::new();
        let nodes = page.append_html(page.body_id(), r#"<div height="1000"></div><img src="a.jpg">"#);
        let img = nodes[1];

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let watch = page
            .observe_intersections(
                &ObserverConfig::default(),
                Box::new(move |entries| {
                    sink.borrow_mut()
                        .extend(entries.into_iter().map(|e| e.is_intersecting))
                }),
            )
            .unwrap();
        watch.observe(&img);

        page.settle();
        assert_eq!(*seen.borrow(), vec![false]);

        page.settle();
        assert_eq!(*seen.borrow(), vec![false], "no change, no entry");

        page.scroll_to(500.0);
        page.settle();
        assert_eq!(*seen.borrow(), vec![false, true]);
        assert_eq!(page.bounding_rect(&img).top, 500.0);

        watch.disconnect();
        assert_eq!(page.intersection_observer_count(), 0);
    }

    #[test]
    fn test_images_load_after_latency() {
        let page = SimPage::new();
        let nodes = page.append_html(page.body_id(), r#"<img src="/img/a.jpg"><img src="/img/b.jpg">"#);
        page.break_resource("/img/b.jpg");

        let events = Rc::new(RefCell::new(Vec::new()));
        for node in &nodes {
            let sink = events.clone();
            let node = *node;
            page.on_resource_event(&node, Box::new(move |event| sink.borrow_mut().push((node, event))));
        }

        page.settle();
        assert!(page.requests().is_empty());

        page.advance(Duration::from_millis(10));
        assert!(page.was_requested("/img/a.jpg"));
        assert_eq!(
            *events.borrow(),
            vec![(nodes[0], ResourceEvent::Load), (nodes[1], ResourceEvent::Error)]
        );
    }

    #[test]
    fn test_resource_listeners_fire_once() {
        let page = SimPage::new();
        let nodes = page.append_html(
            page.body_id(),
            r#"<video src="/media/a.mp4"></video><img src="/img/a.jpg">"#,
        );

        let events = Rc::new(RefCell::new(Vec::new()));
        for node in &nodes {
            let sink = events.clone();
            let node = *node;
            page.on_resource_event(&node, Box::new(move |event| sink.borrow_mut().push((node, event))));
        }
        page.advance(Duration::from_millis(10));
        assert_eq!(
            *events.borrow(),
            vec![(nodes[0], ResourceEvent::Load), (nodes[1], ResourceEvent::Load)]
        );

        page.set_attribute(&nodes[1], "src", "/img/b.jpg");
        page.advance(Duration::from_millis(10));
        assert!(page.was_requested("/img/b.jpg"));
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn test_superseded_src_is_never_requested() {
        let page = SimPage::new();
        let nodes = page.append_html(page.body_id(), r#"<img src="/img/real.jpg">"#);
        page.remove_attribute(&nodes[0], "src");
        page.advance(Duration::from_millis(50));
        assert!(page.requests().is_empty());
    }

    #[test]
    fn test_fetch_and_abort() {
        let page = SimPage::new();
        page.route("/cards/1.html", "<p>card</p>");

        let result = Rc::new(RefCell::new(None));
        let sink = result.clone();
        page.fetch_text(
            "/cards/1.html",
            &CancelToken::new(),
            Box::new(move |r| *sink.borrow_mut() = Some(r)),
        );
        page.advance(Duration::from_millis(30));
        assert_eq!(*result.borrow(), Some(Ok("<p>card</p>".to_string())));

        let token = CancelToken::new();
        let sink = result.clone();
        page.fetch_text("/cards/1.html", &token, Box::new(move |r| *sink.borrow_mut() = Some(r)));
        token.cancel();
        page.advance(Duration::from_millis(100));
        assert_eq!(*result.borrow(), Some(Err(HostError::Aborted)));
    }

    #[test]
    fn test_settled_fetches_release_their_cancel_hooks() {
        let page = SimPage::new();
        page.route("/cards/1.html", "<p>card</p>");
        let token = CancelToken::new();
        let settled = Rc::new(Cell::new(0));

        for i in 0..100 {
            let url = if i % 2 == 0 { "/cards/1.html" } else { "/cards/missing.html" };
            let sink = settled.clone();
            page.fetch_text(url, &token, Box::new(move |_| sink.set(sink.get() + 1)));
        }
        assert_eq!(token.pending_hooks(), 100);

        page.advance(Duration::from_secs(5));
        assert_eq!(settled.get(), 100);
        assert_eq!(token.pending_hooks(), 0);
    }

    #[test]
    fn test_page_load_listeners() {
        let page = SimPage::new();
        let hits = Rc::new(Cell::new(0));

        let sink = hits.clone();
        page.on_page_load(Box::new(move || sink.set(sink.get() + 1)));
        page.dispatch_load();
        assert_eq!(hits.get(), 1);

        let sink = hits.clone();
        page.on_page_load(Box::new(move || sink.set(sink.get() + 1)));
        assert_eq!(hits.get(), 1, "late listeners run as a task");
        page.settle();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_css_url() {
        assert_eq!(css_url("url(y.jpg)").as_deref(), Some("y.jpg"));
        assert_eq!(css_url("url( 'a b.png' )").as_deref(), Some("a b.png"));
        assert_eq!(css_url("none"), None);
    }
}
