//! Browser backend over `web-sys`.
//!
//! [`WebHost`] maps the [`Host`] primitives onto the live document:
//! `MutationObserver`, `IntersectionObserver`, `setTimeout`, `fetch` with an
//! `AbortController`, and dynamic `import()`. The exported [`start`]
//! function is the page entry point.
//!
//! Observer handles own their JS closures and disconnect on drop.

use super::{
    AddedNode, Capabilities, Dom, Host, HostError, IntersectionCallback, IntersectionEntry,
    IntersectionWatch, MutationCallback, MutationRecord, MutationWatch, ObserverConfig,
    ResourceEvent, Task,
};
use crate::config::Options;
use crate::controller::{Controller, bootstrap};
use crate::core::{CancelToken, LazyKind, Rect, Viewport};
use crate::{debug, log};
use anyhow::{Context, Result, anyhow};
use js_sys::{Array, Function, Promise, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    AbortController, AddEventListenerOptions, Document, DomRectReadOnly, Element, Event,
    HtmlElement, HtmlImageElement, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, MutationObserver, MutationObserverInit, Node, RequestInit,
    RequestMode, Response, Window,
};

type Listener = Closure<dyn FnMut(Event)>;

// ============================================================================
// WebHost
// ============================================================================

/// The current browser page.
pub struct WebHost {
    window: Window,
    document: Document,
    /// `s => import(s)`; dynamic import is syntax, not a callable global.
    import: Function,
}

impl WebHost {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| anyhow!("no global `window`"))?;
        let document = window
            .document()
            .ok_or_else(|| anyhow!("window has no document"))?;
        Ok(Self {
            window,
            document,
            import: Function::new_with_args("s", "return import(s)"),
        })
    }

    fn has_global(&self, name: &str) -> bool {
        Reflect::has(&self.window, &JsValue::from_str(name)).unwrap_or(false)
    }

    fn is_loaded(&self) -> bool {
        Reflect::get(&self.document, &JsValue::from_str("readyState"))
            .ok()
            .and_then(|state| state.as_string())
            .is_some_and(|state| state == "complete")
    }

    fn schedule(&self, delay: Duration, task: Task) {
        let callback = Closure::once_into_js(move || task());
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        {
            log!("error"; "setTimeout failed: {:?}", err);
        }
    }
}

/// The load and error listeners of one element. The first event to fire
/// removes both.
struct ResourceListeners {
    target: Element,
    listeners: Vec<(&'static str, Listener)>,
}

impl ResourceListeners {
    fn detach(self, window: &Window) {
        for (event, listener) in &self.listeners {
            self.target
                .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
                .ok();
        }
        // A closure cannot be freed while it runs; release it on the next task
        let release = Closure::once_into_js(move || drop(self));
        if let Err(err) = window.set_timeout_with_callback_and_timeout_and_arguments_0(release.unchecked_ref(), 0) {
            debug!("web"; "listener release: {:?}", err);
        }
    }
}

fn rect_of(rect: &DomRectReadOnly) -> Rect {
    Rect::from_xywh(rect.x(), rect.y(), rect.width(), rect.height())
}

fn reason(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

// ============================================================================
// Dom
// ============================================================================

impl Dom for WebHost {
    type Element = Element;

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn head(&self) -> Option<Element> {
        self.document.query_selector("head").ok().flatten()
    }

    fn tag_name(&self, el: &Element) -> String {
        el.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, el: &Element, name: &str) -> Option<String> {
        el.get_attribute(name)
    }

    fn set_attribute(&self, el: &Element, name: &str, value: &str) {
        if let Err(err) = el.set_attribute(name, value) {
            debug!("web"; "set {} failed: {:?}", name, err);
        }
    }

    fn remove_attribute(&self, el: &Element, name: &str) {
        if let Err(err) = el.remove_attribute(name) {
            debug!("web"; "remove {} failed: {:?}", name, err);
        }
    }

    fn attribute_names(&self, el: &Element) -> Vec<String> {
        el.get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .collect()
    }

    fn has_attribute(&self, el: &Element, name: &str) -> bool {
        el.has_attribute(name)
    }

    fn has_class(&self, el: &Element, class: &str) -> bool {
        el.class_list().contains(class)
    }

    fn add_class(&self, el: &Element, class: &str) {
        if let Err(err) = el.class_list().add_1(class) {
            debug!("web"; "add class {} failed: {:?}", class, err);
        }
    }

    fn remove_class(&self, el: &Element, class: &str) {
        if let Err(err) = el.class_list().remove_1(class) {
            debug!("web"; "remove class {} failed: {:?}", class, err);
        }
    }

    fn style_property(&self, el: &Element, property: &str) -> String {
        el.dyn_ref::<HtmlElement>()
            .and_then(|html| html.style().get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn set_style_property(&self, el: &Element, property: &str, value: &str) {
        let Some(html) = el.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = html.style();
        let result = if value.is_empty() {
            style.remove_property(property).map(|_| ())
        } else {
            style.set_property(property, value)
        };
        if let Err(err) = result {
            debug!("web"; "style {} failed: {:?}", property, err);
        }
    }

    fn inner_html(&self, el: &Element) -> String {
        el.inner_html()
    }

    fn set_inner_html(&self, el: &Element, html: &str) {
        el.set_inner_html(html);
    }

    fn create_element(&self, tag: &str) -> Option<Element> {
        self.document
            .create_element(tag)
            .inspect_err(|err| debug!("web"; "create <{}> failed: {:?}", tag, err))
            .ok()
    }

    fn insert_before(&self, node: &Element, reference: &Element) -> bool {
        let Some(parent) = reference.parent_node() else {
            return false;
        };
        parent.insert_before(node, Some(reference)).is_ok()
    }

    fn insert_after(&self, node: &Element, reference: &Element) -> bool {
        let Some(parent) = reference.parent_node() else {
            return false;
        };
        let next = reference.next_sibling();
        parent.insert_before(node, next.as_ref()).is_ok()
    }

    fn append_child(&self, parent: &Element, child: &Element) {
        if let Err(err) = parent.append_child(child) {
            debug!("web"; "append failed: {:?}", err);
        }
    }

    fn remove(&self, el: &Element) {
        el.remove();
    }

    fn is_connected(&self, el: &Element) -> bool {
        el.is_connected()
    }

    fn query_selector_all(&self, selector: &str) -> Vec<Element> {
        let list = match self.document.query_selector_all(selector) {
            Ok(list) => list,
            Err(err) => {
                debug!("web"; "invalid selector `{}`: {:?}", selector, err);
                return Vec::new();
            }
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn bounding_rect(&self, el: &Element) -> Rect {
        rect_of(&el.get_bounding_client_rect())
    }

    fn viewport(&self) -> Viewport {
        let size = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let inner = (size(self.window.inner_width()), size(self.window.inner_height()));
        let client = self
            .document
            .document_element()
            .map(|root| (f64::from(root.client_width()), f64::from(root.client_height())))
            .unwrap_or_default();
        Viewport::resolve(inner, client)
    }
}

// ============================================================================
// Observer handles
// ============================================================================

/// A connected `MutationObserver`.
pub struct WebMutations {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl MutationWatch for WebMutations {
    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl Drop for WebMutations {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// A connected `IntersectionObserver`.
pub struct WebIntersection {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(Array, IntersectionObserver)>,
}

impl IntersectionWatch<Element> for WebIntersection {
    fn observe(&self, el: &Element) {
        self.observer.observe(el);
    }

    fn unobserve(&self, el: &Element) {
        self.observer.unobserve(el);
    }

    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

impl Drop for WebIntersection {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

fn mutation_records(records: &Array) -> Vec<MutationRecord<Element>> {
    records
        .iter()
        .filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
        .map(|record| {
            let nodes = record.added_nodes();
            let added = (0..nodes.length())
                .filter_map(|i| nodes.item(i))
                .map(|node: Node| match node.dyn_into::<Element>() {
                    Ok(el) => AddedNode::Element(el),
                    Err(_) => AddedNode::Other,
                })
                .collect();
            MutationRecord { added }
        })
        .collect()
}

fn intersection_entries(entries: &Array) -> Vec<IntersectionEntry<Element>> {
    entries
        .iter()
        .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
        .map(|entry| IntersectionEntry {
            target: entry.target(),
            is_intersecting: entry.is_intersecting(),
            intersection_ratio: entry.intersection_ratio(),
            bounding_rect: rect_of(&entry.bounding_client_rect()),
        })
        .collect()
}

// ============================================================================
// Host
// ============================================================================

impl Host for WebHost {
    type Mutations = WebMutations;
    type Intersection = WebIntersection;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            mutations: self.has_global("MutationObserver"),
            intersections: self.has_global("IntersectionObserver"),
        }
    }

    fn observe_mutations(
        &self,
        root: &Element,
        mut callback: MutationCallback<Element>,
    ) -> Option<WebMutations> {
        let closure = Closure::wrap(Box::new(move |records: Array, _: MutationObserver| {
            callback(mutation_records(&records));
        }) as Box<dyn FnMut(Array, MutationObserver)>);

        let observer = MutationObserver::new(closure.as_ref().unchecked_ref())
            .inspect_err(|err| log!("warning"; "MutationObserver: {:?}", err))
            .ok()?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Err(err) = observer.observe_with_options(root, &init) {
            log!("warning"; "MutationObserver.observe: {:?}", err);
            return None;
        }

        Some(WebMutations {
            observer,
            _callback: closure,
        })
    }

    fn observe_intersections(
        &self,
        config: &ObserverConfig<Element>,
        mut callback: IntersectionCallback<Element>,
    ) -> Option<WebIntersection> {
        let closure = Closure::wrap(Box::new(move |entries: Array, _: IntersectionObserver| {
            callback(intersection_entries(&entries));
        }) as Box<dyn FnMut(Array, IntersectionObserver)>);

        let init = IntersectionObserverInit::new();
        init.set_root(config.root.as_ref().map(|root| root.unchecked_ref::<js_sys::Object>()));
        init.set_root_margin(&config.margin.to_string());
        init.set_threshold(&JsValue::from_f64(config.threshold));

        let observer =
            IntersectionObserver::new_with_options(closure.as_ref().unchecked_ref(), &init)
                .inspect_err(|err| log!("warning"; "IntersectionObserver: {:?}", err))
                .ok()?;

        Some(WebIntersection {
            observer,
            _callback: closure,
        })
    }

    fn on_page_load(&self, task: Task) {
        if self.is_loaded() {
            self.schedule(Duration::ZERO, task);
            return;
        }
        let callback = Closure::once_into_js(move |_: Event| task());
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        if let Err(err) = self
            .window
            .add_event_listener_with_callback_and_add_event_listener_options(
                "load",
                callback.unchecked_ref(),
                &options,
            )
        {
            log!("error"; "load listener: {:?}", err);
        }
    }

    fn set_timeout(&self, delay: Duration, task: Task) {
        self.schedule(delay, task);
    }

    fn on_resource_event(&self, el: &Element, callback: Box<dyn FnOnce(ResourceEvent)>) {
        // Media never fire `load`; their first frame is `loadeddata`
        let media = LazyKind::from_tag(&self.tag_name(el)).is_some_and(LazyKind::is_media);
        let loaded = if media { "loadeddata" } else { "load" };

        let callback = Rc::new(RefCell::new(Some(callback)));
        let pending: Rc<RefCell<Option<ResourceListeners>>> = Rc::new(RefCell::new(None));
        let mut listeners = Vec::with_capacity(2);
        for (event, outcome) in [(loaded, ResourceEvent::Load), ("error", ResourceEvent::Error)] {
            let callback = Rc::clone(&callback);
            let pending = Rc::clone(&pending);
            let window = self.window.clone();
            let listener: Listener = Closure::wrap(Box::new(move |_: Event| {
                let attached = pending.borrow_mut().take();
                if let Some(attached) = attached {
                    attached.detach(&window);
                }
                let callback = callback.borrow_mut().take();
                if let Some(callback) = callback {
                    callback(outcome);
                }
            }) as Box<dyn FnMut(Event)>);
            if let Err(err) = el.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref()) {
                debug!("web"; "{} listener: {:?}", event, err);
                continue;
            }
            listeners.push((event, listener));
        }
        *pending.borrow_mut() = Some(ResourceListeners {
            target: el.clone(),
            listeners,
        });
    }

    fn probe_image(&self, url: &str, callback: Box<dyn FnOnce(ResourceEvent)>) {
        let image = match HtmlImageElement::new() {
            Ok(image) => image,
            Err(err) => {
                debug!("web"; "probe image: {:?}", err);
                self.schedule(Duration::ZERO, Box::new(move || callback(ResourceEvent::Error)));
                return;
            }
        };

        // Whichever of load and error fires first wins
        let slot = Rc::new(RefCell::new(Some(callback)));
        let settle = |outcome: ResourceEvent| {
            let slot = Rc::clone(&slot);
            Closure::once_into_js(move |_: Event| {
                if let Some(callback) = slot.borrow_mut().take() {
                    callback(outcome);
                }
            })
        };
        image.set_onload(Some(settle(ResourceEvent::Load).unchecked_ref()));
        image.set_onerror(Some(settle(ResourceEvent::Error).unchecked_ref()));
        image.set_src(url);
    }

    fn fetch_text(
        &self,
        url: &str,
        cancel: &CancelToken,
        callback: Box<dyn FnOnce(Result<String, HostError>)>,
    ) {
        if cancel.is_cancelled() {
            self.schedule(Duration::ZERO, Box::new(move || callback(Err(HostError::Aborted))));
            return;
        }
        let controller = match AbortController::new() {
            Ok(controller) => controller,
            Err(err) => {
                let err = HostError::Network {
                    url: url.to_string(),
                    reason: reason(&err),
                };
                self.schedule(Duration::ZERO, Box::new(move || callback(Err(err))));
                return;
            }
        };
        let signal = controller.signal();
        let hook = cancel.on_cancel(move || controller.abort());
        let cancel = cancel.clone();

        let init = RequestInit::new();
        init.set_method("GET");
        init.set_mode(RequestMode::Cors);
        init.set_signal(Some(&signal));
        let request = self.window.fetch_with_str_and_init(url, &init);

        let url = url.to_string();
        spawn_local(async move {
            let result = fetch_body(&url, request).await.map_err(|err| {
                if signal.aborted() { HostError::Aborted } else { err }
            });
            cancel.release(hook);
            callback(result);
        });
    }

    fn import_module(&self, specifier: &str, callback: Box<dyn FnOnce(Result<(), HostError>)>) {
        let module_error = |err: &JsValue| HostError::Module {
            specifier: specifier.to_string(),
            reason: reason(err),
        };
        let promise = match self.import.call1(&JsValue::NULL, &JsValue::from_str(specifier)) {
            Ok(value) => Promise::resolve(&value),
            Err(err) => {
                let err = module_error(&err);
                self.schedule(Duration::ZERO, Box::new(move || callback(Err(err))));
                return;
            }
        };

        let specifier = specifier.to_string();
        spawn_local(async move {
            let result = JsFuture::from(promise).await.map(|_| ()).map_err(|err| HostError::Module {
                specifier,
                reason: reason(&err),
            });
            callback(result);
        });
    }
}

async fn fetch_body(url: &str, request: Promise) -> Result<String, HostError> {
    let network = |err: JsValue| HostError::Network {
        url: url.to_string(),
        reason: reason(&err),
    };

    let response: Response = JsFuture::from(request)
        .await
        .map_err(network)?
        .dyn_into()
        .map_err(network)?;
    if !response.ok() {
        return Err(HostError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    let text = JsFuture::from(response.text().map_err(network)?)
        .await
        .map_err(network)?;
    Ok(text.as_string().unwrap_or_default())
}

// ============================================================================
// Entry point
// ============================================================================

thread_local! {
    static ACTIVE: RefCell<Option<Rc<Controller<WebHost>>>> = const { RefCell::new(None) };
}

/// JS handle returned by [`start`].
#[wasm_bindgen]
pub struct LazyHandle {
    controller: Rc<Controller<WebHost>>,
}

#[wasm_bindgen]
impl LazyHandle {
    /// Track an element inserted outside of automatic discovery.
    pub fn watch(&self, el: &Element) -> bool {
        self.controller.watch(el)
    }

    /// Reveal an element immediately.
    pub fn unveil(&self, el: &Element) {
        self.controller.unveil(el);
    }

    /// Rescan matching elements; returns how many were taken in.
    pub fn update(&self, selector: Option<String>) -> u32 {
        let count = self.controller.update(selector.as_deref());
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn unmount(&self) {
        self.controller.unmount();
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if active.as_ref().is_some_and(|c| Rc::ptr_eq(c, &self.controller)) {
                active.take();
            }
        });
    }

    #[wasm_bindgen(getter)]
    pub fn active(&self) -> bool {
        self.controller.is_active()
    }
}

/// Start lazy loading on the current page.
///
/// `options` may be omitted, in which case `window.autolazy` is read. A
/// second call returns a handle to the controller already running.
#[wasm_bindgen]
pub fn start(options: JsValue) -> Result<LazyHandle, JsValue> {
    if let Some(controller) = ACTIVE.with(|active| active.borrow().clone()) {
        return Ok(LazyHandle { controller });
    }

    let host = WebHost::new().map_err(|err| JsValue::from_str(&format!("{err:#}")))?;
    let options = read_options(&host.window, options).map_err(|err| JsValue::from_str(&format!("{err:#}")))?;
    let controller = Rc::new(bootstrap(Rc::new(host), options).map_err(|err| JsValue::from_str(&err.to_string()))?);

    ACTIVE.with(|active| *active.borrow_mut() = Some(Rc::clone(&controller)));
    Ok(LazyHandle { controller })
}

/// Toggle debug output in the console.
#[wasm_bindgen(js_name = setVerbose)]
pub fn set_verbose(verbose: bool) {
    crate::logger::set_verbose(verbose);
}

fn read_options(window: &Window, explicit: JsValue) -> Result<Options> {
    let value = if explicit.is_undefined() || explicit.is_null() {
        Reflect::get(window, &JsValue::from_str("autolazy")).unwrap_or(JsValue::UNDEFINED)
    } else {
        explicit
    };
    if value.is_undefined() || value.is_null() {
        return Ok(Options::default());
    }

    let json: String = js_sys::JSON::stringify(&value)
        .map_err(|err| anyhow!("{}", reason(&err)))
        .context("options are not serializable")?
        .into();
    Ok(Options::from_json(&json)?)
}
