//! Host environment abstraction.
//!
//! The pipeline never touches a concrete DOM. It drives a [`Host`], which
//! is a [`Dom`] plus the asynchronous primitives a browser page offers.
//!
//! # Module Structure
//!
//! ```text
//! host/
//! ├── sim/     # SimPage: deterministic in-memory page with a virtual clock
//! ├── web.rs   # WebHost: web-sys backend (feature `web`, wasm32)
//! └── mod.rs   # Dom, Host, observer handles, records (this file)
//! ```
//!
//! # Callback contract
//!
//! A host never invokes a pipeline callback from inside the host method
//! that registered it. Every callback runs later, from the host's event
//! loop, so callers may hold their own state while calling into the host.

pub mod sim;
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

use crate::config::RootMargin;
use crate::core::{CancelToken, Rect, Viewport};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A deferred unit of work scheduled on the host event loop.
pub type Task = Box<dyn FnOnce()>;

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by asynchronous host primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("network error fetching `{url}`: {reason}")]
    Network { url: String, reason: String },

    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("request aborted")]
    Aborted,

    #[error("failed to import module `{specifier}`: {reason}")]
    Module { specifier: String, reason: String },

    #[error("{0} is not available in this environment")]
    Unsupported(&'static str),
}

// ============================================================================
// Dom
// ============================================================================

/// Tree, attribute, class and style access on element handles.
///
/// Tag names are lowercase. Style property names use the CSS spelling
/// (`background-image`), and an unset property reads as an empty string.
pub trait Dom {
    /// Handle to one element; equality is node identity.
    type Element: Clone + PartialEq + fmt::Debug + 'static;

    fn body(&self) -> Option<Self::Element>;
    fn head(&self) -> Option<Self::Element>;

    fn tag_name(&self, el: &Self::Element) -> String;

    fn attribute(&self, el: &Self::Element, name: &str) -> Option<String>;
    fn set_attribute(&self, el: &Self::Element, name: &str, value: &str);
    fn remove_attribute(&self, el: &Self::Element, name: &str);
    /// Attribute names in document order.
    fn attribute_names(&self, el: &Self::Element) -> Vec<String>;

    fn has_attribute(&self, el: &Self::Element, name: &str) -> bool {
        self.attribute(el, name).is_some()
    }

    fn has_class(&self, el: &Self::Element, class: &str) -> bool;
    fn add_class(&self, el: &Self::Element, class: &str);
    fn remove_class(&self, el: &Self::Element, class: &str);

    fn style_property(&self, el: &Self::Element, property: &str) -> String;
    fn set_style_property(&self, el: &Self::Element, property: &str, value: &str);

    fn inner_html(&self, el: &Self::Element) -> String;
    fn set_inner_html(&self, el: &Self::Element, html: &str);

    /// New detached element; `None` when the tag name is rejected.
    fn create_element(&self, tag: &str) -> Option<Self::Element>;

    /// Insert `node` before `reference`; false when `reference` has no parent.
    fn insert_before(&self, node: &Self::Element, reference: &Self::Element) -> bool;
    /// Insert `node` after `reference`; false when `reference` has no parent.
    fn insert_after(&self, node: &Self::Element, reference: &Self::Element) -> bool;
    fn append_child(&self, parent: &Self::Element, child: &Self::Element);
    /// Detach `el` from its parent.
    fn remove(&self, el: &Self::Element);
    fn is_connected(&self, el: &Self::Element) -> bool;

    fn query_selector_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Viewport-relative border box; zero for detached elements.
    fn bounding_rect(&self, el: &Self::Element) -> Rect;
    fn viewport(&self) -> Viewport;
}

// ============================================================================
// Records
// ============================================================================

/// Which observer primitives the host provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub mutations: bool,
    pub intersections: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        mutations: true,
        intersections: true,
    };

    /// Whether automatic lazy loading can run at all.
    pub fn is_complete(self) -> bool {
        self.mutations && self.intersections
    }
}

/// A node reported as added by the mutation primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum AddedNode<E> {
    Element(E),
    /// Text, comment and other non-element nodes.
    Other,
}

/// One `childList` mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<E> {
    pub added: Vec<AddedNode<E>>,
}

/// One visibility notification.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry<E> {
    pub target: E,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
    pub bounding_rect: Rect,
}

/// Outcome of loading an element's resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvent {
    Load,
    Error,
}

/// Visibility observer configuration with the root already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig<E> {
    /// Scroll container; `None` observes against the viewport.
    pub root: Option<E>,
    pub margin: RootMargin,
    pub threshold: f64,
}

impl<E> Default for ObserverConfig<E> {
    fn default() -> Self {
        Self {
            root: None,
            margin: RootMargin::default(),
            threshold: 0.0,
        }
    }
}

// ============================================================================
// Observer handles
// ============================================================================

/// A live visibility subscription.
pub trait IntersectionWatch<E> {
    fn observe(&self, el: &E);
    fn unobserve(&self, el: &E);
    fn disconnect(&self);
}

/// A live mutation subscription.
pub trait MutationWatch {
    fn disconnect(&self);
}

pub type MutationCallback<E> = Box<dyn FnMut(Vec<MutationRecord<E>>)>;
pub type IntersectionCallback<E> = Box<dyn FnMut(Vec<IntersectionEntry<E>>)>;

// ============================================================================
// Host
// ============================================================================

/// Asynchronous page primitives.
pub trait Host: Dom {
    type Mutations: MutationWatch;
    type Intersection: IntersectionWatch<Self::Element>;

    fn capabilities(&self) -> Capabilities;

    /// Watch `root`'s subtree for added nodes; `None` without the primitive.
    fn observe_mutations(
        &self,
        root: &Self::Element,
        callback: MutationCallback<Self::Element>,
    ) -> Option<Self::Mutations>;

    /// Create a visibility subscription; `None` without the primitive.
    fn observe_intersections(
        &self,
        config: &ObserverConfig<Self::Element>,
        callback: IntersectionCallback<Self::Element>,
    ) -> Option<Self::Intersection>;

    /// Run `task` once the page has loaded, as a fresh task if it already has.
    fn on_page_load(&self, task: Task);

    fn set_timeout(&self, delay: Duration, task: Task);

    /// Report the first load or error of `el`'s own resource, once.
    ///
    /// Media count as loaded on their first frame (`loadeddata`).
    fn on_resource_event(&self, el: &Self::Element, callback: Box<dyn FnOnce(ResourceEvent)>);

    /// Load `url` through an off-document image and report the outcome.
    fn probe_image(&self, url: &str, callback: Box<dyn FnOnce(ResourceEvent)>);

    /// GET `url` as text; cancelling `cancel` aborts the request.
    fn fetch_text(
        &self,
        url: &str,
        cancel: &CancelToken,
        callback: Box<dyn FnOnce(Result<String, HostError>)>,
    );

    /// Dynamically import the module `specifier`.
    fn import_module(&self, specifier: &str, callback: Box<dyn FnOnce(Result<(), HostError>)>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(Capabilities::ALL.is_complete());
        let partial = Capabilities {
            mutations: true,
            intersections: false,
        };
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_host_error_display() {
        let err = HostError::Status {
            url: "/fragments/card.html".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "`/fragments/card.html` answered with status 404");
        assert_eq!(HostError::Aborted.to_string(), "request aborted");
    }
}
