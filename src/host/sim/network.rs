//! Scripted network for the in-memory page.

use crate::host::{HostError, ResourceEvent};
use rustc_hash::{FxHashMap, FxHashSet};
use url::Url;

/// Base URL of every in-memory page.
pub const DEFAULT_BASE_URL: &str = "https://example.test/";

/// Canned answer for a fetched URL.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Route {
    Body(String),
    Status(u16),
    Failure(String),
}

#[derive(Debug)]
pub(crate) struct Network {
    base: Option<Url>,
    routes: FxHashMap<String, Route>,
    modules: FxHashSet<String>,
    broken: FxHashSet<String>,
    requests: Vec<String>,
}

impl Network {
    pub fn new(base: Option<Url>) -> Self {
        Self {
            base,
            routes: FxHashMap::default(),
            modules: FxHashSet::default(),
            broken: FxHashSet::default(),
            requests: Vec::new(),
        }
    }

    /// Absolute form of `url`, or the input when it cannot be resolved.
    pub fn resolve(&self, url: &str) -> String {
        self.base
            .as_ref()
            .and_then(|base| base.join(url.trim()).ok())
            .map(String::from)
            .unwrap_or_else(|| url.to_string())
    }

    pub fn is_data_uri(url: &str) -> bool {
        url.trim_start().to_ascii_lowercase().starts_with("data:")
    }

    pub fn route(&mut self, url: &str, route: Route) {
        let key = self.resolve(url);
        self.routes.insert(key, route);
    }

    pub fn define_module(&mut self, specifier: &str) {
        let key = self.resolve(specifier);
        self.modules.insert(key);
    }

    pub fn break_resource(&mut self, url: &str) {
        let key = self.resolve(url);
        self.broken.insert(key);
    }

    /// Record a request unless it is a `data:` URI.
    pub fn log_request(&mut self, url: &str) {
        if !Self::is_data_uri(url) {
            let resolved = self.resolve(url);
            self.requests.push(resolved);
        }
    }

    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    pub fn was_requested(&self, url: &str) -> bool {
        let resolved = self.resolve(url);
        self.requests.iter().any(|r| *r == resolved)
    }

    /// Outcome of loading an image or script resource.
    pub fn resource_outcome(&self, url: &str) -> ResourceEvent {
        if url.trim().is_empty() || self.broken.contains(&self.resolve(url)) {
            ResourceEvent::Error
        } else {
            ResourceEvent::Load
        }
    }

    /// Outcome of a text fetch.
    pub fn fetch_outcome(&self, url: &str) -> Result<String, HostError> {
        let resolved = self.resolve(url);
        match self.routes.get(&resolved) {
            Some(Route::Body(body)) => Ok(body.clone()),
            Some(Route::Status(status)) => Err(HostError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(Route::Failure(reason)) => Err(HostError::Network {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            None => Err(HostError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    /// Outcome of a dynamic import.
    pub fn import_outcome(&self, specifier: &str) -> Result<(), HostError> {
        if self.modules.contains(&self.resolve(specifier)) {
            Ok(())
        } else {
            Err(HostError::Module {
                specifier: specifier.to_string(),
                reason: "module not found".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network::new(Url::parse(DEFAULT_BASE_URL).ok())
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        let net = network();
        assert_eq!(net.resolve("/img/a.jpg"), "https://example.test/img/a.jpg");
        assert_eq!(net.resolve("a.jpg"), "https://example.test/a.jpg");
        assert_eq!(net.resolve("https://cdn.test/x.png"), "https://cdn.test/x.png");
    }

    #[test]
    fn test_data_uris_are_not_logged() {
        let mut net = network();
        net.log_request("data:image/gif;base64,R0lGOD");
        net.log_request("/img/a.jpg");
        assert_eq!(net.requests(), ["https://example.test/img/a.jpg"]);
        assert!(net.was_requested("img/a.jpg"));
    }

    #[test]
    fn test_fetch_routes() {
        let mut net = network();
        net.route("/cards/1.html", Route::Body("<p>card</p>".to_string()));
        net.route("/cards/2.html", Route::Status(500));
        net.route("/cards/3.html", Route::Failure("offline".to_string()));

        assert_eq!(net.fetch_outcome("cards/1.html"), Ok("<p>card</p>".to_string()));
        assert!(matches!(net.fetch_outcome("/cards/2.html"), Err(HostError::Status { status: 500, .. })));
        assert!(matches!(net.fetch_outcome("/cards/3.html"), Err(HostError::Network { .. })));
        assert!(matches!(net.fetch_outcome("/cards/4.html"), Err(HostError::Status { status: 404, .. })));
    }

    #[test]
    fn test_module_and_resource_outcomes() {
        let mut net = network();
        net.define_module("/js/chart.js");
        net.break_resource("/img/broken.jpg");

        assert!(net.import_outcome("/js/chart.js").is_ok());
        assert!(net.import_outcome("/js/missing.js").is_err());
        assert_eq!(net.resource_outcome("/img/broken.jpg"), ResourceEvent::Error);
        assert_eq!(net.resource_outcome("/img/fine.jpg"), ResourceEvent::Load);
    }
}
