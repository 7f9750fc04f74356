use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::results::{JsonResultsAdapter, ODataResultsAdapter};
use super::transport::RequestDescriptor;

/// A remote service endpoint: its root address plus the results adapter used
/// to read its payloads.
#[derive(Clone)]
pub struct DataService {
    service_name: String,
    adapter: Arc<dyn JsonResultsAdapter>,
}

impl DataService {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            adapter: Arc::new(ODataResultsAdapter),
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn JsonResultsAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn adapter(&self) -> &Arc<dyn JsonResultsAdapter> {
        &self.adapter
    }

    /// Joins the service root and a relative path with exactly one `/`.
    pub fn qualify(&self, path: &str) -> String {
        if self.service_name.is_empty() {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.service_name.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn query_request(&self, wire_path: &str) -> RequestDescriptor {
        RequestDescriptor::get(self.qualify(wire_path))
    }

    pub fn save_request(&self, bundle: JsonValue) -> RequestDescriptor {
        RequestDescriptor::post(self.qualify("SaveChanges"), bundle)
    }
}

impl std::fmt::Debug for DataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataService")
            .field("service_name", &self.service_name)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::HttpMethod;

    #[test]
    fn test_qualify() {
        let service = DataService::new("http://localhost/breeze/Northwind/");
        assert_eq!(
            service.qualify("/Customers?$top=1"),
            "http://localhost/breeze/Northwind/Customers?$top=1"
        );
        assert_eq!(DataService::new("").qualify("Customers"), "Customers");
    }

    #[test]
    fn test_requests() {
        let service = DataService::new("api");
        let get = service.query_request("Orders");
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.url, "api/Orders");

        let post = service.save_request(serde_json::json!({"entities": []}));
        assert_eq!(post.method, HttpMethod::Post);
        assert_eq!(post.url, "api/SaveChanges");
        assert!(post.body.is_some());
    }
}
