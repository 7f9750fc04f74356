//! Query-to-URI builders.
//!
//! A builder turns an [`EntityQuery`] into the resource path plus query
//! string sent to the server. Builders are looked up by name in a
//! [`UriBuilderRegistry`] that is populated once at startup and handed to the
//! [`crate::manager::EntityManager`].

pub mod json;
pub mod odata;

use std::sync::Arc;

use log::debug;

use crate::core::{BreezeError, Result};
use crate::metadata::MetadataStore;
use crate::query::EntityQuery;

pub use json::JsonUriBuilder;
pub use odata::ODataUriBuilder;

pub trait UriBuilder: Send + Sync {
    /// Name the builder is registered under
    fn name(&self) -> &'static str;

    /// Builds `resource?options`. Entity type resolution happens before any
    /// fragment is formatted.
    fn build_uri(&self, query: &EntityQuery, metadata: &MetadataStore) -> Result<String>;
}

/// Named set of uri builders.
#[derive(Clone)]
pub struct UriBuilderRegistry {
    builders: Vec<Arc<dyn UriBuilder>>,
}

impl UriBuilderRegistry {
    pub fn new() -> Self {
        Self {
            builders: Vec::new(),
        }
    }

    /// Registers a builder, replacing any builder with the same name.
    pub fn register(&mut self, builder: Arc<dyn UriBuilder>) {
        debug!("registered uri builder '{}'", builder.name());
        self.builders.retain(|b| b.name() != builder.name());
        self.builders.push(builder);
    }

    /// Registry holding the `odata` and `json` builders.
    pub fn with_default_builders() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ODataUriBuilder));
        registry.register(Arc::new(JsonUriBuilder));
        registry
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn UriBuilder>> {
        self.builders
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| BreezeError::UriBuilderNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.builders.iter().map(|b| b.name()).collect()
    }
}

impl Default for UriBuilderRegistry {
    fn default() -> Self {
        Self::with_default_builders()
    }
}

impl std::fmt::Debug for UriBuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriBuilderRegistry")
            .field("builders", &self.names())
            .finish()
    }
}

/// Percent-encodes like `encodeURIComponent`: `!'()*` stay literal.
pub fn encode_uri_component(text: &str) -> String {
    urlencoding::encode(text)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBuilder;

    impl UriBuilder for EchoBuilder {
        fn name(&self) -> &'static str {
            "odata"
        }

        fn build_uri(&self, query: &EntityQuery, _metadata: &MetadataStore) -> Result<String> {
            Ok(query.resource_name().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_defaults_and_lookup() {
        let registry = UriBuilderRegistry::with_default_builders();
        assert_eq!(registry.names(), vec!["odata", "json"]);
        assert!(registry.get("OData").is_ok());
        assert!(matches!(
            registry.get("xml"),
            Err(BreezeError::UriBuilderNotFound(_))
        ));
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = UriBuilderRegistry::with_default_builders();
        registry.register(Arc::new(EchoBuilder));
        assert_eq!(registry.names(), vec!["json", "odata"]);

        let uri = registry
            .get("odata")
            .unwrap()
            .build_uri(&EntityQuery::from("Orders").take(5), &MetadataStore::new())
            .unwrap();
        assert_eq!(uri, "Orders");
    }

    #[test]
    fn test_encode_uri_component() {
        assert_eq!(encode_uri_component("a b'c(d)*!"), "a%20b'c(d)*!");
        assert_eq!(encode_uri_component("{\"x\":1}"), "%7B%22x%22%3A1%7D");
    }
}
