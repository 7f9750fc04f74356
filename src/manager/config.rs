use serde::Deserialize;

use crate::core::Result;
use crate::entity::MergeStrategy;
use crate::metadata::{MetadataStore, NamingConvention};

/// Entity manager configuration
///
/// Loadable from JSON with camelCase field names; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Root address of the data service
    pub service_name: String,

    /// Name of the uri builder used for queries (`odata` or `json`)
    pub uri_builder: String,

    /// Merge strategy for imported query results when the query sets none
    pub merge_strategy: MergeStrategy,

    /// Client/server property name mapping for new metadata stores
    pub naming_convention: NamingConvention,

    /// Request `$inlinecount` on every query
    pub inline_count_by_default: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            uri_builder: "odata".to_string(),
            merge_strategy: MergeStrategy::PreserveChanges,
            naming_convention: NamingConvention::None,
            inline_count_by_default: false,
        }
    }
}

impl ManagerConfig {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    pub fn uri_builder(mut self, name: &str) -> Self {
        self.uri_builder = name.to_string();
        self
    }

    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    pub fn naming_convention(mut self, convention: NamingConvention) -> Self {
        self.naming_convention = convention;
        self
    }

    pub fn inline_count_by_default(mut self, enabled: bool) -> Self {
        self.inline_count_by_default = enabled;
        self
    }

    /// An empty metadata store using the configured naming convention.
    pub fn metadata_store(&self) -> MetadataStore {
        MetadataStore::new().with_naming_convention(self.naming_convention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.uri_builder, "odata");
        assert_eq!(config.merge_strategy, MergeStrategy::PreserveChanges);
        assert_eq!(config.naming_convention, NamingConvention::None);
    }

    #[test]
    fn test_builder_chain() {
        let config = ManagerConfig::new("api/Northwind")
            .uri_builder("json")
            .merge_strategy(MergeStrategy::OverwriteChanges)
            .inline_count_by_default(true);
        assert_eq!(config.service_name, "api/Northwind");
        assert_eq!(config.uri_builder, "json");
        assert!(config.inline_count_by_default);
    }

    #[test]
    fn test_from_json() {
        let config = ManagerConfig::from_json(
            r#"{"serviceName": "breeze/Todos", "mergeStrategy": "SkipMerge", "namingConvention": "camelCase"}"#,
        )
        .unwrap();
        assert_eq!(config.service_name, "breeze/Todos");
        assert_eq!(config.merge_strategy, MergeStrategy::SkipMerge);
        assert_eq!(config.naming_convention, NamingConvention::CamelCase);
        assert_eq!(config.uri_builder, "odata");

        assert!(ManagerConfig::from_json("{not json").is_err());
    }
}
