//! Results adapters
//!
//! Servers wrap query results differently. An adapter locates the entity
//! nodes in a raw payload, the inline count, and the entity type each node
//! claims to be.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::core::{BreezeError, Result};

/// Entity nodes and optional total count pulled out of a payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedResults {
    pub nodes: Vec<JsonValue>,
    pub inline_count: Option<i64>,
}

pub trait JsonResultsAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract_results(&self, payload: &JsonValue) -> Result<ExtractedResults>;

    /// Short entity type name a node declares, if any.
    fn node_type(&self, node: &JsonValue) -> Option<String>;
}

/// OData v2/v3/v4 payloads: `{"d":{"results":[..]}}`, `{"d":[..]}` or `{"value":[..]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ODataResultsAdapter;

impl JsonResultsAdapter for ODataResultsAdapter {
    fn name(&self) -> &'static str {
        "OData"
    }

    fn extract_results(&self, payload: &JsonValue) -> Result<ExtractedResults> {
        let container = payload.get("d").unwrap_or(payload);

        let nodes = match container {
            JsonValue::Array(items) => items.clone(),
            JsonValue::Object(map) => match map.get("results").or_else(|| map.get("value")) {
                Some(JsonValue::Array(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                // a single entity, e.g. from a key lookup
                None => vec![container.clone()],
            },
            _ => {
                return Err(BreezeError::Json(format!(
                    "unexpected OData payload: {}",
                    payload
                )));
            }
        };

        let inline_count = ["__count", "odata.count", "@odata.count"]
            .iter()
            .find_map(|key| container.get(*key).or_else(|| payload.get(*key)))
            .and_then(parse_count);

        Ok(ExtractedResults {
            nodes,
            inline_count,
        })
    }

    fn node_type(&self, node: &JsonValue) -> Option<String> {
        node.get("__metadata")
            .and_then(|m| m.get("type"))
            .or_else(|| node.get("odata.type"))
            .or_else(|| node.get("@odata.type"))
            .and_then(JsonValue::as_str)
            .map(|t| short_type_name(t.trim_start_matches('#')))
    }
}

/// ASP.NET Web API payloads: a bare array or `{"Results":[..],"InlineCount":n}`,
/// with `$type` annotations and `$id`/`$ref` reference preservation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebApiResultsAdapter;

impl WebApiResultsAdapter {
    /// Replaces `{"$ref":"n"}` stubs with the node carrying `"$id":"n"`.
    fn resolve_refs(nodes: Vec<JsonValue>) -> Vec<JsonValue> {
        let mut by_id: HashMap<String, JsonValue> = HashMap::new();
        for node in &nodes {
            collect_ids(node, &mut by_id);
        }
        nodes
            .into_iter()
            .map(|node| match node.get("$ref").and_then(JsonValue::as_str) {
                Some(id) => by_id.get(id).cloned().unwrap_or(node),
                None => node,
            })
            .collect()
    }
}

impl JsonResultsAdapter for WebApiResultsAdapter {
    fn name(&self) -> &'static str {
        "WebApi"
    }

    fn extract_results(&self, payload: &JsonValue) -> Result<ExtractedResults> {
        let (nodes, inline_count) = match payload {
            JsonValue::Array(items) => (items.clone(), None),
            JsonValue::Object(map) => match map.get("Results") {
                Some(JsonValue::Array(items)) => (
                    items.clone(),
                    map.get("InlineCount").and_then(parse_count),
                ),
                _ => (vec![payload.clone()], None),
            },
            _ => {
                return Err(BreezeError::Json(format!(
                    "unexpected Web API payload: {}",
                    payload
                )));
            }
        };

        Ok(ExtractedResults {
            nodes: Self::resolve_refs(nodes),
            inline_count,
        })
    }

    fn node_type(&self, node: &JsonValue) -> Option<String> {
        node.get("$type").and_then(JsonValue::as_str).map(|t| {
            // "Northwind.Models.Customer, Northwind.Models"
            let qualified = t.split(',').next().unwrap_or(t).trim();
            short_type_name(qualified)
        })
    }
}

fn collect_ids(node: &JsonValue, by_id: &mut HashMap<String, JsonValue>) {
    match node {
        JsonValue::Object(map) => {
            if let Some(id) = map.get("$id").and_then(JsonValue::as_str) {
                by_id.insert(id.to_string(), node.clone());
            }
            for child in map.values() {
                collect_ids(child, by_id);
            }
        }
        JsonValue::Array(items) => items.iter().for_each(|item| collect_ids(item, by_id)),
        _ => {}
    }
}

fn parse_count(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn short_type_name(qualified: &str) -> String {
    qualified
        .rsplit('.')
        .next()
        .unwrap_or(qualified)
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_odata_v2_envelope() {
        let payload = json!({"d": {
            "__count": "2",
            "results": [
                {"__metadata": {"type": "NorthwindModel.Customer"}, "CustomerID": 1},
                {"__metadata": {"type": "NorthwindModel.Customer"}, "CustomerID": 2}
            ]
        }});
        let adapter = ODataResultsAdapter;
        let extracted = adapter.extract_results(&payload).unwrap();
        assert_eq!(extracted.nodes.len(), 2);
        assert_eq!(extracted.inline_count, Some(2));
        assert_eq!(adapter.node_type(&extracted.nodes[0]).as_deref(), Some("Customer"));
    }

    #[test]
    fn test_odata_v4_value() {
        let payload = json!({"@odata.count": 7, "value": [{"OrderID": 1}]});
        let extracted = ODataResultsAdapter.extract_results(&payload).unwrap();
        assert_eq!(extracted.nodes.len(), 1);
        assert_eq!(extracted.inline_count, Some(7));
    }

    #[test]
    fn test_web_api_envelope_and_type() {
        let payload = json!({
            "Results": [{"$id": "1", "$type": "Northwind.Models.Order, Northwind", "OrderID": 5}],
            "InlineCount": 40
        });
        let adapter = WebApiResultsAdapter;
        let extracted = adapter.extract_results(&payload).unwrap();
        assert_eq!(extracted.inline_count, Some(40));
        assert_eq!(adapter.node_type(&extracted.nodes[0]).as_deref(), Some("Order"));
    }

    #[test]
    fn test_web_api_refs_are_resolved() {
        let payload = json!([
            {"$id": "1", "$type": "App.Customer, App", "CustomerID": 3},
            {"$ref": "1"}
        ]);
        let extracted = WebApiResultsAdapter.extract_results(&payload).unwrap();
        assert_eq!(extracted.nodes[1]["CustomerID"], json!(3));
    }

    #[test]
    fn test_scalar_payload_is_rejected() {
        assert!(ODataResultsAdapter.extract_results(&json!(42)).is_err());
    }
}
