use serde_json::{Map, Value as JsonValue};

use super::{UriBuilder, encode_uri_component};
use crate::core::Result;
use crate::metadata::MetadataStore;
use crate::query::{EntityQuery, JsonVisitor, VisitContext};

/// Sends the whole query as one percent-encoded JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonUriBuilder;

impl JsonUriBuilder {
    /// The structural query document, without the resource name.
    pub fn to_document(&self, query: &EntityQuery, metadata: &MetadataStore) -> Result<JsonValue> {
        let entity_type = query.resolve_type(metadata)?;
        let ctx = VisitContext::new(metadata, entity_type.clone());
        let mut doc = Map::new();

        if let Some(predicate) = query.predicate() {
            doc.insert("where".into(), predicate.visit(&ctx, &JsonVisitor)?);
        }

        if !query.order_by_clauses().is_empty() {
            let terms = query
                .order_by_clauses()
                .iter()
                .map(|clause| {
                    let path = metadata.client_path_to_server(&entity_type, &clause.path, ".")?;
                    Ok(JsonValue::String(if clause.descending {
                        format!("{} desc", path)
                    } else {
                        path
                    }))
                })
                .collect::<Result<Vec<_>>>()?;
            doc.insert("orderBy".into(), JsonValue::Array(terms));
        }

        if let Some(skip) = query.skip_count() {
            doc.insert("skip".into(), skip.into());
        }
        if let Some(take) = query.take_count() {
            doc.insert("take".into(), take.into());
        }

        for (name, paths) in [
            ("expand", query.expand_paths()),
            ("select", query.select_paths()),
        ] {
            if paths.is_empty() {
                continue;
            }
            let resolved = paths
                .iter()
                .map(|p| {
                    metadata
                        .client_path_to_server(&entity_type, p, ".")
                        .map(JsonValue::String)
                })
                .collect::<Result<Vec<_>>>()?;
            doc.insert(name.into(), JsonValue::Array(resolved));
        }

        if query.is_inline_count() {
            doc.insert("inlineCount".into(), JsonValue::Bool(true));
        }

        if !query.parameters().is_empty() {
            let params: Map<String, JsonValue> = query
                .parameters()
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect();
            doc.insert("parameters".into(), JsonValue::Object(params));
        }

        Ok(JsonValue::Object(doc))
    }
}

impl UriBuilder for JsonUriBuilder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn build_uri(&self, query: &EntityQuery, metadata: &MetadataStore) -> Result<String> {
        let doc = self.to_document(query, metadata)?;
        let resource = query.resolve_resource_name(metadata)?;
        let text = serde_json::to_string(&doc)?;
        Ok(format!("{}?{}", resource, encode_uri_component(&text)))
    }
}
