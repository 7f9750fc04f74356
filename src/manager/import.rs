use std::sync::Arc;

use log::debug;
use serde_json::Value as JsonValue;
use tracing::Instrument;

use super::EntityManager;
use crate::adapter::{JsonResultsAdapter, Transport};
use crate::core::{BreezeError, Result, Value};
use crate::entity::{Entity, EntityRef, EntityState, MergeStrategy};
use crate::metadata::EntityType;
use crate::query::EntityQuery;

/// Outcome of importing a query response.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Top-level entities, as held by the cache
    pub entities: Vec<EntityRef>,
    /// Nodes that are not entities (projections, untyped results)
    pub projections: Vec<JsonValue>,
    pub inline_count: Option<i64>,
}

impl EntityManager {
    /// Merges a raw query response into the cache.
    ///
    /// Each node is materialized as the type it declares, or else as the
    /// query's result type. Projection queries (`select`) and untyped queries
    /// keep their nodes as plain JSON.
    pub fn import_results(
        &mut self,
        payload: &JsonValue,
        query: &EntityQuery,
        adapter: &dyn JsonResultsAdapter,
    ) -> Result<QueryResult> {
        let extracted = adapter.extract_results(payload)?;
        let is_projection = !query.select_paths().is_empty();
        let default_type = query.resolve_type(&self.metadata)?.entity_type().cloned();
        let strategy = query.merge_strategy().unwrap_or(self.config.merge_strategy);

        let mut result = QueryResult {
            inline_count: extracted.inline_count,
            ..QueryResult::default()
        };
        for node in &extracted.nodes {
            let entity_type = if is_projection {
                None
            } else {
                self.declared_type(adapter, node).or_else(|| default_type.clone())
            };
            match entity_type {
                Some(entity_type) => {
                    let entity = self.materialize(&entity_type, node, strategy, adapter)?;
                    result.entities.push(entity);
                }
                None => result.projections.push(node.clone()),
            }
        }

        debug!(
            "imported {} entities and {} projections via {}",
            result.entities.len(),
            result.projections.len(),
            adapter.name()
        );
        Ok(result)
    }

    /// Builds the request, awaits the transport, then imports the response.
    pub async fn execute_query(
        &mut self,
        query: &EntityQuery,
        transport: &dyn Transport,
    ) -> Result<QueryResult> {
        let request = self.query_request(query)?;
        let span = tracing::info_span!("execute_query", method = %request.method, url = %request.url);

        let payload = match transport.execute(request).instrument(span.clone()).await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(parent: &span, error = %err, "query failed");
                return Err(err);
            }
        };

        let adapter = self.data_service.adapter().clone();
        let result = span.in_scope(|| self.import_results(&payload, query, adapter.as_ref()))?;
        tracing::info!(
            parent: &span,
            entities = result.entities.len(),
            inline_count = ?result.inline_count,
            "query completed"
        );
        Ok(result)
    }

    pub(super) fn declared_type(
        &self,
        adapter: &dyn JsonResultsAdapter,
        node: &JsonValue,
    ) -> Option<Arc<EntityType>> {
        adapter
            .node_type(node)
            .and_then(|name| self.metadata.find_entity_type(&name))
    }

    /// Turns one node into an entity, attaches it as Unchanged and recurses
    /// into expanded navigation properties.
    fn materialize(
        &mut self,
        entity_type: &Arc<EntityType>,
        node: &JsonValue,
        strategy: MergeStrategy,
        adapter: &dyn JsonResultsAdapter,
    ) -> Result<EntityRef> {
        if !node.is_object() {
            return Err(BreezeError::Json(format!(
                "expected a '{}' object but found {}",
                entity_type.name(),
                node
            )));
        }

        let mut entity = Entity::new(entity_type.clone());
        for prop in entity_type.data_properties() {
            if let Some(raw) = node.get(prop.wire_name()) {
                entity.set_raw(&prop.name, prop.data_type.parse(Value::from(raw)));
            }
        }
        let cached = self.attach_entity(entity, EntityState::Unchanged, Some(strategy))?;

        for nav in entity_type.navigation_properties() {
            let Some(raw) = node.get(nav.wire_name()) else {
                continue;
            };
            let related: Vec<&JsonValue> = match raw {
                JsonValue::Array(items) => items.iter().collect(),
                // OData v2 leaves unexpanded navigations as deferred links
                JsonValue::Object(map) if map.contains_key("__deferred") => continue,
                JsonValue::Object(map) => match map.get("results") {
                    Some(JsonValue::Array(items)) => items.iter().collect(),
                    _ => vec![raw],
                },
                _ => continue,
            };

            let target = self.metadata.get_entity_type(&nav.entity_type_name)?;
            for related_node in related {
                let related_type = self
                    .declared_type(adapter, related_node)
                    .unwrap_or_else(|| target.clone());
                self.materialize(&related_type, related_node, strategy, adapter)?;
            }
        }

        Ok(cached)
    }
}
