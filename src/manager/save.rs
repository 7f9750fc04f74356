use log::{info, warn};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue, json};
use tracing::Instrument;

use super::EntityManager;
use crate::adapter::Transport;
use crate::core::{BreezeError, Result, Value};
use crate::entity::{Entity, EntityRef, EntityState};

/// Server-assigned key replacing a temporary one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyMapping {
    #[serde(rename = "EntityTypeName", alias = "entityTypeName")]
    pub entity_type_name: String,
    #[serde(rename = "TempValue", alias = "tempValue", deserialize_with = "value_from_json")]
    pub temp_value: Value,
    #[serde(rename = "RealValue", alias = "realValue", deserialize_with = "value_from_json")]
    pub real_value: Value,
}

impl KeyMapping {
    pub fn new(
        entity_type_name: impl Into<String>,
        temp_value: impl Into<Value>,
        real_value: impl Into<Value>,
    ) -> Self {
        Self {
            entity_type_name: entity_type_name.into(),
            temp_value: temp_value.into(),
            real_value: real_value.into(),
        }
    }
}

/// Response to a save request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SaveResult {
    /// Saved entities as the server now sees them
    #[serde(rename = "Entities", alias = "entities")]
    pub entities: Vec<JsonValue>,
    #[serde(rename = "KeyMappings", alias = "keyMappings")]
    pub key_mappings: Vec<KeyMapping>,
}

impl SaveResult {
    pub fn from_json(payload: &JsonValue) -> Result<Self> {
        Ok(SaveResult::deserialize(payload)?)
    }
}

fn value_from_json<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let json = JsonValue::deserialize(deserializer)?;
    Ok(Value::from(&json))
}

impl EntityManager {
    /// The JSON save bundle for `entities`, or for every pending change.
    pub fn build_save_bundle(&self, entities: Option<&[EntityRef]>) -> Result<JsonValue> {
        let entities = match entities {
            Some(entities) => entities.to_vec(),
            None => self.get_changes(),
        };
        let nodes = entities
            .iter()
            .map(|e| save_node(&e.borrow()))
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({ "entities": nodes, "saveOptions": {} }))
    }

    /// Reconciles the cache with a successful save of `saved`.
    ///
    /// Key mappings are fixed up first, then deleted entities leave the cache
    /// and the rest become Unchanged. Values returned by the server are merged
    /// into whatever is still cached.
    pub fn apply_save_result(&mut self, saved: &[EntityRef], result: &SaveResult) -> Result<()> {
        for mapping in &result.key_mappings {
            self.fixup_key(
                &mapping.entity_type_name,
                &mapping.temp_value,
                &mapping.real_value,
            )?;
        }

        for entity in saved {
            match entity.state() {
                EntityState::Deleted => {
                    self.detach_entity(entity)?;
                }
                EntityState::Added | EntityState::Modified => {
                    let mut entity = entity.borrow_mut();
                    if entity.aspect().has_temp_key() {
                        warn!("'{}' saved without a key mapping for its temporary key", entity.type_name());
                    }
                    entity.accept_changes();
                }
                _ => {}
            }
        }

        let adapter = self.data_service.adapter().clone();
        for node in &result.entities {
            let Some(entity_type) = self.declared_type(adapter.as_ref(), node) else {
                continue;
            };
            let key_values = entity_type
                .key_properties()
                .iter()
                .map(|p| node.get(p.wire_name()).map(Value::from).unwrap_or(Value::Null))
                .collect();
            let Some(cached) = self.get_entity_by_key(entity_type.name(), key_values)? else {
                continue;
            };

            let mut incoming = cached.borrow().clone();
            for prop in entity_type.data_properties() {
                if let Some(raw) = node.get(prop.wire_name()) {
                    incoming.set_raw(&prop.name, prop.data_type.parse(Value::from(raw)));
                }
            }
            cached.borrow_mut().merge_values_from(&incoming);
        }

        info!(
            "applied save of {} entities ({} key mappings)",
            saved.len(),
            result.key_mappings.len()
        );
        Ok(())
    }

    /// Sends every pending change and applies the server's answer.
    pub async fn save_changes(&mut self, transport: &dyn Transport) -> Result<SaveResult> {
        let saved = self.get_changes();
        if saved.is_empty() {
            return Ok(SaveResult::default());
        }

        let bundle = self.build_save_bundle(Some(&saved))?;
        let request = self.data_service.save_request(bundle);
        let span = tracing::info_span!("save_changes", entities = saved.len(), url = %request.url);

        let payload = match transport.execute(request).instrument(span.clone()).await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(parent: &span, error = %err, "save failed");
                return Err(err);
            }
        };
        let result = SaveResult::from_json(&payload)?;
        span.in_scope(|| self.apply_save_result(&saved, &result))?;
        Ok(result)
    }
}

/// One entity of the save bundle: server-named values plus its `entityAspect`.
fn save_node(entity: &Entity) -> Result<JsonValue> {
    let state = entity.state();
    if !state.is_added_modified_or_deleted() {
        return Err(BreezeError::InvalidState(format!(
            "{} '{}' has nothing to save",
            state,
            entity.type_name()
        )));
    }

    let entity_type = entity.entity_type();
    let mut node = Map::new();
    for prop in entity_type.data_properties() {
        let value = entity.get(&prop.name).unwrap_or(&Value::Null);
        node.insert(prop.wire_name().to_string(), prop.data_type.fmt_json(value));
    }

    let original_values: Map<String, JsonValue> = entity
        .aspect()
        .original_values()
        .iter()
        .filter_map(|(name, value)| {
            entity_type
                .data_property(name)
                .map(|p| (p.wire_name().to_string(), p.data_type.fmt_json(value)))
        })
        .collect();

    let mut aspect = json!({
        "entityTypeName": entity_type.full_name(),
        "entityState": state.to_string(),
        "originalValuesMap": original_values,
    });
    if entity.aspect().has_temp_key() {
        if let [key] = entity_type.key_properties().as_slice() {
            aspect["autoGeneratedKey"] = json!({
                "propertyName": key.wire_name(),
                "autoGeneratedKeyType": "Identity",
            });
        }
    }
    node.insert("entityAspect".into(), aspect);
    Ok(JsonValue::Object(node))
}
