//! Entity manager
//!
//! The owning cache. Holds one [`EntityGroup`] per concrete entity type,
//! created lazily on first attach, together with the metadata, the temporary
//! key generator and the uri builders used to talk to the data service.
//!
//! All cache operations are synchronous. The only `async` entry points,
//! [`EntityManager::execute_query`] and [`EntityManager::save_changes`],
//! build their request up front, await the injected transport, then apply
//! the response synchronously.

mod config;
mod import;
mod save;

pub use config::ManagerConfig;
pub use import::QueryResult;
pub use save::{KeyMapping, SaveResult};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use log::{debug, info};

use crate::adapter::{DataService, RequestDescriptor};
use crate::core::{BreezeError, KeyGenerator, Result, Value};
use crate::entity::{Entity, EntityGroup, EntityKey, EntityRef, EntityState, MergeStrategy};
use crate::metadata::{EntityType, MetadataStore};
use crate::query::EntityQuery;
use crate::uri_builder::UriBuilderRegistry;

pub struct EntityManager {
    metadata: Arc<MetadataStore>,
    groups: HashMap<String, EntityGroup>,
    key_generator: KeyGenerator,
    uri_builders: UriBuilderRegistry,
    data_service: DataService,
    config: ManagerConfig,
}

impl EntityManager {
    pub fn new(metadata: MetadataStore, config: ManagerConfig) -> Self {
        Self {
            metadata: Arc::new(metadata),
            groups: HashMap::new(),
            key_generator: KeyGenerator::new(),
            uri_builders: UriBuilderRegistry::with_default_builders(),
            data_service: DataService::new(config.service_name.clone()),
            config,
        }
    }

    pub fn with_uri_builders(mut self, registry: UriBuilderRegistry) -> Self {
        self.uri_builders = registry;
        self
    }

    pub fn with_data_service(mut self, data_service: DataService) -> Self {
        self.data_service = data_service;
        self
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn data_service(&self) -> &DataService {
        &self.data_service
    }

    pub fn key_generator(&self) -> &KeyGenerator {
        &self.key_generator
    }

    /// Creates a detached instance of a registered type and freezes the type.
    pub fn create_entity(&self, type_name: &str) -> Result<Entity> {
        let entity_type = self.metadata.get_entity_type(type_name)?;
        if entity_type.is_abstract() {
            return Err(BreezeError::InvalidValue(format!(
                "Cannot create an instance of abstract type '{}'",
                entity_type.name()
            )));
        }
        entity_type.freeze();
        Ok(Entity::new(entity_type))
    }

    fn group_mut(&mut self, entity_type: &Arc<EntityType>) -> Result<&mut EntityGroup> {
        match self.groups.entry(entity_type.name().to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("creating entity group for '{}'", entity_type.name());
                Ok(entry.insert(EntityGroup::new(entity_type.clone())?))
            }
        }
    }

    /// Attaches an entity to the cache.
    ///
    /// Added entities with an unset single-part key receive a temporary key
    /// first. Without an explicit `strategy` a key that is already cached is
    /// rejected with [`BreezeError::EntityAlreadyExists`]; the configured merge
    /// strategy only governs imported query results.
    pub fn attach_entity(
        &mut self,
        entity: impl Into<EntityRef>,
        state: EntityState,
        strategy: Option<MergeStrategy>,
    ) -> Result<EntityRef> {
        let entity = entity.into();
        let entity_type = entity.borrow().entity_type().clone();
        self.metadata.get_entity_type(entity_type.name())?;

        let temp_key = if state == EntityState::Added {
            self.assign_temp_key(&entity)?
        } else {
            None
        };
        let strategy = strategy.unwrap_or(MergeStrategy::Disallowed);
        let attached = self
            .group_mut(&entity_type)?
            .attach_entity(entity.clone(), state, strategy);

        if let (Err(_), Some(temp)) = (&attached, temp_key) {
            self.key_generator.release(entity_type.name(), &temp);
            let mut entity = entity.borrow_mut();
            if let Some(key_prop) = entity_type.key_properties().first() {
                entity.set_raw(&key_prop.name, key_prop.initial_value());
            }
            entity.aspect_mut().has_temp_key = false;
        }
        attached
    }

    /// Shorthand for attaching in the Added state.
    pub fn add_entity(&mut self, entity: impl Into<EntityRef>) -> Result<EntityRef> {
        self.attach_entity(entity, EntityState::Added, None)
    }

    /// Gives an Added entity a temporary key when its key is unset and
    /// returns the value issued.
    fn assign_temp_key(&mut self, entity: &EntityRef) -> Result<Option<Value>> {
        let entity_type = entity.borrow().entity_type().clone();
        let key_props = entity_type.key_properties();
        // Composite keys are never generated; the caller assigns them.
        let [key_prop] = key_props.as_slice() else {
            return Ok(None);
        };

        let current = entity.get(&key_prop.name).unwrap_or(Value::Null);
        if !current.is_null() && current != key_prop.data_type.default_value() {
            return Ok(None);
        }

        let temp = self
            .key_generator
            .generate_temp_key_value(entity_type.name(), key_prop.data_type)
            .ok_or_else(|| {
                BreezeError::MissingKey(format!(
                    "'{}.{}' has no value and {} keys cannot be generated",
                    entity_type.name(),
                    key_prop.name,
                    key_prop.data_type
                ))
            })?;
        debug!("assigned temporary key {} to new '{}'", temp, entity_type.name());

        let mut entity = entity.borrow_mut();
        entity.set_raw(&key_prop.name, temp.clone());
        entity.aspect_mut().has_temp_key = true;
        Ok(Some(temp))
    }

    pub fn detach_entity(&mut self, entity: &EntityRef) -> Result<EntityRef> {
        let type_name = entity.borrow().type_name().to_string();
        let temp_key = if entity.borrow().aspect().has_temp_key() {
            entity.entity_key().ok()
        } else {
            None
        };

        let group = self.groups.get_mut(&type_name).ok_or_else(|| {
            BreezeError::Internal(format!("no entity group for '{}'", type_name))
        })?;
        let detached = group.detach_entity(entity)?;

        if let Some(key) = temp_key {
            for value in key.values() {
                self.key_generator.release(&type_name, value);
            }
        }
        Ok(detached)
    }

    /// Marks an entity for deletion. Added entities never reached the
    /// server, so they are detached instead.
    pub fn delete_entity(&mut self, entity: &EntityRef) -> Result<EntityState> {
        if entity.state() == EntityState::Added {
            self.detach_entity(entity)?;
            return Ok(EntityState::Detached);
        }
        entity.borrow_mut().set_deleted()
    }

    pub fn get_entity_by_key(&self, type_name: &str, values: Vec<Value>) -> Result<Option<EntityRef>> {
        let entity_type = self.metadata.get_entity_type(type_name)?;
        match self.groups.get(entity_type.name()) {
            Some(group) => group.find_entity_by_values(values),
            None => EntityKey::new(&entity_type, values).map(|_| None),
        }
    }

    pub fn find_entity_by_key(&self, key: &EntityKey) -> Option<EntityRef> {
        self.groups
            .get(key.type_name())
            .and_then(|group| group.find_entity_by_key(key))
    }

    /// Cached entities, optionally restricted to some types and states.
    /// Groups are visited in type-name order.
    pub fn get_entities(
        &self,
        type_names: Option<&[&str]>,
        states: Option<&[EntityState]>,
    ) -> Vec<EntityRef> {
        let mut names: Vec<&String> = self
            .groups
            .keys()
            .filter(|name| type_names.is_none_or(|wanted| wanted.contains(&name.as_str())))
            .collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.groups.get(name))
            .flat_map(|group| group.get_entities(states))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.groups.values().any(EntityGroup::has_changes)
    }

    pub fn get_changes(&self) -> Vec<EntityRef> {
        let changed = [EntityState::Added, EntityState::Modified, EntityState::Deleted];
        self.get_entities(None, Some(&changed))
    }

    /// Commits one entity's pending change. A Deleted entity leaves the cache.
    pub fn accept_entity_changes(&mut self, entity: &EntityRef) -> Result<EntityState> {
        match entity.state() {
            EntityState::Deleted => {
                self.detach_entity(entity)?;
                Ok(EntityState::Detached)
            }
            EntityState::Detached => Err(BreezeError::InvalidState(format!(
                "Detached entity '{}' has no changes to accept",
                entity.borrow().type_name()
            ))),
            _ => Ok(entity.borrow_mut().accept_changes()),
        }
    }

    /// Rolls one entity's pending change back. An Added entity leaves the cache.
    pub fn reject_entity_changes(&mut self, entity: &EntityRef) -> Result<EntityState> {
        match entity.state() {
            EntityState::Added => {
                self.detach_entity(entity)?;
                Ok(EntityState::Detached)
            }
            EntityState::Detached => Err(BreezeError::InvalidState(format!(
                "Detached entity '{}' has no changes to reject",
                entity.borrow().type_name()
            ))),
            _ => Ok(entity.borrow_mut().reject_changes()),
        }
    }

    /// Commits every pending change locally. Deleted entities leave the cache.
    pub fn accept_changes(&mut self) -> Result<()> {
        for entity in self.get_changes() {
            self.accept_entity_changes(&entity)?;
        }
        Ok(())
    }

    /// Rolls every pending change back. Added entities leave the cache.
    pub fn reject_changes(&mut self) -> Result<Vec<EntityRef>> {
        let changes = self.get_changes();
        for entity in &changes {
            self.reject_entity_changes(entity)?;
        }
        Ok(changes)
    }

    /// Detaches everything and discards all groups.
    pub fn clear(&mut self) {
        for group in self.groups.values() {
            for entity in group.get_entities(None) {
                entity.borrow_mut().set_detached();
            }
        }
        self.groups.clear();
        self.key_generator = KeyGenerator::new();
        info!("entity manager cleared");
    }

    /// Replaces a temporary key with the server-assigned one and cascades the
    /// new value into every foreign key that referenced the old one.
    pub fn fixup_key(&mut self, type_name: &str, temp_value: &Value, real_value: &Value) -> Result<EntityRef> {
        let entity_type = self.metadata.get_entity_type(type_name)?;
        let group = self.groups.get_mut(entity_type.name()).ok_or_else(|| {
            BreezeError::Internal(format!(
                "fix-up for '{}' but no entity group exists",
                entity_type.name()
            ))
        })?;
        let entity = group.fixup_key(temp_value, real_value)?;

        let key = entity.entity_key()?;
        let new_value = key.values()[0].clone();
        let old_value = entity_type.key_properties()[0]
            .data_type
            .parse(temp_value.clone());
        self.key_generator.release(entity_type.name(), &old_value);

        let mut cascaded = 0;
        for (dependent, fk_property) in self.metadata.foreign_key_refs(entity_type.name()) {
            if let Some(group) = self.groups.get_mut(&dependent) {
                cascaded += group.update_fk_val(&fk_property, &old_value, &new_value)?;
            }
        }
        debug!(
            "fixed up {} from {} ({} foreign keys updated)",
            key, old_value, cascaded
        );
        Ok(entity)
    }

    /// Relative wire path for a query using the configured uri builder.
    pub fn build_query_uri(&self, query: &EntityQuery) -> Result<String> {
        let builder = self.uri_builders.get(&self.config.uri_builder)?;
        if self.config.inline_count_by_default && !query.is_inline_count() {
            let query = query.clone().inline_count(true);
            return builder.build_uri(&query, &self.metadata);
        }
        builder.build_uri(query, &self.metadata)
    }

    pub fn query_request(&self, query: &EntityQuery) -> Result<RequestDescriptor> {
        let wire_path = self.build_query_uri(query)?;
        Ok(self.data_service.query_request(&wire_path))
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("service", &self.data_service.service_name())
            .field("groups", &self.groups.len())
            .field("config", &self.config)
            .finish()
    }
}
