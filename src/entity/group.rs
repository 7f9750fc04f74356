//! Per-type partition of the entity cache.
//!
//! An [`EntityGroup`] owns every attached instance of one concrete entity
//! type. Instances live in a slot array; detaching an entity tombstones its
//! slot and pushes the index on a free list, so surviving entities never move.
//! `index_map` maps each canonical key string to its slot, and both views are
//! updated together before any mutating call returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use super::{EntityKey, EntityRef, EntityState, MergeStrategy};
use crate::core::{BreezeError, Result, Value};
use crate::metadata::EntityType;

#[derive(Debug)]
pub struct EntityGroup {
    entity_type: Arc<EntityType>,
    entities: Vec<Option<EntityRef>>,
    free_slots: Vec<usize>,
    index_map: HashMap<String, usize>,
}

impl EntityGroup {
    pub fn new(entity_type: Arc<EntityType>) -> Result<Self> {
        if entity_type.is_abstract() {
            return Err(BreezeError::InvalidValue(format!(
                "Abstract type '{}' cannot own an entity group",
                entity_type.name()
            )));
        }
        Ok(Self {
            entity_type,
            entities: Vec::new(),
            free_slots: Vec::new(),
            index_map: HashMap::new(),
        })
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Number of attached entities.
    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    /// Attaches `entity` in `state`, merging into an already cached instance
    /// with the same key according to `strategy`.
    ///
    /// The returned handle is the instance held by the cache, which is not
    /// necessarily the one passed in.
    pub fn attach_entity(
        &mut self,
        entity: EntityRef,
        state: EntityState,
        strategy: MergeStrategy,
    ) -> Result<EntityRef> {
        if entity.borrow().type_name() != self.entity_type.name() {
            return Err(BreezeError::InvalidValue(format!(
                "Entity of type '{}' cannot join the '{}' group",
                entity.borrow().type_name(),
                self.entity_type.name()
            )));
        }
        if state == EntityState::Detached {
            return Err(BreezeError::InvalidState(
                "Entities cannot be attached in the Detached state".into(),
            ));
        }

        let key = entity.entity_key()?;
        if !key.is_complete() {
            return Err(BreezeError::MissingKey(format!(
                "{} has unassigned key values",
                key
            )));
        }
        let key_in_group = key.key_in_group();
        self.entity_type.freeze();

        if let Some(&slot) = self.index_map.get(&key_in_group) {
            let existing = self.slot(slot)?.clone();

            if existing.ptr_eq(&entity) {
                existing.borrow_mut().set_state(state)?;
                return Ok(existing);
            }

            // A new instance in the Added state is an insert of an existing row.
            if strategy == MergeStrategy::Disallowed || state == EntityState::Added {
                return Err(BreezeError::EntityAlreadyExists(key.to_string()));
            }
            let current = existing.state();
            if strategy.should_overwrite(current) {
                debug!("merging incoming values into cached {}", key);
                let incoming = entity.borrow();
                let mut target = existing.borrow_mut();
                target.merge_values_from(&incoming);
                target.aspect_mut().state = state;
            } else {
                debug!("keeping cached {} ({}) under {:?}", key, current, strategy);
            }
            return Ok(existing);
        }

        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.entities[slot] = Some(entity.clone());
                slot
            }
            None => {
                self.entities.push(Some(entity.clone()));
                self.entities.len() - 1
            }
        };
        self.index_map.insert(key_in_group.clone(), slot);

        {
            let mut attached = entity.borrow_mut();
            let aspect = attached.aspect_mut();
            aspect.state = state;
            aspect.group_key = Some(key_in_group);
        }
        debug!("attached {} as {} in slot {}", key, state, slot);
        Ok(entity)
    }

    /// Removes `entity` from the group and marks it Detached.
    pub fn detach_entity(&mut self, entity: &EntityRef) -> Result<EntityRef> {
        let key_in_group = entity.borrow().aspect().group_key.clone().ok_or_else(|| {
            BreezeError::Internal(format!(
                "detach of an entity that is not attached to the '{}' group",
                self.entity_type.name()
            ))
        })?;

        let slot = self.index_map.get(&key_in_group).copied().ok_or_else(|| {
            BreezeError::Internal(format!(
                "key '{}' missing from the '{}' group index",
                key_in_group,
                self.entity_type.name()
            ))
        })?;
        if !self.slot(slot)?.ptr_eq(entity) {
            return Err(BreezeError::Internal(format!(
                "slot {} of the '{}' group holds a different instance",
                slot,
                self.entity_type.name()
            )));
        }

        self.index_map.remove(&key_in_group);
        self.entities[slot] = None;
        self.free_slots.push(slot);

        entity.borrow_mut().set_detached();
        debug!("detached '{}' key {} from slot {}", self.entity_type.name(), key_in_group, slot);
        Ok(entity.clone())
    }

    pub fn find_entity_by_key(&self, key: &EntityKey) -> Option<EntityRef> {
        if key.type_name() != self.entity_type.name() {
            return None;
        }
        self.find_by_key_string(&key.key_in_group())
    }

    /// Looks an entity up by raw key values, normalized through the key property types.
    pub fn find_entity_by_values(&self, values: Vec<Value>) -> Result<Option<EntityRef>> {
        let key = EntityKey::new(&self.entity_type, values)?;
        Ok(self.find_by_key_string(&key.key_in_group()))
    }

    fn find_by_key_string(&self, key_in_group: &str) -> Option<EntityRef> {
        self.index_map
            .get(key_in_group)
            .and_then(|&slot| self.entities.get(slot))
            .and_then(|e| e.clone())
    }

    /// Live entities, optionally restricted to a set of states.
    pub fn get_entities<'a>(
        &'a self,
        states: Option<&'a [EntityState]>,
    ) -> impl Iterator<Item = EntityRef> + 'a {
        self.entities
            .iter()
            .flatten()
            .filter(move |e| states.is_none_or(|s| s.contains(&e.state())))
            .cloned()
    }

    /// Linear scan for any Added, Modified or Deleted entity.
    pub fn has_changes(&self) -> bool {
        self.entities
            .iter()
            .flatten()
            .any(|e| e.state().is_added_modified_or_deleted())
    }

    pub fn get_changes(&self) -> Vec<EntityRef> {
        self.entities
            .iter()
            .flatten()
            .filter(|e| e.state().is_added_modified_or_deleted())
            .cloned()
            .collect()
    }

    /// Replaces a temporary key value with the real one assigned by the server.
    ///
    /// Updates the key property on the entity itself, moves the index entry
    /// and clears the temporary-key marker. Foreign keys held by other groups
    /// are cascaded by the caller through [`EntityGroup::update_fk_val`].
    pub fn fixup_key(&mut self, temp_value: &Value, real_value: &Value) -> Result<EntityRef> {
        let key_prop = match self.entity_type.key_properties().as_slice() {
            [single] => single.name.clone(),
            _ => {
                return Err(BreezeError::InvalidValue(format!(
                    "Key fix-up requires a single-part key on '{}'",
                    self.entity_type.name()
                )));
            }
        };

        let temp_key = EntityKey::new(&self.entity_type, vec![temp_value.clone()])?;
        let real_key = EntityKey::new(&self.entity_type, vec![real_value.clone()])?;
        let entity = self.find_entity_by_key(&temp_key).ok_or_else(|| {
            BreezeError::Internal(format!("temporary key {} not found for fix-up", temp_key))
        })?;

        if temp_key == real_key {
            entity.borrow_mut().aspect_mut().has_temp_key = false;
            return Ok(entity);
        }

        self.replace_key(&temp_key, &real_key)?;
        {
            let mut fixed = entity.borrow_mut();
            fixed.set_raw(&key_prop, real_key.values()[0].clone());
            fixed.aspect_mut().has_temp_key = false;
        }
        debug!("fixed up {} -> {}", temp_key, real_key);
        Ok(entity)
    }

    /// Moves the index entry of `old_key` to `new_key` without touching the entity values.
    pub fn replace_key(&mut self, old_key: &EntityKey, new_key: &EntityKey) -> Result<()> {
        let old = old_key.key_in_group();
        let new = new_key.key_in_group();
        if self.index_map.contains_key(&new) {
            return Err(BreezeError::EntityAlreadyExists(new_key.to_string()));
        }

        let slot = self.index_map.remove(&old).ok_or_else(|| {
            BreezeError::Internal(format!("key {} missing from its group index", old_key))
        })?;
        self.index_map.insert(new.clone(), slot);
        if let Some(entity) = self.entities.get(slot).and_then(|e| e.as_ref()) {
            entity.borrow_mut().aspect_mut().group_key = Some(new);
        }
        Ok(())
    }

    /// Rewrites every foreign-key value `old_value` of `fk_property` to `new_value`.
    ///
    /// Called on dependent groups after a principal entity is re-keyed.
    /// Returns the number of entities updated.
    pub fn update_fk_val(
        &mut self,
        fk_property: &str,
        old_value: &Value,
        new_value: &Value,
    ) -> Result<usize> {
        let prop = self
            .entity_type
            .data_property(fk_property)
            .ok_or_else(|| BreezeError::PropertyNotFound {
                segment: fk_property.to_string(),
                path: fk_property.to_string(),
                type_name: self.entity_type.name().to_string(),
            })?;
        let is_key = prop.is_part_of_key;
        let new_value = prop.data_type.parse(new_value.clone());

        let matching: Vec<(usize, EntityRef)> = self
            .entities
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| e.as_ref().map(|e| (slot, e.clone())))
            .filter(|(_, e)| e.borrow().get(fk_property) == Some(old_value))
            .collect();

        // Every re-keyed index entry is checked before anything is written,
        // so a failed cascade leaves the group untouched.
        let mut moves: Vec<(usize, String, String)> = Vec::new();
        if is_key {
            let vacated: HashSet<String> = matching
                .iter()
                .map(|(_, e)| e.entity_key().map(|k| k.key_in_group()))
                .collect::<Result<_>>()?;
            let mut claimed: HashSet<String> = HashSet::new();
            for (slot, entity) in &matching {
                let old_key = entity.entity_key()?;
                let new_key = self.rekeyed(entity, fk_property, &new_value)?;
                let new = new_key.key_in_group();
                let taken = self.index_map.contains_key(&new) && !vacated.contains(&new);
                if taken || !claimed.insert(new.clone()) {
                    warn!("foreign key cascade on {} failed: {} is already cached", old_key, new_key);
                    return Err(BreezeError::EntityAlreadyExists(new_key.to_string()));
                }
                moves.push((*slot, old_key.key_in_group(), new));
            }
        }

        for (_, entity) in &matching {
            entity.borrow_mut().set_raw(fk_property, new_value.clone());
        }
        for (_, old, _) in &moves {
            self.index_map.remove(old);
        }
        for (slot, _, new) in moves {
            if let Some(entity) = self.entities.get(slot).and_then(|e| e.as_ref()) {
                entity.borrow_mut().aspect_mut().group_key = Some(new.clone());
            }
            self.index_map.insert(new, slot);
        }

        if !matching.is_empty() {
            debug!(
                "updated {} '{}.{}' foreign keys",
                matching.len(),
                self.entity_type.name(),
                fk_property
            );
        }
        Ok(matching.len())
    }

    /// Key `entity` would have with `property` set to `value`.
    fn rekeyed(&self, entity: &EntityRef, property: &str, value: &Value) -> Result<EntityKey> {
        let current = entity.borrow();
        let values = self
            .entity_type
            .key_properties()
            .iter()
            .map(|p| {
                if p.name == property {
                    value.clone()
                } else {
                    current.get(&p.name).cloned().unwrap_or(Value::Null)
                }
            })
            .collect();
        EntityKey::new(&self.entity_type, values)
    }

    /// Checks that the slot array and the key index describe the same set of entities.
    pub fn verify_index(&self) -> Result<()> {
        let live = self.entities.iter().flatten().count();
        if live != self.index_map.len() {
            return Err(BreezeError::Internal(format!(
                "{} live slots but {} index entries",
                live,
                self.index_map.len()
            )));
        }
        for (key, &slot) in &self.index_map {
            let entity = self.slot(slot)?;
            let actual = entity.entity_key()?.key_in_group();
            if &actual != key {
                return Err(BreezeError::Internal(format!(
                    "slot {} indexed as '{}' but holds key '{}'",
                    slot, key, actual
                )));
            }
        }
        Ok(())
    }

    fn slot(&self, slot: usize) -> Result<&EntityRef> {
        self.entities
            .get(slot)
            .and_then(|e| e.as_ref())
            .ok_or_else(|| BreezeError::Internal(format!("index points at empty slot {}", slot)))
    }
}
