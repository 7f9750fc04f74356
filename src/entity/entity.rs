use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::{EntityKey, EntityState};
use crate::core::{BreezeError, Result, Value};
use crate::metadata::EntityType;

/// Change-tracking bookkeeping carried by every entity.
#[derive(Debug, Clone)]
pub struct EntityAspect {
    pub(crate) state: EntityState,
    /// Values as they were before the first local edit
    pub(crate) original_values: HashMap<String, Value>,
    pub(crate) has_temp_key: bool,
    /// Canonical key the owning group indexes this entity under
    pub(crate) group_key: Option<String>,
}

impl EntityAspect {
    fn new() -> Self {
        Self {
            state: EntityState::Detached,
            original_values: HashMap::new(),
            has_temp_key: false,
            group_key: None,
        }
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn original_values(&self) -> &HashMap<String, Value> {
        &self.original_values
    }

    pub fn has_temp_key(&self) -> bool {
        self.has_temp_key
    }

    pub fn is_attached(&self) -> bool {
        self.group_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    values: HashMap<String, Value>,
    aspect: EntityAspect,
}

impl Entity {
    /// Creates a detached instance with every data property at its initial value.
    pub fn new(entity_type: Arc<EntityType>) -> Self {
        let values = entity_type
            .data_properties()
            .iter()
            .map(|p| (p.name.clone(), p.initial_value()))
            .collect();
        Self {
            entity_type,
            values,
            aspect: EntityAspect::new(),
        }
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn type_name(&self) -> &str {
        self.entity_type.name()
    }

    pub fn aspect(&self) -> &EntityAspect {
        &self.aspect
    }

    pub fn state(&self) -> EntityState {
        self.aspect.state
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn original_value(&self, name: &str) -> Option<&Value> {
        self.aspect.original_values.get(name)
    }

    /// Assigns a property, recording the original value and moving an
    /// Unchanged entity to Modified.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let prop = self
            .entity_type
            .data_property(name)
            .ok_or_else(|| BreezeError::PropertyNotFound {
                segment: name.to_string(),
                path: name.to_string(),
                type_name: self.entity_type.name().to_string(),
            })?;

        if prop.is_part_of_key && self.aspect.is_attached() {
            return Err(BreezeError::InvalidState(format!(
                "Key property '{}' of an attached entity changes only through key fix-up",
                name
            )));
        }
        if self.aspect.state == EntityState::Deleted {
            return Err(BreezeError::InvalidState(format!(
                "Cannot modify '{}' of a deleted entity",
                name
            )));
        }

        let value = prop.data_type.parse(value.into());
        let old = self.values.insert(name.to_string(), value.clone()).unwrap_or(Value::Null);
        if old == value {
            return Ok(());
        }

        match self.aspect.state {
            EntityState::Unchanged | EntityState::Modified => {
                self.aspect
                    .original_values
                    .entry(name.to_string())
                    .or_insert(old);
                self.aspect.state = EntityState::Modified;
            }
            _ => {}
        }
        Ok(())
    }

    /// Assigns a value without any change tracking.
    pub(crate) fn set_raw(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Copies incoming data property values and forgets local edits.
    pub(crate) fn merge_values_from(&mut self, source: &Entity) {
        for prop in self.entity_type.data_properties() {
            if let Some(value) = source.values.get(&prop.name) {
                self.values.insert(prop.name.clone(), value.clone());
            }
        }
        self.aspect.original_values.clear();
    }

    pub fn entity_key(&self) -> Result<EntityKey> {
        let values = self
            .entity_type
            .key_properties()
            .iter()
            .map(|p| self.values.get(&p.name).cloned().unwrap_or(Value::Null))
            .collect();
        EntityKey::new(&self.entity_type, values)
    }

    pub(crate) fn set_state(&mut self, next: EntityState) -> Result<()> {
        if !self.aspect.state.can_transition_to(next) {
            return Err(BreezeError::InvalidState(format!(
                "{} entity '{}' cannot become {}",
                self.aspect.state,
                self.entity_type.name(),
                next
            )));
        }
        self.aspect.state = next;
        Ok(())
    }

    /// Marks the entity Unchanged and forgets its original values.
    pub fn set_unchanged(&mut self) -> Result<()> {
        self.set_state(EntityState::Unchanged)?;
        self.aspect.original_values.clear();
        Ok(())
    }

    pub fn set_modified(&mut self) -> Result<()> {
        self.set_state(EntityState::Modified)
    }

    /// Marks the entity Deleted, or Detached if it was never saved.
    /// Returns the resulting state. Reaching Detached does not evict the
    /// entity from its group; callers go through the manager.
    pub(crate) fn set_deleted(&mut self) -> Result<EntityState> {
        match self.aspect.state {
            EntityState::Added => {
                self.aspect.state = EntityState::Detached;
            }
            EntityState::Detached => {
                return Err(BreezeError::InvalidState(format!(
                    "Detached entity '{}' cannot be deleted",
                    self.entity_type.name()
                )));
            }
            _ => self.set_state(EntityState::Deleted)?,
        }
        Ok(self.aspect.state)
    }

    /// Removes the entity from tracking; reachable from any state.
    pub(crate) fn set_detached(&mut self) {
        self.aspect.state = EntityState::Detached;
        self.aspect.original_values.clear();
        self.aspect.group_key = None;
    }

    /// Commits local edits: Added/Modified become Unchanged, Deleted becomes Detached.
    pub(crate) fn accept_changes(&mut self) -> EntityState {
        self.aspect.original_values.clear();
        self.aspect.state = match self.aspect.state {
            EntityState::Deleted | EntityState::Detached => EntityState::Detached,
            _ => EntityState::Unchanged,
        };
        self.aspect.state
    }

    /// Rolls local edits back: Added becomes Detached, Modified/Deleted become Unchanged.
    pub(crate) fn reject_changes(&mut self) -> EntityState {
        self.restore_originals();
        self.aspect.state = match self.aspect.state {
            EntityState::Added | EntityState::Detached => EntityState::Detached,
            _ => EntityState::Unchanged,
        };
        self.aspect.state
    }

    fn restore_originals(&mut self) {
        for (name, value) in self.aspect.original_values.drain() {
            self.values.insert(name, value);
        }
    }

    pub(crate) fn aspect_mut(&mut self) -> &mut EntityAspect {
        &mut self.aspect
    }
}

/// Shared handle to a cached entity.
///
/// The cache and its callers hold the same instance; identity is pointer
/// identity. Handles are single-threaded.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<Entity>>);

impl EntityRef {
    pub fn new(entity: Entity) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    pub fn borrow(&self) -> Ref<'_, Entity> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Entity> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn state(&self) -> EntityState {
        self.0.borrow().state()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.0.borrow_mut().set(name, value)
    }

    pub fn entity_key(&self) -> Result<EntityKey> {
        self.0.borrow().entity_key()
    }
}

impl From<Entity> for EntityRef {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => f
                .debug_struct("EntityRef")
                .field("type", &entity.type_name())
                .field("state", &entity.state())
                .field("values", &entity.values)
                .finish(),
            Err(_) => f.write_str("EntityRef(<borrowed>)"),
        }
    }
}
