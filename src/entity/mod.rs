mod entity;
mod group;
mod key;
mod state;

pub use entity::{Entity, EntityAspect, EntityRef};
pub use group::EntityGroup;
pub use key::{EntityKey, KEY_DELIMITER};
pub use state::{EntityState, MergeStrategy};
