// ============================================================================
// Entity State Management
// ============================================================================
//
// Every cached entity moves through a small state machine:
//
//   Detached ──attach──> Added | Unchanged
//   Added     ──save──> Unchanged        ──delete/reject──> Detached
//   Unchanged ──edit──> Modified         ──delete──> Deleted
//   Modified  ──save/accept──> Unchanged ──delete──> Deleted
//   Deleted   ──save──> Detached         ──reject──> Unchanged
//
// Any state may drop to Detached when the entity is evicted from the cache.
//
// ============================================================================

use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    Detached,
    Added,
    Unchanged,
    Modified,
    Deleted,
}

impl EntityState {
    pub const ALL: [EntityState; 5] = [
        Self::Detached,
        Self::Added,
        Self::Unchanged,
        Self::Modified,
        Self::Deleted,
    ];

    /// Check whether the machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: EntityState) -> bool {
        use EntityState::*;

        if *self == next || next == Detached {
            return true;
        }
        matches!(
            (self, next),
            (Detached, Added)
                | (Detached, Unchanged)
                | (Added, Unchanged)
                | (Unchanged, Modified)
                | (Unchanged, Deleted)
                | (Modified, Unchanged)
                | (Modified, Deleted)
                | (Deleted, Unchanged)
        )
    }

    /// Added, Modified or Deleted
    pub fn is_added_modified_or_deleted(&self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached)
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Detached => "Detached",
            Self::Added => "Added",
            Self::Unchanged => "Unchanged",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
        };
        write!(f, "{}", name)
    }
}

/// Policy applied when attaching data for a key that is already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum MergeStrategy {
    /// Fail with an entity-already-exists error
    Disallowed,
    /// Always copy incoming values onto the cached instance
    OverwriteChanges,
    /// Copy incoming values only while the cached instance is Unchanged
    #[default]
    PreserveChanges,
    /// Keep the cached instance as it is
    SkipMerge,
}

impl MergeStrategy {
    /// Whether incoming values replace those of a cached entity in `state`.
    pub fn should_overwrite(&self, state: EntityState) -> bool {
        match self {
            Self::OverwriteChanges => true,
            Self::PreserveChanges => state.is_unchanged(),
            Self::Disallowed | Self::SkipMerge => false,
        }
    }
}
