//! Error types for placement operations and configuration.
//!
//! Every expected failure of a placement operation is reported as a
//! `PlacementError` and leaves all touched containers untouched.

use thiserror::Error;

use crate::models::{EquipmentSlotType, SlotAddress, StashAddress};

/// Reasons a placement, move, swap or tab operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Address outside the container's address space.
    #[error("address {0} is out of range")]
    OutOfRange(SlotAddress),
    /// Stash address outside the stash.
    #[error("stash address {0} is out of range")]
    StashOutOfRange(StashAddress),
    /// The item's footprint would leave the grid.
    #[error("item {instance_id} does not fit inside the grid at anchor {anchor}")]
    OutOfBounds { instance_id: u64, anchor: usize },
    /// Item category does not match the equipment slot.
    #[error("item {instance_id} cannot be equipped in slot {slot:?}")]
    SlotTypeMismatch {
        instance_id: u64,
        slot: EquipmentSlotType,
    },
    /// A different item already covers part of the target footprint.
    #[error("target is occupied by item {occupant}")]
    Occupied { occupant: u64 },
    /// The target footprint overlaps more than one distinct item.
    #[error("target overlaps {count} items, swap is ambiguous")]
    Ambiguous { count: usize },
    /// No legal destination exists for a displaced or recovered item.
    #[error("no space left for item {instance_id}")]
    NoSpace { instance_id: u64 },
    /// Nothing to move at the source address.
    #[error("source {0} is empty")]
    EmptySource(String),
    /// Tab index does not exist.
    #[error("stash tab {0} does not exist")]
    NoSuchTab(usize),
    /// Tab still holds items.
    #[error("stash tab {0} is not empty")]
    TabNotEmpty(usize),
    /// The stash must keep at least one tab.
    #[error("cannot remove the last stash tab")]
    LastTab,
}

impl PlacementError {
    /// True for the InvalidTarget family: bad address, bounds or slot type.
    pub fn is_invalid_target(&self) -> bool {
        matches!(
            self,
            PlacementError::OutOfRange(_)
                | PlacementError::StashOutOfRange(_)
                | PlacementError::OutOfBounds { .. }
                | PlacementError::SlotTypeMismatch { .. }
                | PlacementError::NoSuchTab(_)
        )
    }
}

pub type PlacementResult<T> = Result<T, PlacementError>;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse inventory config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid inventory config: {0}")]
    Invalid(String),
}
