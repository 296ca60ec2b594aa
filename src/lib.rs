//! Grid inventory placement engine.
//!
//! A player inventory (backpack grid, one slot per equipment category and a
//! craft slot) and a multi-tab stash, with drag-and-drop moves, single-item
//! swaps and displacement of bumped items. Every operation either commits
//! completely or leaves all touched containers exactly as they were, and
//! change events are published only after a commit.
//!
//! The engine is single-threaded: items are shared `Rc` handles and
//! containers are plain values owned by the caller.

mod config;
mod displacement;
mod errors;
mod events;
mod item_grid;
mod items;
mod models;
mod player_inventory;
mod stash;

pub mod inventory_management; // Cross-container moves, drag sessions, recovery
pub mod layout; // Persisted layouts

pub use config::{GridDims, InventoryConfig};
pub use displacement::{find_displacement_anchor, find_displacement_in_tabs, TabExclusion};
pub use errors::{ConfigError, PlacementError, PlacementResult};
pub use events::{ChangeNotifier, InventoryEvent, Subscription};
pub use inventory_management::{is_container_empty, HeldItem, ItemContainer, Transfer};
pub use item_grid::{GridRect, ItemGrid};
pub use items::{same_item, InventoryItem, ItemRef};
pub use models::{
    ContainerType, EquipmentSlotType, ItemLocation, SlotAddress, StashAddress, CRAFT_SLOT_ADDRESS,
    EQUIPMENT_SLOT_OFFSET,
};
pub use player_inventory::PlayerInventory;
pub use stash::Stash;
