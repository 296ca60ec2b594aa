//! Persisted container layouts.
//!
//! One record per item, addressed by its anchor. Inventory records use the
//! flat address space (`SlotAddress` serializes as its raw `i32`). Restoring
//! replays normal placement rules in record order, so a record whose cells
//! are already claimed, whose address is out of range, or whose item does
//! not fit its equipment slot is handed back to the caller instead of being
//! written.

use std::rc::Rc;

use log;
use serde::{Deserialize, Serialize};

use crate::config::GridDims;
use crate::item_grid::ItemGrid;
use crate::items::{InventoryItem, ItemRef};
use crate::models::{EquipmentSlotType, SlotAddress, StashAddress};
use crate::player_inventory::{InventoryState, PlayerInventory};
use crate::stash::{Stash, StashState};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LayoutRecord {
    pub address: SlotAddress,
    pub item: InventoryItem,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StashLayoutRecord {
    pub tab: usize,
    pub index: usize,
    pub item: InventoryItem,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StashLayout {
    pub tab_count: usize,
    pub current_tab: usize,
    pub records: Vec<StashLayoutRecord>,
}

// --- Player Inventory ---

pub fn save_inventory(inventory: &PlayerInventory) -> Vec<LayoutRecord> {
    let record = |address: SlotAddress, item: &ItemRef| LayoutRecord { address, item: InventoryItem::clone(item) };
    let mut records: Vec<LayoutRecord> = inventory
        .backpack()
        .items()
        .iter()
        .map(|(anchor, item)| record(SlotAddress::Backpack(*anchor), item))
        .collect();
    for slot in EquipmentSlotType::ALL {
        if let Some(item) = inventory.equipped(slot) {
            records.push(record(SlotAddress::Equipment(slot), item));
        }
    }
    if let Some(item) = inventory.craft_item() {
        records.push(record(SlotAddress::Craft, item));
    }
    records
}

/// Replaces the inventory contents with `records`. Returns the items that
/// could not be placed, in record order.
pub fn restore_inventory(inventory: &mut PlayerInventory, records: &[LayoutRecord]) -> Vec<ItemRef> {
    let backpack = inventory.backpack();
    let mut next = InventoryState {
        backpack: ItemGrid::new(GridDims::new(backpack.cols(), backpack.rows())),
        equipment: Default::default(),
        craft: None,
    };
    let mut rejected = Vec::new();
    for record in records {
        let item = Rc::new(record.item.clone());
        if let Err(e) = next.bind(&item, record.address) {
            log::warn!(
                "[Layout] Item {} rejected at {} while restoring inventory: {}",
                item.instance_id, record.address, e
            );
            rejected.push(item);
        }
    }
    log::info!("[Layout] Restored inventory: {} records, {} rejected.", records.len(), rejected.len());
    inventory.commit(next);
    rejected
}

// --- Stash ---

pub fn save_stash(stash: &Stash) -> StashLayout {
    StashLayout {
        tab_count: stash.tab_count(),
        current_tab: stash.current_tab(),
        records: stash
            .items()
            .into_iter()
            .map(|(address, item)| StashLayoutRecord {
                tab: address.tab,
                index: address.index,
                item: InventoryItem::clone(&item),
            })
            .collect(),
    }
}

/// Replaces the stash contents and tab list with `layout`. Returns the
/// items that could not be placed.
pub fn restore_stash(stash: &mut Stash, layout: &StashLayout) -> Vec<ItemRef> {
    let tab_count = layout.tab_count.max(1);
    let mut next = StashState {
        tabs: vec![ItemGrid::new(stash.tab_dims()); tab_count],
        current_tab: layout.current_tab.min(tab_count - 1),
    };
    let mut rejected = Vec::new();
    for record in &layout.records {
        let item = Rc::new(record.item.clone());
        let address = StashAddress::new(record.tab, record.index);
        let valid = next.validate(address).map(|_| ());
        let placed = valid.and_then(|()| next.tabs[address.tab].place(&item, address.index));
        if let Err(e) = placed {
            log::warn!("[Layout] Item {} rejected at {} while restoring stash: {}", item.instance_id, address, e);
            rejected.push(item);
        }
    }
    log::info!("[Layout] Restored stash: {} tabs, {} rejected.", tab_count, rejected.len());
    stash.commit(next);
    rejected
}
