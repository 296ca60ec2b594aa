/******************************************************************************
 *                                                                            *
 * Item instances as seen by the placement engine. Items are created by an    *
 * external generator and shared by reference: occupancy is decided by        *
 * identity (Rc pointer equality), never by comparing field values.           *
 *                                                                            *
 ******************************************************************************/

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::models::EquipmentSlotType;

// --- Item Struct ---

/// A placed or placeable item. Only the footprint and slot type matter to
/// the engine; the rest is carried for logs and for the persisted layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryItem {
    pub instance_id: u64,      // Unique ID for this specific item instance
    pub item_def_id: u64,      // Definition the generator built this item from
    pub name: String,
    pub width: u32,            // Cells covered horizontally
    pub height: u32,           // Cells covered vertically
    pub slot_type: Option<EquipmentSlotType>, // Equipment category, if equippable
}

/// Shared handle to an item. Cloning the handle never clones the item.
pub type ItemRef = Rc<InventoryItem>;

impl InventoryItem {
    pub fn new(instance_id: u64, name: impl Into<String>, width: u32, height: u32) -> Self {
        InventoryItem {
            instance_id,
            item_def_id: 0,
            name: name.into(),
            width,
            height,
            slot_type: None,
        }
    }

    pub fn with_definition(mut self, item_def_id: u64) -> Self {
        self.item_def_id = item_def_id;
        self
    }

    pub fn with_slot_type(mut self, slot_type: EquipmentSlotType) -> Self {
        self.slot_type = Some(slot_type);
        self
    }

    pub fn into_ref(self) -> ItemRef {
        Rc::new(self)
    }

    /// True if the item may sit in the given equipment slot.
    pub fn fits_equipment_slot(&self, slot: EquipmentSlotType) -> bool {
        self.slot_type == Some(slot)
    }
}

/// Identity comparison for item handles.
pub fn same_item(a: &ItemRef, b: &ItemRef) -> bool {
    Rc::ptr_eq(a, b)
}

/// Identity comparison for optional slot contents.
pub(crate) fn same_slot(a: &Option<ItemRef>, b: &Option<ItemRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_item(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Pushes `item` unless the same instance is already present.
pub(crate) fn push_unique(items: &mut Vec<ItemRef>, item: &ItemRef) {
    if !items.iter().any(|existing| same_item(existing, item)) {
        items.push(Rc::clone(item));
    }
}
