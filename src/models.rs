/******************************************************************************
 *                                                                            *
 * Address types shared by every container. The flat address space used by   *
 * the player inventory is part of the save format: plain indices address    *
 * backpack cells, EQUIPMENT_SLOT_OFFSET + category addresses an equipment    *
 * slot and CRAFT_SLOT_ADDRESS addresses the craft slot. Stash addresses are  *
 * always (tab, index) pairs and never enter the flat space.                  *
 *                                                                            *
 ******************************************************************************/

use serde::{Deserialize, Serialize};
use std::fmt;

// --- Address Space Constants ---
/// First raw address used by equipment slots.
pub const EQUIPMENT_SLOT_OFFSET: i32 = 1000;
/// Reserved raw address of the craft slot.
pub const CRAFT_SLOT_ADDRESS: i32 = -1;

/// Enum to differentiate between the kinds of item containers.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerType {
    PlayerInventory,
    Stash,
}

/// Enum to differentiate between the equipment slot categories.
/// The discriminant is the category index used in raw addresses.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EquipmentSlotType {
    Head = 0,
    Chest = 1,
    Weapon = 2,
    OffHand = 3,
    Legs = 4,
    Feet = 5,
    Hands = 6,
    Back = 7,
}

impl EquipmentSlotType {
    pub const COUNT: usize = 8;

    pub const ALL: [EquipmentSlotType; Self::COUNT] = [
        EquipmentSlotType::Head,
        EquipmentSlotType::Chest,
        EquipmentSlotType::Weapon,
        EquipmentSlotType::OffHand,
        EquipmentSlotType::Legs,
        EquipmentSlotType::Feet,
        EquipmentSlotType::Hands,
        EquipmentSlotType::Back,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A location inside one player inventory.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotAddress {
    /// Backpack cell, `row * cols + col`.
    Backpack(usize),
    Equipment(EquipmentSlotType),
    Craft,
}

impl SlotAddress {
    /// Encodes the address into the flat save-format integer.
    pub fn to_raw(self) -> i32 {
        match self {
            SlotAddress::Backpack(index) => index as i32,
            SlotAddress::Equipment(slot) => EQUIPMENT_SLOT_OFFSET + slot.index() as i32,
            SlotAddress::Craft => CRAFT_SLOT_ADDRESS,
        }
    }

    /// Decodes a flat address. Unknown negative values and equipment
    /// indices past the last category yield `None`. Backpack indices are
    /// not range-checked here; the inventory does that against its grid.
    pub fn from_raw(raw: i32) -> Option<Self> {
        if raw == CRAFT_SLOT_ADDRESS {
            return Some(SlotAddress::Craft);
        }
        if raw < 0 {
            return None;
        }
        if raw >= EQUIPMENT_SLOT_OFFSET {
            return EquipmentSlotType::from_index((raw - EQUIPMENT_SLOT_OFFSET) as usize)
                .map(SlotAddress::Equipment);
        }
        Some(SlotAddress::Backpack(raw as usize))
    }

    pub fn backpack_index(self) -> Option<usize> {
        match self {
            SlotAddress::Backpack(index) => Some(index),
            _ => None,
        }
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotAddress::Backpack(index) => write!(f, "backpack[{}]", index),
            SlotAddress::Equipment(slot) => write!(f, "equipment[{:?}]", slot),
            SlotAddress::Craft => write!(f, "craft"),
        }
    }
}

impl Serialize for SlotAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.to_raw())
    }
}

impl<'de> Deserialize<'de> for SlotAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i32::deserialize(deserializer)?;
        SlotAddress::from_raw(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid slot address {}", raw)))
    }
}

/// A location inside the stash: tab index plus the cell index within that tab.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StashAddress {
    pub tab: usize,
    pub index: usize,
}

impl StashAddress {
    pub fn new(tab: usize, index: usize) -> Self {
        StashAddress { tab, index }
    }
}

impl fmt::Display for StashAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stash[{}][{}]", self.tab, self.index)
    }
}

/// A location in either container: where a dragged item came from, or where an item landed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemLocation {
    Inventory(SlotAddress),
    Stash(StashAddress),
}

impl ItemLocation {
    pub fn container_type(&self) -> ContainerType {
        match self {
            ItemLocation::Inventory(_) => ContainerType::PlayerInventory,
            ItemLocation::Stash(_) => ContainerType::Stash,
        }
    }
}

impl fmt::Display for ItemLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemLocation::Inventory(address) => write!(f, "{}", address),
            ItemLocation::Stash(address) => write!(f, "{}", address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_addresses_keep_their_ranges() {
        assert_eq!(SlotAddress::Backpack(7).to_raw(), 7);
        assert_eq!(SlotAddress::Equipment(EquipmentSlotType::Weapon).to_raw(), 1002);
        assert_eq!(SlotAddress::Craft.to_raw(), CRAFT_SLOT_ADDRESS);

        assert_eq!(SlotAddress::from_raw(0), Some(SlotAddress::Backpack(0)));
        assert_eq!(
            SlotAddress::from_raw(1007),
            Some(SlotAddress::Equipment(EquipmentSlotType::Back))
        );
        assert_eq!(SlotAddress::from_raw(-1), Some(SlotAddress::Craft));
    }

    #[test]
    fn unknown_raw_addresses_are_rejected() {
        assert_eq!(SlotAddress::from_raw(-7), None);
        assert_eq!(SlotAddress::from_raw(EQUIPMENT_SLOT_OFFSET + 8), None);
    }

    #[test]
    fn every_slot_address_survives_the_flat_encoding() {
        for slot in EquipmentSlotType::ALL {
            let address = SlotAddress::Equipment(slot);
            assert_eq!(SlotAddress::from_raw(address.to_raw()), Some(address));
        }
    }
}
