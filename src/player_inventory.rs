/******************************************************************************
 *                                                                            *
 * Per-player inventory: one backpack grid, one slot per equipment category   *
 * and a single craft slot, all addressed through the flat SlotAddress space. *
 * Every operation plans its result on a staged copy of the state and         *
 * commits it in one assignment, so a refused request never leaves a partial  *
 * write behind and listeners only ever see committed state.                  *
 *                                                                            *
 ******************************************************************************/

use std::rc::Rc;

use log;

use crate::config::InventoryConfig;
use crate::displacement::find_displacement_anchor;
use crate::errors::{ConfigError, PlacementError, PlacementResult};
use crate::events::{ChangeNotifier, InventoryEvent, Subscription};
use crate::item_grid::{GridRect, ItemGrid};
use crate::items::{same_item, same_slot, ItemRef};
use crate::inventory_management::ItemContainer;
use crate::models::{ContainerType, EquipmentSlotType, ItemLocation, SlotAddress};

// --- Inventory State ---

/// Contents of one inventory. Cheap to clone: cells hold shared handles.
#[derive(Clone, Debug)]
pub(crate) struct InventoryState {
    pub(crate) backpack: ItemGrid,
    pub(crate) equipment: [Option<ItemRef>; EquipmentSlotType::COUNT],
    pub(crate) craft: Option<ItemRef>,
}

impl PartialEq for InventoryState {
    fn eq(&self, other: &Self) -> bool {
        self.backpack == other.backpack
            && same_slot(&self.craft, &other.craft)
            && self.equipment.iter().zip(other.equipment.iter()).all(|(a, b)| same_slot(a, b))
    }
}

impl InventoryState {
    fn new(config: &InventoryConfig) -> Self {
        InventoryState {
            backpack: ItemGrid::new(config.backpack),
            equipment: Default::default(),
            craft: None,
        }
    }

    fn singleton_mut(&mut self, address: SlotAddress) -> Option<&mut Option<ItemRef>> {
        match address {
            SlotAddress::Equipment(slot) => Some(&mut self.equipment[slot.index()]),
            SlotAddress::Craft => Some(&mut self.craft),
            SlotAddress::Backpack(_) => None,
        }
    }

    pub(crate) fn get_item_at(&self, address: SlotAddress) -> Option<(ItemRef, SlotAddress)> {
        match address {
            SlotAddress::Backpack(index) => self
                .backpack
                .get_item_at(index)
                .map(|(item, anchor)| (item, SlotAddress::Backpack(anchor))),
            SlotAddress::Equipment(slot) => self.equipment[slot.index()].clone().map(|item| (item, address)),
            SlotAddress::Craft => self.craft.clone().map(|item| (item, address)),
        }
    }

    pub(crate) fn location_of(&self, item: &ItemRef) -> Option<SlotAddress> {
        if let Some(anchor) = self.backpack.anchor_of(item) {
            return Some(SlotAddress::Backpack(anchor));
        }
        if let Some(slot) = EquipmentSlotType::ALL
            .into_iter()
            .find(|slot| self.equipment[slot.index()].as_ref().map_or(false, |held| same_item(held, item)))
        {
            return Some(SlotAddress::Equipment(slot));
        }
        match &self.craft {
            Some(held) if same_item(held, item) => Some(SlotAddress::Craft),
            _ => None,
        }
    }

    /// Unbinds `item` from wherever it is and returns that location.
    pub(crate) fn detach(&mut self, item: &ItemRef) -> Option<SlotAddress> {
        let location = self.location_of(item)?;
        match location {
            SlotAddress::Backpack(_) => {
                self.backpack.remove(item);
            }
            other => {
                if let Some(slot) = self.singleton_mut(other) {
                    *slot = None;
                }
            }
        }
        Some(location)
    }

    /// Binds `item` at `address`, which must be free (or already hold the item).
    pub(crate) fn bind(&mut self, item: &ItemRef, address: SlotAddress) -> PlacementResult<()> {
        match address {
            SlotAddress::Backpack(anchor) => self.backpack.place(item, anchor),
            other => {
                if let SlotAddress::Equipment(slot) = other {
                    if !item.fits_equipment_slot(slot) {
                        return Err(PlacementError::SlotTypeMismatch { instance_id: item.instance_id, slot });
                    }
                }
                let Some(slot) = self.singleton_mut(other) else {
                    return Err(PlacementError::OutOfRange(other));
                };
                match slot {
                    Some(occupant) if !same_item(occupant, item) => {
                        Err(PlacementError::Occupied { occupant: occupant.instance_id })
                    }
                    _ => {
                        *slot = Some(Rc::clone(item));
                        Ok(())
                    }
                }
            }
        }
    }

    /// Makes room for `item` at `target`. Returns the backpack footprint (if
    /// the target is a backpack cell) and the single occupant that was lifted
    /// out of the way, if any. More than one occupant is ambiguous.
    pub(crate) fn clear_target(
        &mut self,
        item: &ItemRef,
        target: SlotAddress,
    ) -> PlacementResult<(Option<GridRect>, Option<ItemRef>)> {
        let anchor = match target {
            SlotAddress::Backpack(anchor) => anchor,
            SlotAddress::Equipment(slot) if !item.fits_equipment_slot(slot) => {
                return Err(PlacementError::SlotTypeMismatch { instance_id: item.instance_id, slot });
            }
            singleton => {
                let displaced = self.singleton_mut(singleton).and_then(Option::take);
                return Ok((None, displaced.filter(|occupant| !same_item(occupant, item))));
            }
        };
        if anchor >= self.backpack.len() {
            return Err(PlacementError::OutOfRange(target));
        }
        let footprint = match self.backpack.check_place(item, anchor) {
            Ok(rect) => return Ok((Some(rect), None)),
            Err(PlacementError::Occupied { .. }) => self
                .backpack
                .rect_at(item, anchor)
                .ok_or(PlacementError::OutOfRange(target))?,
            Err(e) => return Err(e),
        };
        let occupants = self.backpack.unique_items_in_area(footprint);
        let [displaced] = occupants.as_slice() else {
            return Err(PlacementError::Ambiguous { count: occupants.len() });
        };
        let displaced = Rc::clone(displaced);
        self.backpack.remove(&displaced);
        Ok((Some(footprint), Some(displaced)))
    }

    /// Finds the displaced item a new home inside this inventory: the
    /// preferred address first (backpack anchor, or a free compatible
    /// singleton slot), then a row-major backpack scan that avoids `exclusions`.
    pub(crate) fn rehome(
        &mut self,
        displaced: &ItemRef,
        preferred: Option<SlotAddress>,
        exclusions: &[GridRect],
    ) -> Option<SlotAddress> {
        if let Some(address @ (SlotAddress::Equipment(_) | SlotAddress::Craft)) = preferred {
            let slot_free = self.singleton_mut(address).map_or(false, |slot| slot.is_none());
            if slot_free && self.bind(displaced, address).is_ok() {
                return Some(address);
            }
        }
        let preferred_anchor = preferred.and_then(SlotAddress::backpack_index);
        let anchor = find_displacement_anchor(&self.backpack, displaced, preferred_anchor, exclusions)?;
        self.backpack.place(displaced, anchor).ok()?;
        Some(SlotAddress::Backpack(anchor))
    }

    /// Binds the displaced item at exactly `address`, with no fallback.
    pub(crate) fn rehome_at(&mut self, displaced: &ItemRef, address: SlotAddress) -> Option<SlotAddress> {
        self.bind(displaced, address).ok().map(|()| address)
    }

    fn is_empty(&self) -> bool {
        self.backpack.is_empty() && self.craft.is_none() && self.equipment.iter().all(Option::is_none)
    }
}

// --- Player Inventory ---

#[derive(Debug)]
pub struct PlayerInventory {
    state: InventoryState,
    notifier: ChangeNotifier,
}

impl PlayerInventory {
    pub fn new(config: &InventoryConfig) -> Result<Self, ConfigError> {
        Self::with_notifier(config, ChangeNotifier::new())
    }

    /// Builds an inventory that publishes to an existing (possibly shared) notifier.
    /// The config is validated first, so every backpack index stays inside the
    /// flat address range.
    pub fn with_notifier(config: &InventoryConfig, notifier: ChangeNotifier) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(PlayerInventory { state: InventoryState::new(config), notifier })
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn subscribe(&self, listener: impl FnMut(&InventoryEvent) + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    pub fn backpack(&self) -> &ItemGrid {
        &self.state.backpack
    }

    pub fn equipped(&self, slot: EquipmentSlotType) -> Option<&ItemRef> {
        self.state.equipment[slot.index()].as_ref()
    }

    pub fn craft_item(&self) -> Option<&ItemRef> {
        self.state.craft.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.state.location_of(item).is_some()
    }

    /// Distinct items in the backpack, equipment and craft slots.
    pub fn item_count(&self) -> usize {
        let singletons = self.state.equipment.iter().chain(std::iter::once(&self.state.craft));
        self.state.backpack.item_count() + singletons.filter(|slot| slot.is_some()).count()
    }

    /// Where `item` is bound; backpack items report their anchor.
    pub fn location_of(&self, item: &ItemRef) -> Option<SlotAddress> {
        self.state.location_of(item)
    }

    pub fn validate_address(&self, address: SlotAddress) -> PlacementResult<()> {
        match address {
            SlotAddress::Backpack(index) if index >= self.state.backpack.len() => {
                Err(PlacementError::OutOfRange(address))
            }
            _ => Ok(()),
        }
    }

    /// Address-level feasibility. Singleton slots always accept here; their
    /// type check happens when the placement is committed.
    pub fn can_place_at(&self, item: &ItemRef, target: SlotAddress) -> bool {
        match target {
            SlotAddress::Backpack(index) => {
                index < self.state.backpack.len() && self.state.backpack.can_place(item, index)
            }
            SlotAddress::Equipment(_) | SlotAddress::Craft => true,
        }
    }

    /// Occupant of `address` and its anchor address.
    pub fn get_item_at(&self, address: SlotAddress) -> Option<(ItemRef, SlotAddress)> {
        self.validate_address(address).ok()?;
        self.state.get_item_at(address)
    }

    /// Detaches and returns whatever occupies `address`. No displacement logic runs.
    pub fn take_from_slot(&mut self, address: SlotAddress) -> Option<ItemRef> {
        self.validate_address(address).ok()?;
        let mut next = self.state.clone();
        let taken = match address {
            SlotAddress::Backpack(index) => next.backpack.take(index),
            other => next.singleton_mut(other).and_then(Option::take),
        }?;
        log::info!("[TakeFromSlot] Took item {} from {}.", taken.instance_id, address);
        self.commit(next);
        Some(taken)
    }

    /// Puts `item` into the first backpack anchor that fits.
    pub fn try_add_item(&mut self, item: &ItemRef) -> PlacementResult<SlotAddress> {
        if let Some(existing) = self.state.location_of(item) {
            return Ok(existing);
        }
        let anchor = self
            .state
            .backpack
            .find_first_empty_root(item, None)
            .ok_or(PlacementError::NoSpace { instance_id: item.instance_id })?;
        let mut next = self.state.clone();
        next.backpack.place(item, anchor)?;
        log::info!("[AddItem] Item {} added to backpack anchor {}.", item.instance_id, anchor);
        self.commit(next);
        Ok(SlotAddress::Backpack(anchor))
    }

    /// Places `item` at `target`, swapping with a single occupant when one is
    /// in the way. `source_anchor_for_swap` is where a displaced occupant
    /// should go first; if it is omitted the item's current location is used.
    /// An occupant bumped out of an equipment or craft slot only ever lands
    /// at `source_anchor_for_swap` when one is given.
    pub fn place_at(
        &mut self,
        item: &ItemRef,
        target: SlotAddress,
        source_anchor_for_swap: Option<SlotAddress>,
    ) -> PlacementResult<()> {
        match self.plan_place(item, target, source_anchor_for_swap) {
            Ok(next) => {
                log::info!("[PlaceAt] Item {} placed at {}.", item.instance_id, target);
                self.commit(next);
                Ok(())
            }
            Err(e) => {
                log::debug!("[PlaceAt] Refused to place item {} at {}: {}", item.instance_id, target, e);
                Err(e)
            }
        }
    }

    /// Moves whatever sits at `from` to `to`, swapping when needed.
    pub fn try_move_or_swap(&mut self, from: SlotAddress, to: SlotAddress) -> PlacementResult<()> {
        if from == to {
            return Ok(());
        }
        self.validate_address(from)?;
        self.validate_address(to)?;
        let (item, from_anchor) = self
            .state
            .get_item_at(from)
            .ok_or_else(|| PlacementError::EmptySource(from.to_string()))?;
        if let Some((occupant, _)) = self.state.get_item_at(to) {
            if same_item(&occupant, &item) {
                log::debug!("[MoveOrSwap] Item {} already occupies {}. No action.", item.instance_id, to);
                return Ok(());
            }
        }
        log::debug!("[MoveOrSwap] Moving item {} from {} to {}.", item.instance_id, from_anchor, to);
        self.place_at(&item, to, Some(from_anchor))
    }

    // --- Planning ---

    fn plan_place(
        &self,
        item: &ItemRef,
        target: SlotAddress,
        source: Option<SlotAddress>,
    ) -> PlacementResult<InventoryState> {
        self.validate_address(target)?;
        let mut next = self.state.clone();
        let origin = next.detach(item);

        if source == Some(target) {
            // Restoring a cancelled drag: the item only has to fit again.
            next.bind(item, target)?;
            return Ok(next);
        }

        let (footprint, displaced) = next.clear_target(item, target)?;
        if let Some(displaced) = displaced {
            let landed = match (target, source) {
                // An equipment or craft occupant goes back to the swap source or nowhere.
                (SlotAddress::Equipment(_) | SlotAddress::Craft, Some(source)) => next.rehome_at(&displaced, source),
                _ => {
                    let exclusions: Vec<GridRect> = footprint.into_iter().collect();
                    next.rehome(&displaced, source.or(origin), &exclusions)
                }
            }
            .ok_or(PlacementError::NoSpace { instance_id: displaced.instance_id })?;
            log::info!(
                "[PlaceAt Swap] Item {} moved from {} to {} to make room for item {}.",
                displaced.instance_id, target, landed, item.instance_id
            );
        }
        next.bind(item, target)?;
        Ok(next)
    }

    // --- Commit ---

    pub(crate) fn state(&self) -> &InventoryState {
        &self.state
    }

    /// Replaces the state and publishes one batch of events describing the change.
    pub(crate) fn commit(&mut self, next: InventoryState) {
        let events = self.apply(next);
        self.notifier.emit(events);
    }

    /// Replaces the state and returns the events it owes, without publishing them.
    pub(crate) fn apply(&mut self, next: InventoryState) -> Vec<InventoryEvent> {
        if next == self.state {
            return Vec::new();
        }
        let mut events = Vec::new();
        for slot in EquipmentSlotType::ALL {
            let before = &self.state.equipment[slot.index()];
            let after = &next.equipment[slot.index()];
            if same_slot(before, after) {
                continue;
            }
            if let Some(old) = before {
                events.push(InventoryEvent::ItemUnequipped(Rc::clone(old)));
            }
            if let Some(new) = after {
                events.push(InventoryEvent::ItemEquipped(Rc::clone(new)));
            }
        }
        events.push(InventoryEvent::InventoryChanged);
        self.state = next;
        events
    }
}

// --- ItemContainer Trait Implementation ---

impl ItemContainer for PlayerInventory {
    fn container_type(&self) -> ContainerType {
        ContainerType::PlayerInventory
    }

    fn contains(&self, item: &ItemRef) -> bool {
        PlayerInventory::contains(self, item)
    }

    fn try_add_anywhere(&mut self, item: &ItemRef) -> PlacementResult<ItemLocation> {
        self.try_add_item(item).map(ItemLocation::Inventory)
    }

    fn remove_item(&mut self, item: &ItemRef) -> bool {
        let mut next = self.state.clone();
        let Some(location) = next.detach(item) else {
            return false;
        };
        log::info!("[RemoveItem] Item {} removed from {}.", item.instance_id, location);
        self.commit(next);
        true
    }

    fn item_count(&self) -> usize {
        PlayerInventory::item_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::InventoryItem;
    use std::cell::RefCell;

    fn inventory() -> PlayerInventory {
        PlayerInventory::new(&InventoryConfig::default()).unwrap()
    }

    fn item(id: u64, width: u32, height: u32) -> ItemRef {
        InventoryItem::new(id, format!("item-{}", id), width, height).into_ref()
    }

    fn gear(id: u64, width: u32, height: u32, slot: EquipmentSlotType) -> ItemRef {
        InventoryItem::new(id, format!("gear-{}", id), width, height).with_slot_type(slot).into_ref()
    }

    fn record(inv: &PlayerInventory) -> (Rc<RefCell<Vec<String>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = inv.subscribe(move |event| {
            let text = match event {
                InventoryEvent::InventoryChanged => "changed".to_string(),
                InventoryEvent::ItemEquipped(item) => format!("equipped:{}", item.instance_id),
                InventoryEvent::ItemUnequipped(item) => format!("unequipped:{}", item.instance_id),
                InventoryEvent::StashChanged => "stash".to_string(),
            };
            sink.borrow_mut().push(text);
        });
        (log, sub)
    }

    #[test]
    fn wide_item_resolves_to_its_anchor() {
        let mut inv = inventory();
        let axe = item(1, 2, 1);
        inv.place_at(&axe, SlotAddress::Backpack(0), None).unwrap();
        let (found, anchor) = inv.get_item_at(SlotAddress::Backpack(1)).unwrap();
        assert!(same_item(&found, &axe));
        assert_eq!(anchor, SlotAddress::Backpack(0));
    }

    #[test]
    fn out_of_range_backpack_address_is_invalid() {
        let mut inv = inventory();
        let ring = item(1, 1, 1);
        let err = inv.place_at(&ring, SlotAddress::Backpack(40), None).unwrap_err();
        assert!(err.is_invalid_target());
        assert!(!inv.can_place_at(&ring, SlotAddress::Backpack(40)));
        assert!(inv.get_item_at(SlotAddress::Backpack(40)).is_none());
    }

    #[test]
    fn singleton_slots_accept_at_address_level() {
        let inv = inventory();
        let ring = item(1, 1, 1);
        assert!(inv.can_place_at(&ring, SlotAddress::Craft));
        assert!(inv.can_place_at(&ring, SlotAddress::Equipment(EquipmentSlotType::Head)));
    }

    #[test]
    fn equipping_checks_the_slot_type() {
        let mut inv = inventory();
        let helm = gear(1, 2, 2, EquipmentSlotType::Head);
        let err = inv.place_at(&helm, SlotAddress::Equipment(EquipmentSlotType::Chest), None).unwrap_err();
        assert_eq!(err, PlacementError::SlotTypeMismatch { instance_id: 1, slot: EquipmentSlotType::Chest });
        inv.place_at(&helm, SlotAddress::Equipment(EquipmentSlotType::Head), None).unwrap();
        assert!(same_item(inv.equipped(EquipmentSlotType::Head).unwrap(), &helm));
    }

    #[test]
    fn swap_two_single_cell_items() {
        let mut inv = inventory();
        let a = item(1, 1, 1);
        let b = item(2, 1, 1);
        inv.place_at(&a, SlotAddress::Backpack(3), None).unwrap();
        inv.place_at(&b, SlotAddress::Backpack(8), None).unwrap();
        inv.try_move_or_swap(SlotAddress::Backpack(3), SlotAddress::Backpack(8)).unwrap();
        assert!(same_item(&inv.get_item_at(SlotAddress::Backpack(8)).unwrap().0, &a));
        assert!(same_item(&inv.get_item_at(SlotAddress::Backpack(3)).unwrap().0, &b));
    }

    #[test]
    fn placing_over_two_items_is_ambiguous() {
        let mut inv = inventory();
        let a = item(1, 1, 1);
        let b = item(2, 1, 1);
        let slab = item(3, 2, 1);
        inv.place_at(&a, SlotAddress::Backpack(0), None).unwrap();
        inv.place_at(&b, SlotAddress::Backpack(1), None).unwrap();
        let before = inv.state().clone();
        let err = inv.place_at(&slab, SlotAddress::Backpack(0), None).unwrap_err();
        assert_eq!(err, PlacementError::Ambiguous { count: 2 });
        assert_eq!(*inv.state(), before);
    }

    #[test]
    fn displaced_item_avoids_the_incoming_footprint() {
        let mut inv = inventory();
        let ring = item(1, 1, 1);
        let staff = item(2, 3, 1);
        inv.place_at(&ring, SlotAddress::Backpack(1), None).unwrap();
        // Held staff with no origin: the ring must leave cells 0..=2.
        inv.place_at(&staff, SlotAddress::Backpack(0), None).unwrap();
        assert_eq!(inv.location_of(&staff), Some(SlotAddress::Backpack(0)));
        assert_eq!(inv.location_of(&ring), Some(SlotAddress::Backpack(3)));
    }

    #[test]
    fn moving_onto_own_cell_is_a_no_op() {
        let mut inv = inventory();
        let axe = item(1, 2, 1);
        inv.place_at(&axe, SlotAddress::Backpack(4), None).unwrap();
        let (log, _sub) = record(&inv);
        inv.try_move_or_swap(SlotAddress::Backpack(4), SlotAddress::Backpack(5)).unwrap();
        inv.try_move_or_swap(SlotAddress::Backpack(4), SlotAddress::Backpack(4)).unwrap();
        assert_eq!(inv.location_of(&axe), Some(SlotAddress::Backpack(4)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn moving_from_an_empty_cell_fails() {
        let mut inv = inventory();
        let err = inv.try_move_or_swap(SlotAddress::Backpack(0), SlotAddress::Backpack(1)).unwrap_err();
        assert!(matches!(err, PlacementError::EmptySource(_)));
    }

    #[test]
    fn take_from_slot_detaches_without_displacement() {
        let mut inv = inventory();
        let helm = gear(1, 2, 2, EquipmentSlotType::Head);
        inv.place_at(&helm, SlotAddress::Equipment(EquipmentSlotType::Head), None).unwrap();
        let (log, _sub) = record(&inv);
        let taken = inv.take_from_slot(SlotAddress::Equipment(EquipmentSlotType::Head)).unwrap();
        assert!(same_item(&taken, &helm));
        assert!(inv.is_empty());
        assert_eq!(*log.borrow(), vec!["unequipped:1".to_string(), "changed".to_string()]);
        assert!(inv.take_from_slot(SlotAddress::Craft).is_none());
    }

    #[test]
    fn equip_swap_fires_each_event_once_after_commit() {
        let mut inv = inventory();
        let old_blade = gear(1, 1, 3, EquipmentSlotType::Weapon);
        let new_blade = gear(2, 1, 3, EquipmentSlotType::Weapon);
        inv.place_at(&old_blade, SlotAddress::Equipment(EquipmentSlotType::Weapon), None).unwrap();
        inv.place_at(&new_blade, SlotAddress::Backpack(0), None).unwrap();
        let (log, _sub) = record(&inv);
        inv.try_move_or_swap(SlotAddress::Backpack(0), SlotAddress::Equipment(EquipmentSlotType::Weapon))
            .unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["unequipped:1".to_string(), "equipped:2".to_string(), "changed".to_string()]
        );
        assert_eq!(inv.location_of(&old_blade), Some(SlotAddress::Backpack(0)));
    }

    #[test]
    fn unequip_onto_matching_occupant_swaps_them() {
        let mut inv = inventory();
        let worn = gear(1, 2, 2, EquipmentSlotType::Chest);
        let spare = gear(2, 2, 2, EquipmentSlotType::Chest);
        inv.place_at(&worn, SlotAddress::Equipment(EquipmentSlotType::Chest), None).unwrap();
        inv.place_at(&spare, SlotAddress::Backpack(0), None).unwrap();
        inv.try_move_or_swap(SlotAddress::Equipment(EquipmentSlotType::Chest), SlotAddress::Backpack(0))
            .unwrap();
        assert!(same_item(inv.equipped(EquipmentSlotType::Chest).unwrap(), &spare));
        assert_eq!(inv.location_of(&worn), Some(SlotAddress::Backpack(0)));
    }

    #[test]
    fn unequip_onto_incompatible_occupant_bumps_it_inside_the_backpack() {
        let mut inv = inventory();
        let worn = gear(1, 1, 1, EquipmentSlotType::Feet);
        let rock = item(2, 1, 1);
        inv.place_at(&worn, SlotAddress::Equipment(EquipmentSlotType::Feet), None).unwrap();
        inv.place_at(&rock, SlotAddress::Backpack(0), None).unwrap();
        inv.try_move_or_swap(SlotAddress::Equipment(EquipmentSlotType::Feet), SlotAddress::Backpack(0))
            .unwrap();
        assert!(inv.equipped(EquipmentSlotType::Feet).is_none());
        assert_eq!(inv.location_of(&worn), Some(SlotAddress::Backpack(0)));
        assert_eq!(inv.location_of(&rock), Some(SlotAddress::Backpack(1)));
    }

    #[test]
    fn craft_slot_swaps_with_its_occupant() {
        let mut inv = inventory();
        let ore = item(1, 1, 1);
        let gem = item(2, 1, 1);
        inv.place_at(&ore, SlotAddress::Craft, None).unwrap();
        inv.place_at(&gem, SlotAddress::Backpack(12), None).unwrap();
        inv.try_move_or_swap(SlotAddress::Backpack(12), SlotAddress::Craft).unwrap();
        assert!(same_item(inv.craft_item().unwrap(), &gem));
        assert_eq!(inv.location_of(&ore), Some(SlotAddress::Backpack(12)));
    }

    #[test]
    fn restoring_to_the_source_anchor_is_a_plain_placement() {
        let mut inv = inventory();
        let bow = item(1, 2, 3);
        inv.place_at(&bow, SlotAddress::Backpack(2), None).unwrap();
        let held = inv.take_from_slot(SlotAddress::Backpack(2)).unwrap();
        inv.place_at(&held, SlotAddress::Backpack(2), Some(SlotAddress::Backpack(2))).unwrap();
        assert_eq!(inv.location_of(&bow), Some(SlotAddress::Backpack(2)));
    }

    #[test]
    fn try_add_item_uses_the_first_free_anchor() {
        let mut inv = inventory();
        let first = item(1, 2, 2);
        let second = item(2, 2, 2);
        assert_eq!(inv.try_add_item(&first), Ok(SlotAddress::Backpack(0)));
        assert_eq!(inv.try_add_item(&second), Ok(SlotAddress::Backpack(2)));
        assert_eq!(inv.try_add_item(&first), Ok(SlotAddress::Backpack(0)));
    }

    #[test]
    fn bumped_craft_item_only_returns_to_the_source_anchor() {
        let mut inv = inventory();
        let anvil = item(1, 2, 2);
        let catalyst = item(2, 1, 1);
        inv.place_at(&anvil, SlotAddress::Craft, None).unwrap();
        inv.place_at(&catalyst, SlotAddress::Backpack(39), None).unwrap();
        let held = inv.take_from_slot(SlotAddress::Backpack(39)).unwrap();
        let before = inv.state().clone();
        // Anchor 39 is the bottom-right cell; the rest of the backpack is empty.
        let err = inv.place_at(&held, SlotAddress::Craft, Some(SlotAddress::Backpack(39))).unwrap_err();
        assert_eq!(err, PlacementError::NoSpace { instance_id: 1 });
        assert!(same_item(inv.craft_item().unwrap(), &anvil));
        assert_eq!(*inv.state(), before);
    }

    #[test]
    fn bumped_weapon_only_returns_to_the_vacated_anchor() {
        let mut inv = inventory();
        let spear = gear(1, 1, 2, EquipmentSlotType::Weapon);
        let dagger = gear(2, 1, 1, EquipmentSlotType::Weapon);
        inv.place_at(&spear, SlotAddress::Equipment(EquipmentSlotType::Weapon), None).unwrap();
        inv.place_at(&dagger, SlotAddress::Backpack(35), None).unwrap();
        let err = inv
            .try_move_or_swap(SlotAddress::Backpack(35), SlotAddress::Equipment(EquipmentSlotType::Weapon))
            .unwrap_err();
        assert_eq!(err, PlacementError::NoSpace { instance_id: 1 });
        assert!(same_item(inv.equipped(EquipmentSlotType::Weapon).unwrap(), &spear));
        assert_eq!(inv.location_of(&dagger), Some(SlotAddress::Backpack(35)));
    }

    #[test]
    fn bumped_craft_item_without_a_source_scans_the_backpack() {
        let mut inv = inventory();
        let anvil = item(1, 2, 2);
        let catalyst = item(2, 1, 1);
        inv.place_at(&anvil, SlotAddress::Craft, None).unwrap();
        inv.place_at(&catalyst, SlotAddress::Craft, None).unwrap();
        assert!(same_item(inv.craft_item().unwrap(), &catalyst));
        assert_eq!(inv.location_of(&anvil), Some(SlotAddress::Backpack(0)));
    }

    #[test]
    fn listener_can_call_back_into_the_inventory_after_flush() {
        let notifier = ChangeNotifier::deferred();
        let handle = Rc::new(RefCell::new(
            PlayerInventory::with_notifier(&InventoryConfig::default(), notifier.clone()).unwrap(),
        ));
        let refill = item(2, 1, 1);
        let results = Rc::new(RefCell::new(Vec::new()));
        let weak = Rc::downgrade(&handle);
        let sink = Rc::clone(&results);
        let queued = RefCell::new(Some(Rc::clone(&refill)));
        let _sub = notifier.subscribe(move |event| {
            if !matches!(event, InventoryEvent::InventoryChanged) {
                return;
            }
            let Some(next) = queued.borrow_mut().take() else {
                return;
            };
            if let Some(inv) = weak.upgrade() {
                sink.borrow_mut().push(inv.borrow_mut().try_add_item(&next));
            }
        });

        let ring = item(1, 1, 1);
        handle.borrow_mut().place_at(&ring, SlotAddress::Backpack(0), None).unwrap();
        assert!(results.borrow().is_empty());
        assert_eq!(notifier.pending_count(), 1);

        notifier.flush();
        assert_eq!(*results.borrow(), vec![Ok(SlotAddress::Backpack(1))]);
        assert!(handle.borrow().contains(&refill));
        assert_eq!(notifier.pending_count(), 0);
    }

    #[test]
    fn backpack_too_large_for_the_address_space_is_rejected() {
        let config = InventoryConfig {
            backpack: crate::config::GridDims::new(50, 21),
            ..InventoryConfig::default()
        };
        assert!(matches!(PlayerInventory::new(&config), Err(ConfigError::Invalid(_))));
        let empty = InventoryConfig { backpack: crate::config::GridDims::new(0, 4), ..InventoryConfig::default() };
        assert!(PlayerInventory::new(&empty).is_err());
    }
}
