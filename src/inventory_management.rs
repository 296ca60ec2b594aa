/******************************************************************************
 *                                                                            *
 * Moves items between the player inventory and the stash. Both containers    *
 * are staged together: the item is detached from exactly one source, placed  *
 * at the destination (bumping at most one occupant into whichever container  *
 * it fits), and both containers commit only when every step succeeded. Drag  *
 * sessions that cannot complete put the item back where it came from or, as  *
 * a last resort, anywhere it fits.                                           *
 *                                                                            *
 ******************************************************************************/

use log;

use crate::displacement::TabExclusion;
use crate::errors::{PlacementError, PlacementResult};
use crate::item_grid::GridRect;
use crate::items::{same_item, ItemRef};
use crate::models::{ContainerType, ItemLocation, SlotAddress, StashAddress};
use crate::player_inventory::{InventoryState, PlayerInventory};
use crate::stash::{Stash, StashState};

// --- Generic Item Container Trait ---

/// Common surface of the inventory and the stash, used where the caller does
/// not care which container ends up holding an item.
pub trait ItemContainer {
    fn container_type(&self) -> ContainerType;

    fn contains(&self, item: &ItemRef) -> bool;

    /// Puts the item at the first place that fits and reports where.
    fn try_add_anywhere(&mut self, item: &ItemRef) -> PlacementResult<ItemLocation>;

    /// Detaches the item wherever it is. Returns false if it was not here.
    fn remove_item(&mut self, item: &ItemRef) -> bool;

    /// Number of distinct items held.
    fn item_count(&self) -> usize;
}

/// Checks if a container holds no items at all.
pub fn is_container_empty<C: ItemContainer + ?Sized>(container: &C) -> bool {
    container.item_count() == 0
}

// --- Held Item ---

/// An item picked up by a drag. The item belongs to no container until it is
/// dropped, cancelled or recovered.
#[derive(Clone, Debug)]
#[must_use = "a held item is lost unless it is dropped or cancelled"]
pub struct HeldItem {
    item: ItemRef,
    origin: Option<ItemLocation>,
}

impl HeldItem {
    /// Wraps an item that did not come from either container (e.g. a pickup).
    pub fn new(item: ItemRef) -> Self {
        HeldItem { item, origin: None }
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    pub fn origin(&self) -> Option<ItemLocation> {
        self.origin
    }
}

// --- Transfer Coordinator ---

/// Borrows both containers for the duration of one or more transfers.
pub struct Transfer<'a> {
    inventory: &'a mut PlayerInventory,
    stash: &'a mut Stash,
}

impl<'a> Transfer<'a> {
    pub fn new(inventory: &'a mut PlayerInventory, stash: &'a mut Stash) -> Self {
        Transfer { inventory, stash }
    }

    pub fn inventory(&self) -> &PlayerInventory {
        &*self.inventory
    }

    pub fn stash(&self) -> &Stash {
        &*self.stash
    }

    pub fn location_of(&self, item: &ItemRef) -> Option<ItemLocation> {
        self.inventory
            .location_of(item)
            .map(ItemLocation::Inventory)
            .or_else(|| self.stash.location_of(item).map(ItemLocation::Stash))
    }

    /// Occupant of `location` with its anchor.
    pub fn get_item_at(&self, location: ItemLocation) -> Option<(ItemRef, ItemLocation)> {
        match location {
            ItemLocation::Inventory(address) => self
                .inventory
                .get_item_at(address)
                .map(|(item, anchor)| (item, ItemLocation::Inventory(anchor))),
            ItemLocation::Stash(address) => self
                .stash
                .get_item_at(address)
                .map(|(item, anchor)| (item, ItemLocation::Stash(anchor))),
        }
    }

    fn validate(&self, location: ItemLocation) -> PlacementResult<()> {
        match location {
            ItemLocation::Inventory(address) => self.inventory.validate_address(address),
            ItemLocation::Stash(address) => self.stash.validate_address(address),
        }
    }

    // --- Moves ---

    /// Moves whatever occupies `from` to `to` in either container, swapping
    /// with a single occupant at the destination.
    pub fn move_item(&mut self, from: ItemLocation, to: ItemLocation) -> PlacementResult<()> {
        if from == to {
            return Ok(());
        }
        self.validate(from)?;
        self.validate(to)?;
        let (item, from_anchor) = self
            .get_item_at(from)
            .ok_or_else(|| PlacementError::EmptySource(from.to_string()))?;
        if let Some((occupant, _)) = self.get_item_at(to) {
            if same_item(&occupant, &item) {
                log::debug!("[Transfer] Item {} already occupies {}. No action.", item.instance_id, to);
                return Ok(());
            }
        }
        self.place(&item, to, Some(from_anchor))
    }

    pub fn inventory_to_stash(&mut self, from: SlotAddress, to: StashAddress) -> PlacementResult<()> {
        self.move_item(ItemLocation::Inventory(from), ItemLocation::Stash(to))
    }

    pub fn stash_to_inventory(&mut self, from: StashAddress, to: SlotAddress) -> PlacementResult<()> {
        self.move_item(ItemLocation::Stash(from), ItemLocation::Inventory(to))
    }

    pub fn stash_to_stash(&mut self, from: StashAddress, to: StashAddress) -> PlacementResult<()> {
        self.move_item(ItemLocation::Stash(from), ItemLocation::Stash(to))
    }

    /// Places `item` in the stash. A bumped stash item prefers `swap_source`,
    /// which may be an inventory address when the incoming item came from the
    /// backpack; it falls back to any free stash spot.
    pub fn place_in_stash(
        &mut self,
        item: &ItemRef,
        to: StashAddress,
        swap_source: Option<ItemLocation>,
    ) -> PlacementResult<()> {
        self.place(item, ItemLocation::Stash(to), swap_source)
    }

    pub fn place_in_inventory(
        &mut self,
        item: &ItemRef,
        to: SlotAddress,
        swap_source: Option<ItemLocation>,
    ) -> PlacementResult<()> {
        self.place(item, ItemLocation::Inventory(to), swap_source)
    }

    /// Places `item` at `to`, detaching it from wherever it currently is.
    /// Nothing is committed unless the whole move, including the bumped
    /// occupant's new home, succeeds.
    pub fn place(
        &mut self,
        item: &ItemRef,
        to: ItemLocation,
        swap_source: Option<ItemLocation>,
    ) -> PlacementResult<()> {
        self.validate(to)?;
        let mut inventory = self.inventory.state().clone();
        let mut stash = self.stash.state().clone();
        let origin = inventory
            .detach(item)
            .map(ItemLocation::Inventory)
            .or_else(|| stash.detach(item).map(ItemLocation::Stash));

        if swap_source == Some(to) {
            bind(&mut inventory, &mut stash, item, to)?;
            self.commit(inventory, stash);
            return Ok(());
        }

        let (footprint, displaced) = match to {
            ItemLocation::Inventory(address) => inventory.clear_target(item, address)?,
            ItemLocation::Stash(address) => {
                let (rect, displaced) = stash.clear_footprint(item, address)?;
                (Some(rect), displaced)
            }
        };
        if let Some(displaced) = displaced {
            let landed = match (to, swap_source) {
                // An equipment or craft occupant goes back to the swap source or nowhere.
                (ItemLocation::Inventory(SlotAddress::Equipment(_) | SlotAddress::Craft), Some(source)) => {
                    bind(&mut inventory, &mut stash, &displaced, source).ok().map(|()| source)
                }
                _ => {
                    let mut inventory_exclusions = Vec::new();
                    let mut stash_exclusions = Vec::new();
                    match (to, footprint) {
                        (ItemLocation::Inventory(_), Some(rect)) => inventory_exclusions.push(rect),
                        (ItemLocation::Stash(address), Some(rect)) => {
                            stash_exclusions.push(TabExclusion { tab: address.tab, rect })
                        }
                        _ => {}
                    }
                    rehome_across(
                        &mut inventory,
                        &mut stash,
                        &displaced,
                        to.container_type(),
                        swap_source.or(origin),
                        &inventory_exclusions,
                        &stash_exclusions,
                    )
                }
            }
            .ok_or(PlacementError::NoSpace { instance_id: displaced.instance_id })?;
            log::info!(
                "[Transfer Swap] Item {} bumped from {} to {} by item {}.",
                displaced.instance_id, to, landed, item.instance_id
            );
        }
        bind(&mut inventory, &mut stash, item, to)?;
        log::info!(
            "[Transfer] Item {} moved from {} to {}.",
            item.instance_id,
            origin.map_or_else(|| "hand".to_string(), |location| location.to_string()),
            to
        );
        self.commit(inventory, stash);
        Ok(())
    }

    // --- Quick Transfer ---

    /// Shortcut move of an inventory item into the stash, current tab first.
    pub fn quick_transfer_to_stash(&mut self, from: SlotAddress) -> PlacementResult<StashAddress> {
        self.inventory.validate_address(from)?;
        let (item, _) = self
            .inventory
            .get_item_at(from)
            .ok_or_else(|| PlacementError::EmptySource(from.to_string()))?;
        let landing = self
            .stash
            .state()
            .first_free(&item, self.stash.current_tab())
            .ok_or(PlacementError::NoSpace { instance_id: item.instance_id })?;
        let mut inventory = self.inventory.state().clone();
        let mut stash = self.stash.state().clone();
        inventory.detach(&item);
        stash.tabs[landing.tab].place(&item, landing.index)?;
        log::info!("[QuickTransfer] Item {} sent from {} to {}.", item.instance_id, from, landing);
        self.commit(inventory, stash);
        Ok(landing)
    }

    /// Shortcut move of a stash item into the first free backpack anchor.
    pub fn quick_transfer_to_inventory(&mut self, from: StashAddress) -> PlacementResult<SlotAddress> {
        self.stash.validate_address(from)?;
        let (item, _) = self
            .stash
            .get_item_at(from)
            .ok_or_else(|| PlacementError::EmptySource(from.to_string()))?;
        let anchor = self
            .inventory
            .backpack()
            .find_first_empty_root(&item, None)
            .ok_or(PlacementError::NoSpace { instance_id: item.instance_id })?;
        let mut inventory = self.inventory.state().clone();
        let mut stash = self.stash.state().clone();
        stash.detach(&item);
        inventory.backpack.place(&item, anchor)?;
        log::info!("[QuickTransfer] Item {} sent from {} to backpack anchor {}.", item.instance_id, from, anchor);
        self.commit(inventory, stash);
        Ok(SlotAddress::Backpack(anchor))
    }

    // --- Drag Session ---

    /// Lifts the item at `from` out of its container.
    pub fn begin_drag(&mut self, from: ItemLocation) -> PlacementResult<HeldItem> {
        self.validate(from)?;
        let (item, anchor) = self
            .get_item_at(from)
            .ok_or_else(|| PlacementError::EmptySource(from.to_string()))?;
        let taken = match anchor {
            ItemLocation::Inventory(address) => self.inventory.take_from_slot(address),
            ItemLocation::Stash(address) => self.stash.take_item_from_stash(address),
        };
        if taken.is_none() {
            return Err(PlacementError::EmptySource(from.to_string()));
        }
        log::debug!("[Drag] Picked up item {} from {}.", item.instance_id, anchor);
        Ok(HeldItem { item, origin: Some(anchor) })
    }

    /// Drops the held item at `to`. On rejection the item goes back to its
    /// origin (or through recovery) and the placement error is returned; if
    /// even recovery fails the recovery error is returned instead.
    pub fn drop_held(&mut self, held: HeldItem, to: ItemLocation) -> PlacementResult<()> {
        let error = match self.place(&held.item, to, held.origin) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        log::debug!("[Drag] Drop of item {} at {} rejected: {}", held.item.instance_id, to, error);
        self.cancel_drag(held)?;
        Err(error)
    }

    /// Returns the held item to its origin, falling back to recovery.
    pub fn cancel_drag(&mut self, held: HeldItem) -> PlacementResult<ItemLocation> {
        if let Some(origin) = held.origin {
            match self.place(&held.item, origin, Some(origin)) {
                Ok(()) => {
                    log::debug!("[Drag] Item {} returned to {}.", held.item.instance_id, origin);
                    return Ok(origin);
                }
                Err(e) => {
                    log::warn!("[Drag] Item {} cannot return to {}: {}", held.item.instance_id, origin, e);
                }
            }
        }
        self.recover(&held.item)
    }

    /// Last resort for an item that belongs nowhere: backpack first, then the
    /// stash. Reaching this path at all is logged as an anomaly.
    pub fn recover(&mut self, item: &ItemRef) -> PlacementResult<ItemLocation> {
        log::warn!("[Recovery] Recovering orphaned item {} ({}).", item.instance_id, item.name);
        let containers: [&mut dyn ItemContainer; 2] = [&mut *self.inventory, &mut *self.stash];
        for container in containers {
            match container.try_add_anywhere(item) {
                Ok(location) => {
                    log::warn!("[Recovery] Item {} recovered into {}.", item.instance_id, location);
                    return Ok(location);
                }
                Err(e) => {
                    log::debug!("[Recovery] {:?} refused item {}: {}", container.container_type(), item.instance_id, e);
                }
            }
        }
        log::error!("[Recovery] Item {} could not be placed in any container.", item.instance_id);
        Err(PlacementError::NoSpace { instance_id: item.instance_id })
    }

    /// Assigns both staged states before either container publishes.
    fn commit(&mut self, inventory: InventoryState, stash: StashState) {
        let inventory_events = self.inventory.apply(inventory);
        let stash_events = self.stash.apply(stash);
        self.inventory.notifier().emit(inventory_events);
        self.stash.notifier().emit(stash_events);
    }
}

// --- Staging Helpers ---

fn bind(
    inventory: &mut InventoryState,
    stash: &mut StashState,
    item: &ItemRef,
    to: ItemLocation,
) -> PlacementResult<()> {
    match to {
        ItemLocation::Inventory(address) => inventory.bind(item, address),
        ItemLocation::Stash(address) => {
            stash.validate(address)?;
            stash.tabs[address.tab].place(item, address.index)
        }
    }
}

fn rehome_in(
    container: ContainerType,
    inventory: &mut InventoryState,
    stash: &mut StashState,
    displaced: &ItemRef,
    preferred: Option<ItemLocation>,
    inventory_exclusions: &[GridRect],
    stash_exclusions: &[TabExclusion],
) -> Option<ItemLocation> {
    match container {
        ContainerType::PlayerInventory => {
            let preferred = match preferred {
                Some(ItemLocation::Inventory(address)) => Some(address),
                _ => None,
            };
            inventory.rehome(displaced, preferred, inventory_exclusions).map(ItemLocation::Inventory)
        }
        ContainerType::Stash => {
            let preferred = match preferred {
                Some(ItemLocation::Stash(address)) => Some(address),
                _ => None,
            };
            stash.rehome(displaced, preferred, stash_exclusions).map(ItemLocation::Stash)
        }
    }
}

/// Homes a bumped item. The container of `preferred` is tried first; when
/// that is not the container the item was bumped from, its home container is
/// the fallback.
fn rehome_across(
    inventory: &mut InventoryState,
    stash: &mut StashState,
    displaced: &ItemRef,
    home: ContainerType,
    preferred: Option<ItemLocation>,
    inventory_exclusions: &[GridRect],
    stash_exclusions: &[TabExclusion],
) -> Option<ItemLocation> {
    let first = preferred.map_or(home, |location| location.container_type());
    if let Some(landed) =
        rehome_in(first, inventory, stash, displaced, preferred, inventory_exclusions, stash_exclusions)
    {
        return Some(landed);
    }
    if first == home {
        return None;
    }
    rehome_in(home, inventory, stash, displaced, None, inventory_exclusions, stash_exclusions)
}
