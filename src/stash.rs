/******************************************************************************
 *                                                                            *
 * Multi-tab stash. Every tab is an independent grid of the same dimensions;  *
 * items are addressed by (tab, index) and may be swapped or bumped across    *
 * tabs. Like the player inventory, each operation is planned on a staged     *
 * copy and committed in one assignment before listeners are told.            *
 *                                                                            *
 ******************************************************************************/

use std::rc::Rc;

use log;

use crate::config::{GridDims, InventoryConfig};
use crate::displacement::{find_displacement_in_tabs, TabExclusion};
use crate::errors::{ConfigError, PlacementError, PlacementResult};
use crate::events::{ChangeNotifier, InventoryEvent, Subscription};
use crate::item_grid::{GridRect, ItemGrid};
use crate::items::{same_item, ItemRef};
use crate::inventory_management::ItemContainer;
use crate::models::{ContainerType, ItemLocation, StashAddress};

// --- Stash State ---

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StashState {
    pub(crate) tabs: Vec<ItemGrid>,
    pub(crate) current_tab: usize,
}

impl StashState {
    pub(crate) fn validate(&self, address: StashAddress) -> PlacementResult<&ItemGrid> {
        let grid = self.tabs.get(address.tab).ok_or(PlacementError::NoSuchTab(address.tab))?;
        if address.index >= grid.len() {
            return Err(PlacementError::StashOutOfRange(address));
        }
        Ok(grid)
    }

    pub(crate) fn get_item_at(&self, address: StashAddress) -> Option<(ItemRef, StashAddress)> {
        let grid = self.validate(address).ok()?;
        grid.get_item_at(address.index)
            .map(|(item, anchor)| (item, StashAddress::new(address.tab, anchor)))
    }

    pub(crate) fn location_of(&self, item: &ItemRef) -> Option<StashAddress> {
        self.tabs
            .iter()
            .enumerate()
            .find_map(|(tab, grid)| grid.anchor_of(item).map(|anchor| StashAddress::new(tab, anchor)))
    }

    pub(crate) fn detach(&mut self, item: &ItemRef) -> Option<StashAddress> {
        let location = self.location_of(item)?;
        self.tabs[location.tab].remove(item);
        Some(location)
    }

    /// Makes room for `item` at `to`: returns the footprint and, when exactly
    /// one other item was in the way, that item (already lifted out of the grid).
    pub(crate) fn clear_footprint(
        &mut self,
        item: &ItemRef,
        to: StashAddress,
    ) -> PlacementResult<(GridRect, Option<ItemRef>)> {
        self.validate(to)?;
        let grid = &mut self.tabs[to.tab];
        let footprint = match grid.check_place(item, to.index) {
            Ok(rect) => return Ok((rect, None)),
            Err(PlacementError::Occupied { .. }) => grid
                .rect_at(item, to.index)
                .ok_or(PlacementError::StashOutOfRange(to))?,
            Err(e) => return Err(e),
        };
        let occupants = grid.unique_items_in_area(footprint);
        let [displaced] = occupants.as_slice() else {
            return Err(PlacementError::Ambiguous { count: occupants.len() });
        };
        let displaced = Rc::clone(displaced);
        grid.remove(&displaced);
        Ok((footprint, Some(displaced)))
    }

    /// Finds the bumped item a free spot in any tab and writes it there.
    pub(crate) fn rehome(
        &mut self,
        displaced: &ItemRef,
        preferred: Option<StashAddress>,
        exclusions: &[TabExclusion],
    ) -> Option<StashAddress> {
        let landing = find_displacement_in_tabs(&self.tabs, displaced, preferred, exclusions)?;
        self.tabs[landing.tab].place(displaced, landing.index).ok()?;
        Some(landing)
    }

    /// First free anchor, trying `preferred_tab` before the others.
    pub(crate) fn first_free(&self, item: &ItemRef, preferred_tab: usize) -> Option<StashAddress> {
        let others = (0..self.tabs.len()).filter(|&tab| tab != preferred_tab);
        std::iter::once(preferred_tab)
            .filter(|&tab| tab < self.tabs.len())
            .chain(others)
            .find_map(|tab| {
                self.tabs[tab]
                    .find_first_empty_root(item, None)
                    .map(|index| StashAddress::new(tab, index))
            })
    }
}

// --- Stash ---

#[derive(Debug)]
pub struct Stash {
    state: StashState,
    tab_dims: GridDims,
    notifier: ChangeNotifier,
}

impl Stash {
    pub fn new(config: &InventoryConfig) -> Result<Self, ConfigError> {
        Self::with_notifier(config, ChangeNotifier::new())
    }

    pub fn with_notifier(config: &InventoryConfig, notifier: ChangeNotifier) -> Result<Self, ConfigError> {
        config.validate()?;
        let tab_count = config.initial_stash_tabs.max(1);
        Ok(Stash {
            state: StashState { tabs: vec![ItemGrid::new(config.stash_tab); tab_count], current_tab: 0 },
            tab_dims: config.stash_tab,
            notifier,
        })
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn subscribe(&self, listener: impl FnMut(&InventoryEvent) + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    pub fn tab_count(&self) -> usize {
        self.state.tabs.len()
    }

    pub fn tab(&self, index: usize) -> Option<&ItemGrid> {
        self.state.tabs.get(index)
    }

    pub fn tab_dims(&self) -> GridDims {
        self.tab_dims
    }

    pub fn current_tab(&self) -> usize {
        self.state.current_tab
    }

    pub fn is_tab_empty(&self, index: usize) -> bool {
        self.state.tabs.get(index).map_or(false, ItemGrid::is_empty)
    }

    pub fn is_empty(&self) -> bool {
        self.state.tabs.iter().all(ItemGrid::is_empty)
    }

    /// Number of distinct items over all tabs.
    pub fn item_count(&self) -> usize {
        self.state.tabs.iter().map(ItemGrid::item_count).sum()
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.state.location_of(item).is_some()
    }

    pub fn location_of(&self, item: &ItemRef) -> Option<StashAddress> {
        self.state.location_of(item)
    }

    /// Every item with its anchor address, tab by tab.
    pub fn items(&self) -> Vec<(StashAddress, ItemRef)> {
        self.state
            .tabs
            .iter()
            .enumerate()
            .flat_map(|(tab, grid)| {
                grid.items().into_iter().map(move |(index, item)| (StashAddress::new(tab, index), item))
            })
            .collect()
    }

    // --- Tabs ---

    /// Appends an empty tab and returns its index.
    pub fn add_tab(&mut self) -> usize {
        let mut next = self.state.clone();
        next.tabs.push(ItemGrid::new(self.tab_dims));
        let index = next.tabs.len() - 1;
        log::info!("[Stash] Added tab {}.", index);
        self.commit(next);
        index
    }

    /// Removes an empty tab. The last remaining tab can never be removed.
    pub fn try_remove_tab(&mut self, index: usize) -> PlacementResult<()> {
        let grid = self.state.tabs.get(index).ok_or(PlacementError::NoSuchTab(index))?;
        if !grid.is_empty() {
            log::warn!("[Stash] Refusing to remove tab {}: it still holds items.", index);
            return Err(PlacementError::TabNotEmpty(index));
        }
        if self.state.tabs.len() <= 1 {
            return Err(PlacementError::LastTab);
        }
        let mut next = self.state.clone();
        next.tabs.remove(index);
        if index < next.current_tab {
            next.current_tab -= 1;
        }
        next.current_tab = next.current_tab.min(next.tabs.len() - 1);
        log::info!("[Stash] Removed tab {}. Current tab is now {}.", index, next.current_tab);
        self.commit(next);
        Ok(())
    }

    pub fn set_current_tab(&mut self, index: usize) -> PlacementResult<()> {
        if index >= self.state.tabs.len() {
            return Err(PlacementError::NoSuchTab(index));
        }
        let mut next = self.state.clone();
        next.current_tab = index;
        self.commit(next);
        Ok(())
    }

    // --- Placement ---

    pub fn validate_address(&self, address: StashAddress) -> PlacementResult<()> {
        self.state.validate(address).map(|_| ())
    }

    pub fn can_place_in_stash(&self, item: &ItemRef, to: StashAddress) -> bool {
        self.state.validate(to).map_or(false, |grid| grid.can_place(item, to.index))
    }

    pub fn get_item_at(&self, address: StashAddress) -> Option<(ItemRef, StashAddress)> {
        self.state.get_item_at(address)
    }

    pub fn take_item_from_stash(&mut self, address: StashAddress) -> Option<ItemRef> {
        self.state.validate(address).ok()?;
        let mut next = self.state.clone();
        let taken = next.tabs[address.tab].take(address.index)?;
        log::info!("[Stash] Took item {} from {}.", taken.instance_id, address);
        self.commit(next);
        Some(taken)
    }

    /// Adds `item` at the first free anchor of `preferred_tab`, falling back
    /// to the other tabs in index order.
    pub fn try_add_preferring_tab(&mut self, item: &ItemRef, preferred_tab: usize) -> PlacementResult<StashAddress> {
        if let Some(existing) = self.state.location_of(item) {
            return Ok(existing);
        }
        let landing = self
            .state
            .first_free(item, preferred_tab)
            .ok_or(PlacementError::NoSpace { instance_id: item.instance_id })?;
        let mut next = self.state.clone();
        next.tabs[landing.tab].place(item, landing.index)?;
        log::info!("[Stash] Item {} added at {} (preferred tab {}).", item.instance_id, landing, preferred_tab);
        self.commit(next);
        Ok(landing)
    }

    /// Places `item` at `to`, bumping a single occupant to `swap_source`
    /// (or the item's current stash location) or any free spot in any tab.
    pub fn place_in_stash(
        &mut self,
        item: &ItemRef,
        to: StashAddress,
        swap_source: Option<StashAddress>,
    ) -> PlacementResult<()> {
        match self.plan_place(item, to, swap_source) {
            Ok(next) => {
                log::info!("[Stash] Item {} placed at {}.", item.instance_id, to);
                self.commit(next);
                Ok(())
            }
            Err(e) => {
                log::debug!("[Stash] Refused to place item {} at {}: {}", item.instance_id, to, e);
                Err(e)
            }
        }
    }

    pub fn try_move_or_swap(&mut self, from: StashAddress, to: StashAddress) -> PlacementResult<()> {
        if from == to {
            return Ok(());
        }
        self.state.validate(from)?;
        self.state.validate(to)?;
        let (item, from_anchor) = self
            .state
            .get_item_at(from)
            .ok_or_else(|| PlacementError::EmptySource(from.to_string()))?;
        if let Some((occupant, _)) = self.state.get_item_at(to) {
            if same_item(&occupant, &item) {
                return Ok(());
            }
        }
        self.place_in_stash(&item, to, Some(from_anchor))
    }

    fn plan_place(
        &self,
        item: &ItemRef,
        to: StashAddress,
        swap_source: Option<StashAddress>,
    ) -> PlacementResult<StashState> {
        self.state.validate(to)?;
        let mut next = self.state.clone();
        let origin = next.detach(item);
        let (footprint, displaced) = next.clear_footprint(item, to)?;
        if let Some(displaced) = displaced {
            let exclusion = TabExclusion { tab: to.tab, rect: footprint };
            let landed = next
                .rehome(&displaced, swap_source.or(origin), &[exclusion])
                .ok_or(PlacementError::NoSpace { instance_id: displaced.instance_id })?;
            log::info!(
                "[Stash Swap] Item {} bumped from {} to {} by item {}.",
                displaced.instance_id, to, landed, item.instance_id
            );
        }
        next.tabs[to.tab].place(item, to.index)?;
        Ok(next)
    }

    // --- Commit ---

    pub(crate) fn state(&self) -> &StashState {
        &self.state
    }

    pub(crate) fn commit(&mut self, next: StashState) {
        let events = self.apply(next);
        self.notifier.emit(events);
    }

    /// Replaces the state and returns the events it owes, without publishing them.
    pub(crate) fn apply(&mut self, next: StashState) -> Vec<InventoryEvent> {
        if next == self.state {
            return Vec::new();
        }
        self.state = next;
        vec![InventoryEvent::StashChanged]
    }
}

// --- ItemContainer Trait Implementation ---

impl ItemContainer for Stash {
    fn container_type(&self) -> ContainerType {
        ContainerType::Stash
    }

    fn contains(&self, item: &ItemRef) -> bool {
        Stash::contains(self, item)
    }

    fn try_add_anywhere(&mut self, item: &ItemRef) -> PlacementResult<ItemLocation> {
        let preferred_tab = self.state.current_tab;
        self.try_add_preferring_tab(item, preferred_tab).map(ItemLocation::Stash)
    }

    fn remove_item(&mut self, item: &ItemRef) -> bool {
        let mut next = self.state.clone();
        let Some(location) = next.detach(item) else {
            return false;
        };
        log::info!("[Stash] Item {} removed from {}.", item.instance_id, location);
        self.commit(next);
        true
    }

    fn item_count(&self) -> usize {
        Stash::item_count(self)
    }
}
