/******************************************************************************
 *                                                                            *
 * Finds a new home for an item that is being bumped out of its cells by an   *
 * incoming item. Exclusion rectangles mark placements that are planned but   *
 * not yet written, so the bumped item never lands where the incoming item    *
 * is about to go. The resolver only reads; callers commit the result.        *
 *                                                                            *
 ******************************************************************************/

use log;

use crate::item_grid::{GridRect, ItemGrid};
use crate::items::ItemRef;
use crate::models::StashAddress;

/// A planned-but-uncommitted placement inside one stash tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TabExclusion {
    pub tab: usize,
    pub rect: GridRect,
}

fn is_candidate(grid: &ItemGrid, item: &ItemRef, anchor: usize, exclusions: &[GridRect]) -> bool {
    if !grid.can_place(item, anchor) {
        return false;
    }
    match grid.rect_at(item, anchor) {
        Some(rect) => !exclusions.iter().any(|excluded| excluded.intersects(&rect)),
        None => false,
    }
}

/// Preferred anchor first, then a row-major scan of every legal anchor.
pub fn find_displacement_anchor(
    grid: &ItemGrid,
    item: &ItemRef,
    preferred: Option<usize>,
    exclusions: &[GridRect],
) -> Option<usize> {
    if let Some(anchor) = preferred {
        if is_candidate(grid, item, anchor, exclusions) {
            log::debug!("[Displacement] Item {} fits at preferred anchor {}.", item.instance_id, anchor);
            return Some(anchor);
        }
        log::debug!("[Displacement] Preferred anchor {} rejected for item {}. Scanning.", anchor, item.instance_id);
    }
    let found = grid
        .candidate_anchors(item)
        .find(|&anchor| is_candidate(grid, item, anchor, exclusions));
    if found.is_none() {
        log::debug!("[Displacement] No anchor left for item {}.", item.instance_id);
    }
    found
}

/// Stash variant: preferred address first, then every tab in index order.
/// Exclusions only apply inside the tab they name.
pub fn find_displacement_in_tabs(
    tabs: &[ItemGrid],
    item: &ItemRef,
    preferred: Option<StashAddress>,
    exclusions: &[TabExclusion],
) -> Option<StashAddress> {
    let rects_for = |tab: usize| -> Vec<GridRect> {
        exclusions.iter().filter(|ex| ex.tab == tab).map(|ex| ex.rect).collect()
    };

    if let Some(address) = preferred {
        if let Some(grid) = tabs.get(address.tab) {
            if is_candidate(grid, item, address.index, &rects_for(address.tab)) {
                return Some(address);
            }
        }
    }
    for (tab, grid) in tabs.iter().enumerate() {
        let rects = rects_for(tab);
        if let Some(index) = grid.candidate_anchors(item).find(|&anchor| is_candidate(grid, item, anchor, &rects)) {
            return Some(StashAddress::new(tab, index));
        }
    }
    log::debug!("[Displacement] No stash tab has room for item {}.", item.instance_id);
    None
}
