/*
 * src/item_grid.rs
 *
 * Purpose: Fixed-size occupancy grid used by the backpack and by every stash tab.
 * Each cell holds an optional item handle; a multi-cell item writes the same
 * handle into every cell of its width x height rectangle.
 *
 * Invariants:
 *   - The cells holding one item form an in-bounds rectangle whose top-left
 *     cell (the anchor) is found by walking left, then up.
 *   - Two distinct items never share a cell. Every write is checked first.
 *   - Oversized items are clamped to the grid instead of rejected.
 */

use std::rc::Rc;

use log;

use crate::config::GridDims;
use crate::errors::{PlacementError, PlacementResult};
use crate::items::{push_unique, same_item, same_slot, ItemRef};

/// Axis-aligned rectangle of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridRect {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

impl GridRect {
    pub fn new(col: usize, row: usize, width: usize, height: usize) -> Self {
        GridRect { col, row, width, height }
    }

    pub fn intersects(&self, other: &GridRect) -> bool {
        self.col < other.col + other.width
            && other.col < self.col + self.width
            && self.row < other.row + other.height
            && other.row < self.row + self.height
    }
}

// The occupancy grid
#[derive(Clone, Debug)]
pub struct ItemGrid {
    cols: usize,
    rows: usize,
    cells: Vec<Option<ItemRef>>,
}

impl ItemGrid {
    pub fn new(dims: GridDims) -> Self {
        let cols = dims.cols.max(1);
        let rows = dims.rows.max(1);
        ItemGrid { cols, rows, cells: vec![None; cols * rows] }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    pub fn index_of(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    pub fn cell_of(&self, index: usize) -> (usize, usize) {
        (index % self.cols, index / self.cols)
    }

    /// Item dimensions clamped to `[1, grid_dim]`.
    pub fn footprint(&self, item: &ItemRef) -> (usize, usize) {
        let width = (item.width as usize).clamp(1, self.cols);
        let height = (item.height as usize).clamp(1, self.rows);
        (width, height)
    }

    /// Rectangle the item would cover if anchored at `anchor`. May extend past
    /// the grid edge; `None` only if the anchor itself is not a cell.
    pub fn rect_at(&self, item: &ItemRef, anchor: usize) -> Option<GridRect> {
        if anchor >= self.cells.len() {
            return None;
        }
        let (col, row) = self.cell_of(anchor);
        let (width, height) = self.footprint(item);
        Some(GridRect::new(col, row, width, height))
    }

    fn in_bounds(&self, rect: &GridRect) -> bool {
        rect.col + rect.width <= self.cols && rect.row + rect.height <= self.rows
    }

    fn cells_in(&self, rect: GridRect) -> impl Iterator<Item = usize> + '_ {
        let row_end = (rect.row + rect.height).min(self.rows);
        let col_end = (rect.col + rect.width).min(self.cols);
        (rect.row..row_end).flat_map(move |row| (rect.col..col_end).map(move |col| row * self.cols + col))
    }

    /// Raw cell content.
    pub fn get(&self, index: usize) -> Option<&ItemRef> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    /// Occupant of `index` and its anchor.
    pub fn get_item_at(&self, index: usize) -> Option<(ItemRef, usize)> {
        let item = self.get(index)?;
        let (mut col, mut row) = self.cell_of(index);
        while col > 0 && self.holds(self.index_of(col - 1, row), item) {
            col -= 1;
        }
        while row > 0 && self.holds(self.index_of(col, row - 1), item) {
            row -= 1;
        }
        Some((Rc::clone(item), self.index_of(col, row)))
    }

    fn holds(&self, index: usize, item: &ItemRef) -> bool {
        self.get(index).map_or(false, |occupant| same_item(occupant, item))
    }

    /// Validates a placement without touching the grid.
    pub fn check_place(&self, item: &ItemRef, anchor: usize) -> PlacementResult<GridRect> {
        let rect = self
            .rect_at(item, anchor)
            .filter(|rect| self.in_bounds(rect))
            .ok_or(PlacementError::OutOfBounds { instance_id: item.instance_id, anchor })?;
        for index in self.cells_in(rect) {
            if let Some(occupant) = &self.cells[index] {
                if !same_item(occupant, item) {
                    return Err(PlacementError::Occupied { occupant: occupant.instance_id });
                }
            }
        }
        Ok(rect)
    }

    pub fn can_place(&self, item: &ItemRef, anchor: usize) -> bool {
        self.check_place(item, anchor).is_ok()
    }

    /// Places (or moves) `item` so that its anchor is `anchor`.
    /// On error the grid is left exactly as it was.
    pub fn place(&mut self, item: &ItemRef, anchor: usize) -> PlacementResult<()> {
        let rect = self.check_place(item, anchor)?;
        if item.width as usize > self.cols || item.height as usize > self.rows || item.width == 0 || item.height == 0 {
            log::warn!(
                "[ItemGrid] Item {} is {}x{}, clamped to {}x{} to fit a {}x{} grid.",
                item.instance_id, item.width, item.height, rect.width, rect.height, self.cols, self.rows
            );
        }
        self.remove(item);
        for index in self.cells_in(rect).collect::<Vec<_>>() {
            self.cells[index] = Some(Rc::clone(item));
        }
        log::debug!("[ItemGrid] Placed item {} at anchor {}.", item.instance_id, anchor);
        Ok(())
    }

    /// Clears every cell holding `item`. Returns whether anything was cleared.
    pub fn remove(&mut self, item: &ItemRef) -> bool {
        let mut removed = false;
        for cell in self.cells.iter_mut() {
            if cell.as_ref().map_or(false, |occupant| same_item(occupant, item)) {
                *cell = None;
                removed = true;
            }
        }
        removed
    }

    /// Removes and returns the occupant of `anchor` (any covered cell works).
    pub fn take(&mut self, anchor: usize) -> Option<ItemRef> {
        let (item, _) = self.get_item_at(anchor)?;
        self.remove(&item);
        Some(item)
    }

    /// Distinct occupants overlapping `rect`, in row-major discovery order.
    /// Parts of the rectangle outside the grid are ignored.
    pub fn unique_items_in_area(&self, rect: GridRect) -> Vec<ItemRef> {
        let mut found = Vec::new();
        for index in self.cells_in(rect) {
            if let Some(occupant) = &self.cells[index] {
                push_unique(&mut found, occupant);
            }
        }
        found
    }

    /// Every legal top-left position for the item, row-major.
    pub fn candidate_anchors(&self, item: &ItemRef) -> impl Iterator<Item = usize> + '_ {
        let (width, height) = self.footprint(item);
        let cols = self.cols;
        (0..=self.rows - height).flat_map(move |row| (0..=cols - width).map(move |col| row * cols + col))
    }

    /// First anchor (row-major) where the item can be placed, skipping `exclude_anchor`.
    pub fn find_first_empty_root(&self, item: &ItemRef, exclude_anchor: Option<usize>) -> Option<usize> {
        self.candidate_anchors(item)
            .filter(|&anchor| Some(anchor) != exclude_anchor)
            .find(|&anchor| self.can_place(item, anchor))
    }

    /// Anchor of `item` if it is in this grid.
    pub fn anchor_of(&self, item: &ItemRef) -> Option<usize> {
        // Row-major order meets the top-left cell first.
        self.cells.iter().position(|cell| cell.as_ref().map_or(false, |occupant| same_item(occupant, item)))
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.anchor_of(item).is_some()
    }

    /// Distinct items with their anchors, ordered by anchor.
    pub fn items(&self) -> Vec<(usize, ItemRef)> {
        let mut seen: Vec<ItemRef> = Vec::new();
        let mut out = Vec::new();
        for (index, cell) in self.cells.iter().enumerate() {
            if let Some(item) = cell {
                if !seen.iter().any(|known| same_item(known, item)) {
                    seen.push(Rc::clone(item));
                    out.push((index, Rc::clone(item)));
                }
            }
        }
        out
    }

    pub fn item_count(&self) -> usize {
        self.items().len()
    }
}

impl PartialEq for ItemGrid {
    fn eq(&self, other: &Self) -> bool {
        self.cols == other.cols
            && self.rows == other.rows
            && self.cells.iter().zip(other.cells.iter()).all(|(a, b)| same_slot(a, b))
    }
}
