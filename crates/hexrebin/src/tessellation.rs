//! Square tessellation of the sensor bounding region.
//!
//! Cells tile `[-extent, extent]^2` starting at the top-left corner
//! `(-extent, extent)`. Cell ids are row-major: row 0 is the top row, col 0
//! the leftmost column, `id = row * width + col`. When `2 * extent` is not a
//! multiple of the cell size the last row/column extends past the bound.

use crate::error::ConfigError;
use crate::geometry::Rect;

/// Grid layout derived from `(extent, cell_size)`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GridSpec {
    /// Bounding half-width of the tessellated square.
    pub extent: f64,
    /// Side length of one square cell.
    pub cell_size: f64,
    /// Cells per row.
    pub width: usize,
    /// Cells per column.
    pub height: usize,
}

/// One square cell of the tessellation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub id: usize,
    pub row: usize,
    pub col: usize,
    pub rect: Rect,
}

/// Largest number of cells per grid side.
///
/// Caps a grid at 4096 x 4096 cells; smaller cell sizes are rejected
/// instead of allocating (or scanning) an unbounded grid.
pub const MAX_GRID_SIDE: usize = 4096;

impl GridSpec {
    /// Derive the grid for a positive extent and cell size.
    pub fn new(extent: f64, cell_size: f64) -> Result<Self, ConfigError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize(cell_size));
        }
        // Extent is validated with the geometry; NaN falls back to one cell.
        let steps = (2.0 * extent / cell_size).ceil().max(1.0);
        if steps > MAX_GRID_SIDE as f64 {
            return Err(ConfigError::GridTooLarge {
                cells_per_side: steps,
                max: MAX_GRID_SIDE,
            });
        }
        let steps = steps as usize;
        Ok(Self {
            extent,
            cell_size,
            width: steps,
            height: steps,
        })
    }

    pub fn n_cells(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// `(row, col)` of a cell id.
    pub fn position(&self, cell_id: usize) -> (usize, usize) {
        (cell_id / self.width, cell_id % self.width)
    }

    pub fn cell_id(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// Square covered by `(row, col)`.
    pub fn cell_rect(&self, row: usize, col: usize) -> Rect {
        let left = -self.extent + col as f64 * self.cell_size;
        let top = self.extent - row as f64 * self.cell_size;
        Rect::square_from_top_left([left, top], self.cell_size)
    }

    pub fn cell(&self, cell_id: usize) -> GridCell {
        let (row, col) = self.position(cell_id);
        GridCell {
            id: cell_id,
            row,
            col,
            rect: self.cell_rect(row, col),
        }
    }

    /// All cells in id order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.n_cells()).map(|id| self.cell(id))
    }

    /// Cell -> `(row, col)` table indexed by cell id.
    pub fn coordinate_table(&self) -> Vec<(usize, usize)> {
        (0..self.n_cells()).map(|id| self.position(id)).collect()
    }

    /// Inclusive `(rows, cols)` index ranges of cells whose closed squares can
    /// touch `bounds`, or `None` when `bounds` misses the grid entirely.
    pub fn covering_range(&self, bounds: &Rect) -> Option<([usize; 2], [usize; 2])> {
        let s = self.cell_size;
        let col_lo = ((bounds.min[0] + self.extent) / s).floor();
        let col_hi = ((bounds.max[0] + self.extent) / s).floor();
        let row_lo = ((self.extent - bounds.max[1]) / s).floor();
        let row_hi = ((self.extent - bounds.min[1]) / s).floor();

        let clamp = |lo: f64, hi: f64, n: usize| -> Option<[usize; 2]> {
            let last = n as f64 - 1.0;
            // One extra cell on each side absorbs rounding at shared edges;
            // extra candidates only contribute zero-area overlaps.
            let lo = (lo - 1.0).max(0.0);
            let hi = (hi + 1.0).min(last);
            if lo > hi || !lo.is_finite() || !hi.is_finite() {
                return None;
            }
            Some([lo as usize, hi as usize])
        };

        let cols = clamp(col_lo, col_hi, self.width)?;
        let rows = clamp(row_lo, row_hi, self.height)?;
        Some((rows, cols))
    }
}
