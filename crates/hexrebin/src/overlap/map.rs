use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::tessellation::GridSpec;

const OVERLAP_SCHEMA_V1: &str = "hexrebin.overlap.v1";

/// `fraction` of `pixel_id`'s hexagon area lies inside `cell_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEntry {
    pub cell_id: usize,
    pub pixel_id: usize,
    pub fraction: f64,
}

/// Pixel-indexed view element: one cell touched by a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellWeight {
    pub cell_id: usize,
    pub fraction: f64,
}

/// Cell-indexed view element: one pixel touching a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelWeight {
    pub pixel_id: usize,
    pub fraction: f64,
}

/// Sparse hexagon-to-cell overlap table for one `(geometry, cell size)`.
///
/// Indexed both ways: [`OverlapMap::cells_for_pixel`] lists a pixel's cells
/// in ascending cell id; [`OverlapMap::pixels_for_cell`] lists a cell's
/// pixels in pixel enumeration order (the geometry table order).
///
/// Per pixel the fractions sum to at most 1. Mass lost to the tolerance
/// cut or to the outer tessellation boundary is dropped, never redistributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OverlapMapRecord", into = "OverlapMapRecord")]
pub struct OverlapMap {
    grid: GridSpec,
    epsilon: f64,
    pixel_order: Vec<usize>,
    by_pixel: Vec<Vec<CellWeight>>,
    by_cell: Vec<Vec<PixelWeight>>,
    n_entries: usize,
}

/// Diagnostic summary of an overlap map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSummary {
    pub grid_width: usize,
    pub grid_height: usize,
    pub cell_size: f64,
    pub n_cells: usize,
    pub n_pixels: usize,
    /// Pixels with at least one recorded overlap.
    pub n_referenced_pixels: usize,
    pub n_entries: usize,
    /// Cells touched by at least one pixel.
    pub n_occupied_cells: usize,
    /// Smallest per-pixel fraction sum over referenced pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_retained_mass: Option<f64>,
    /// Mean per-pixel fraction sum over referenced pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_retained_mass: Option<f64>,
}

impl OverlapMap {
    /// Assemble from per-pixel overlap lists.
    ///
    /// `per_pixel[i]` belongs to pixel `pixel_order[i]` and must be sorted by
    /// cell id. Callers guarantee ids are in range.
    pub(crate) fn assemble(
        grid: GridSpec,
        epsilon: f64,
        pixel_order: Vec<usize>,
        per_pixel: Vec<Vec<CellWeight>>,
    ) -> Self {
        let n_pixels = pixel_order.len();
        let mut by_pixel = vec![Vec::new(); n_pixels];
        let mut by_cell = vec![Vec::new(); grid.n_cells()];
        let mut n_entries = 0;

        for (&pixel_id, weights) in pixel_order.iter().zip(per_pixel) {
            for w in &weights {
                by_cell[w.cell_id].push(PixelWeight {
                    pixel_id,
                    fraction: w.fraction,
                });
            }
            n_entries += weights.len();
            by_pixel[pixel_id] = weights;
        }

        Self {
            grid,
            epsilon,
            pixel_order,
            by_pixel,
            by_cell,
            n_entries,
        }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Tolerance below which overlap fractions were dropped.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn n_pixels(&self) -> usize {
        self.pixel_order.len()
    }

    pub fn n_cells(&self) -> usize {
        self.grid.n_cells()
    }

    pub fn n_entries(&self) -> usize {
        self.n_entries
    }

    /// Pixel ids in enumeration order.
    pub fn pixel_order(&self) -> &[usize] {
        &self.pixel_order
    }

    /// Cells overlapped by `pixel_id`; empty for unknown ids.
    pub fn cells_for_pixel(&self, pixel_id: usize) -> &[CellWeight] {
        self.by_pixel.get(pixel_id).map_or(&[], Vec::as_slice)
    }

    /// Pixels overlapping `cell_id`; empty for unknown ids.
    pub fn pixels_for_cell(&self, cell_id: usize) -> &[PixelWeight] {
        self.by_cell.get(cell_id).map_or(&[], Vec::as_slice)
    }

    /// `(row, col)` of a cell.
    pub fn cell_position(&self, cell_id: usize) -> (usize, usize) {
        self.grid.position(cell_id)
    }

    /// Cell -> `(row, col)` table indexed by cell id.
    pub fn coordinate_table(&self) -> Vec<(usize, usize)> {
        self.grid.coordinate_table()
    }

    /// Whether `pixel_id` has at least one recorded overlap.
    pub fn is_referenced(&self, pixel_id: usize) -> bool {
        !self.cells_for_pixel(pixel_id).is_empty()
    }

    /// Referenced pixel ids in ascending order.
    pub fn referenced_pixels(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_pixel
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.is_empty())
            .map(|(id, _)| id)
    }

    /// Sum of a pixel's recorded fractions.
    pub fn retained_mass(&self, pixel_id: usize) -> f64 {
        self.cells_for_pixel(pixel_id)
            .iter()
            .map(|w| w.fraction)
            .sum()
    }

    /// Entries in canonical order: pixel enumeration order, then cell id.
    pub fn entries(&self) -> impl Iterator<Item = OverlapEntry> + '_ {
        self.pixel_order.iter().flat_map(move |&pixel_id| {
            self.by_pixel[pixel_id].iter().map(move |w| OverlapEntry {
                cell_id: w.cell_id,
                pixel_id,
                fraction: w.fraction,
            })
        })
    }

    /// `(height, width)` of tensors produced from this map.
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.grid.height, self.grid.width)
    }

    pub fn summary(&self) -> MapSummary {
        let masses: Vec<f64> = self
            .referenced_pixels()
            .map(|id| self.retained_mass(id))
            .collect();
        let min_retained_mass = masses.iter().copied().reduce(f64::min);
        let mean_retained_mass = if masses.is_empty() {
            None
        } else {
            Some(masses.iter().sum::<f64>() / masses.len() as f64)
        };

        MapSummary {
            grid_width: self.grid.width,
            grid_height: self.grid.height,
            cell_size: self.grid.cell_size,
            n_cells: self.n_cells(),
            n_pixels: self.n_pixels(),
            n_referenced_pixels: masses.len(),
            n_entries: self.n_entries,
            n_occupied_cells: self.by_cell.iter().filter(|c| !c.is_empty()).count(),
            min_retained_mass,
            mean_retained_mass,
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate a persisted map.
    ///
    /// Malformed JSON is [`StoreError::Json`]; well-formed JSON that fails
    /// validation is [`StoreError::Corrupt`].
    pub fn from_json_str(data: &str) -> Result<Self, StoreError> {
        let record: OverlapMapRecord = serde_json::from_str(data)?;
        Self::try_from(record).map_err(StoreError::Corrupt)
    }
}

/// Persisted form: flat `[cell_id, pixel_id, fraction]` triples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct OverlapMapRecord {
    schema: String,
    grid: GridSpec,
    n_pixels: usize,
    epsilon: f64,
    pixel_order: Vec<usize>,
    entries: Vec<(usize, usize, f64)>,
}

impl From<OverlapMap> for OverlapMapRecord {
    fn from(map: OverlapMap) -> Self {
        let entries = map
            .entries()
            .map(|e| (e.cell_id, e.pixel_id, e.fraction))
            .collect();
        Self {
            schema: OVERLAP_SCHEMA_V1.to_string(),
            grid: map.grid,
            n_pixels: map.pixel_order.len(),
            epsilon: map.epsilon,
            pixel_order: map.pixel_order,
            entries,
        }
    }
}

impl TryFrom<OverlapMapRecord> for OverlapMap {
    type Error = String;

    fn try_from(rec: OverlapMapRecord) -> Result<Self, Self::Error> {
        if rec.schema != OVERLAP_SCHEMA_V1 {
            return Err(format!(
                "unsupported overlap schema '{}' (expected '{}')",
                rec.schema, OVERLAP_SCHEMA_V1
            ));
        }

        let derived =
            GridSpec::new(rec.grid.extent, rec.grid.cell_size).map_err(|e| e.to_string())?;
        if derived != rec.grid {
            return Err(format!(
                "grid {}x{} does not match extent {} and cell size {}",
                rec.grid.width, rec.grid.height, rec.grid.extent, rec.grid.cell_size
            ));
        }
        if !rec.epsilon.is_finite() || rec.epsilon < 0.0 {
            return Err(format!("invalid epsilon {}", rec.epsilon));
        }

        let n_pixels = rec.n_pixels;
        if rec.pixel_order.len() != n_pixels {
            return Err(format!(
                "pixel order lists {} pixels, expected {n_pixels}",
                rec.pixel_order.len()
            ));
        }
        let mut slot = vec![usize::MAX; n_pixels];
        for (pos, &id) in rec.pixel_order.iter().enumerate() {
            if id >= n_pixels || slot[id] != usize::MAX {
                return Err(format!("pixel order is not a permutation (id {id})"));
            }
            slot[id] = pos;
        }

        let n_cells = derived.n_cells();
        let mut per_pixel: Vec<Vec<CellWeight>> = vec![Vec::new(); n_pixels];
        let mut seen = HashSet::with_capacity(rec.entries.len());
        for &(cell_id, pixel_id, fraction) in &rec.entries {
            if cell_id >= n_cells {
                return Err(format!("cell id {cell_id} outside grid of {n_cells} cells"));
            }
            if pixel_id >= n_pixels {
                return Err(format!("pixel id {pixel_id} outside [0, {n_pixels})"));
            }
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(format!(
                    "fraction {fraction} for cell {cell_id} / pixel {pixel_id} outside (0, 1]"
                ));
            }
            if !seen.insert((cell_id, pixel_id)) {
                return Err(format!("duplicate entry for cell {cell_id} / pixel {pixel_id}"));
            }
            per_pixel[slot[pixel_id]].push(CellWeight { cell_id, fraction });
        }
        for weights in &mut per_pixel {
            weights.sort_by_key(|w| w.cell_id);
        }

        Ok(Self::assemble(derived, rec.epsilon, rec.pixel_order, per_pixel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> OverlapMap {
        let grid = GridSpec::new(1.0, 1.0).expect("valid");
        // pixel 1 enumerated first, pixel 2 touches nothing
        let per_pixel = vec![
            vec![
                CellWeight {
                    cell_id: 0,
                    fraction: 0.5,
                },
                CellWeight {
                    cell_id: 3,
                    fraction: 0.25,
                },
            ],
            vec![CellWeight {
                cell_id: 3,
                fraction: 0.75,
            }],
            Vec::new(),
        ];
        OverlapMap::assemble(grid, 1e-8, vec![1, 0, 2], per_pixel)
    }

    #[test]
    fn both_views_agree() {
        let map = small_map();
        assert_eq!(map.n_entries(), 3);
        assert_eq!(map.cells_for_pixel(1).len(), 2);
        assert_eq!(
            map.cells_for_pixel(0),
            &[CellWeight {
                cell_id: 3,
                fraction: 0.75
            }]
        );
        let cell3: Vec<usize> = map.pixels_for_cell(3).iter().map(|w| w.pixel_id).collect();
        assert_eq!(cell3, vec![1, 0]);
        assert!(map.pixels_for_cell(1).is_empty());
        assert!(map.pixels_for_cell(99).is_empty());
    }

    #[test]
    fn referenced_pixels_skip_empty() {
        let map = small_map();
        let ids: Vec<usize> = map.referenced_pixels().collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(!map.is_referenced(2));
        assert!((map.retained_mass(1) - 0.75).abs() < 1e-15);
    }

    #[test]
    fn summary_reports_mass() {
        let s = small_map().summary();
        assert_eq!(s.n_cells, 4);
        assert_eq!(s.n_pixels, 3);
        assert_eq!(s.n_referenced_pixels, 2);
        assert_eq!(s.n_occupied_cells, 2);
        assert_eq!(s.min_retained_mass, Some(0.75));
        assert_eq!(s.mean_retained_mass, Some(0.75));
    }

    #[test]
    fn json_round_trip_is_identical() {
        let map = small_map();
        let json = map.to_json_string().expect("serialize");
        let back = OverlapMap::from_json_str(&json).expect("parse");
        assert_eq!(map, back);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let raw = r#"{"schema":"hexrebin.overlap.v1",
            "grid":{"extent":1.0,"cell_size":1.0,"width":2,"height":2},
            "n_pixels":1,"epsilon":1e-8,"pixel_order":[0],"entries":[[0,0,1.5]]}"#;
        let err = OverlapMap::from_json_str(raw).expect_err("fraction");
        assert!(matches!(&err, StoreError::Corrupt(msg) if msg.contains("outside (0, 1]")));
    }

    #[test]
    fn rejects_oversized_grid_without_allocating() {
        let raw = r#"{"schema":"hexrebin.overlap.v1",
            "grid":{"extent":3.0,"cell_size":1e-10,"width":60000000000,"height":60000000000},
            "n_pixels":1,"epsilon":1e-8,"pixel_order":[0],"entries":[]}"#;
        let err = OverlapMap::from_json_str(raw).expect_err("grid");
        assert!(matches!(&err, StoreError::Corrupt(msg) if msg.contains("cells per side")));
    }

    #[test]
    fn malformed_json_is_not_corrupt_map() {
        let err = OverlapMap::from_json_str("{not json").expect_err("syntax");
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn rejects_inconsistent_grid() {
        let raw = r#"{"schema":"hexrebin.overlap.v1",
            "grid":{"extent":1.0,"cell_size":1.0,"width":3,"height":3},
            "n_pixels":1,"epsilon":1e-8,"pixel_order":[0],"entries":[]}"#;
        assert!(OverlapMap::from_json_str(raw).is_err());
    }

    #[test]
    fn rejects_duplicate_entries() {
        let raw = r#"{"schema":"hexrebin.overlap.v1",
            "grid":{"extent":1.0,"cell_size":1.0,"width":2,"height":2},
            "n_pixels":1,"epsilon":1e-8,"pixel_order":[0],"entries":[[0,0,0.5],[0,0,0.25]]}"#;
        assert!(OverlapMap::from_json_str(raw).is_err());
    }
}
