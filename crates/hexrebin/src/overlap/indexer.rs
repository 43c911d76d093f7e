use std::time::Instant;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{ConfigError, RebinError};
use crate::geometry::Polygon;
use crate::sensor_layout::{SensorGeometry, SensorPixel};
use crate::tessellation::GridSpec;

use super::map::{CellWeight, OverlapMap};

/// Fractions at or below this are treated as zero.
pub const DEFAULT_OVERLAP_EPSILON: f64 = 1e-8;

/// Computes hexagon/square overlap fractions for a sensor geometry.
///
/// Build once per `(geometry, cell_size)` and reuse the resulting
/// [`OverlapMap`] for every event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryIndexer {
    epsilon: f64,
}

impl Default for GeometryIndexer {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_OVERLAP_EPSILON,
        }
    }
}

impl GeometryIndexer {
    pub fn new(epsilon: f64) -> Result<Self, ConfigError> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ConfigError::InvalidEpsilon(epsilon));
        }
        Ok(Self { epsilon })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Build the overlap map of `geometry` against a grid of `cell_size` squares.
    ///
    /// Each pixel is only tested against the cells its bounding box can
    /// touch; every other pair has zero overlap. Fractions are normalised by
    /// the hexagon area and clamped to 1.
    pub fn build(
        &self,
        geometry: &SensorGeometry,
        cell_size: f64,
    ) -> Result<OverlapMap, RebinError> {
        let grid = GridSpec::new(geometry.extent(), cell_size)?;
        let t0 = Instant::now();

        let compute = |pixel: &SensorPixel| self.pixel_overlaps(&geometry.hexagon(pixel), &grid);
        #[cfg(feature = "rayon")]
        let per_pixel: Vec<Vec<CellWeight>> = geometry.pixels().par_iter().map(compute).collect();
        #[cfg(not(feature = "rayon"))]
        let per_pixel: Vec<Vec<CellWeight>> = geometry.pixels().iter().map(compute).collect();

        let order = geometry.pixels().iter().map(|p| p.id).collect();
        let map = OverlapMap::assemble(grid, self.epsilon, order, per_pixel);

        let summary = map.summary();
        tracing::info!(
            "overlap map: {}x{} cells of {}, {} entries, {}/{} pixels referenced",
            grid.width,
            grid.height,
            grid.cell_size,
            summary.n_entries,
            summary.n_referenced_pixels,
            summary.n_pixels,
        );
        tracing::debug!(
            geometry = geometry.version(),
            elapsed_ms = t0.elapsed().as_secs_f64() * 1e3,
            "overlap map built"
        );
        let dropped = summary.n_pixels - summary.n_referenced_pixels;
        if dropped > 0 {
            tracing::warn!("{dropped} pixels lie entirely outside the tessellation");
        }

        Ok(map)
    }

    /// Cells overlapped by one hexagon, ascending by cell id.
    fn pixel_overlaps(&self, hexagon: &Polygon, grid: &GridSpec) -> Vec<CellWeight> {
        let Some(bounds) = hexagon.bounds() else {
            return Vec::new();
        };
        let Some((rows, cols)) = grid.covering_range(&bounds) else {
            return Vec::new();
        };
        let hex_area = hexagon.area();
        if hex_area <= 0.0 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for row in rows[0]..=rows[1] {
            for col in cols[0]..=cols[1] {
                let rect = grid.cell_rect(row, col);
                let fraction = (hexagon.intersection_area(&rect) / hex_area).min(1.0);
                if fraction > self.epsilon {
                    out.push(CellWeight {
                        cell_id: grid.cell_id(row, col),
                        fraction,
                    });
                }
            }
        }
        out
    }
}

/// Build with the default tolerance.
pub fn build(geometry: &SensorGeometry, cell_size: f64) -> Result<OverlapMap, RebinError> {
    GeometryIndexer::default().build(geometry, cell_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{reference_patch, single_pixel_geometry};

    const EPS: f64 = 1e-9;

    #[test]
    fn centered_pixel_splits_into_four_quarters() {
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let map = build(&geometry, 1.0).expect("build");
        assert_eq!(map.grid_shape(), (6, 6));

        let cells = map.cells_for_pixel(0);
        assert_eq!(cells.len(), 4);
        for w in cells {
            assert!((w.fraction - 0.25).abs() < EPS, "fraction {}", w.fraction);
            let (row, col) = map.cell_position(w.cell_id);
            assert!((2..=3).contains(&row) && (2..=3).contains(&col));
        }
        assert!((map.retained_mass(0) - 1.0).abs() < EPS);
    }

    #[test]
    fn pixel_inside_one_cell_has_exact_unit_fraction() {
        let geometry = single_pixel_geometry([5.0, 5.0], 1.0, 20.0);
        let map = build(&geometry, 10.0).expect("build");
        assert_eq!(map.cells_for_pixel(0).len(), 1);
        assert_eq!(map.cells_for_pixel(0)[0].fraction, 1.0);
        let (row, col) = map.cell_position(map.cells_for_pixel(0)[0].cell_id);
        assert_eq!((row, col), (1, 2));
    }

    #[test]
    fn fractions_per_pixel_never_exceed_one() {
        let geometry = reference_patch(3);
        for cell_size in [1.0, 2.5, 5.0, 7.3] {
            let map = build(&geometry, cell_size).expect("build");
            for p in geometry.pixels() {
                let mass = map.retained_mass(p.id);
                assert!(mass <= 1.0 + 1e-8, "pixel {} mass {mass}", p.id);
                assert!(mass > 1.0 - 1e-6, "pixel {} mass {mass}", p.id);
            }
        }
    }

    #[test]
    fn bounding_box_pruning_matches_exhaustive_scan() {
        let geometry = reference_patch(2);
        let grid = GridSpec::new(geometry.extent(), 3.0).expect("grid");
        let map = build(&geometry, 3.0).expect("build");
        for p in geometry.pixels() {
            let hex = geometry.hexagon(p);
            let area = hex.area();
            let exhaustive: Vec<usize> = grid
                .cells()
                .filter(|c| hex.intersection_area(&c.rect) / area > DEFAULT_OVERLAP_EPSILON)
                .map(|c| c.id)
                .collect();
            let pruned: Vec<usize> = map
                .cells_for_pixel(p.id)
                .iter()
                .map(|w| w.cell_id)
                .collect();
            assert_eq!(pruned, exhaustive, "pixel {}", p.id);
        }
    }

    #[test]
    fn pixel_outside_tessellation_is_unreferenced() {
        let geometry = single_pixel_geometry([50.0, 50.0], 1.0, 3.0);
        let map = build(&geometry, 1.0).expect("build");
        assert_eq!(map.n_entries(), 0);
        assert!(!map.is_referenced(0));
    }

    #[test]
    fn pixel_straddling_boundary_loses_mass() {
        let geometry = single_pixel_geometry([3.0, 0.0], 1.0, 3.0);
        let map = build(&geometry, 1.0).expect("build");
        let mass = map.retained_mass(0);
        assert!((mass - 0.5).abs() < EPS, "mass {mass}");
    }

    #[test]
    fn tolerance_drops_slivers() {
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let map = GeometryIndexer::new(0.3)
            .expect("eps")
            .build(&geometry, 1.0)
            .expect("build");
        assert_eq!(map.n_entries(), 0);
        assert_eq!(map.epsilon(), 0.3);
    }

    #[test]
    fn invalid_inputs_are_configuration_errors() {
        assert!(matches!(
            GeometryIndexer::new(-1.0),
            Err(ConfigError::InvalidEpsilon(_))
        ));
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let err = build(&geometry, 0.0).expect_err("cell size");
        assert!(matches!(err, RebinError::Config(ConfigError::InvalidCellSize(_))));
    }

    #[test]
    fn tiny_cells_are_rejected_before_building() {
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let err = build(&geometry, 1e-10).expect_err("grid too large");
        assert!(matches!(err, RebinError::Config(ConfigError::GridTooLarge { .. })));
    }

    #[test]
    fn cell_lists_follow_pixel_enumeration_order() {
        // neighbours sharing the column x in [0, 1], enumerated out of id order
        let sqrt3 = f64::sqrt(3.0);
        let geometry = SensorGeometry::from_columns(
            "t",
            1.0,
            3.0,
            &[2, 0, 1],
            &[0.0, sqrt3, -sqrt3],
            &[0.0; 3],
        )
        .expect("geometry");
        let map = build(&geometry, 1.0).expect("build");
        let rank = |id: usize| map.pixel_order().iter().position(|&p| p == id);
        let mut shared = 0;
        for cell in 0..map.n_cells() {
            let ranks: Vec<_> = map
                .pixels_for_cell(cell)
                .iter()
                .map(|w| rank(w.pixel_id))
                .collect();
            assert!(
                ranks.windows(2).all(|w| w[0] < w[1]),
                "cell {cell}: {ranks:?}"
            );
            if ranks.len() > 1 {
                shared += 1;
            }
        }
        assert!(shared > 0);
    }
}
