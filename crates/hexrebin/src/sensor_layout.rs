//! Sensor pixel geometry table.
//!
//! Geometry JSON follows a column schema (`hexrebin.geometry.v1`): pixel ids
//! and center coordinates are stored as three parallel arrays so that a table
//! with mismatched columns is detected instead of silently truncated.
//! The order of the `ids` column is the pixel enumeration order used by the
//! overlap indexer.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{GeometryError, RebinError};
use crate::geometry::Polygon;

const GEOMETRY_SCHEMA_V1: &str = "hexrebin.geometry.v1";

/// Center-to-center distance of neighbouring pixels on the reference camera (mm).
pub const DEFAULT_PIXEL_SPACING_MM: f64 = 9.51;
/// Bounding half-width of the reference camera (mm).
pub const DEFAULT_EXTENT_MM: f64 = 186.0;

/// Hexagon edge length of the reference camera (mm).
pub fn default_pixel_edge_mm() -> f64 {
    DEFAULT_PIXEL_SPACING_MM / f64::sqrt(3.0)
}

/// One hexagonal sensor pixel.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SensorPixel {
    pub id: usize,
    pub center: [f64; 2],
}

/// Validated sensor geometry used to build overlap maps.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorGeometry {
    version: String,
    pixel_edge: f64,
    extent: f64,
    pixels: Vec<SensorPixel>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GeometryFileV1 {
    schema: String,
    version: String,
    pixel_edge: f64,
    extent: f64,
    pixels: PixelColumns,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PixelColumns {
    ids: Vec<usize>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl SensorGeometry {
    /// Build from an ordered pixel table.
    ///
    /// Ids must be unique and lie in `[0, N)` where `N = pixels.len()`.
    pub fn new(
        version: impl Into<String>,
        pixel_edge: f64,
        extent: f64,
        pixels: Vec<SensorPixel>,
    ) -> Result<Self, GeometryError> {
        validate_scalars(pixel_edge, extent)?;
        validate_pixels(&pixels)?;
        Ok(Self {
            version: version.into(),
            pixel_edge,
            extent,
            pixels,
        })
    }

    /// Build from parallel id / x / y columns.
    pub fn from_columns(
        version: impl Into<String>,
        pixel_edge: f64,
        extent: f64,
        ids: &[usize],
        xs: &[f64],
        ys: &[f64],
    ) -> Result<Self, GeometryError> {
        if ids.len() != xs.len() || ids.len() != ys.len() {
            return Err(GeometryError::ColumnLengthMismatch {
                ids: ids.len(),
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let pixels = ids
            .iter()
            .zip(xs.iter().zip(ys))
            .map(|(&id, (&x, &y))| SensorPixel { id, center: [x, y] })
            .collect();
        Self::new(version, pixel_edge, extent, pixels)
    }

    /// Parametric layout: a hexagonal patch of `rings` rings around a center
    /// pixel on a pointy-top axial lattice, `1 + 3 * rings * (rings + 1)`
    /// pixels in total. Neighbouring centers are `sqrt(3) * pixel_edge` apart,
    /// so the hexagons tile without gaps.
    ///
    /// Ids follow generation order: rows from bottom (`r = -rings`) to top,
    /// left to right within a row.
    pub fn hexagonal(
        version: impl Into<String>,
        rings: usize,
        pixel_edge: f64,
        extent: f64,
    ) -> Result<Self, GeometryError> {
        validate_scalars(pixel_edge, extent)?;
        let n = rings as i64;
        let mut pixels = Vec::with_capacity(1 + 3 * rings * (rings + 1));
        for r in -n..=n {
            let q_min = (-n).max(-r - n);
            let q_max = n.min(-r + n);
            for q in q_min..=q_max {
                pixels.push(SensorPixel {
                    id: pixels.len(),
                    center: hex_axial_to_xy(q, r, pixel_edge),
                });
            }
        }
        Self::new(version, pixel_edge, extent, pixels)
    }

    /// Load a geometry table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, RebinError> {
        let data = std::fs::read_to_string(path).map_err(crate::error::StoreError::from)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, RebinError> {
        let file: GeometryFileV1 =
            serde_json::from_str(data).map_err(crate::error::StoreError::from)?;
        Ok(Self::from_file(file)?)
    }

    /// Serialize to the `hexrebin.geometry.v1` JSON schema.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let file = GeometryFileV1 {
            schema: GEOMETRY_SCHEMA_V1.to_string(),
            version: self.version.clone(),
            pixel_edge: self.pixel_edge,
            extent: self.extent,
            pixels: PixelColumns {
                ids: self.pixels.iter().map(|p| p.id).collect(),
                x: self.pixels.iter().map(|p| p.center[0]).collect(),
                y: self.pixels.iter().map(|p| p.center[1]).collect(),
            },
        };
        serde_json::to_string_pretty(&file)
    }

    fn from_file(file: GeometryFileV1) -> Result<Self, GeometryError> {
        if file.schema != GEOMETRY_SCHEMA_V1 {
            return Err(GeometryError::UnsupportedSchema {
                found: file.schema,
                expected: GEOMETRY_SCHEMA_V1,
            });
        }
        Self::from_columns(
            file.version,
            file.pixel_edge,
            file.extent,
            &file.pixels.ids,
            &file.pixels.x,
            &file.pixels.y,
        )
    }

    /// Version string identifying this table; part of the map cache key.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pixel_edge(&self) -> f64 {
        self.pixel_edge
    }

    /// Bounding half-width: the tessellated square is `[-extent, extent]^2`.
    pub fn extent(&self) -> f64 {
        self.extent
    }

    /// Pixels in enumeration order.
    pub fn pixels(&self) -> &[SensorPixel] {
        &self.pixels
    }

    pub fn n_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Area shared by every pixel hexagon.
    pub fn pixel_area(&self) -> f64 {
        Polygon::regular_hexagon_area(self.pixel_edge)
    }

    /// Hexagon polygon of one pixel.
    pub fn hexagon(&self, pixel: &SensorPixel) -> Polygon {
        Polygon::regular_hexagon(pixel.center, self.pixel_edge)
    }

    /// Axis-aligned bounds of the pixel centers.
    pub fn center_bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let first = self.pixels.first()?;
        let mut min = first.center;
        let mut max = first.center;
        for p in &self.pixels[1..] {
            min[0] = min[0].min(p.center[0]);
            min[1] = min[1].min(p.center[1]);
            max[0] = max[0].max(p.center[0]);
            max[1] = max[1].max(p.center[1]);
        }
        Some((min, max))
    }
}

fn validate_scalars(pixel_edge: f64, extent: f64) -> Result<(), GeometryError> {
    if !pixel_edge.is_finite() || pixel_edge <= 0.0 {
        return Err(GeometryError::InvalidPixelEdge(pixel_edge));
    }
    if !extent.is_finite() || extent <= 0.0 {
        return Err(GeometryError::InvalidExtent(extent));
    }
    Ok(())
}

fn validate_pixels(pixels: &[SensorPixel]) -> Result<(), GeometryError> {
    if pixels.is_empty() {
        return Err(GeometryError::Empty);
    }
    let n_pixels = pixels.len();
    let mut seen = HashSet::with_capacity(n_pixels);
    for p in pixels {
        if p.id >= n_pixels {
            return Err(GeometryError::PixelIdOutOfRange { id: p.id, n_pixels });
        }
        if !seen.insert(p.id) {
            return Err(GeometryError::DuplicatePixelId(p.id));
        }
        if !p.center[0].is_finite() || !p.center[1].is_finite() {
            return Err(GeometryError::NonFiniteCenter(p.id));
        }
    }
    Ok(())
}

fn hex_axial_to_xy(q: i64, r: i64, edge: f64) -> [f64; 2] {
    let qf = q as f64;
    let rf = r as f64;
    let x = edge * (f64::sqrt(3.0) * qf + 0.5 * f64::sqrt(3.0) * rf);
    let y = edge * (1.5 * rf);
    [x, y]
}
