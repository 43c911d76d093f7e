//! hexrebin: area-weighted rebinning of hexagonal sensor data onto a square grid.
//!
//! Built for cameras whose pixels are regular hexagons, so their per-pixel
//! time series can be fed to models that expect a dense image tensor.
//! The pipeline stages are:
//!
//! 1. **Geometry** – pixel table with hexagon centers, edge length and extent.
//! 2. **Tessellation** – square cells covering `[-extent, extent]^2`,
//!    row-major from the top-left corner.
//! 3. **Overlap** – per pixel, the fraction of its hexagon inside each cell
//!    (convex clipping, bounding-box pruned). Built once per geometry.
//! 4. **Rebin** – per event, spread every reading over the overlapped cells
//!    into a `(row, col, time)` tensor.
//!
//! # Public API
//! - [`HexRebinner`] and [`RebinConfig`] as primary entry points
//! - [`Resampler`] / [`AreaWeightedResampler`] for the two-step build/rebin form
//! - [`OverlapCache`] with pluggable [`MapStore`] persistence

mod api;
mod cache;
mod config;
mod error;
pub mod geometry;
mod overlap;
mod rebin;
mod sensor_layout;
mod tessellation;

#[cfg(test)]
mod test_utils;

pub use api::{AreaWeightedResampler, HexRebinner, Resampler};
pub use cache::{CacheStats, DirStore, MapKey, MapStore, MemoryStore, NullStore, OverlapCache};
pub use config::{RebinConfig, DEFAULT_CELL_SIZE};
pub use error::{
    ConfigError, GeometryError, RebinError, Result, SeriesError, StoreError, WindowError,
};
pub use overlap::{
    build, CellWeight, GeometryIndexer, MapSummary, OverlapEntry, OverlapMap, PixelWeight,
    DEFAULT_OVERLAP_EPSILON,
};
pub use rebin::{rebin, rebin_batch, EventSeries, RebinnedTensor, SliceWindow};
pub use sensor_layout::{
    default_pixel_edge_mm, SensorGeometry, SensorPixel, DEFAULT_EXTENT_MM,
    DEFAULT_PIXEL_SPACING_MM,
};
pub use tessellation::{GridCell, GridSpec, MAX_GRID_SIDE};
