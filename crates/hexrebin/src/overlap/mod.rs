//! Hexagon-to-cell overlap maps.
//!
//! [`GeometryIndexer`] computes, for every pixel, the fraction of its hexagon
//! falling into each grid cell; [`OverlapMap`] stores the sparse result with
//! per-pixel and per-cell views and a versioned JSON form.

mod indexer;
mod map;

pub use indexer::{build, GeometryIndexer, DEFAULT_OVERLAP_EPSILON};
pub use map::{CellWeight, MapSummary, OverlapEntry, OverlapMap, PixelWeight};

pub(crate) use map::OverlapMapRecord;
