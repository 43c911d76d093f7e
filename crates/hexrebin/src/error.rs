//! Error taxonomy for map construction, rebinning and persistence.

use thiserror::Error;

/// Invalid configuration values (cell size, tolerance, configured window).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cell size must be finite and > 0 (got {0})")]
    InvalidCellSize(f64),
    #[error("overlap epsilon must be finite and >= 0 (got {0})")]
    InvalidEpsilon(f64),
    #[error("grid would need {cells_per_side} cells per side (max {max})")]
    GridTooLarge { cells_per_side: f64, max: usize },
    #[error("configured slice window [{start}, {end}) is empty or reversed")]
    InvalidWindow { start: usize, end: usize },
}

/// Malformed sensor geometry table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("unsupported geometry schema '{found}' (expected '{expected}')")]
    UnsupportedSchema {
        found: String,
        expected: &'static str,
    },
    #[error("geometry table is empty")]
    Empty,
    #[error("column lengths disagree: {ids} ids, {xs} x coordinates, {ys} y coordinates")]
    ColumnLengthMismatch { ids: usize, xs: usize, ys: usize },
    #[error("duplicate pixel id {0}")]
    DuplicatePixelId(usize),
    #[error("pixel id {id} is outside [0, {n_pixels})")]
    PixelIdOutOfRange { id: usize, n_pixels: usize },
    #[error("pixel {0} has a non-finite center coordinate")]
    NonFiniteCenter(usize),
    #[error("pixel edge length must be finite and > 0 (got {0})")]
    InvalidPixelEdge(f64),
    #[error("sensor extent must be finite and > 0 (got {0})")]
    InvalidExtent(f64),
}

/// Slice window that does not fit the series it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window start {start} must be < end {end}")]
    StartNotBeforeEnd { start: usize, end: usize },
    #[error("window end {end} exceeds series length {series_len}")]
    EndBeyondSeries { end: usize, series_len: usize },
}

/// Inconsistent per-event readings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("pixel {pixel_id} has {found} time slices, expected {expected}")]
    LengthMismatch {
        pixel_id: usize,
        expected: usize,
        found: usize,
    },
}

/// Failure to load or store a persisted overlap map.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid persisted overlap map: {0}")]
    Corrupt(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum RebinError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    #[error("series error: {0}")]
    Series(#[from] SeriesError),
    #[error("event series has no readings for pixel {pixel_id} referenced by the overlap map")]
    MissingPixelData { pixel_id: usize },
    #[error("map store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = RebinError> = std::result::Result<T, E>;
