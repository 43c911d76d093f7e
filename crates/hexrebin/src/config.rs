//! Rebinning configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RebinError, StoreError};
use crate::overlap::{GeometryIndexer, DEFAULT_OVERLAP_EPSILON};
use crate::rebin::SliceWindow;

/// Default side length of one grid cell (same units as the geometry).
pub const DEFAULT_CELL_SIZE: f64 = 5.0;

/// Parameters for building overlap maps and rebinning events.
///
/// Missing JSON fields fall back to the defaults; unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebinConfig {
    /// Side length of one square grid cell.
    pub cell_size: f64,
    /// Time slices kept in every output tensor.
    pub window: SliceWindow,
    /// Overlap fractions at or below this are dropped.
    pub overlap_epsilon: f64,
}

impl Default for RebinConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            window: SliceWindow::default(),
            overlap_epsilon: DEFAULT_OVERLAP_EPSILON,
        }
    }
}

impl RebinConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, RebinError> {
        let data = std::fs::read_to_string(path).map_err(StoreError::from)?;
        Self::from_json_str(&data)
    }

    /// Parse and validate.
    pub fn from_json_str(data: &str) -> Result<Self, RebinError> {
        let cfg: Self = serde_json::from_str(data).map_err(StoreError::from)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        if !self.overlap_epsilon.is_finite() || self.overlap_epsilon < 0.0 {
            return Err(ConfigError::InvalidEpsilon(self.overlap_epsilon));
        }
        if self.window.start >= self.window.end {
            return Err(ConfigError::InvalidWindow {
                start: self.window.start,
                end: self.window.end,
            });
        }
        Ok(())
    }

    /// Indexer using this config's tolerance.
    pub fn indexer(&self) -> Result<GeometryIndexer, ConfigError> {
        GeometryIndexer::new(self.overlap_epsilon)
    }
}
