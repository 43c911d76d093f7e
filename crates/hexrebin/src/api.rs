//! High-level rebinning API.
//!
//! [`HexRebinner`] is the primary entry point: it owns a shared overlap map
//! and a slice window. Create once per geometry, rebin many events.

use std::sync::Arc;

use crate::cache::{MapStore, OverlapCache};
use crate::config::RebinConfig;
use crate::error::RebinError;
use crate::overlap::{GeometryIndexer, OverlapMap};
use crate::rebin::{self, EventSeries, RebinnedTensor, SliceWindow};
use crate::sensor_layout::SensorGeometry;

/// Hexagon-to-grid resampling strategy.
pub trait Resampler {
    /// Precompute the overlap map for a geometry and cell size.
    fn build(&self, geometry: &SensorGeometry, cell_size: f64) -> Result<OverlapMap, RebinError>;

    /// Rebin one event with a previously built map.
    fn rebin(
        &self,
        map: &OverlapMap,
        series: &EventSeries,
        window: SliceWindow,
    ) -> Result<RebinnedTensor, RebinError>;
}

/// Area-weighted resampling: each reading is split over cells in proportion
/// to the hexagon area falling into them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AreaWeightedResampler {
    indexer: GeometryIndexer,
}

impl AreaWeightedResampler {
    pub fn new(epsilon: f64) -> Result<Self, RebinError> {
        Ok(Self {
            indexer: GeometryIndexer::new(epsilon)?,
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.indexer.epsilon()
    }
}

impl Resampler for AreaWeightedResampler {
    fn build(&self, geometry: &SensorGeometry, cell_size: f64) -> Result<OverlapMap, RebinError> {
        self.indexer.build(geometry, cell_size)
    }

    fn rebin(
        &self,
        map: &OverlapMap,
        series: &EventSeries,
        window: SliceWindow,
    ) -> Result<RebinnedTensor, RebinError> {
        rebin::rebin(map, series, window)
    }
}

/// Primary rebinning interface.
///
/// Holds the overlap map for one `(geometry, cell size)` and the configured
/// slice window. Cloning is cheap; the map is shared.
///
/// # Examples
///
/// ```no_run
/// use hexrebin::{EventSeries, HexRebinner, RebinConfig, SensorGeometry};
/// use std::path::Path;
///
/// let geometry = SensorGeometry::from_json_file(Path::new("camera.json")).unwrap();
/// let rebinner = HexRebinner::new(&geometry, &RebinConfig::default()).unwrap();
/// let series = EventSeries::zeros(0..geometry.n_pixels(), 100);
/// let tensor = rebinner.rebin(&series).unwrap();
/// println!("tensor shape {:?}", tensor.shape());
/// ```
#[derive(Debug, Clone)]
pub struct HexRebinner {
    map: Arc<OverlapMap>,
    window: SliceWindow,
}

impl HexRebinner {
    /// Validate `config` and build the map for `geometry`.
    pub fn new(geometry: &SensorGeometry, config: &RebinConfig) -> Result<Self, RebinError> {
        config.validate()?;
        let map = config.indexer()?.build(geometry, config.cell_size)?;
        Ok(Self::with_map(Arc::new(map), config.window))
    }

    /// Take the map from `cache`, building it on first use.
    ///
    /// The cache's indexer decides the overlap tolerance.
    pub fn from_cache<S: MapStore>(
        cache: &OverlapCache<S>,
        geometry: &SensorGeometry,
        config: &RebinConfig,
    ) -> Result<Self, RebinError> {
        config.validate()?;
        if config.overlap_epsilon != cache.indexer().epsilon() {
            tracing::debug!(
                "config epsilon {} ignored; cache uses {}",
                config.overlap_epsilon,
                cache.indexer().epsilon()
            );
        }
        let map = cache.get_or_build(geometry, config.cell_size)?;
        Ok(Self::with_map(map, config.window))
    }

    pub fn with_map(map: Arc<OverlapMap>, window: SliceWindow) -> Self {
        Self { map, window }
    }

    pub fn map(&self) -> &Arc<OverlapMap> {
        &self.map
    }

    pub fn window(&self) -> SliceWindow {
        self.window
    }

    /// `[height, width, n_slices]` of tensors produced by [`HexRebinner::rebin`].
    pub fn tensor_shape(&self) -> [usize; 3] {
        let (h, w) = self.map.grid_shape();
        [h, w, self.window.len()]
    }

    /// Rebin over the configured window.
    pub fn rebin(&self, series: &EventSeries) -> Result<RebinnedTensor, RebinError> {
        rebin::rebin(&self.map, series, self.window)
    }

    /// Rebin over an explicit window.
    pub fn rebin_window(
        &self,
        series: &EventSeries,
        window: SliceWindow,
    ) -> Result<RebinnedTensor, RebinError> {
        rebin::rebin(&self.map, series, window)
    }

    /// Rebin a batch over the configured window; results keep input order.
    pub fn rebin_batch(&self, events: &[EventSeries]) -> Vec<Result<RebinnedTensor, RebinError>> {
        rebin::rebin_batch(&self.map, events, self.window)
    }
}
