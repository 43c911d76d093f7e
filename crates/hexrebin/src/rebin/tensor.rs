use ndarray::{Array3, ArrayView2};
use serde::{Deserialize, Serialize};

use super::SliceWindow;

/// Rebinned event: `data[[row, col, t]]` with row 0 at the top of the
/// tessellation and `t` counted from the window start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebinnedTensor {
    data: Array3<f32>,
    window: SliceWindow,
}

impl RebinnedTensor {
    pub(crate) fn new(data: Array3<f32>, window: SliceWindow) -> Self {
        Self { data, window }
    }

    /// `[height, width, n_slices]`.
    pub fn shape(&self) -> [usize; 3] {
        let (h, w, t) = self.data.dim();
        [h, w, t]
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_slices(&self) -> usize {
        self.data.dim().2
    }

    /// Source slice range this tensor was produced from.
    pub fn window(&self) -> SliceWindow {
        self.window
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize, t: usize) -> Option<f32> {
        self.data.get([row, col, t]).copied()
    }

    /// `height x width` image of one slice.
    pub fn slice_image(&self, t: usize) -> Option<ArrayView2<'_, f32>> {
        (t < self.n_slices()).then(|| self.data.index_axis(ndarray::Axis(2), t))
    }

    /// Sum over all cells of slice `t`; zero when out of range.
    pub fn slice_total(&self, t: usize) -> f64 {
        self.slice_image(t)
            .map_or(0.0, |img| img.iter().map(|&v| f64::from(v)).sum())
    }

    pub fn total(&self) -> f64 {
        self.data.iter().map(|&v| f64::from(v)).sum()
    }

    /// Values in row-major `[row][col][t]` order.
    pub fn to_flat_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}
