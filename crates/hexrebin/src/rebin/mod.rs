//! Per-event rebinning of hexagonal pixel series onto the square grid.
//!
//! Each pixel's readings are spread over the cells its hexagon overlaps,
//! weighted by the overlap fraction:
//!
//! `out[row, col, t] = sum_p fraction(cell, p) * readings[p][start + t]`
//!
//! The result is linear in the readings and independent of the order in
//! which pixels are stored in the series.

mod series;
mod tensor;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use ndarray::{s, Array3};

use crate::error::RebinError;
use crate::overlap::{CellWeight, OverlapMap};

pub use series::{EventSeries, SliceWindow};
pub use tensor::RebinnedTensor;

/// Rebin one event over `window`.
///
/// Fails when the window does not fit the series, or when a pixel the map
/// references has no readings (the lowest such pixel id is reported).
/// Pixels the map does not reference are ignored, as are extra pixels in
/// the series.
pub fn rebin(
    map: &OverlapMap,
    series: &EventSeries,
    window: SliceWindow,
) -> Result<RebinnedTensor, RebinError> {
    window.check(series.n_slices())?;

    let mut sources: Vec<(&[f32], &[CellWeight])> = Vec::new();
    for pixel_id in map.referenced_pixels() {
        let readings = series
            .get(pixel_id)
            .ok_or(RebinError::MissingPixelData { pixel_id })?;
        sources.push((
            &readings[window.start..window.end],
            map.cells_for_pixel(pixel_id),
        ));
    }

    let (height, width) = map.grid_shape();
    let mut out = Array3::<f32>::zeros((height, width, window.len()));
    let grid = map.grid();
    for (readings, cells) in sources {
        for w in cells {
            let (row, col) = grid.position(w.cell_id);
            let mut lane = out.slice_mut(s![row, col, ..]);
            for (acc, &v) in lane.iter_mut().zip(readings) {
                *acc += (f64::from(v) * w.fraction) as f32;
            }
        }
    }

    Ok(RebinnedTensor::new(out, window))
}

/// Rebin a batch of events with the same map and window.
///
/// Results are returned in input order; one failing event does not affect
/// the others.
pub fn rebin_batch(
    map: &OverlapMap,
    events: &[EventSeries],
    window: SliceWindow,
) -> Vec<Result<RebinnedTensor, RebinError>> {
    #[cfg(feature = "rayon")]
    let out: Vec<_> = events.par_iter().map(|s| rebin(map, s, window)).collect();
    #[cfg(not(feature = "rayon"))]
    let out: Vec<_> = events.iter().map(|s| rebin(map, s, window)).collect();

    let failed = out.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        tracing::warn!("{failed} of {} events failed to rebin", events.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WindowError;
    use crate::overlap::build;
    use crate::test_utils::{single_pixel_geometry, three_pixel_geometry};
    use std::collections::HashMap;

    #[test]
    fn single_reading_lands_in_overlapped_cells() {
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let map = build(&geometry, 1.0).expect("map");
        let mut readings = vec![0.0; 4];
        readings[2] = 5.0;
        let series = EventSeries::from_dense(vec![readings]).expect("series");

        let tensor = rebin(&map, &series, SliceWindow::new(0, 4)).expect("rebin");
        assert_eq!(tensor.shape(), [6, 6, 4]);
        assert_eq!((tensor.height(), tensor.width()), map.grid_shape());
        for row in 0..tensor.height() {
            for col in 0..tensor.width() {
                for t in 0..4 {
                    let v = tensor.get(row, col, t).expect("in range");
                    let centre = (2..=3).contains(&row) && (2..=3).contains(&col);
                    if centre && t == 2 {
                        assert!((v - 1.25).abs() < 1e-6, "({row},{col},{t}) = {v}");
                    } else {
                        assert_eq!(v, 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn window_offsets_slice_index() {
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let map = build(&geometry, 1.0).expect("map");
        let series = EventSeries::from_dense(vec![vec![1.0, 2.0, 3.0, 4.0]]).expect("series");
        let tensor = rebin(&map, &series, SliceWindow::new(1, 3)).expect("rebin");
        assert_eq!(tensor.n_slices(), 2);
        assert!((tensor.slice_total(0) - 2.0).abs() < 1e-6);
        assert!((tensor.slice_total(1) - 3.0).abs() < 1e-6);
        assert_eq!(tensor.window(), SliceWindow::new(1, 3));
    }

    #[test]
    fn window_errors_come_before_missing_pixels() {
        let geometry = three_pixel_geometry();
        let map = build(&geometry, 1.0).expect("map");
        let series = EventSeries::zeros([0], 4);

        let err = rebin(&map, &series, SliceWindow::new(3, 3)).expect_err("empty window");
        assert!(matches!(
            err,
            RebinError::Window(WindowError::StartNotBeforeEnd { .. })
        ));
        let err = rebin(&map, &series, SliceWindow::new(0, 5)).expect_err("too long");
        assert!(matches!(
            err,
            RebinError::Window(WindowError::EndBeyondSeries { .. })
        ));
        let err = rebin(&map, &series, SliceWindow::new(0, 4)).expect_err("missing");
        assert!(matches!(err, RebinError::MissingPixelData { pixel_id: 1 }));
    }

    #[test]
    fn unreferenced_and_extra_pixels_are_ignored() {
        // pixel 0 at the centre, pixel 1 far outside the grid
        let geometry = crate::sensor_layout::SensorGeometry::from_columns(
            "t",
            1.0,
            3.0,
            &[0, 1],
            &[0.0, 40.0],
            &[0.0, 40.0],
        )
        .expect("geometry");
        let map = build(&geometry, 1.0).expect("map");
        let series =
            EventSeries::new(HashMap::from([(0, vec![2.0]), (17, vec![9.0])])).expect("series");
        let tensor = rebin(&map, &series, SliceWindow::full(1)).expect("rebin");
        assert!((tensor.total() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let geometry = single_pixel_geometry([0.0, 0.0], 1.0, 3.0);
        let map = build(&geometry, 1.0).expect("map");
        let events = vec![
            EventSeries::from_dense(vec![vec![1.0; 3]]).expect("a"),
            EventSeries::default(),
            EventSeries::from_dense(vec![vec![3.0; 3]]).expect("c"),
        ];
        let out = rebin_batch(&map, &events, SliceWindow::full(3));
        assert_eq!(out.len(), 3);
        assert!((out[0].as_ref().expect("a").total() - 3.0).abs() < 1e-5);
        assert!(out[1].is_err());
        assert!((out[2].as_ref().expect("c").total() - 9.0).abs() < 1e-5);
    }
}
