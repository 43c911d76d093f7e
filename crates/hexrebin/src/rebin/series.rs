use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{SeriesError, WindowError};

/// Per-pixel time series of one event.
///
/// Every pixel carries the same number of time slices. Pixels may be absent;
/// whether that matters depends on the overlap map the series is rebinned
/// with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRecord", into = "SeriesRecord")]
pub struct EventSeries {
    n_slices: usize,
    readings: HashMap<usize, Vec<f32>>,
}

/// Half-open slice range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceWindow {
    pub start: usize,
    pub end: usize,
}

impl Default for SliceWindow {
    fn default() -> Self {
        Self { start: 0, end: 100 }
    }
}

impl SliceWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// `[0, n_slices)`.
    pub fn full(n_slices: usize) -> Self {
        Self {
            start: 0,
            end: n_slices,
        }
    }

    /// Slices covered; zero for empty or reversed windows.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the window against a series of `series_len` slices.
    pub fn check(&self, series_len: usize) -> Result<(), WindowError> {
        if self.start >= self.end {
            return Err(WindowError::StartNotBeforeEnd {
                start: self.start,
                end: self.end,
            });
        }
        if self.end > series_len {
            return Err(WindowError::EndBeyondSeries {
                end: self.end,
                series_len,
            });
        }
        Ok(())
    }
}

impl EventSeries {
    /// Wrap per-pixel readings; all series must have the same length.
    ///
    /// The reference length is taken from the lowest pixel id, so the
    /// reported mismatch does not depend on map iteration order.
    pub fn new(readings: HashMap<usize, Vec<f32>>) -> Result<Self, SeriesError> {
        let mut ids: Vec<usize> = readings.keys().copied().collect();
        ids.sort_unstable();
        let n_slices = ids.first().map_or(0, |id| readings[id].len());
        for id in ids.iter().skip(1) {
            let found = readings[id].len();
            if found != n_slices {
                return Err(SeriesError::LengthMismatch {
                    pixel_id: *id,
                    expected: n_slices,
                    found,
                });
            }
        }
        Ok(Self { n_slices, readings })
    }

    /// Dense form: `rows[pixel_id]` holds that pixel's readings.
    pub fn from_dense(rows: Vec<Vec<f32>>) -> Result<Self, SeriesError> {
        Self::new(rows.into_iter().enumerate().collect())
    }

    /// Every listed pixel reads zero in every slice.
    pub fn zeros(pixel_ids: impl IntoIterator<Item = usize>, n_slices: usize) -> Self {
        Self {
            n_slices,
            readings: pixel_ids
                .into_iter()
                .map(|id| (id, vec![0.0; n_slices]))
                .collect(),
        }
    }

    /// Add or replace one pixel's readings.
    pub fn insert(&mut self, pixel_id: usize, readings: Vec<f32>) -> Result<(), SeriesError> {
        let others = self.readings.keys().any(|&id| id != pixel_id);
        if others && readings.len() != self.n_slices {
            return Err(SeriesError::LengthMismatch {
                pixel_id,
                expected: self.n_slices,
                found: readings.len(),
            });
        }
        self.n_slices = readings.len();
        self.readings.insert(pixel_id, readings);
        Ok(())
    }

    /// Number of time slices per pixel; zero for an empty series.
    pub fn n_slices(&self) -> usize {
        self.n_slices
    }

    /// Number of pixels with readings.
    pub fn n_pixels(&self) -> usize {
        self.readings.len()
    }

    pub fn get(&self, pixel_id: usize) -> Option<&[f32]> {
        self.readings.get(&pixel_id).map(Vec::as_slice)
    }

    pub fn contains(&self, pixel_id: usize) -> bool {
        self.readings.contains_key(&pixel_id)
    }

    /// Pixel ids with readings, ascending.
    pub fn pixel_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.readings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sum of readings inside `window`, over all pixels.
    pub fn window_total(&self, window: SliceWindow) -> f64 {
        self.readings
            .values()
            .filter_map(|r| r.get(window.start..window.end))
            .flatten()
            .map(|&v| f64::from(v))
            .sum()
    }
}

/// JSON form: `{"n_slices": 100, "readings": {"<pixel_id>": [..], ..}}`.
///
/// `n_slices` is optional on input; when present it must match the readings,
/// and it is the only length an empty series has.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeriesRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n_slices: Option<usize>,
    readings: BTreeMap<usize, Vec<f32>>,
}

impl From<EventSeries> for SeriesRecord {
    fn from(series: EventSeries) -> Self {
        Self {
            n_slices: Some(series.n_slices),
            readings: series.readings.into_iter().collect(),
        }
    }
}

impl TryFrom<SeriesRecord> for EventSeries {
    type Error = SeriesError;

    fn try_from(rec: SeriesRecord) -> Result<Self, Self::Error> {
        let lowest = rec.readings.keys().next().copied();
        let mut series = Self::new(rec.readings.into_iter().collect())?;
        match (rec.n_slices, lowest) {
            (Some(n), None) => series.n_slices = n,
            (Some(n), Some(pixel_id)) if n != series.n_slices => {
                return Err(SeriesError::LengthMismatch {
                    pixel_id,
                    expected: n,
                    found: series.n_slices,
                });
            }
            _ => {}
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_reports_lowest_offending_pixel() {
        let readings = HashMap::from([
            (4, vec![1.0; 3]),
            (1, vec![1.0; 5]),
            (2, vec![1.0; 3]),
            (9, vec![1.0; 2]),
        ]);
        let err = EventSeries::new(readings).expect_err("mismatch");
        assert_eq!(
            err,
            SeriesError::LengthMismatch {
                pixel_id: 2,
                expected: 5,
                found: 3
            }
        );
    }

    #[test]
    fn dense_rows_are_indexed_by_position() {
        let s = EventSeries::from_dense(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("series");
        assert_eq!(s.n_slices(), 2);
        assert_eq!(s.get(1), Some(&[3.0, 4.0][..]));
        assert_eq!(s.get(2), None);
        assert_eq!(s.pixel_ids(), vec![0, 1]);
    }

    #[test]
    fn insert_enforces_common_length() {
        let mut s = EventSeries::default();
        s.insert(3, vec![0.0; 4]).expect("first");
        s.insert(3, vec![0.0; 6]).expect("replace only pixel");
        assert_eq!(s.n_slices(), 6);
        assert!(s.insert(1, vec![0.0; 4]).is_err());
        s.insert(1, vec![1.0; 6]).expect("same length");
        assert_eq!(s.n_pixels(), 2);
    }

    #[test]
    fn window_checks() {
        assert!(SliceWindow::new(0, 4).check(4).is_ok());
        assert_eq!(
            SliceWindow::new(2, 2).check(4),
            Err(WindowError::StartNotBeforeEnd { start: 2, end: 2 })
        );
        assert_eq!(
            SliceWindow::new(0, 5).check(4),
            Err(WindowError::EndBeyondSeries {
                end: 5,
                series_len: 4
            })
        );
        assert_eq!(SliceWindow::new(5, 2).len(), 0);
        assert_eq!(SliceWindow::default().len(), 100);
    }

    #[test]
    fn json_uses_string_pixel_keys() {
        let s: EventSeries =
            serde_json::from_str(r#"{"readings":{"0":[1.0,2.0],"7":[0.5,0.0]}}"#).expect("parse");
        assert_eq!(s.n_slices(), 2);
        assert_eq!(s.get(7), Some(&[0.5, 0.0][..]));
        let back: EventSeries =
            serde_json::from_str(&serde_json::to_string(&s).expect("json")).expect("reparse");
        assert_eq!(back, s);

        let bad = serde_json::from_str::<EventSeries>(r#"{"readings":{"0":[1.0],"1":[]}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn empty_series_keeps_its_length_through_json() {
        let empty = EventSeries::zeros(std::iter::empty(), 5);
        let json = serde_json::to_string(&empty).expect("json");
        let back: EventSeries = serde_json::from_str(&json).expect("parse");
        assert_eq!(back.n_slices(), 5);
        assert_eq!(back, empty);

        let declared = r#"{"n_slices":3,"readings":{"2":[1.0,2.0]}}"#;
        let err = serde_json::from_str::<EventSeries>(declared).expect_err("length");
        assert!(err
            .to_string()
            .contains("pixel 2 has 2 time slices, expected 3"));
    }

    #[test]
    fn window_total_sums_selected_slices() {
        let s = EventSeries::from_dense(vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]])
            .expect("series");
        assert_eq!(s.window_total(SliceWindow::new(1, 3)), 55.0);
    }
}
