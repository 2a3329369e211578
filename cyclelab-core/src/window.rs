//! Feature window — a cycle's trailing rows as a fixed-size matrix.
//!
//! Rows arrive already normalized to [0, 1]. The builder prepends a
//! duplicated signal column, takes the trailing `height` usable rows, and
//! zero-pads symmetrically to exactly height×width. Cycles with no usable
//! rows are skipped, never an error.

use serde::{Deserialize, Serialize};

use crate::domain::FeatureMatrix;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowConfig {
    pub height: usize,
    pub width: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            height: 30,
            width: 30,
        }
    }
}

/// Builds fixed-size feature matrices for the predictor.
#[derive(Debug, Clone, Default)]
pub struct FeatureWindowBuilder {
    config: WindowConfig,
}

impl FeatureWindowBuilder {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    /// Build the matrix for one cycle.
    ///
    /// `rows` are the cycle's trailing feature rows, oldest first; a row
    /// containing any `None` is unusable and dropped. `signal` is the ±1
    /// direction value duplicated into the leading column. Returns `None`
    /// when no usable row remains (skip the cycle).
    ///
    /// Padding split: `top = pad // 2`, `bottom = pad - top`, and the same
    /// split left/right, so any odd remainder lands bottom/right.
    pub fn build(&self, rows: &[Vec<Option<f64>>], signal: f64) -> Option<FeatureMatrix> {
        let height = self.config.height;
        let width = self.config.width;

        let usable: Vec<Vec<f64>> = rows
            .iter()
            .filter_map(|row| row.iter().copied().collect::<Option<Vec<f64>>>())
            .map(|mut row| {
                row.insert(0, signal);
                row.truncate(width);
                row
            })
            .collect();
        if usable.is_empty() {
            return None;
        }

        let take = usable.len().min(height);
        let window = &usable[usable.len() - take..];
        let row_width = window[0].len();

        let pad_rows = height - take;
        let top = pad_rows / 2;
        let pad_cols = width - row_width;
        let left = pad_cols / 2;

        let mut matrix = FeatureMatrix::zeros(height, width);
        for (r, row) in window.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                matrix.set(top + r, left + c, value);
            }
        }
        Some(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row(n: usize, value: f64) -> Vec<Option<f64>> {
        vec![Some(value); n]
    }

    fn builder() -> FeatureWindowBuilder {
        FeatureWindowBuilder::default()
    }

    #[test]
    fn scenario_d_seven_rows_pad_top_11_bottom_12() {
        let rows: Vec<Vec<Option<f64>>> = (0..7).map(|_| full_row(11, 0.5)).collect();
        let m = builder().build(&rows, 1.0).unwrap();

        assert_eq!((m.height, m.width), (30, 30));
        // pad_total = 23 -> top = 11, bottom = 12
        for c in 0..30 {
            assert_eq!(m.get(10, c), 0.0); // last top-pad row
            assert_eq!(m.get(18, c), 0.0); // first bottom-pad row
        }
        // Data rows occupy 11..=17; row width = 12 -> left pad 9, right pad 9...
        // 30 - 12 = 18, left = 9.
        assert_eq!(m.get(11, 9), 1.0); // signal column
        assert_eq!(m.get(11, 10), 0.5);
        assert_eq!(m.get(17, 20), 0.5);
        assert_eq!(m.get(11, 8), 0.0); // left pad
        assert_eq!(m.get(11, 21), 0.0); // right pad
    }

    #[test]
    fn shape_is_exact_for_length_one() {
        let m = builder().build(&[full_row(11, 0.3)], -1.0).unwrap();
        assert_eq!((m.height, m.width), (30, 30));
        assert_eq!(m.as_slice().len(), 900);
    }

    #[test]
    fn shape_is_exact_for_length_over_height() {
        let rows: Vec<Vec<Option<f64>>> = (0..45).map(|i| full_row(11, i as f64)).collect();
        let m = builder().build(&rows, 1.0).unwrap();
        assert_eq!((m.height, m.width), (30, 30));
        // Only the trailing 30 rows survive: first data value is row 15.
        assert_eq!(m.get(0, 10), 15.0);
        assert_eq!(m.get(29, 10), 44.0);
    }

    #[test]
    fn odd_column_pad_goes_right() {
        // 1 feature + signal = 2 columns; pad 28 -> left 14, right 14.
        // 2 features + signal = 3 columns; pad 27 -> left 13, right 14.
        let m = builder().build(&[full_row(2, 0.7)], 1.0).unwrap();
        assert_eq!(m.get(14, 13), 1.0);
        assert_eq!(m.get(14, 14), 0.7);
        assert_eq!(m.get(14, 15), 0.7);
        assert_eq!(m.get(14, 12), 0.0);
        assert_eq!(m.get(14, 16), 0.0);
    }

    #[test]
    fn rows_with_nulls_are_dropped() {
        let mut null_row = full_row(11, 0.5);
        null_row[3] = None;
        let rows = vec![null_row, full_row(11, 0.9)];
        let m = builder().build(&rows, 1.0).unwrap();
        // Only one usable row -> centered vertically at 14 (pad 29, top 14).
        assert_eq!(m.get(14, 10), 0.9);
        assert_eq!(m.get(13, 10), 0.0);
    }

    #[test]
    fn all_null_rows_skip_the_cycle() {
        let rows = vec![vec![None; 11], vec![None; 11]];
        assert!(builder().build(&rows, 1.0).is_none());
        assert!(builder().build(&[], 1.0).is_none());
    }

    #[test]
    fn signal_column_is_duplicated_first() {
        let rows = vec![full_row(11, 0.2)];
        let m = builder().build(&rows, -1.0).unwrap();
        // 12 columns -> left pad 9; signal sits at column 9.
        assert_eq!(m.get(14, 9), -1.0);
    }
}
