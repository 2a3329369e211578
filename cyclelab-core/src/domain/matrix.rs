//! FeatureMatrix — fixed-size single-channel input to the predictor.

use serde::{Deserialize, Serialize};

/// A fixed H×W single-channel matrix in row-major order.
///
/// Constructed only by the feature-window builder, so `data.len()` is
/// always `height * width`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub height: usize,
    pub width: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(height: usize, width: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), height * width, "matrix shape mismatch");
        Self {
            height,
            width,
            data,
        }
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![0.0; height * width],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.width + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_exact_shape() {
        let m = FeatureMatrix::zeros(30, 30);
        assert_eq!(m.height, 30);
        assert_eq!(m.width, 30);
        assert_eq!(m.as_slice().len(), 900);
    }

    #[test]
    fn get_set_roundtrip() {
        let mut m = FeatureMatrix::zeros(3, 4);
        m.set(2, 3, 7.5);
        assert_eq!(m.get(2, 3), 7.5);
        assert_eq!(m.row(2)[3], 7.5);
    }

    #[test]
    #[should_panic(expected = "matrix shape mismatch")]
    fn new_rejects_wrong_length() {
        FeatureMatrix::new(2, 2, vec![0.0; 3]);
    }
}
