//! Robust normalization bounds: median/MAD fit, clip-scale apply.

use serde::{Deserialize, Serialize};

/// Default clip multiplier: 3 sigma expressed through the MAD-to-sigma
/// consistency constant 1.4826.
pub const DEFAULT_CLIP_K: f64 = 3.0 * 1.4826;

/// A normalization bound for one (symbol, feature, epoch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub low: f64,
    pub high: f64,
}

impl Bound {
    pub fn new(low: f64, high: f64) -> Self {
        debug_assert!(low <= high, "bound low must not exceed high");
        Self { low, high }
    }

    /// Clip into [low, high], then scale to [0, 1].
    ///
    /// A degenerate bound (`high == low`) maps everything to the midpoint
    /// 0.5 — a defined fallback, never a division by zero.
    pub fn apply(&self, value: f64) -> f64 {
        if self.high == self.low {
            return 0.5;
        }
        let clipped = value.clamp(self.low, self.high);
        (clipped - self.low) / (self.high - self.low)
    }

    /// Inverse of `apply` over the clipped range.
    pub fn invert(&self, normalized: f64) -> f64 {
        normalized * (self.high - self.low) + self.low
    }

    /// Union of two bounds: the non-shrinking merge.
    pub fn union(&self, other: &Bound) -> Bound {
        Bound {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }

    /// True when `other` covers at least this range.
    pub fn is_within(&self, other: &Bound) -> bool {
        other.low <= self.low && other.high >= self.high
    }
}

/// Fit a robust bound: center = median, spread = MAD,
/// bound = center ± k·spread.
///
/// Returns `None` for an empty value set. Values that are NaN are ignored;
/// an all-NaN set is also `None`. A zero-MAD distribution yields a
/// degenerate bound, handled by `Bound::apply`.
pub fn fit_bound(values: &[f64], k: f64) -> Option<Bound> {
    let mut clean: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if clean.is_empty() {
        return None;
    }
    let center = median_in_place(&mut clean);
    let mut deviations: Vec<f64> = clean.iter().map(|v| (v - center).abs()).collect();
    let spread = median_in_place(&mut deviations);
    Some(Bound::new(center - k * spread, center + k * spread))
}

fn median_in_place(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
