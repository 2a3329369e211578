//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! mid = SMA(close, period); up/dn = mid ± mult * stddev.
//! Uses population stddev (divide by N). Warmup prefix: period - 1 NaN.

/// Compute (mid, std, up, dn) series for a close series.
pub fn bollinger_of_series(
    closes: &[f64],
    period: usize,
    mult: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = closes.len();
    let mut mid = vec![f64::NAN; n];
    let mut std = vec![f64::NAN; n];
    let mut up = vec![f64::NAN; n];
    let mut dn = vec![f64::NAN; n];

    if n < period || period == 0 {
        return (mid, std, up, dn);
    }

    for i in (period - 1)..n {
        let window = &closes[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        mid[i] = mean;
        std[i] = stddev;
        up[i] = mean + mult * stddev;
        dn[i] = mean - mult * stddev;
    }

    (mid, std, up, dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn middle_is_sma() {
        let (mid, _, _, _) = bollinger_of_series(&[10.0, 11.0, 12.0, 13.0, 14.0], 3, 2.0);
        assert!(mid[1].is_nan());
        assert_approx(mid[2], 11.0, DEFAULT_EPSILON);
        assert_approx(mid[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bands_symmetric_about_middle() {
        let (mid, _, up, dn) = bollinger_of_series(&[10.0, 11.0, 12.0, 13.0, 14.0], 3, 2.0);
        for i in 2..5 {
            assert_approx(up[i] - mid[i], mid[i] - dn[i], DEFAULT_EPSILON);
        }
    }

    #[test]
    fn constant_price_zero_width() {
        let (mid, std, up, dn) = bollinger_of_series(&[100.0, 100.0, 100.0, 100.0], 3, 2.0);
        assert_approx(std[2], 0.0, DEFAULT_EPSILON);
        assert_approx(up[2], mid[2], DEFAULT_EPSILON);
        assert_approx(dn[2], mid[2], DEFAULT_EPSILON);
    }

    #[test]
    fn nan_in_window_leaves_nan() {
        let (mid, _, _, _) = bollinger_of_series(&[10.0, 11.0, f64::NAN, 13.0, 14.0], 3, 2.0);
        assert!(mid[2].is_nan());
        assert!(mid[3].is_nan());
        assert!(mid[4].is_nan());
    }
}
