//! MACD — dif/dea/histogram triple.
//!
//! dif  = EMA(close, fast) - EMA(close, slow)
//! dea  = EMA(dif, signal), seeded where dif becomes valid
//! macd = 2 * (dif - dea)

use super::ema::ema_of_series;

/// Compute the (dif, dea, macd) series for a close series.
pub fn macd_of_series(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = closes.len();
    let fast_ema = ema_of_series(closes, fast);
    let slow_ema = ema_of_series(closes, slow);

    let dif: Vec<f64> = (0..n).map(|i| fast_ema[i] - slow_ema[i]).collect();

    // DEA is an EMA of dif, which carries a NaN warmup prefix. Seed the
    // signal EMA from the first valid dif value onward.
    let first_valid = dif.iter().position(|v| !v.is_nan());
    let mut dea = vec![f64::NAN; n];
    if let Some(start) = first_valid {
        let tail = ema_of_series(&dif[start..], signal);
        for (i, v) in tail.into_iter().enumerate() {
            dea[start + i] = v;
        }
    }

    let macd: Vec<f64> = (0..n).map(|i| 2.0 * (dif[i] - dea[i])).collect();
    (dif, dea, macd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn macd_warmup_is_nan() {
        let closes: Vec<f64> = (0..40).map(|i| 10.0 + i as f64 * 0.1).collect();
        let (dif, dea, macd) = macd_of_series(&closes, 12, 26, 9);
        assert!(dif[24].is_nan());
        assert!(!dif[25].is_nan());
        // DEA needs 9 valid dif values starting at index 25
        assert!(dea[32].is_nan());
        assert!(!dea[33].is_nan());
        assert!(!macd[33].is_nan());
    }

    #[test]
    fn macd_is_twice_dif_minus_dea() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + (i as f64 * 0.3).sin()).collect();
        let (dif, dea, macd) = macd_of_series(&closes, 12, 26, 9);
        for i in 35..60 {
            assert_approx(macd[i], 2.0 * (dif[i] - dea[i]), DEFAULT_EPSILON);
        }
    }

    #[test]
    fn rising_series_has_positive_dif() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64 * 0.5).collect();
        let (dif, _, _) = macd_of_series(&closes, 12, 26, 9);
        assert!(dif[59] > 0.0);
    }
}
