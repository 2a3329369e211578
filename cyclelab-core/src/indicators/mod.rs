//! Indicator series math and bar enrichment.
//!
//! Pure functions: series in, series out, NaN warmup prefixes. Enrichment
//! computes every `IndicatorBar` column in one pass; the trend *rule* that
//! consumes these columns stays a pluggable `SignalRule`.

pub mod bollinger;
pub mod ema;
pub mod macd;

pub use bollinger::bollinger_of_series;
pub use ema::ema_of_series;
pub use macd::macd_of_series;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, IndicatorBar};

/// Periods for the enriched indicator columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub ema_short: usize,
    pub ema_mid: usize,
    pub ema_long: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub boll_period: usize,
    pub boll_mult: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_short: 5,
            ema_mid: 10,
            ema_long: 20,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            boll_period: 20,
            boll_mult: 2.0,
        }
    }
}

/// Enrich a bar stream with the EMA / MACD / Bollinger columns.
pub fn enrich_bars(bars: &[Bar], config: &IndicatorConfig) -> Vec<IndicatorBar> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let ema_short = ema_of_series(&closes, config.ema_short);
    let ema_mid = ema_of_series(&closes, config.ema_mid);
    let ema_long = ema_of_series(&closes, config.ema_long);
    let (dif, dea, macd) = macd_of_series(
        &closes,
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
    );
    let (boll_mid, boll_std, boll_up, boll_dn) =
        bollinger_of_series(&closes, config.boll_period, config.boll_mult);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| IndicatorBar {
            bar: bar.clone(),
            ema_short: ema_short[i],
            ema_mid: ema_mid[i],
            ema_long: ema_long[i],
            dif: dif[i],
            dea: dea[i],
            macd: macd[i],
            boll_mid: boll_mid[i],
            boll_std: boll_std[i],
            boll_up: boll_up[i],
            boll_dn: boll_dn[i],
        })
        .collect()
}

pub(crate) const DEFAULT_EPSILON: f64 = 1e-9;

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {expected}, got {actual}"
    );
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 0.1, low = min(open,close) - 0.1,
/// one bar per minute inside the morning session.
#[cfg(test)]
pub(crate) fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 0.1;
            let low = open.min(close) - 0.1;
            // Spill across days every 120 minutes to stay inside the session.
            let day = (i / 120) as i64;
            let minute = (i % 120) as u32;
            Bar {
                symbol: "TEST".to_string(),
                ts: (base + chrono::Duration::days(day))
                    .and_hms_opt(9, 30, 0)
                    .unwrap()
                    + chrono::Duration::minutes(i64::from(minute) + 1),
                open,
                high,
                low,
                close,
                volume: 1000.0,
                turnover: 1000.0 * close,
            }
        })
        .collect()
}
