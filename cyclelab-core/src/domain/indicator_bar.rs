//! IndicatorBar — a bar enriched with the trend-indicator columns.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::bar::Bar;

/// Bar plus the EMA / MACD / Bollinger columns used by signal rules and
/// re-trend detection.
///
/// Warmup bars carry NaN in the enriched columns; consumers that need a
/// valid `ema_mid` (re-trend detection) must check `has_indicators()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorBar {
    pub bar: Bar,
    pub ema_short: f64,
    pub ema_mid: f64,
    pub ema_long: f64,
    pub dif: f64,
    pub dea: f64,
    pub macd: f64,
    pub boll_mid: f64,
    pub boll_std: f64,
    pub boll_up: f64,
    pub boll_dn: f64,
}

impl IndicatorBar {
    pub fn ts(&self) -> NaiveDateTime {
        self.bar.ts
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    /// True once every enriched column is past its warmup.
    pub fn has_indicators(&self) -> bool {
        !(self.ema_short.is_nan()
            || self.ema_mid.is_nan()
            || self.ema_long.is_nan()
            || self.dif.is_nan()
            || self.dea.is_nan()
            || self.macd.is_nan()
            || self.boll_mid.is_nan())
    }
}
