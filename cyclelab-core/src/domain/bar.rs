//! Bar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Bar frequency. Finer frequencies resample into coarser ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day,
}

impl Frequency {
    /// Bucket length in minutes. `Day` is session-length dependent and
    /// handled separately by the resampler.
    pub fn minutes(&self) -> Option<u32> {
        match self {
            Frequency::Min1 => Some(1),
            Frequency::Min5 => Some(5),
            Frequency::Min15 => Some(15),
            Frequency::Min30 => Some(30),
            Frequency::Hour1 => Some(60),
            Frequency::Day => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Min1 => "1m",
            Frequency::Min5 => "5m",
            Frequency::Min15 => "15m",
            Frequency::Min30 => "30m",
            Frequency::Hour1 => "1h",
            Frequency::Day => "1d",
        }
    }
}

/// OHLCV bar for a single symbol at a single timestamp.
///
/// `ts` is the bucket-close timestamp: a 15m bar stamped 09:45 covers
/// (09:30, 09:45]. `turnover` is the traded notional over the bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub ts: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            symbol: "600000".into(),
            ts: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 45, 0)
                .unwrap(),
            open: 10.0,
            high: 10.5,
            low: 9.8,
            close: 10.3,
            volume: 50_000.0,
            turnover: 512_000.0,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 9.7; // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn frequency_minutes() {
        assert_eq!(Frequency::Min15.minutes(), Some(15));
        assert_eq!(Frequency::Day.minutes(), None);
    }

    #[test]
    fn frequency_serde_wire_names() {
        let json = serde_json::to_string(&Frequency::Min15).unwrap();
        assert_eq!(json, "\"15m\"");
        let freq: Frequency = serde_json::from_str("\"1d\"").unwrap();
        assert_eq!(freq, Frequency::Day);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar.symbol, deser.symbol);
        assert_eq!(bar.ts, deser.ts);
        assert_eq!(bar.close, deser.close);
        assert_eq!(bar.turnover, deser.turnover);
    }
}
