//! Session-aware bar resampling and bar-stream validation.
//!
//! Finer bars aggregate into a coarser target frequency. Buckets are
//! aligned to trading-session opens and stamped at the bucket close, so a
//! 15m bar stamped 09:45 covers (09:30, 09:45]. Bars outside every session
//! span are dropped. Calendar gaps are tolerated: no bucket is emitted for
//! an empty interval.

use chrono::{Duration, NaiveTime};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Bar, Frequency};

/// Errors in an incoming bar stream.
///
/// An out-of-order timestamp surviving deduplication is fatal for the
/// symbol's run: proceeding would corrupt cycle boundaries.
#[derive(Debug, Error)]
pub enum BarStreamError {
    #[error("non-monotonic timestamp {ts} in bar stream for {symbol}")]
    NonMonotonic {
        symbol: String,
        ts: chrono::NaiveDateTime,
    },
}

/// Validate an ordered bar stream: drop exact-duplicate timestamps
/// (keeping the first), fail on any timestamp going backwards.
pub fn validate_bars(bars: &[Bar]) -> Result<Vec<Bar>, BarStreamError> {
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    let mut dropped = 0usize;
    for bar in bars {
        match out.last() {
            Some(prev) if bar.ts == prev.ts => {
                dropped += 1;
            }
            Some(prev) if bar.ts < prev.ts => {
                return Err(BarStreamError::NonMonotonic {
                    symbol: bar.symbol.clone(),
                    ts: bar.ts,
                });
            }
            _ => out.push(bar.clone()),
        }
    }
    if dropped > 0 {
        debug!(
            symbol = out.first().map(|b| b.symbol.as_str()).unwrap_or(""),
            dropped, "dropped duplicate-timestamp bars"
        );
    }
    Ok(out)
}

/// Trading session: an ordered list of (open, close) spans.
#[derive(Debug, Clone)]
pub struct Session {
    spans: Vec<(NaiveTime, NaiveTime)>,
}

impl Session {
    pub fn new(mut spans: Vec<(NaiveTime, NaiveTime)>) -> Self {
        spans.sort_by_key(|(open, _)| *open);
        Self { spans }
    }

    /// Mainland-China equity session: 09:30–11:30, 13:00–15:00.
    pub fn cn_equity() -> Self {
        Self::new(vec![
            (
                NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            ),
            (
                NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            ),
        ])
    }

    /// Session close (end of the last span).
    pub fn close(&self) -> NaiveTime {
        self.spans.last().map(|(_, close)| *close).unwrap()
    }

    /// The session-aligned bucket close a timestamp belongs to, or `None`
    /// if it falls outside every span. A bar stamped exactly at a span
    /// open (auction print) joins the first bucket of that span.
    fn bucket_end(&self, t: NaiveTime, minutes: u32) -> Option<NaiveTime> {
        let bucket_secs = i64::from(minutes) * 60;
        for &(open, close) in &self.spans {
            if t >= open && t <= close {
                let secs = t.signed_duration_since(open).num_seconds();
                let k = ((secs + bucket_secs - 1) / bucket_secs).max(1);
                let end = open + Duration::seconds(k * bucket_secs);
                return Some(if end > close { close } else { end });
            }
        }
        None
    }
}

/// Aggregates finer bars into a target frequency, session-aware.
#[derive(Debug, Clone)]
pub struct BarResampler {
    target: Frequency,
    session: Session,
}

impl BarResampler {
    pub fn new(target: Frequency, session: Session) -> Self {
        Self { target, session }
    }

    /// Resample an ordered, deduplicated bar stream into the target
    /// frequency. Validates the stream first.
    pub fn resample(&self, bars: &[Bar]) -> Result<Vec<Bar>, BarStreamError> {
        let bars = validate_bars(bars)?;
        let mut out: Vec<Bar> = Vec::new();
        let mut current_key: Option<chrono::NaiveDateTime> = None;

        for bar in &bars {
            let key = match self.target.minutes() {
                Some(minutes) => match self.session.bucket_end(bar.ts.time(), minutes) {
                    Some(end) => bar.ts.date().and_time(end),
                    None => continue, // out-of-session bar
                },
                // Daily: one bucket per trading date, stamped at session close.
                None => bar.ts.date().and_time(self.session.close()),
            };

            if current_key == Some(key) {
                let agg = out.last_mut().unwrap();
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                agg.turnover += bar.turnover;
            } else {
                out.push(Bar {
                    symbol: bar.symbol.clone(),
                    ts: key,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    turnover: bar.turnover,
                });
                current_key = Some(key);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn minute_bar(h: u32, m: u32, close: f64, volume: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        Bar {
            symbol: "600000".into(),
            ts,
            open: close - 0.1,
            high: close + 0.2,
            low: close - 0.2,
            close,
            volume,
            turnover: close * volume,
        }
    }

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn validate_drops_duplicates_keeps_first() {
        let mut a = minute_bar(9, 31, 10.0, 100.0);
        a.close = 10.0;
        let mut b = minute_bar(9, 31, 11.0, 200.0);
        b.close = 11.0;
        let c = minute_bar(9, 32, 12.0, 300.0);
        let out = validate_bars(&[a, b, c]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].close, 10.0);
    }

    #[test]
    fn validate_rejects_backwards_timestamp() {
        let bars = vec![minute_bar(9, 35, 10.0, 100.0), minute_bar(9, 31, 9.0, 100.0)];
        let err = validate_bars(&bars).unwrap_err();
        assert!(matches!(err, BarStreamError::NonMonotonic { .. }));
    }

    #[test]
    fn resample_1m_to_15m_buckets_at_session_aligned_close() {
        let bars: Vec<Bar> = (1..=20)
            .map(|m| minute_bar(9, 30 + m, 10.0 + m as f64 * 0.01, 100.0))
            .collect();
        let resampler = BarResampler::new(Frequency::Min15, Session::cn_equity());
        let out = resampler.resample(&bars).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ts, ts(9, 45));
        assert_eq!(out[1].ts, ts(10, 0));
        // First bucket aggregates minutes 09:31..=09:45
        assert_eq!(out[0].volume, 1500.0);
        assert_eq!(out[0].open, bars[0].open);
        assert_eq!(out[0].close, bars[14].close);
    }

    #[test]
    fn resample_drops_out_of_session_bars() {
        let bars = vec![
            minute_bar(9, 31, 10.0, 100.0),
            minute_bar(12, 15, 99.0, 100.0), // lunch break
            minute_bar(13, 1, 10.2, 100.0),
        ];
        let resampler = BarResampler::new(Frequency::Min15, Session::cn_equity());
        let out = resampler.resample(&bars).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ts, ts(9, 45));
        assert_eq!(out[1].ts, ts(13, 15));
    }

    #[test]
    fn resample_auction_print_joins_first_bucket() {
        let bars = vec![minute_bar(9, 30, 10.0, 500.0), minute_bar(9, 31, 10.1, 100.0)];
        let resampler = BarResampler::new(Frequency::Min15, Session::cn_equity());
        let out = resampler.resample(&bars).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ts, ts(9, 45));
        assert_eq!(out[0].volume, 600.0);
    }

    #[test]
    fn resample_daily_stamps_session_close() {
        let mut bars = vec![minute_bar(9, 31, 10.0, 100.0), minute_bar(14, 59, 10.5, 100.0)];
        let mut next_day = minute_bar(9, 31, 11.0, 100.0);
        next_day.ts = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(9, 31, 0)
            .unwrap();
        bars.push(next_day);

        let resampler = BarResampler::new(Frequency::Day, Session::cn_equity());
        let out = resampler.resample(&bars).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ts, ts(15, 0));
        assert_eq!(out[0].close, 10.5);
        assert_eq!(out[0].volume, 200.0);
    }

    #[test]
    fn resample_tolerates_calendar_gaps() {
        // 09:31 then 10:31 — the gap emits no empty buckets.
        let bars = vec![minute_bar(9, 31, 10.0, 100.0), minute_bar(10, 31, 10.5, 100.0)];
        let resampler = BarResampler::new(Frequency::Min15, Session::cn_equity());
        let out = resampler.resample(&bars).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].ts, ts(10, 45));
    }
}
