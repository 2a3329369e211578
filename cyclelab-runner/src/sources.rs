//! Concrete collaborator backends: CSV bar import and an in-memory
//! cycle store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use cyclelab_core::collab::{BarSource, CycleStore, PersistError, SourceError};
use cyclelab_core::domain::{Bar, Cycle, Frequency};
use cyclelab_core::resample::validate_bars;

/// One CSV row of a bar file. The symbol comes from the file name, not
/// the row.
#[derive(Debug, Deserialize)]
struct BarRecord {
    ts: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    turnover: f64,
}

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reads bars from `<root>/<symbol>_<frequency>.csv` with columns
/// `ts,open,high,low,close,volume,turnover`.
pub struct CsvBarSource {
    root: PathBuf,
}

impl CsvBarSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn file_path(&self, symbol: &str, frequency: Frequency) -> PathBuf {
        self.root.join(format!("{symbol}_{}.csv", frequency.as_str()))
    }
}

impl BarSource for CsvBarSource {
    fn get_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<Vec<Bar>, SourceError> {
        let path = self.file_path(symbol, frequency);
        let mut reader = csv::Reader::from_path(&path).map_err(|e| match e.kind() {
            csv::ErrorKind::Io(_) => SourceError::Io(std::io::Error::other(e.to_string())),
            _ => SourceError::Malformed {
                symbol: symbol.to_string(),
                detail: e.to_string(),
            },
        })?;

        let mut bars = Vec::new();
        for record in reader.deserialize::<BarRecord>() {
            let record = record.map_err(|e| SourceError::Malformed {
                symbol: symbol.to_string(),
                detail: e.to_string(),
            })?;
            let ts = NaiveDateTime::parse_from_str(&record.ts, TS_FORMAT).map_err(|e| {
                SourceError::Malformed {
                    symbol: symbol.to_string(),
                    detail: format!("bad timestamp {:?}: {e}", record.ts),
                }
            })?;
            if ts < start || ts >= end {
                continue;
            }
            bars.push(Bar {
                symbol: symbol.to_string(),
                ts,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
                turnover: record.turnover,
            });
        }

        // Contract: ordered and deduplicated. Files are append-ordered, so
        // sort first and let validation collapse duplicate prints.
        bars.sort_by_key(|b| b.ts);
        let bars = validate_bars(&bars).map_err(|e| SourceError::Malformed {
            symbol: symbol.to_string(),
            detail: e.to_string(),
        })?;
        debug!(symbol, count = bars.len(), path = %path.display(), "bars loaded");
        Ok(bars)
    }
}

/// Mutex-guarded cycle store for tests and single-process runs. Appends
/// conflict on an existing (symbol, start_ts), driving the upsert path.
#[derive(Default)]
pub struct MemoryCycleStore {
    rows: Mutex<HashMap<String, Vec<Cycle>>>,
}

impl CycleStore for MemoryCycleStore {
    fn append_cycles(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows.entry(symbol.to_string()).or_default();
        if cycles
            .iter()
            .any(|c| existing.iter().any(|e| e.start_ts == c.start_ts))
        {
            return Err(PersistError::Conflict {
                symbol: symbol.to_string(),
            });
        }
        existing.extend_from_slice(cycles);
        existing.sort_by_key(|c| c.start_ts);
        Ok(())
    }

    fn replace_cycles(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError> {
        let mut sorted = cycles.to_vec();
        sorted.sort_by_key(|c| c.start_ts);
        self.rows
            .lock()
            .unwrap()
            .insert(symbol.to_string(), sorted);
        Ok(())
    }

    fn load_cycles(&self, symbol: &str) -> Result<Vec<Cycle>, PersistError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;

    use super::*;
    use cyclelab_core::collab::upsert_cycles;
    use cyclelab_core::domain::Direction;

    fn write_bar_file(dir: &std::path::Path, symbol: &str, rows: &[&str]) {
        let path = dir.join(format!("{symbol}_1m.csv"));
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(f, "ts,open,high,low,close,volume,turnover").unwrap();
        for row in rows {
            writeln!(f, "{row}").unwrap();
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn reads_and_filters_by_range() {
        let dir = tempfile::tempdir().unwrap();
        write_bar_file(
            dir.path(),
            "600000",
            &[
                "2024-03-01 09:31:00,10.0,10.1,9.9,10.05,1000,10050",
                "2024-03-01 09:32:00,10.05,10.2,10.0,10.1,1200,12120",
                "2024-03-02 09:31:00,10.1,10.3,10.0,10.2,900,9180",
            ],
        );
        let source = CsvBarSource::new(dir.path());
        let bars = source
            .get_bars("600000", at(0, 0), at(23, 59), Frequency::Min1)
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ts, at(9, 31));
        assert_eq!(bars[1].close, 10.1);
        assert_eq!(bars[0].symbol, "600000");
    }

    #[test]
    fn out_of_order_rows_are_sorted_and_duplicates_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        write_bar_file(
            dir.path(),
            "600000",
            &[
                "2024-03-01 09:32:00,10.05,10.2,10.0,10.1,1200,12120",
                "2024-03-01 09:31:00,10.0,10.1,9.9,10.05,1000,10050",
                "2024-03-01 09:31:00,99.0,99.0,99.0,99.0,1,99",
            ],
        );
        let source = CsvBarSource::new(dir.path());
        let bars = source
            .get_bars("600000", at(0, 0), at(23, 59), Frequency::Min1)
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 10.05); // first print kept
        assert!(bars[0].ts < bars[1].ts);
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_bar_file(
            dir.path(),
            "600000",
            &["not-a-date,10.0,10.1,9.9,10.05,1000,10050"],
        );
        let source = CsvBarSource::new(dir.path());
        let err = source
            .get_bars("600000", at(0, 0), at(23, 59), Frequency::Min1)
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvBarSource::new(dir.path());
        let err = source
            .get_bars("600000", at(0, 0), at(23, 59), Frequency::Min1)
            .unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[test]
    fn memory_cycle_store_upsert_roundtrip() {
        let store = MemoryCycleStore::default();
        let cycle = |id: u64, minute: u32| {
            Cycle::open(id, "600000", Direction::Up, at(9, minute), 10.0, 10.0)
        };
        upsert_cycles(&store, "600000", &[cycle(1, 31), cycle(2, 45)]).unwrap();
        // Overlapping re-run takes the conflict path and stays idempotent.
        upsert_cycles(&store, "600000", &[cycle(2, 45), cycle(3, 59)]).unwrap();
        let rows = store.load_cycles("600000").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.last().unwrap().id, 3);
    }
}
