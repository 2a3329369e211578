//! Dataset export — cycle rows and score records as CSV for external
//! training and analysis tools.
//!
//! Missing joinable features export as empty cells, never as 0.0; the
//! consumer decides how to treat gaps.

use std::path::Path;

use thiserror::Error;

use cyclelab_core::domain::ScoreRecord;
use cyclelab_core::stats::CycleRow;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

// ─── Cycle rows ──────────────────────────────────────────────────────

/// Columns: symbol, cycle_id, direction, start_ts, end_ts, start_price,
/// end_price, extreme_price, cycle_change, cycle_length, amplitude_per_bar,
/// volume_max_1, volume_max_5, prev_*, next_*, reversal_flag.
pub fn export_cycle_rows_csv(rows: &[CycleRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "cycle_id",
        "direction",
        "start_ts",
        "end_ts",
        "start_price",
        "end_price",
        "extreme_price",
        "cycle_change",
        "cycle_length",
        "amplitude_per_bar",
        "volume_max_1",
        "volume_max_5",
        "prev_cycle_change",
        "prev_cycle_length",
        "prev_volume_max_1",
        "prev_volume_max_5",
        "next_cycle_change",
        "next_cycle_length",
        "next_volume_max_1",
        "next_volume_max_5",
        "reversal_flag",
    ])?;

    for row in rows {
        let c = &row.cycle;
        wtr.write_record([
            c.symbol.clone(),
            c.id.to_string(),
            format!("{:?}", c.direction).to_lowercase(),
            c.start_ts.to_string(),
            c.end_ts.to_string(),
            format!("{:.6}", c.start_price),
            format!("{:.6}", c.end_price),
            format!("{:.6}", c.extreme_price),
            format!("{:.6}", c.amplitude_max),
            c.length_bars.to_string(),
            format!("{:.6}", row.amplitude_per_bar),
            opt_cell(row.volume_max_1),
            opt_cell(row.volume_max_5),
            opt_cell(row.prev_cycle_change),
            opt_cell(row.prev_cycle_length),
            opt_cell(row.prev_volume_max_1),
            opt_cell(row.prev_volume_max_5),
            opt_cell(row.next_cycle_change),
            opt_cell(row.next_cycle_length),
            opt_cell(row.next_volume_max_1),
            opt_cell(row.next_volume_max_5),
            c.reversal_flag.to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().expect("in-memory CSV writer");
    Ok(String::from_utf8(bytes).expect("CSV output is UTF-8"))
}

pub fn write_cycle_rows_csv(path: &Path, rows: &[CycleRow]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, export_cycle_rows_csv(rows)?)?;
    Ok(())
}

// ─── Score records ───────────────────────────────────────────────────

/// Columns: symbol, cycle_id, direction, then predicted/clamped/realized/
/// sub_score per metric, trend_score, reversal_flag, trade_action, skipped.
pub fn export_score_records_csv(records: &[ScoreRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "symbol".to_string(),
        "cycle_id".to_string(),
        "direction".to_string(),
    ];
    for metric in ["cycle_change", "cycle_length", "bar_change", "bar_volume"] {
        for part in ["predicted", "clamped", "realized", "sub_score"] {
            header.push(format!("{metric}_{part}"));
        }
    }
    header.extend(
        ["trend_score", "reversal_flag", "trade_action", "skipped"]
            .map(str::to_string),
    );
    wtr.write_record(&header)?;

    for record in records {
        let mut fields = vec![
            record.symbol.clone(),
            record.cycle_id.to_string(),
            format!("{:?}", record.direction).to_lowercase(),
        ];
        for outcome in [
            &record.cycle_change,
            &record.cycle_length,
            &record.bar_change,
            &record.bar_volume,
        ] {
            match outcome {
                Some(o) => {
                    fields.push(format!("{:.6}", o.predicted));
                    fields.push(format!("{:.6}", o.clamped));
                    fields.push(format!("{:.6}", o.realized));
                    fields.push(format!("{:.6}", o.sub_score));
                }
                None => fields.extend([String::new(), String::new(), String::new(), String::new()]),
            }
        }
        fields.push(format!("{:.2}", record.trend_score));
        fields.push(record.reversal_flag.to_string());
        fields.push(format!("{:?}", record.trade_action).to_lowercase());
        fields.push(record.skipped.to_string());
        wtr.write_record(&fields)?;
    }

    let bytes = wtr.into_inner().expect("in-memory CSV writer");
    Ok(String::from_utf8(bytes).expect("CSV output is UTF-8"))
}

pub fn write_score_records_csv(path: &Path, records: &[ScoreRecord]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, export_score_records_csv(records)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use cyclelab_core::domain::{Cycle, Direction, MetricOutcome, TradeAction};
    use cyclelab_core::stats::{CycleStatsTracker, LagMode, StatsConfig};

    fn sample_rows() -> Vec<CycleRow> {
        let base = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 45, 0)
            .unwrap();
        let mut c1 = Cycle::open(1, "600000", Direction::Up, base, 10.0, 10.1);
        c1.extend(base + chrono::Duration::minutes(15), 10.4, 10.5, 10.3);
        c1.seal();
        let mut c2 = Cycle::open(
            2,
            "600000",
            Direction::Down,
            base + chrono::Duration::minutes(30),
            10.4,
            10.3,
        );
        c2.extend(base + chrono::Duration::minutes(45), 10.1, 10.2, 10.0);
        c2.seal();
        // A third open cycle keeps the tracker honest about filtering.
        let open = Cycle::open(
            3,
            "600000",
            Direction::Up,
            base + chrono::Duration::minutes(60),
            10.1,
            10.2,
        );
        CycleStatsTracker::new(StatsConfig::default()).build_rows(
            &[c1, c2, open],
            &[],
            &[],
            LagMode::Backfill,
        )
    }

    #[test]
    fn cycle_rows_csv_shape_and_gaps() {
        let rows = sample_rows();
        let csv = export_cycle_rows_csv(&rows).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("symbol,cycle_id,direction"));
        assert_eq!(lines.clone().count(), rows.len());

        // No finer bars were supplied, so volume cells are empty, not 0.
        let first = lines.next().unwrap();
        assert!(first.contains(",,"));
        assert!(first.starts_with("600000,1,up"));
    }

    #[test]
    fn score_records_csv_handles_skip_and_outcomes() {
        let scored = ScoreRecord {
            symbol: "600000".into(),
            cycle_id: 7,
            direction: Direction::Down,
            cycle_change: Some(MetricOutcome {
                predicted: -0.08,
                clamped: -0.07,
                realized: -0.11,
                sub_score: -1.3,
            }),
            cycle_length: None,
            bar_change: None,
            bar_volume: None,
            trend_score: -1.3,
            reversal_flag: true,
            trade_action: TradeAction::None,
            skipped: false,
        };
        let skipped = ScoreRecord::skipped("600000", 8, Direction::Up);

        let csv = export_score_records_csv(&[scored, skipped]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("cycle_change_predicted"));
        assert!(lines[1].starts_with("600000,7,down,-0.080000,-0.070000,-0.110000"));
        assert!(lines[1].ends_with("-1.30,true,none,false"));
        assert!(lines[2].ends_with("0.00,false,none,true"));
    }
}
