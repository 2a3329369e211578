//! End-to-end flow through the core engine: raw minute bars in, scored
//! cycles out. Exercises the stage seams the unit tests cannot.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use cyclelab_core::domain::{Bar, FeatureField, Frequency, TradeAction};
use cyclelab_core::indicators::{enrich_bars, IndicatorConfig};
use cyclelab_core::normalize::{Epoch, MemoryParamStore, NormalizationStore, DEFAULT_CLIP_K};
use cyclelab_core::resample::{BarResampler, Session};
use cyclelab_core::scoring::{CycleOutcome, RegimeTable, ScoreMetric, ScoringConfig, ScoringEngine};
use cyclelab_core::signal::{MacdDirectionRule, SignalConfig, SignalEngine};
use cyclelab_core::stats::{CycleStatsTracker, LagMode, StatsConfig};
use cyclelab_core::window::{FeatureWindowBuilder, WindowConfig};

fn session_open(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

/// Minute bars covering both sessions of several trading days, with an
/// oscillating close so the MACD rule produces multiple cycles.
fn minute_bars(days: u32) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut i = 0u64;
    for day in 1..=days {
        let open = session_open(day);
        // 09:30-11:30 and 13:00-15:00, one bar per minute stamped at close.
        let afternoon = open + Duration::minutes(210);
        let minutes = (1..=120)
            .map(|m| open + Duration::minutes(m))
            .chain((1..=120).map(|m| afternoon + Duration::minutes(m)));
        for ts in minutes {
            let close = 10.0 + (i as f64 * 0.02).sin() * 1.5;
            bars.push(Bar {
                symbol: "600000".to_string(),
                ts,
                open: close - 0.01,
                high: close + 0.05,
                low: close - 0.05,
                close,
                volume: 50_000.0 + (i % 97) as f64 * 1_000.0,
                turnover: close * 50_000.0,
            });
            i += 1;
        }
    }
    bars
}

#[test]
fn minute_bars_to_scored_cycles() {
    let minute = minute_bars(10);

    // Resample to 15m; bucket count is fixed by the session calendar.
    let resampler = BarResampler::new(Frequency::Min15, Session::cn_equity());
    let bars_15m = resampler.resample(&minute).unwrap();
    assert_eq!(bars_15m.len(), 10 * 16);

    let enriched = enrich_bars(&bars_15m, &IndicatorConfig::default());
    assert_eq!(enriched.len(), bars_15m.len());

    let engine = SignalEngine::new(Arc::new(MacdDirectionRule), SignalConfig::default());
    let seg = engine.segment(&enriched);
    assert!(
        seg.completed_cycles().len() >= 2,
        "oscillating closes must produce several completed cycles"
    );

    let tracker = CycleStatsTracker::new(StatsConfig::default());
    let rows = tracker.build_rows(&seg.cycles, &enriched, &minute, LagMode::Backfill);
    assert_eq!(rows.len(), seg.completed_cycles().len());

    // The finer stream covers every cycle, so the volume join never gaps.
    for row in &rows {
        assert!(row.volume_max_1.is_some());
        assert!(row.volume_max_5.is_some());
        assert!(row.volume_max_1 >= row.volume_max_5);
    }
    // Backfill gives every row but the last its next-cycle features.
    for row in &rows[..rows.len() - 1] {
        assert!(row.next_cycle_change.is_some());
    }
    assert!(rows.last().unwrap().next_cycle_change.is_none());

    // Fit bounds per feature over the batch, normalize, and build windows.
    let ns = NormalizationStore::new(Arc::new(MemoryParamStore::default()), DEFAULT_CLIP_K);
    let epoch = Epoch::new(2024, 3);
    let mut raw_bounds = Vec::new();
    for &field in FeatureField::WINDOW_COLUMNS {
        let values: Vec<f64> = rows.iter().filter_map(|r| r.feature(field)).collect();
        if let Some(bound) = ns.fit(&values) {
            raw_bounds.push((field, bound));
        }
    }
    ns.commit_batch("600000", epoch, &raw_bounds, Default::default())
        .unwrap();

    let builder = FeatureWindowBuilder::new(WindowConfig::default());
    let mut matrices = 0usize;
    for row in &rows {
        let normalized: Vec<Option<f64>> = FeatureField::WINDOW_COLUMNS
            .iter()
            .map(|&field| {
                let raw = row.feature(field)?;
                let bound = ns.bound_for("600000", field, epoch).unwrap()?;
                Some(bound.apply(raw))
            })
            .collect();
        if let Some(m) = builder.build(&[normalized], row.direction().sign()) {
            assert_eq!((m.height, m.width), (30, 30));
            matrices += 1;
        }
    }
    assert!(matrices > 0, "at least the gap-free rows must window");

    // Score each completed cycle against the fitted regime table, using
    // the realized stats as their own (perfect) predictions.
    let table = RegimeTable::fit(&rows, &[], &[]);
    let scorer = ScoringEngine::new(table.clone(), ScoringConfig::default());
    for row in &rows {
        let direction = row.direction();
        assert!(table.get(direction, ScoreMetric::CycleChange).is_some());
        let outcome = CycleOutcome {
            cycle_change: Some((row.cycle.amplitude_max, row.cycle.amplitude_max)),
            cycle_length: Some((
                row.cycle.length_bars as f64,
                row.cycle.length_bars as f64,
            )),
            ..Default::default()
        };
        let record = scorer.score_cycle("600000", row.cycle.id, direction, false, &outcome);
        assert!(!record.skipped);
        assert!(record.trend_score.abs() <= 4.0 + 1e-9);
        // Two mid-distribution metrics can never breach the 5.5 trigger.
        assert_eq!(record.trade_action, TradeAction::None);
    }
}

#[test]
fn live_mode_forward_fills_next_features() {
    let minute = minute_bars(10);
    let resampler = BarResampler::new(Frequency::Min15, Session::cn_equity());
    let bars_15m = resampler.resample(&minute).unwrap();
    let enriched = enrich_bars(&bars_15m, &IndicatorConfig::default());
    let engine = SignalEngine::new(Arc::new(MacdDirectionRule), SignalConfig::default());
    let seg = engine.segment(&enriched);

    let tracker = CycleStatsTracker::new(StatsConfig::default());
    let backfill = tracker.build_rows(&seg.cycles, &enriched, &minute, LagMode::Backfill);
    let live = tracker.build_rows(&seg.cycles, &enriched, &minute, LagMode::Live);
    assert_eq!(backfill.len(), live.len());

    // Live never looks ahead: the trailing row carries its predecessor's
    // next-cycle features instead of the actually-following cycle's.
    let last = live.last().unwrap();
    let prev = &live[live.len() - 2];
    assert_eq!(last.next_cycle_change, prev.next_cycle_change);
}
