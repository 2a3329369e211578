//! Live scoring tick: score every symbol's open cycle against the model
//! prediction and the fitted regime statistics.
//!
//! Runs sequentially per symbol; a tick is latency-bound on the predictor,
//! not CPU-bound. Uses `LagMode::Live`, so no feature ever reads data that
//! had not been observed at tick time.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{error, info};

use cyclelab_core::collab::{BarSource, PredictError, Predictor};
use cyclelab_core::domain::{Direction, FeatureField, ScoreRecord};
use cyclelab_core::indicators::enrich_bars;
use cyclelab_core::normalize::{Epoch, NormalizationStore};
use cyclelab_core::resample::{BarResampler, Session};
use cyclelab_core::signal::{SignalEngine, SignalRule};
use cyclelab_core::stats::{CycleRow, CycleStatsTracker, LagMode};
use cyclelab_core::scoring::{CycleOutcome, RegimeTable, ScoreMetric, ScoringEngine};
use cyclelab_core::window::FeatureWindowBuilder;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineError;

/// What one tick produced.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub records: Vec<ScoreRecord>,
    /// Symbols whose tick failed, with the reason. A predictor outage is
    /// NOT a failure; it yields a skipped record.
    pub failed: Vec<(String, String)>,
}

pub struct LiveScorer {
    config: PipelineConfig,
    bars: Arc<dyn BarSource>,
    params: NormalizationStore,
    rule: Arc<dyn SignalRule>,
    predictor: Arc<dyn Predictor>,
}

impl LiveScorer {
    pub fn new(
        config: PipelineConfig,
        bars: Arc<dyn BarSource>,
        params: NormalizationStore,
        rule: Arc<dyn SignalRule>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            config,
            bars,
            params,
            rule,
            predictor,
        }
    }

    /// Score every symbol's open cycle as of `now`, using bars from
    /// [start, now). Symbols with no open cycle produce no record.
    pub fn tick(&self, start: NaiveDateTime, now: NaiveDateTime) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        for symbol in &self.config.universe {
            match self.tick_symbol(symbol, start, now) {
                Ok(Some(record)) => outcome.records.push(record),
                Ok(None) => {}
                Err(e) => {
                    error!(symbol, error = %e, "live tick failed for symbol");
                    outcome.failed.push((symbol.clone(), e.to_string()));
                }
            }
        }
        info!(
            records = outcome.records.len(),
            failed = outcome.failed.len(),
            "live tick done"
        );
        outcome
    }

    fn tick_symbol(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Option<ScoreRecord>, PipelineError> {
        let finer = self
            .bars
            .get_bars(symbol, start, now, self.config.finer_frequency)?;
        if finer.is_empty() {
            return Ok(None);
        }

        let resampler = BarResampler::new(self.config.cycle_frequency, Session::cn_equity());
        let cycle_bars = resampler.resample(&finer)?;
        let enriched = enrich_bars(&cycle_bars, &self.config.indicator_config());
        let engine = SignalEngine::new(self.rule.clone(), self.config.signal_config());
        let seg = engine.segment(&enriched);

        let Some(open) = seg.open_cycle() else {
            return Ok(None);
        };

        let tracker = CycleStatsTracker::new(self.config.stats_config());
        let rows = tracker.build_rows(&seg.cycles, &enriched, &finer, LagMode::Live);
        if rows.is_empty() {
            return Ok(None);
        }

        let epoch = Epoch::from_date(now.date());
        let Some(matrix) = self.open_cycle_window(symbol, epoch, &rows, open.direction)? else {
            return Ok(None);
        };

        // Bar-level regime series come from the already-segmented stream.
        let mut bar_changes = Vec::new();
        let mut bar_volumes = Vec::new();
        for (i, direction) in seg.directions.iter().enumerate() {
            let Some(direction) = *direction else { continue };
            if i > 0 {
                let prev_close = enriched[i - 1].close();
                if prev_close != 0.0 {
                    bar_changes.push((direction, enriched[i].close() / prev_close - 1.0));
                }
            }
            bar_volumes.push((direction, enriched[i].bar.volume));
        }
        let table = RegimeTable::fit(&rows, &bar_changes, &bar_volumes);
        let scorer = ScoringEngine::new(table.clone(), self.config.scoring_config());

        let predicted_change = match self.predictor.predict(&self.config.model_name, &matrix) {
            Ok(value) => value,
            Err(PredictError::Unavailable(_)) => {
                return Ok(Some(scorer.skip_cycle(symbol, open.id, open.direction)));
            }
            Err(PredictError::BadInput(detail)) => {
                return Err(PipelineError::Source(
                    cyclelab_core::collab::SourceError::Malformed {
                        symbol: symbol.to_string(),
                        detail,
                    },
                ));
            }
        };

        // The model predicts the cycle change; the remaining metrics are
        // measured against their regime expectation.
        let expectation = |metric: ScoreMetric| {
            table.get(open.direction, metric).map(|s| s.mean)
        };
        let Some(last_bar) = enriched.last() else {
            return Ok(None);
        };
        let last_change = if enriched.len() >= 2 {
            let prev_close = enriched[enriched.len() - 2].close();
            (prev_close != 0.0).then(|| last_bar.close() / prev_close - 1.0)
        } else {
            None
        };
        let outcome = CycleOutcome {
            cycle_change: Some((predicted_change, open.amplitude_max)),
            cycle_length: expectation(ScoreMetric::CycleLength)
                .map(|p| (p, open.length_bars as f64)),
            bar_change: expectation(ScoreMetric::BarChange).zip(last_change),
            bar_volume: expectation(ScoreMetric::BarVolume)
                .map(|p| (p, last_bar.bar.volume)),
        };

        Ok(Some(scorer.score_cycle(
            symbol,
            open.id,
            open.direction,
            open.reversal_flag,
            &outcome,
        )))
    }

    /// Normalize the live rows and window the trailing lookback for the
    /// open cycle.
    fn open_cycle_window(
        &self,
        symbol: &str,
        epoch: Epoch,
        rows: &[CycleRow],
        direction: Direction,
    ) -> Result<Option<cyclelab_core::domain::FeatureMatrix>, PipelineError> {
        let mut bounds = Vec::with_capacity(FeatureField::WINDOW_COLUMNS.len());
        for &field in FeatureField::WINDOW_COLUMNS {
            bounds.push(self.params.bound_for(symbol, field, epoch)?);
        }
        let height = self.config.window_config().height;
        let start = rows.len().saturating_sub(height);
        let normalized: Vec<Vec<Option<f64>>> = rows[start..]
            .iter()
            .map(|row| {
                FeatureField::WINDOW_COLUMNS
                    .iter()
                    .zip(&bounds)
                    .map(|(&field, bound)| Some(bound.as_ref()?.apply(row.feature(field)?)))
                    .collect()
            })
            .collect();
        let builder = FeatureWindowBuilder::new(self.config.window_config());
        Ok(builder.build(&normalized, direction.sign()))
    }
}
