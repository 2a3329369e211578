//! The per-symbol training pipeline: raw bars in, labeled feature windows
//! and committed normalization bounds out.
//!
//! One parameterized pipeline covers both fitting modes; there is no
//! separate class per mode. Bounds are committed only after the symbol's
//! entire cycle batch is computed.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info};

use cyclelab_core::collab::{upsert_cycles, BarSource, CycleStore, PersistError, SourceError};
use cyclelab_core::domain::{FeatureField, FeatureMatrix, IndicatorBar};
use cyclelab_core::indicators::enrich_bars;
use cyclelab_core::normalize::{
    BatchMeta, Bound, Epoch, NormalizationStore, ParamDocument, StoreError,
};
use cyclelab_core::resample::{BarResampler, BarStreamError, Session};
use cyclelab_core::signal::{SignalEngine, SignalRule};
use cyclelab_core::stats::{CycleRow, CycleStatsTracker, LagMode};
use cyclelab_core::window::FeatureWindowBuilder;

use crate::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Stream(#[from] BarStreamError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Params(#[from] StoreError),
    #[error("no bars for {symbol} in the requested range")]
    NoBars { symbol: String },
}

/// Where the normalization bounds come from.
///
/// `FitFromRaw` fits them from this batch's rows. `FitFromStoredCycles`
/// refits from the full stored cycle history, so a short incremental
/// batch does not fit bounds on a handful of cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    FitFromRaw,
    FitFromStoredCycles,
}

/// One feature window plus its training label (the next cycle's change;
/// `None` for the trailing row, which has nothing to predict yet).
#[derive(Debug, Clone)]
pub struct LabeledWindow {
    pub cycle_id: u64,
    pub matrix: FeatureMatrix,
    pub label: Option<f64>,
}

/// Everything one symbol's batch produced.
#[derive(Debug, Clone)]
pub struct SymbolDataset {
    pub symbol: String,
    pub epoch: Epoch,
    pub rows: Vec<CycleRow>,
    pub windows: Vec<LabeledWindow>,
    pub document: ParamDocument,
}

pub struct TrainingPipeline {
    config: PipelineConfig,
    bars: Arc<dyn BarSource>,
    cycles: Arc<dyn CycleStore>,
    params: NormalizationStore,
    rule: Arc<dyn SignalRule>,
}

impl TrainingPipeline {
    pub fn new(
        config: PipelineConfig,
        bars: Arc<dyn BarSource>,
        cycles: Arc<dyn CycleStore>,
        params: NormalizationStore,
        rule: Arc<dyn SignalRule>,
    ) -> Self {
        Self {
            config,
            bars,
            cycles,
            params,
            rule,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full training pipeline for one symbol over [start, end).
    pub fn run_symbol(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        mode: PipelineMode,
    ) -> Result<SymbolDataset, PipelineError> {
        let finer = self
            .bars
            .get_bars(symbol, start, end, self.config.finer_frequency)?;
        if finer.is_empty() {
            return Err(PipelineError::NoBars {
                symbol: symbol.to_string(),
            });
        }

        let resampler = BarResampler::new(self.config.cycle_frequency, Session::cn_equity());
        let cycle_bars = resampler.resample(&finer)?;
        let enriched = enrich_bars(&cycle_bars, &self.config.indicator_config());

        let engine = SignalEngine::new(self.rule.clone(), self.config.signal_config());
        let seg = engine.segment(&enriched);

        let tracker = CycleStatsTracker::new(self.config.stats_config());
        let rows = tracker.build_rows(&seg.cycles, &enriched, &finer, LagMode::Backfill);
        debug!(
            symbol,
            cycles = seg.cycles.len(),
            completed = rows.len(),
            "segmentation done"
        );

        upsert_cycles(self.cycles.as_ref(), symbol, seg.completed_cycles())?;

        // Commit all bounds of the batch in one document write, stamped
        // with resume bookkeeping. A stream that was entirely
        // out-of-session resamples to nothing.
        let Some(last_bar) = cycle_bars.last() else {
            return Err(PipelineError::NoBars {
                symbol: symbol.to_string(),
            });
        };
        let last_date = last_bar.ts.date();
        let epoch = Epoch::from_date(last_date);
        let fit_rows = match mode {
            PipelineMode::FitFromRaw => rows.clone(),
            PipelineMode::FitFromStoredCycles => {
                let stored = self.cycles.load_cycles(symbol)?;
                tracker.build_rows(&stored, &enriched, &finer, LagMode::Backfill)
            }
        };
        let mut raw_bounds = self.fit_bounds(&fit_rows);
        raw_bounds.extend(self.fit_bar_bounds(&enriched));
        let meta = BatchMeta {
            record_end_date: Some(last_date),
            record_end_signal: seg.open_cycle().map(|c| c.direction),
            record_end_signal_times: seg.open_cycle().map(|c| c.length_bars),
            next_start_date: Some(last_date + Duration::days(1)),
        };
        let document = self.params.commit_batch(symbol, epoch, &raw_bounds, meta)?;

        let windows = self.build_windows(symbol, epoch, &rows)?;
        info!(
            symbol,
            epoch = %epoch,
            rows = rows.len(),
            windows = windows.len(),
            "symbol batch complete"
        );

        Ok(SymbolDataset {
            symbol: symbol.to_string(),
            epoch,
            rows,
            windows,
            document,
        })
    }

    fn fit_bounds(&self, rows: &[CycleRow]) -> Vec<(FeatureField, Bound)> {
        let mut bounds = Vec::new();
        for &field in FeatureField::WINDOW_COLUMNS {
            let values: Vec<f64> = rows.iter().filter_map(|r| r.feature(field)).collect();
            if let Some(bound) = self.params.fit(&values) {
                bounds.push((field, bound));
            }
        }
        bounds
    }

    /// Bar-level bounds come from the full bar set, not the cycle rows.
    fn fit_bar_bounds(&self, bars: &[IndicatorBar]) -> Vec<(FeatureField, Bound)> {
        let changes: Vec<f64> = bars
            .windows(2)
            .filter(|w| w[0].close() != 0.0)
            .map(|w| w[1].close() / w[0].close() - 1.0)
            .collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.bar.volume).collect();

        let mut bounds = Vec::new();
        if let Some(bound) = self.params.fit(&changes) {
            bounds.push((FeatureField::BarChange, bound));
        }
        if let Some(bound) = self.params.fit(&volumes) {
            bounds.push((FeatureField::BarVolume, bound));
        }
        bounds
    }

    /// Normalize each row against the committed bounds and assemble one
    /// trailing window per cycle. Cycles whose rows all carry gaps are
    /// skipped.
    fn build_windows(
        &self,
        symbol: &str,
        epoch: Epoch,
        rows: &[CycleRow],
    ) -> Result<Vec<LabeledWindow>, PipelineError> {
        let mut bounds = Vec::with_capacity(FeatureField::WINDOW_COLUMNS.len());
        for &field in FeatureField::WINDOW_COLUMNS {
            bounds.push(self.params.bound_for(symbol, field, epoch)?);
        }

        let normalized: Vec<Vec<Option<f64>>> = rows
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
        let height = self.config.window_config().height;
        let mut windows = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let lookback_start = (i + 1).saturating_sub(height);
            let trailing = &normalized[lookback_start..=i];
            if let Some(matrix) = builder.build(trailing, row.direction().sign()) {
                windows.push(LabeledWindow {
                    cycle_id: row.cycle.id,
                    matrix,
                    label: row.next_cycle_change,
                });
            }
        }
        Ok(windows)
    }
}
