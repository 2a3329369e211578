//! Cycle statistics — derived per-cycle features and lag/lead joins.
//!
//! Runs over *completed* cycles only. Volume extrema come from a
//! time-range join into a finer-grained bar stream; an empty window is a
//! data gap and yields `None`, never zero.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Bar, Cycle, Direction, FeatureField, IndicatorBar};

/// Parameters for derived-statistics computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// How many trailing bars of a sealed cycle feed the volume join.
    pub lag_window_bars: usize,
    /// Lookback into the finer bar stream, in minutes.
    pub volume_lookback_minutes: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            lag_window_bars: 35,
            volume_lookback_minutes: 15,
        }
    }
}

/// Whether next-cycle features may come from the actually-following cycle.
///
/// `Backfill` is batch mode: the following completed cycle is observed
/// history. `Live` forward-fills instead of touching not-yet-observed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagMode {
    Backfill,
    Live,
}

/// One completed cycle with its derived statistics. Immutable once built,
/// except that `next_*` may be attached by a later batch (backfill).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRow {
    pub cycle: Cycle,
    pub amplitude_per_bar: f64,
    pub volume_max_1: Option<f64>,
    pub volume_max_5: Option<f64>,
    pub prev_cycle_change: Option<f64>,
    pub prev_cycle_length: Option<f64>,
    pub prev_volume_max_1: Option<f64>,
    pub prev_volume_max_5: Option<f64>,
    pub next_cycle_change: Option<f64>,
    pub next_cycle_length: Option<f64>,
    pub next_volume_max_1: Option<f64>,
    pub next_volume_max_5: Option<f64>,
}

impl CycleRow {
    fn from_cycle(cycle: &Cycle) -> Self {
        Self {
            cycle: cycle.clone(),
            amplitude_per_bar: cycle.amplitude_per_bar(),
            volume_max_1: None,
            volume_max_5: None,
            prev_cycle_change: None,
            prev_cycle_length: None,
            prev_volume_max_1: None,
            prev_volume_max_5: None,
            next_cycle_change: None,
            next_cycle_length: None,
            next_volume_max_1: None,
            next_volume_max_5: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.cycle.direction
    }

    /// Raw (un-normalized) value of a feature field for this row.
    /// Bar-level fields are not cycle-row columns and return `None`.
    pub fn feature(&self, field: FeatureField) -> Option<f64> {
        match field {
            FeatureField::CycleChange => Some(self.cycle.amplitude_max),
            FeatureField::CycleLength => Some(self.cycle.length_bars as f64),
            FeatureField::AmplitudePerBar => Some(self.amplitude_per_bar),
            FeatureField::VolumeMax1 => self.volume_max_1,
            FeatureField::VolumeMax5 => self.volume_max_5,
            FeatureField::PrevCycleChange => self.prev_cycle_change,
            FeatureField::PrevCycleLength => self.prev_cycle_length,
            FeatureField::PrevVolumeMax1 => self.prev_volume_max_1,
            FeatureField::PrevVolumeMax5 => self.prev_volume_max_5,
            FeatureField::NextCycleChange => self.next_cycle_change,
            FeatureField::NextCycleLength => self.next_cycle_length,
            FeatureField::NextVolumeMax1 => self.next_volume_max_1,
            FeatureField::NextVolumeMax5 => self.next_volume_max_5,
            FeatureField::Signal => Some(self.cycle.direction.sign()),
            FeatureField::BarChange | FeatureField::BarVolume => None,
        }
    }
}

/// Finalizes completed cycles into feature rows.
#[derive(Debug, Clone, Default)]
pub struct CycleStatsTracker {
    config: StatsConfig,
}

impl CycleStatsTracker {
    pub fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    /// Build one row per completed, deduplicated cycle.
    ///
    /// `cycle_bars` is the bar stream the cycles were segmented from;
    /// `finer_bars` is the finer-grained stream for the volume join
    /// (sorted by timestamp). Open cycles in the input are skipped.
    pub fn build_rows(
        &self,
        cycles: &[Cycle],
        cycle_bars: &[IndicatorBar],
        finer_bars: &[Bar],
        mode: LagMode,
    ) -> Vec<CycleRow> {
        let mut rows: Vec<CycleRow> = Vec::new();
        let mut last_id: Option<u64> = None;

        for cycle in cycles {
            if !cycle.completed {
                continue;
            }
            if last_id == Some(cycle.id) {
                debug!(symbol = %cycle.symbol, id = cycle.id, "duplicate cycle dropped");
                continue;
            }
            last_id = Some(cycle.id);

            let mut row = CycleRow::from_cycle(cycle);
            let (top1, top5) = self.volume_extrema(cycle, cycle_bars, finer_bars);
            row.volume_max_1 = top1;
            row.volume_max_5 = top5;
            rows.push(row);
        }

        self.attach_lag_lead(&mut rows, mode);
        rows
    }

    /// Cycle-level volume extrema via time-range join.
    ///
    /// For each of the trailing `lag_window_bars` bars of the sealed cycle,
    /// look back exactly `volume_lookback_minutes` into the finer stream
    /// over `(bar_ts - lookback, bar_ts]`; per bar take the max volume and
    /// the mean of the top-5 volumes. Cycle value is the max over bars.
    /// Windows with no finer bars contribute nothing; all-empty is a data
    /// gap (`None`).
    fn volume_extrema(
        &self,
        cycle: &Cycle,
        cycle_bars: &[IndicatorBar],
        finer_bars: &[Bar],
    ) -> (Option<f64>, Option<f64>) {
        let in_cycle: Vec<&IndicatorBar> = cycle_bars
            .iter()
            .filter(|b| b.ts() >= cycle.start_ts && b.ts() <= cycle.end_ts)
            .collect();
        let trailing = in_cycle
            .iter()
            .rev()
            .take(self.config.lag_window_bars)
            .copied();

        let lookback = Duration::minutes(self.config.volume_lookback_minutes);
        let mut best_top1: Option<f64> = None;
        let mut best_top5: Option<f64> = None;

        for bar in trailing {
            let window_start = bar.ts() - lookback;
            // finer_bars is sorted; slice out (window_start, bar_ts].
            let lo = finer_bars.partition_point(|b| b.ts <= window_start);
            let hi = finer_bars.partition_point(|b| b.ts <= bar.ts());
            if lo == hi {
                continue; // data gap for this bar
            }

            let mut volumes: Vec<f64> = finer_bars[lo..hi].iter().map(|b| b.volume).collect();
            volumes.sort_by(|a, b| b.total_cmp(a));
            let top1 = volumes[0];
            let top_n = volumes.len().min(5);
            let top5 = volumes[..top_n].iter().sum::<f64>() / top_n as f64;

            best_top1 = Some(best_top1.map_or(top1, |v: f64| v.max(top1)));
            best_top5 = Some(best_top5.map_or(top5, |v: f64| v.max(top5)));
        }

        (best_top1, best_top5)
    }

    /// Attach previous-cycle and next-cycle values. In `Live` mode the
    /// next-cycle fields of the trailing rows are forward-filled from the
    /// last known value instead of read from unobserved cycles.
    fn attach_lag_lead(&self, rows: &mut [CycleRow], mode: LagMode) {
        let snapshot: Vec<(f64, f64, Option<f64>, Option<f64>)> = rows
            .iter()
            .map(|r| {
                (
                    r.cycle.amplitude_max,
                    r.cycle.length_bars as f64,
                    r.volume_max_1,
                    r.volume_max_5,
                )
            })
            .collect();

        for i in 0..rows.len() {
            if i > 0 {
                let (change, length, v1, v5) = snapshot[i - 1];
                rows[i].prev_cycle_change = Some(change);
                rows[i].prev_cycle_length = Some(length);
                rows[i].prev_volume_max_1 = v1;
                rows[i].prev_volume_max_5 = v5;
            }
            if i + 1 < rows.len() {
                let (change, length, v1, v5) = snapshot[i + 1];
                rows[i].next_cycle_change = Some(change);
                rows[i].next_cycle_length = Some(length);
                rows[i].next_volume_max_1 = v1;
                rows[i].next_volume_max_5 = v5;
            } else if mode == LagMode::Live && i > 0 {
                rows[i].next_cycle_change = rows[i - 1].next_cycle_change;
                rows[i].next_cycle_length = rows[i - 1].next_cycle_length;
                rows[i].next_volume_max_1 = rows[i - 1].next_volume_max_1;
                rows[i].next_volume_max_5 = rows[i - 1].next_volume_max_5;
            }
            // Backfill mode leaves the trailing row's next_* as None: its
            // following cycle is the open one and is not observed history.
        }
    }
}
