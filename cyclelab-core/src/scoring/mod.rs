//! Predictive scoring — realized vs. clamped-predicted cycle statistics
//! under asymmetric up/down regimes.
//!
//! Implements from first principles:
//! - Standard normal CDF (Abramowitz-Stegun erf approximation)
//! - Standard normal quantile (Acklam rational approximation)
//! - Percentile clamp of model predictions against the regime distribution
//! - Signed sub-scores and the contrarian trade trigger
//!
//! The clamp bands (30/65/80/95) and the 5.5 trade threshold are
//! hand-tuned calibration constants, kept overridable but preserved as
//! defaults. The clamp deliberately damps model extrapolation using the
//! empirical distribution as a prior.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Direction, MetricOutcome, ScoreRecord, TradeAction};
use crate::stats::CycleRow;

// ─── Math primitives ─────────────────────────────────────────────────

/// Error function, Abramowitz-Stegun 7.1.26 (max abs error ~1.5e-7).
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Standard normal CDF: P(Z <= z).
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Standard normal quantile via Acklam's rational approximation
/// (relative error below 1.15e-9 over (0, 1)).
pub fn normal_quantile(p: f64) -> f64 {
    assert!(p > 0.0 && p < 1.0, "quantile requires p in (0, 1)");

    #[allow(clippy::excessive_precision)]
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    #[allow(clippy::excessive_precision)]
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    #[allow(clippy::excessive_precision)]
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    #[allow(clippy::excessive_precision)]
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

// ─── Regime statistics ───────────────────────────────────────────────

/// The four scored metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    CycleChange,
    CycleLength,
    BarChange,
    BarVolume,
}

impl ScoreMetric {
    pub const ALL: [ScoreMetric; 4] = [
        ScoreMetric::CycleChange,
        ScoreMetric::CycleLength,
        ScoreMetric::BarChange,
        ScoreMetric::BarVolume,
    ];
}

/// Historical {mean, std} of one metric under one regime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeStats {
    pub mean: f64,
    pub std: f64,
}

impl RegimeStats {
    /// Fit from raw values (population std). `None` for an empty set.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let clean: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if clean.is_empty() {
            return None;
        }
        let n = clean.len() as f64;
        let mean = clean.iter().sum::<f64>() / n;
        let variance = clean.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: variance.sqrt(),
        })
    }

    /// Percentile of a value under this distribution. A zero-spread
    /// distribution is degenerate: everything sits at the midpoint.
    pub fn percentile(&self, x: f64) -> f64 {
        if self.std <= 0.0 {
            return 0.5;
        }
        normal_cdf((x - self.mean) / self.std)
    }

    /// The value at percentile `p`.
    pub fn point(&self, p: f64) -> f64 {
        if self.std <= 0.0 {
            return self.mean;
        }
        self.mean + self.std * normal_quantile(p)
    }
}

/// Per-(direction, metric) regime statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegimeTable {
    stats: HashMap<Direction, HashMap<ScoreMetric, RegimeStats>>,
}

impl RegimeTable {
    pub fn insert(&mut self, direction: Direction, metric: ScoreMetric, stats: RegimeStats) {
        self.stats.entry(direction).or_default().insert(metric, stats);
    }

    pub fn get(&self, direction: Direction, metric: ScoreMetric) -> Option<RegimeStats> {
        self.stats.get(&direction)?.get(&metric).copied()
    }

    /// Fit cycle-level regimes from completed-cycle rows and bar-level
    /// regimes from the per-bar change/volume series, each grouped by
    /// direction.
    pub fn fit(
        rows: &[CycleRow],
        bar_changes: &[(Direction, f64)],
        bar_volumes: &[(Direction, f64)],
    ) -> Self {
        let mut table = Self::default();
        for direction in [Direction::Up, Direction::Down] {
            let changes: Vec<f64> = rows
                .iter()
                .filter(|r| r.direction() == direction)
                .map(|r| r.cycle.amplitude_max)
                .collect();
            let lengths: Vec<f64> = rows
                .iter()
                .filter(|r| r.direction() == direction)
                .map(|r| r.cycle.length_bars as f64)
                .collect();
            if let Some(s) = RegimeStats::from_values(&changes) {
                table.insert(direction, ScoreMetric::CycleChange, s);
            }
            if let Some(s) = RegimeStats::from_values(&lengths) {
                table.insert(direction, ScoreMetric::CycleLength, s);
            }

            let changes: Vec<f64> = bar_changes
                .iter()
                .filter(|(d, _)| *d == direction)
                .map(|(_, v)| *v)
                .collect();
            let volumes: Vec<f64> = bar_volumes
                .iter()
                .filter(|(d, _)| *d == direction)
                .map(|(_, v)| *v)
                .collect();
            if let Some(s) = RegimeStats::from_values(&changes) {
                table.insert(direction, ScoreMetric::BarChange, s);
            }
            if let Some(s) = RegimeStats::from_values(&volumes) {
                table.insert(direction, ScoreMetric::BarVolume, s);
            }
        }
        table
    }
}

// ─── Scoring engine ──────────────────────────────────────────────────

/// Percentile clamp bands. Hand-tuned; see module docs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClampBands {
    pub p30: f64,
    pub p65: f64,
    pub p80: f64,
    pub p95: f64,
}

impl Default for ClampBands {
    fn default() -> Self {
        Self {
            p30: 0.30,
            p65: 0.65,
            p80: 0.80,
            p95: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub bands: ClampBands,
    /// |trend_score| beyond which the contrarian trigger fires.
    pub trade_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bands: ClampBands::default(),
            trade_threshold: 5.5,
        }
    }
}

/// Predicted and realized value for one metric; `None` marks a data gap
/// or an unavailable prediction for that metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub cycle_change: Option<(f64, f64)>,
    pub cycle_length: Option<(f64, f64)>,
    pub bar_change: Option<(f64, f64)>,
    pub bar_volume: Option<(f64, f64)>,
}

/// Compares realized outcomes to percentile-clamped predictions and emits
/// trend scores and trade actions.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    table: RegimeTable,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(table: RegimeTable, config: ScoringConfig) -> Self {
        Self { table, config }
    }

    /// Clamp a raw prediction against the regime distribution.
    ///
    /// Up regime: predictions below p30 are raised to p30; predictions
    /// above p95 are pulled back to p80. Down regime, mirrored: a
    /// prediction above p65 (undershooting the mean move) is pulled down
    /// to p65; one below p(1-p95) is raised to p(1-p80).
    pub fn clamp_prediction(&self, direction: Direction, metric: ScoreMetric, raw: f64) -> f64 {
        let Some(stats) = self.table.get(direction, metric) else {
            return raw;
        };
        let bands = self.config.bands;
        match direction {
            Direction::Up => {
                let floor = stats.point(bands.p30);
                let ceiling = stats.point(bands.p95);
                if raw < floor {
                    floor
                } else if raw > ceiling {
                    stats.point(bands.p80)
                } else {
                    raw
                }
            }
            Direction::Down => {
                let pull_in = stats.point(bands.p65);
                let floor = stats.point(1.0 - bands.p95);
                if raw > pull_in {
                    pull_in
                } else if raw < floor {
                    stats.point(1.0 - bands.p80)
                } else {
                    raw
                }
            }
        }
    }

    /// Signed sub-score for one metric.
    ///
    /// Realized beyond the clamped prediction in the regime direction
    /// earns `sign(regime) * (1 + percentile(realized))`; otherwise a
    /// smaller-magnitude penalty from the percentile gap.
    fn sub_score(
        &self,
        direction: Direction,
        metric: ScoreMetric,
        clamped: f64,
        realized: f64,
    ) -> f64 {
        let Some(stats) = self.table.get(direction, metric) else {
            return 0.0;
        };
        let sign = direction.sign();
        let p_realized = stats.percentile(realized);
        let exceeded = match direction {
            Direction::Up => realized >= clamped,
            Direction::Down => realized <= clamped,
        };
        if exceeded {
            sign * (1.0 + p_realized)
        } else {
            let p_clamped = stats.percentile(clamped);
            -sign * (p_clamped - p_realized).abs()
        }
    }

    /// Score one cycle. Metrics with missing data contribute nothing.
    pub fn score_cycle(
        &self,
        symbol: &str,
        cycle_id: u64,
        direction: Direction,
        reversal_flag: bool,
        outcome: &CycleOutcome,
    ) -> ScoreRecord {
        let mut total = 0.0;
        let mut build = |metric: ScoreMetric, pair: Option<(f64, f64)>| -> Option<MetricOutcome> {
            let (predicted, realized) = pair?;
            let clamped = self.clamp_prediction(direction, metric, predicted);
            let sub_score = self.sub_score(direction, metric, clamped, realized);
            total += sub_score;
            Some(MetricOutcome {
                predicted,
                clamped,
                realized,
                sub_score,
            })
        };

        let cycle_change = build(ScoreMetric::CycleChange, outcome.cycle_change);
        let cycle_length = build(ScoreMetric::CycleLength, outcome.cycle_length);
        let bar_change = build(ScoreMetric::BarChange, outcome.bar_change);
        let bar_volume = build(ScoreMetric::BarVolume, outcome.bar_volume);

        let trend_score = (total * 100.0).round() / 100.0;
        let trade_action = self.decide(direction, trend_score);

        ScoreRecord {
            symbol: symbol.to_string(),
            cycle_id,
            direction,
            cycle_change,
            cycle_length,
            bar_change,
            bar_volume,
            trend_score,
            reversal_flag,
            trade_action,
            skipped: false,
        }
    }

    /// A skip record for a cycle whose predictor was unavailable.
    /// Logged, never fatal: the batch continues.
    pub fn skip_cycle(&self, symbol: &str, cycle_id: u64, direction: Direction) -> ScoreRecord {
        warn!(symbol, cycle_id, "predictor unavailable, scoring skipped");
        ScoreRecord::skipped(symbol, cycle_id, direction)
    }

    /// Contrarian trigger: a highly exhausted move closes against itself.
    /// An active up cycle with a strongly positive score sells; an active
    /// down cycle with a strongly negative score buys.
    pub fn decide(&self, direction: Direction, trend_score: f64) -> TradeAction {
        if trend_score.abs() <= self.config.trade_threshold {
            return TradeAction::None;
        }
        match direction {
            Direction::Up if trend_score > 0.0 => TradeAction::Sell,
            Direction::Down if trend_score < 0.0 => TradeAction::Buy,
            _ => TradeAction::None,
        }
    }
}
