//! Score records and trade actions emitted by the scoring engine.

use serde::{Deserialize, Serialize};

use super::cycle::Direction;

/// Trade decision attached to a score record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    None,
    Buy,
    Sell,
}

/// Predicted vs. realized value for one scored metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricOutcome {
    /// Raw model output before the percentile clamp.
    pub predicted: f64,
    /// Prediction after the percentile clamp.
    pub clamped: f64,
    pub realized: f64,
    pub sub_score: f64,
}

/// One scored cycle: the four metric outcomes, the summed trend score,
/// and the contrarian trade decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub symbol: String,
    pub cycle_id: u64,
    pub direction: Direction,
    pub cycle_change: Option<MetricOutcome>,
    pub cycle_length: Option<MetricOutcome>,
    pub bar_change: Option<MetricOutcome>,
    pub bar_volume: Option<MetricOutcome>,
    /// Sum of the four sub-scores, rounded to 2 decimals.
    pub trend_score: f64,
    pub reversal_flag: bool,
    pub trade_action: TradeAction,
    /// True when the predictor was unavailable and scoring was skipped.
    pub skipped: bool,
}

impl ScoreRecord {
    /// A skip record: predictor unavailable, no action, batch continues.
    pub fn skipped(symbol: impl Into<String>, cycle_id: u64, direction: Direction) -> Self {
        Self {
            symbol: symbol.into(),
            cycle_id,
            direction,
            cycle_change: None,
            cycle_length: None,
            bar_change: None,
            bar_volume: None,
            trend_score: 0.0,
            reversal_flag: false,
            trade_action: TradeAction::None,
            skipped: true,
        }
    }
}
