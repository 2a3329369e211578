//! Built-in example signal rule.
//!
//! The production trend rule is supplied by the caller; this one exists so
//! the CLI and tests have a concrete rule to inject.

use crate::domain::{Direction, IndicatorBar};

use super::SignalRule;

/// Direction from the sign of the MACD histogram: Up when `macd > 0`,
/// Down otherwise.
#[derive(Debug, Clone, Default)]
pub struct MacdDirectionRule;

impl SignalRule for MacdDirectionRule {
    fn name(&self) -> &str {
        "macd_direction"
    }

    fn evaluate(&self, bar: &IndicatorBar, _history: &[IndicatorBar]) -> Direction {
        if bar.macd > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}
