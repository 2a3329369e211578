//! Trend signal rule trait and cycle segmentation engine.
//!
//! The per-bar ±1 rule is a pluggable collaborator: the engine only
//! consumes its output stream and turns it into discrete directional
//! cycles. One example rule ships for tests and the CLI; production rules
//! are injected.

pub mod engine;
pub mod rules;

pub use engine::{Segmentation, SignalConfig, SignalEngine};
pub use rules::MacdDirectionRule;

use crate::domain::{Direction, IndicatorBar};

/// External trend rule: bar history in, direction out.
///
/// Pure function, no side effects. `history` is every prior enriched bar
/// of the stream (excluding `bar` itself), oldest first. Implementations
/// must not look at anything beyond their inputs.
pub trait SignalRule: Send + Sync {
    /// Human-readable name (e.g., "macd_direction").
    fn name(&self) -> &str;

    /// Evaluate the rule for one bar.
    fn evaluate(&self, bar: &IndicatorBar, history: &[IndicatorBar]) -> Direction;
}
