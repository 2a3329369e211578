//! Domain types for CycleLab.

pub mod bar;
pub mod cycle;
pub mod feature;
pub mod indicator_bar;
pub mod matrix;
pub mod score;

pub use bar::{Bar, Frequency};
pub use cycle::{Cycle, Direction};
pub use feature::FeatureField;
pub use indicator_bar::IndicatorBar;
pub use matrix::FeatureMatrix;
pub use score::{MetricOutcome, ScoreRecord, TradeAction};

/// Symbol type alias
pub type Symbol = String;
