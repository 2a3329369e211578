//! Collaborator interfaces — the seams between the engine and the outside
//! world: bar acquisition, model inference, and cycle persistence.
//!
//! Everything here is a trait so the runner can swap CSV files, in-memory
//! fixtures, or real services without touching the pipeline.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use crate::domain::{Bar, Cycle, FeatureMatrix, Frequency};

/// Errors from a bar source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("bar source I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bar source returned malformed data for {symbol}: {detail}")]
    Malformed { symbol: String, detail: String },
}

/// Supplies raw bars for a symbol over a half-open time range.
///
/// Implementations must return bars ordered by timestamp with duplicates
/// already collapsed; gaps (halts, holidays) are fine.
pub trait BarSource: Send + Sync {
    fn get_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<Vec<Bar>, SourceError>;
}

/// Errors from the prediction service.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The model is not loaded or the service is unreachable. Callers
    /// skip the cycle and keep going.
    #[error("predictor unavailable: {0}")]
    Unavailable(String),
    #[error("predictor rejected input: {0}")]
    BadInput(String),
}

/// Scores a feature window with a named model.
pub trait Predictor: Send + Sync {
    fn predict(&self, model_name: &str, window: &FeatureMatrix) -> Result<f64, PredictError>;
}

/// Errors from cycle persistence.
#[derive(Debug, Error)]
pub enum PersistError {
    /// A row for the same (symbol, start_ts) already exists.
    #[error("cycle rows conflict for {symbol}")]
    Conflict { symbol: String },
    #[error("cycle store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cycle store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Time-series store for computed cycles, keyed by symbol.
pub trait CycleStore: Send + Sync {
    /// Append new rows; fails with [`PersistError::Conflict`] if any row
    /// collides with an existing (symbol, start_ts).
    fn append_cycles(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError>;
    /// Replace the symbol's rows wholesale.
    fn replace_cycles(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError>;
    /// All stored rows for the symbol, ordered by start_ts.
    fn load_cycles(&self, symbol: &str) -> Result<Vec<Cycle>, PersistError>;
}

/// Append with conflict recovery: on [`PersistError::Conflict`], load the
/// stored rows, merge by start_ts (incoming rows win, so re-runs refresh
/// stale rows), and replace. Re-running a batch is therefore idempotent.
pub fn upsert_cycles(
    store: &dyn CycleStore,
    symbol: &str,
    cycles: &[Cycle],
) -> Result<(), PersistError> {
    match store.append_cycles(symbol, cycles) {
        Ok(()) => Ok(()),
        Err(PersistError::Conflict { .. }) => {
            warn!(symbol, "cycle append conflict, merging with stored rows");
            let mut merged = store.load_cycles(symbol)?;
            for incoming in cycles {
                match merged.binary_search_by_key(&incoming.start_ts, |c| c.start_ts) {
                    Ok(i) => merged[i] = incoming.clone(),
                    Err(i) => merged.insert(i, incoming.clone()),
                }
            }
            store.replace_cycles(symbol, &merged)
        }
        Err(other) => Err(other),
    }
}
