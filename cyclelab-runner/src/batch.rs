//! Batch orchestration: rayon fan-out of the training pipeline across the
//! universe, with per-symbol status markers for idempotent resume.
//!
//! Symbols share nothing mutable; each writes its own param documents,
//! cycle rows, and status file. A failed symbol aborts only itself.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pipeline::{PipelineMode, SymbolDataset, TrainingPipeline};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("status file corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persisted per-symbol batch state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolStatus {
    /// Claimed by a run that has not finished; a crash leaves this
    /// behind, and the next run redoes the symbol.
    InProgress { run_id: String },
    Success { run_id: String },
    Error { run_id: String, message: String },
}

/// One JSON status file per symbol under a status directory.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    dir: PathBuf,
}

impl StatusBoard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.json"))
    }

    pub fn read(&self, symbol: &str) -> Result<Option<SymbolStatus>, StatusError> {
        match fs::read_to_string(self.path(symbol)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, symbol: &str, status: &SymbolStatus) -> Result<(), StatusError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(symbol);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(status)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Outcome of one batch run over the universe.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

enum SymbolOutcome {
    Done(Box<SymbolDataset>),
    Skipped,
    Failed(String),
}

/// Fans the training pipeline out across the universe.
pub struct BatchRunner {
    pipeline: Arc<TrainingPipeline>,
    status: StatusBoard,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<TrainingPipeline>, status: StatusBoard) -> Self {
        Self { pipeline, status }
    }

    /// Run the batch. Symbols already marked `Success` for this run id
    /// are skipped, so an interrupted batch resumes where it stopped.
    /// Returns the datasets of newly processed symbols plus the report.
    pub fn run(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        mode: PipelineMode,
    ) -> (Vec<SymbolDataset>, BatchReport) {
        let run_id = self.pipeline.config().run_id();
        let universe = self.pipeline.config().universe.clone();
        info!(run_id, symbols = universe.len(), "batch started");

        let outcomes: Vec<(String, SymbolOutcome)> = universe
            .par_iter()
            .map(|symbol| {
                let outcome = self.run_one(symbol, &run_id, start, end, mode);
                (symbol.clone(), outcome)
            })
            .collect();

        let mut datasets = Vec::new();
        let mut report = BatchReport::default();
        for (symbol, outcome) in outcomes {
            match outcome {
                SymbolOutcome::Done(ds) => {
                    datasets.push(*ds);
                    report.succeeded.push(symbol);
                }
                SymbolOutcome::Skipped => report.skipped.push(symbol),
                SymbolOutcome::Failed(message) => report.failed.push((symbol, message)),
            }
        }
        info!(
            run_id,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        (datasets, report)
    }

    fn run_one(
        &self,
        symbol: &str,
        run_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        mode: PipelineMode,
    ) -> SymbolOutcome {
        match self.status.read(symbol) {
            Ok(Some(SymbolStatus::Success { run_id: done })) if done == run_id => {
                info!(symbol, "already succeeded for this run, skipping");
                return SymbolOutcome::Skipped;
            }
            Ok(Some(SymbolStatus::InProgress { run_id: stale })) => {
                warn!(symbol, stale_run = stale, "stale in-progress marker, redoing");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(symbol, error = %e, "unreadable status file, redoing symbol");
            }
        }

        if let Err(e) = self.status.write(
            symbol,
            &SymbolStatus::InProgress {
                run_id: run_id.to_string(),
            },
        ) {
            error!(symbol, error = %e, "cannot claim symbol");
            return SymbolOutcome::Failed(e.to_string());
        }

        match self.pipeline.run_symbol(symbol, start, end, mode) {
            Ok(dataset) => {
                let status = SymbolStatus::Success {
                    run_id: run_id.to_string(),
                };
                if let Err(e) = self.status.write(symbol, &status) {
                    error!(symbol, error = %e, "result computed but status write failed");
                    return SymbolOutcome::Failed(e.to_string());
                }
                SymbolOutcome::Done(Box::new(dataset))
            }
            Err(e) => {
                error!(symbol, error = %e, "symbol batch failed");
                if let Err(we) = self.status.write(
                    symbol,
                    &SymbolStatus::Error {
                        run_id: run_id.to_string(),
                        message: e.to_string(),
                    },
                ) {
                    warn!(symbol, error = %we, "error status write failed");
                }
                SymbolOutcome::Failed(e.to_string())
            }
        }
    }
}
