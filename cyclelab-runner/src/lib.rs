//! CycleLab Runner — batch orchestration, live scoring, stores, export.
//!
//! This crate builds on `cyclelab-core` to provide:
//! - TOML pipeline configuration with content-addressed run ids
//! - The per-symbol training pipeline (resample → enrich → segment →
//!   stats → fit/merge bounds → normalize → windows)
//! - Rayon batch fan-out with JSON status markers for idempotent resume
//! - A live scoring tick over open cycles
//! - JSON param-store and CSV bar-source backends
//! - CSV export of cycle rows and score records

pub mod batch;
pub mod config;
pub mod export;
pub mod live;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use batch::{BatchReport, BatchRunner, StatusBoard, StatusError, SymbolStatus};
pub use config::{ConfigError, EngineParams, PathsConfig, PipelineConfig, RunId};
pub use export::{
    export_cycle_rows_csv, export_score_records_csv, write_cycle_rows_csv,
    write_score_records_csv, ExportError,
};
pub use live::{LiveScorer, TickOutcome};
pub use pipeline::{LabeledWindow, PipelineError, PipelineMode, SymbolDataset, TrainingPipeline};
pub use sources::{CsvBarSource, MemoryCycleStore};
pub use store::{JsonCycleStore, JsonParamStore};
