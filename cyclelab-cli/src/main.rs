//! CycleLab CLI — training-data preparation, live scoring, bounds
//! inspection.
//!
//! Commands:
//! - `prepare` — run the training batch over the configured universe and
//!   export cycle-row datasets
//! - `score` — run one live scoring tick and export score records
//! - `bounds` — inspect persisted normalization bounds per symbol/epoch

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use cyclelab_core::collab::{PredictError, Predictor};
use cyclelab_core::domain::FeatureMatrix;
use cyclelab_core::normalize::{Epoch, NormalizationStore, ParamStore};
use cyclelab_core::signal::MacdDirectionRule;
use cyclelab_runner::{
    write_cycle_rows_csv, write_score_records_csv, BatchRunner, CsvBarSource, JsonCycleStore,
    JsonParamStore, LiveScorer, PipelineConfig, PipelineMode, StatusBoard, TrainingPipeline,
};

#[derive(Parser)]
#[command(
    name = "cyclelab",
    about = "CycleLab CLI — cycle-segmented trend features and scoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FitMode {
    /// Fit normalization bounds from this batch's rows.
    Raw,
    /// Refit bounds from the full stored cycle history.
    Stored,
}

impl From<FitMode> for PipelineMode {
    fn from(mode: FitMode) -> Self {
        match mode {
            FitMode::Raw => PipelineMode::FitFromRaw,
            FitMode::Stored => PipelineMode::FitFromStoredCycles,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the training batch and export cycle-row datasets.
    Prepare {
        /// Path to the pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Batch start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: String,

        /// Batch end date (YYYY-MM-DD), exclusive.
        #[arg(long)]
        end: String,

        /// Where the normalization bounds come from.
        #[arg(long, value_enum, default_value_t = FitMode::Raw)]
        mode: FitMode,
    },
    /// Run one live scoring tick and export score records.
    Score {
        /// Path to the pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Lookback start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Tick time (YYYY-MM-DD HH:MM:SS). Defaults to now.
        #[arg(long)]
        now: Option<String>,

        /// Fixed prediction injected in place of the model service.
        /// Without it the predictor reports unavailable and every cycle
        /// is scored as skipped (a dry run of the tick plumbing).
        #[arg(long)]
        prediction: Option<f64>,
    },
    /// Inspect persisted normalization bounds.
    Bounds {
        /// Path to the pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Symbol to inspect.
        #[arg(long)]
        symbol: String,

        /// Epoch (YYYY-MM). Defaults to every stored epoch.
        #[arg(long)]
        epoch: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Prepare {
            config,
            start,
            end,
            mode,
        } => run_prepare(&config, &start, &end, mode.into()),
        Commands::Score {
            config,
            start,
            now,
            prediction,
        } => run_score(&config, &start, now.as_deref(), prediction),
        Commands::Bounds {
            config,
            symbol,
            epoch,
        } => run_bounds(&config, &symbol, epoch.as_deref()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))?;
    Ok(date.and_hms_opt(0, 0, 0).expect("midnight exists"))
}

fn load_config(path: &PathBuf) -> Result<PipelineConfig> {
    PipelineConfig::from_toml_file(path)
        .with_context(|| format!("cannot load config {}", path.display()))
}

fn build_pipeline(config: &PipelineConfig) -> Arc<TrainingPipeline> {
    let params = NormalizationStore::new(
        Arc::new(JsonParamStore::new(&config.paths.params_dir)),
        config.engine.outlier_clip_k,
    );
    Arc::new(TrainingPipeline::new(
        config.clone(),
        Arc::new(CsvBarSource::new(&config.paths.bars_dir)),
        Arc::new(JsonCycleStore::new(&config.paths.cycles_dir)),
        params,
        Arc::new(MacdDirectionRule),
    ))
}

fn run_prepare(
    config_path: &PathBuf,
    start: &str,
    end: &str,
    mode: PipelineMode,
) -> Result<()> {
    let config = load_config(config_path)?;
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if start >= end {
        bail!("start must precede end");
    }

    let pipeline = build_pipeline(&config);
    let runner = BatchRunner::new(
        pipeline.clone(),
        StatusBoard::new(&config.paths.status_dir),
    );
    let (datasets, report) = runner.run(start, end, mode);

    for dataset in &datasets {
        let path = config
            .paths
            .export_dir
            .join(format!("{}_cycles.csv", dataset.symbol));
        write_cycle_rows_csv(&path, &dataset.rows)?;
        println!(
            "{}: {} cycles, {} windows -> {}",
            dataset.symbol,
            dataset.rows.len(),
            dataset.windows.len(),
            path.display()
        );
    }
    for symbol in &report.skipped {
        println!("{symbol}: already done, skipped");
    }
    if !report.all_succeeded() {
        for (symbol, message) in &report.failed {
            eprintln!("Error for {symbol}: {message}");
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Stand-in for the model service: fixed answer or unavailable.
struct CliPredictor(Option<f64>);

impl Predictor for CliPredictor {
    fn predict(&self, _model: &str, _window: &FeatureMatrix) -> Result<f64, PredictError> {
        self.0
            .ok_or_else(|| PredictError::Unavailable("no model service configured".into()))
    }
}

fn run_score(
    config_path: &PathBuf,
    start: &str,
    now: Option<&str>,
    prediction: Option<f64>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let start = parse_date(start)?;
    let now = match now {
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .with_context(|| format!("invalid tick time {s:?}"))?,
        None => chrono::Local::now().naive_local(),
    };

    let params = NormalizationStore::new(
        Arc::new(JsonParamStore::new(&config.paths.params_dir)),
        config.engine.outlier_clip_k,
    );
    let scorer = LiveScorer::new(
        config.clone(),
        Arc::new(CsvBarSource::new(&config.paths.bars_dir)),
        params,
        Arc::new(MacdDirectionRule),
        Arc::new(CliPredictor(prediction)),
    );
    let outcome = scorer.tick(start, now);

    for record in &outcome.records {
        println!(
            "{} cycle {} [{:?}] score {:.2} action {:?}{}",
            record.symbol,
            record.cycle_id,
            record.direction,
            record.trend_score,
            record.trade_action,
            if record.skipped { " (skipped)" } else { "" },
        );
    }
    let path = config
        .paths
        .export_dir
        .join(format!("scores_{}.csv", now.format("%Y%m%d_%H%M%S")));
    write_score_records_csv(&path, &outcome.records)?;
    println!("Scores saved to: {}", path.display());

    if !outcome.failed.is_empty() {
        for (symbol, message) in &outcome.failed {
            eprintln!("Error for {symbol}: {message}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_bounds(config_path: &PathBuf, symbol: &str, epoch: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = JsonParamStore::new(&config.paths.params_dir);

    let epochs = match epoch {
        Some(s) => vec![s
            .parse::<Epoch>()
            .with_context(|| format!("invalid epoch {s:?}, expected YYYY-MM"))?],
        None => store.epochs(symbol)?,
    };
    if epochs.is_empty() {
        bail!("no stored bounds for {symbol}");
    }

    for epoch in epochs {
        match store.load(symbol, epoch)? {
            Some(doc) => {
                println!("{symbol} {epoch}:");
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
            None => println!("{symbol} {epoch}: no document"),
        }
    }
    Ok(())
}
