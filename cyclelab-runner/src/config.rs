//! Serializable pipeline configuration, loaded from TOML.
//!
//! Every knob needed to reproduce a training batch lives here; `run_id()`
//! hashes the canonical JSON form so identical configs share one id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cyclelab_core::domain::Frequency;
use cyclelab_core::indicators::IndicatorConfig;
use cyclelab_core::normalize::DEFAULT_CLIP_K;
use cyclelab_core::scoring::{ClampBands, ScoringConfig};
use cyclelab_core::signal::SignalConfig;
use cyclelab_core::stats::StatsConfig;
use cyclelab_core::window::WindowConfig;

/// Unique identifier for a batch run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Full configuration for a training batch or a live scoring tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Symbols to process.
    pub universe: Vec<String>,
    /// Frequency the cycle engine runs on.
    pub cycle_frequency: Frequency,
    /// Finer frequency feeding the volume time-range join.
    pub finer_frequency: Frequency,
    /// Model the predictor is asked for.
    pub model_name: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub engine: EngineParams,
}

/// Where the runner reads bars and writes its artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    pub bars_dir: PathBuf,
    pub params_dir: PathBuf,
    pub cycles_dir: PathBuf,
    pub status_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            bars_dir: PathBuf::from("data/bars"),
            params_dir: PathBuf::from("data/params"),
            cycles_dir: PathBuf::from("data/cycles"),
            status_dir: PathBuf::from("data/status"),
            export_dir: PathBuf::from("data/export"),
        }
    }
}

/// Numeric engine parameters. Defaults are the calibrated production
/// values; override individually in TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineParams {
    /// Feature-window height, also the cycle-row lookback.
    pub lookback_bars_default: usize,
    pub window_width: usize,
    /// Trailing bars of a sealed cycle feeding the volume join.
    pub lag_window_bars: usize,
    pub retrend_window_bars: usize,
    pub volume_lookback_minutes: i64,
    pub outlier_clip_k: f64,
    pub clamp_p30: f64,
    pub clamp_p65: f64,
    pub clamp_p80: f64,
    pub clamp_p95: f64,
    pub score_trade_threshold: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            lookback_bars_default: 30,
            window_width: 30,
            lag_window_bars: 35,
            retrend_window_bars: 5,
            volume_lookback_minutes: 15,
            outlier_clip_k: DEFAULT_CLIP_K,
            clamp_p30: 0.30,
            clamp_p65: 0.65,
            clamp_p80: 0.80,
            clamp_p95: 0.95,
            score_trade_threshold: 5.5,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() {
            return Err(ConfigError::Invalid("universe is empty".into()));
        }
        let mut seen = HashMap::new();
        for symbol in &self.universe {
            if seen.insert(symbol, ()).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "duplicate symbol in universe: {symbol}"
                )));
            }
        }
        match (self.finer_frequency.minutes(), self.cycle_frequency.minutes()) {
            (Some(finer), Some(cycle)) if finer >= cycle => {
                return Err(ConfigError::Invalid(format!(
                    "finer frequency {} must be shorter than cycle frequency {}",
                    self.finer_frequency.as_str(),
                    self.cycle_frequency.as_str(),
                )));
            }
            (None, _) => {
                return Err(ConfigError::Invalid(
                    "finer frequency must be intraday".into(),
                ));
            }
            _ => {}
        }
        let e = &self.engine;
        if e.lookback_bars_default == 0 || e.window_width == 0 {
            return Err(ConfigError::Invalid("window dimensions must be > 0".into()));
        }
        let bands = [e.clamp_p30, e.clamp_p65, e.clamp_p80, e.clamp_p95];
        if !bands.windows(2).all(|w| w[0] < w[1]) || bands[0] <= 0.0 || bands[3] >= 1.0 {
            return Err(ConfigError::Invalid(
                "clamp bands must be strictly increasing within (0, 1)".into(),
            ));
        }
        if e.score_trade_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "score_trade_threshold must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Deterministic hash id for this configuration. Identical configs
    /// produce identical ids, so artifacts can be tied to a run.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("PipelineConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            retrend_window_bars: self.engine.retrend_window_bars,
        }
    }

    pub fn stats_config(&self) -> StatsConfig {
        StatsConfig {
            lag_window_bars: self.engine.lag_window_bars,
            volume_lookback_minutes: self.engine.volume_lookback_minutes,
        }
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            height: self.engine.lookback_bars_default,
            width: self.engine.window_width,
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            bands: ClampBands {
                p30: self.engine.clamp_p30,
                p65: self.engine.clamp_p65,
                p80: self.engine.clamp_p80,
                p95: self.engine.clamp_p95,
            },
            trade_threshold: self.engine.score_trade_threshold,
        }
    }

    pub fn indicator_config(&self) -> IndicatorConfig {
        IndicatorConfig::default()
    }
}
