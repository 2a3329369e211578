//! CycleLab Core — cycle-segmented trend signals, adaptive normalization,
//! and predictive scoring over price/volume bars.
//!
//! This crate contains the engine proper:
//! - Domain types (bars, indicator bars, cycles, feature fields, matrices,
//!   score records)
//! - Session-aware bar resampling for exchange trading calendars
//! - Indicator enrichment (EMA, MACD, Bollinger)
//! - State-machine cycle segmentation with pluggable direction rules
//! - Per-cycle statistics with lag/lead and time-range volume joins
//! - Robust, monotonically-widening normalization bounds versioned by epoch
//! - Fixed-size feature windows for the predictor
//! - Regime-conditioned percentile scoring and the contrarian trade trigger
//! - Collaborator traits for bar sources, predictors, and cycle stores

pub mod collab;
pub mod domain;
pub mod indicators;
pub mod normalize;
pub mod resample;
pub mod scoring;
pub mod signal;
pub mod stats;
pub mod window;
