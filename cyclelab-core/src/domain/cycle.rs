//! Cycle — a maximal run of consecutive bars sharing one trend direction.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Trend direction of a cycle or a single bar's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// +1.0 for Up, -1.0 for Down.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }

    pub fn flip(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// A directional cycle. Opened when the signal flips, mutated bar-by-bar
/// while open, sealed on the next flip.
///
/// `completed` is false exactly while the cycle is open. The trailing
/// cycle of any batch is always open and must be excluded from derived
/// datasets (`Segmentation::completed_cycles` does the filtering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    /// Monotonic per symbol, assigned at open.
    pub id: u64,
    pub symbol: String,
    pub direction: Direction,
    pub start_ts: NaiveDateTime,
    pub start_price: f64,
    pub end_ts: NaiveDateTime,
    pub end_price: f64,
    /// Direction-appropriate extreme: highest high for Up, lowest low for Down.
    pub extreme_price: f64,
    /// Signed peak move relative to start: (extreme - start) / start.
    pub amplitude_max: f64,
    pub length_bars: usize,
    /// Early-reversal characteristics observed inside the active cycle.
    pub reversal_flag: bool,
    pub completed: bool,
}

impl Cycle {
    /// Open a new cycle on a signal flip. Start price is the flip bar's close.
    pub fn open(
        id: u64,
        symbol: impl Into<String>,
        direction: Direction,
        ts: NaiveDateTime,
        close: f64,
        extreme: f64,
    ) -> Self {
        let start_price = close;
        let mut cycle = Self {
            id,
            symbol: symbol.into(),
            direction,
            start_ts: ts,
            start_price,
            end_ts: ts,
            end_price: close,
            extreme_price: extreme,
            amplitude_max: 0.0,
            length_bars: 1,
            reversal_flag: false,
            completed: false,
        };
        cycle.refresh_amplitude();
        cycle
    }

    /// Extend the open cycle with one more bar of the same direction.
    pub fn extend(&mut self, ts: NaiveDateTime, close: f64, high: f64, low: f64) {
        debug_assert!(!self.completed, "cannot extend a sealed cycle");
        self.length_bars += 1;
        self.end_ts = ts;
        self.end_price = close;
        match self.direction {
            Direction::Up => {
                if high > self.extreme_price {
                    self.extreme_price = high;
                }
            }
            Direction::Down => {
                if low < self.extreme_price {
                    self.extreme_price = low;
                }
            }
        }
        self.refresh_amplitude();
    }

    /// Seal the cycle: freeze extrema and mark completed.
    pub fn seal(&mut self) {
        self.completed = true;
    }

    /// Signed per-bar amplitude.
    pub fn amplitude_per_bar(&self) -> f64 {
        self.amplitude_max / self.length_bars as f64
    }

    fn refresh_amplitude(&mut self) {
        self.amplitude_max = (self.extreme_price - self.start_price) / self.start_price;
    }
}
