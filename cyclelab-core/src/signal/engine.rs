//! Cycle segmentation — turns a ±1 signal stream into directional cycles.
//!
//! State machine with states {NoSignal, InUpCycle, InDownCycle}. A flip of
//! the rule output seals the active cycle and opens a new one; a repeat
//! extends the active cycle. The trailing cycle of any batch stays open
//! (`completed = false`) and is excluded by `completed_cycles()`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Cycle, Direction, IndicatorBar};

use super::SignalRule;

/// Segmentation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Trailing-bar window for re-trend detection.
    pub retrend_window_bars: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            retrend_window_bars: 5,
        }
    }
}

/// Result of segmenting one bar stream.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// All cycles in order; the last one may be open.
    pub cycles: Vec<Cycle>,
    /// Per-bar direction, `None` during indicator warmup.
    pub directions: Vec<Option<Direction>>,
}

impl Segmentation {
    /// Cycles safe for training and statistics: the trailing open cycle
    /// is excluded.
    pub fn completed_cycles(&self) -> &[Cycle] {
        match self.cycles.last() {
            Some(last) if !last.completed => &self.cycles[..self.cycles.len() - 1],
            _ => &self.cycles,
        }
    }

    /// The currently open cycle, if any.
    pub fn open_cycle(&self) -> Option<&Cycle> {
        self.cycles.last().filter(|c| !c.completed)
    }
}

/// Consumes an enriched bar stream plus an external signal rule and emits
/// per-bar directions and cycle boundaries.
pub struct SignalEngine {
    rule: Arc<dyn SignalRule>,
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(rule: Arc<dyn SignalRule>, config: SignalConfig) -> Self {
        Self { rule, config }
    }

    /// Segment a full bar stream. Bars without valid indicator columns
    /// (warmup) carry no direction and belong to no cycle.
    pub fn segment(&self, bars: &[IndicatorBar]) -> Segmentation {
        let mut cycles: Vec<Cycle> = Vec::new();
        let mut directions: Vec<Option<Direction>> = Vec::with_capacity(bars.len());
        let mut active: Option<Cycle> = None;
        let mut next_id: u64 = 1;

        for (i, bar) in bars.iter().enumerate() {
            if !bar.has_indicators() {
                directions.push(None);
                continue;
            }

            let direction = self.rule.evaluate(bar, &bars[..i]);
            directions.push(Some(direction));

            match active.take() {
                Some(mut cycle) if cycle.direction == direction => {
                    cycle.extend(bar.ts(), bar.close(), bar.bar.high, bar.bar.low);
                    active = Some(cycle);
                }
                Some(mut cycle) => {
                    cycle.seal();
                    cycles.push(cycle);
                    active = Some(self.open_cycle(next_id, bar, direction));
                    next_id += 1;
                }
                None => {
                    active = Some(self.open_cycle(next_id, bar, direction));
                    next_id += 1;
                }
            }

            if let Some(cycle) = active.as_mut() {
                if !cycle.reversal_flag
                    && retrend_detected(cycle, bars, i, self.config.retrend_window_bars)
                {
                    cycle.reversal_flag = true;
                }
            }
        }

        if let Some(open) = active {
            cycles.push(open);
        }

        Segmentation { cycles, directions }
    }

    fn open_cycle(&self, id: u64, bar: &IndicatorBar, direction: Direction) -> Cycle {
        let extreme = match direction {
            Direction::Up => bar.bar.high,
            Direction::Down => bar.bar.low,
        };
        Cycle::open(
            id,
            bar.bar.symbol.clone(),
            direction,
            bar.ts(),
            bar.close(),
            extreme,
        )
    }
}

/// Re-trend: over the trailing `window` bars of the active cycle,
/// `close - ema_mid` is consistently signed opposite to the cycle
/// direction for every bar.
fn retrend_detected(cycle: &Cycle, bars: &[IndicatorBar], i: usize, window: usize) -> bool {
    if window == 0 || cycle.length_bars < window || i + 1 < window {
        return false;
    }
    let opposite = -cycle.direction.sign();
    bars[i + 1 - window..=i].iter().all(|b| {
        let gap = b.close() - b.ema_mid;
        !gap.is_nan() && gap != 0.0 && gap.signum() == opposite
    })
}
