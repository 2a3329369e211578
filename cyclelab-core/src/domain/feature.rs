//! Closed set of named feature fields.
//!
//! Every column that flows through normalization, the feature window, or
//! scoring is named here. No bare string column names: the persisted key
//! for a bound is always `FeatureField::as_str()`, checked at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every feature column produced by the pipeline.
///
/// `Prev*` / `Next*` are the lag/lead joins of the neighbouring cycles'
/// values onto the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureField {
    /// Signed peak move of the cycle: (extreme - start) / start.
    CycleChange,
    /// Cycle length in bars.
    CycleLength,
    /// CycleChange / CycleLength.
    AmplitudePerBar,
    /// Max over the cycle's trailing bars of the top-1 finer-grained volume.
    #[serde(rename = "volume_max_1")]
    VolumeMax1,
    /// Max over the cycle's trailing bars of the mean top-5 finer-grained volume.
    #[serde(rename = "volume_max_5")]
    VolumeMax5,
    PrevCycleChange,
    PrevCycleLength,
    #[serde(rename = "prev_volume_max_1")]
    PrevVolumeMax1,
    #[serde(rename = "prev_volume_max_5")]
    PrevVolumeMax5,
    NextCycleChange,
    NextCycleLength,
    #[serde(rename = "next_volume_max_1")]
    NextVolumeMax1,
    #[serde(rename = "next_volume_max_5")]
    NextVolumeMax5,
    /// Per-bar close-to-close change.
    BarChange,
    /// Per-bar raw volume.
    BarVolume,
    /// The ±1 direction signal column duplicated into the feature window.
    Signal,
}

impl FeatureField {
    /// Stable persisted name, used as the key inside `ParamDocument.bounds`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureField::CycleChange => "cycle_change",
            FeatureField::CycleLength => "cycle_length",
            FeatureField::AmplitudePerBar => "amplitude_per_bar",
            FeatureField::VolumeMax1 => "volume_max_1",
            FeatureField::VolumeMax5 => "volume_max_5",
            FeatureField::PrevCycleChange => "prev_cycle_change",
            FeatureField::PrevCycleLength => "prev_cycle_length",
            FeatureField::PrevVolumeMax1 => "prev_volume_max_1",
            FeatureField::PrevVolumeMax5 => "prev_volume_max_5",
            FeatureField::NextCycleChange => "next_cycle_change",
            FeatureField::NextCycleLength => "next_cycle_length",
            FeatureField::NextVolumeMax1 => "next_volume_max_1",
            FeatureField::NextVolumeMax5 => "next_volume_max_5",
            FeatureField::BarChange => "bar_change",
            FeatureField::BarVolume => "bar_volume",
            FeatureField::Signal => "signal",
        }
    }

    /// Fields fitted one-row-per-completed-cycle (never per-bar, to avoid
    /// length bias in the bound fit).
    pub const CYCLE_LEVEL: &'static [FeatureField] = &[
        FeatureField::CycleChange,
        FeatureField::CycleLength,
        FeatureField::AmplitudePerBar,
        FeatureField::VolumeMax1,
        FeatureField::VolumeMax5,
    ];

    /// Fields fitted from the full bar set.
    pub const BAR_LEVEL: &'static [FeatureField] =
        &[FeatureField::BarChange, FeatureField::BarVolume];

    /// Columns of a feature-window row, in order, before the prepended
    /// signal column. Cycle-row columns only; the bar-level fields have
    /// bounds but no per-cycle value and never enter a window row.
    pub const WINDOW_COLUMNS: &'static [FeatureField] = &[
        FeatureField::CycleChange,
        FeatureField::CycleLength,
        FeatureField::AmplitudePerBar,
        FeatureField::VolumeMax1,
        FeatureField::VolumeMax5,
        FeatureField::PrevCycleChange,
        FeatureField::PrevCycleLength,
        FeatureField::PrevVolumeMax1,
        FeatureField::PrevVolumeMax5,
    ];
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FeatureField; 16] = [
        FeatureField::CycleChange,
        FeatureField::CycleLength,
        FeatureField::AmplitudePerBar,
        FeatureField::VolumeMax1,
        FeatureField::VolumeMax5,
        FeatureField::PrevCycleChange,
        FeatureField::PrevCycleLength,
        FeatureField::PrevVolumeMax1,
        FeatureField::PrevVolumeMax5,
        FeatureField::NextCycleChange,
        FeatureField::NextCycleLength,
        FeatureField::NextVolumeMax1,
        FeatureField::NextVolumeMax5,
        FeatureField::BarChange,
        FeatureField::BarVolume,
        FeatureField::Signal,
    ];

    #[test]
    fn persisted_names_are_snake_case_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for field in ALL {
            assert!(seen.insert(field.as_str()), "duplicate name: {field}");
            assert!(!field.as_str().contains(char::is_uppercase));
        }
    }

    #[test]
    fn serde_matches_as_str() {
        for field in ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
            assert_eq!(serde_json::from_str::<FeatureField>(&json).unwrap(), field);
        }
    }

    #[test]
    fn cycle_level_excludes_lag_lead() {
        assert!(!FeatureField::CYCLE_LEVEL.contains(&FeatureField::NextCycleChange));
        assert!(!FeatureField::CYCLE_LEVEL.contains(&FeatureField::PrevCycleChange));
    }

    #[test]
    fn window_columns_are_cycle_row_columns_only() {
        for field in FeatureField::BAR_LEVEL {
            assert!(!FeatureField::WINDOW_COLUMNS.contains(field), "{field}");
        }
        assert!(!FeatureField::WINDOW_COLUMNS.contains(&FeatureField::NextCycleChange));
    }
}
