//! Epoch — calendar-month versioning bucket for normalization parameters.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, ordered chronologically. Rendered "YYYY-MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch {
    pub year: i32,
    pub month: u32,
}

impl Epoch {
    pub fn new(year: i32, month: u32) -> Self {
        assert!((1..=12).contains(&month), "month must be 1..=12");
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(&self) -> Epoch {
        if self.month == 12 {
            Epoch::new(self.year + 1, 1)
        } else {
            Epoch::new(self.year, self.month + 1)
        }
    }

    /// First calendar day of the epoch.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid epoch string '{0}', expected YYYY-MM")]
pub struct ParseEpochError(String);

impl FromStr for Epoch {
    type Err = ParseEpochError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| ParseEpochError(s.to_string()))?;
        let year: i32 = year.parse().map_err(|_| ParseEpochError(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| ParseEpochError(s.to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(ParseEpochError(s.to_string()));
        }
        Ok(Epoch { year, month })
    }
}
