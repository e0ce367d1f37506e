//! Calendar-day normalization.
//!
//! Every ledger entry is keyed by a [`DayKey`]: a calendar date with the
//! time-of-day stripped, always derived from a UTC timestamp. This is the
//! one bit-exact contract external callers must respect when constructing
//! date inputs -- two completions at 00:05 and 23:55 UTC of the same date
//! land on the same key.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar day used as the ledger's per-day identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Normalize a UTC timestamp down to its calendar day.
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    /// The current UTC calendar day.
    pub fn today() -> Self {
        Self::from_utc(Utc::now())
    }

    /// The day before this one. Saturates at the calendar minimum.
    pub fn pred(&self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// The day after this one. Saturates at the calendar maximum.
    pub fn succ(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// Underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
