//! Per-day completion ledger.
//!
//! One [`DayRecord`] per calendar day, created lazily on the first
//! completion and deleted outright when the last mark is undone. The
//! record's [`DayPhase`] is a tagged state replacing the old pair of
//! `allCompleted`/`countedAsDay` booleans: a day is either partially
//! complete or fully complete, and "empty" is the absence of the record.
//! The phase only ever changes on the completion/undo path, so a roster
//! that grows after a day went `Complete` never demotes that day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::day_key::DayKey;

/// Completion phase of a ledger day.
///
/// `Complete` doubles as the idempotence guard: entering it counts the
/// day into `successful_days` exactly once, and only the undo transition
/// back to `Partial` reverses that count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPhase {
    /// At least one mark, but not every accepted participant.
    Partial,
    /// Every accepted participant completed; counted into stats.
    Complete,
}

/// One participant's completion mark for one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMark {
    pub user_id: UserId,
    pub completed_at: DateTime<Utc>,
}

/// The ledger entry for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: DayKey,
    /// At most one mark per participant.
    pub completed_by: Vec<CompletionMark>,
    pub phase: DayPhase,
}

impl DayRecord {
    pub(crate) fn open(date: DayKey) -> Self {
        Self {
            date,
            completed_by: Vec::new(),
            phase: DayPhase::Partial,
        }
    }

    /// Whether this participant already has a mark for the day.
    pub fn has_mark(&self, user: UserId) -> bool {
        self.completed_by.iter().any(|m| m.user_id == user)
    }

    /// True iff every accepted participant id appears in `completed_by`.
    /// An empty accepted set never counts as all-completed.
    pub fn is_all_completed(&self, accepted: &[UserId]) -> bool {
        !accepted.is_empty() && accepted.iter().all(|id| self.has_mark(*id))
    }

    /// Whether the day was counted as fully complete.
    pub fn is_complete(&self) -> bool {
        self.phase == DayPhase::Complete
    }
}
