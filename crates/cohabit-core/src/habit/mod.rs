//! The shared-habit aggregate root.
//!
//! A [`SharedHabit`] owns the participant roster, the per-day completion
//! ledger, the streak state, and the aggregate counters. All mutation goes
//! through the roster / ledger / streak submodules; the service layer
//! serializes access per aggregate, so nothing in here locks.

mod ledger;
mod roster;
mod streak;

pub use ledger::{CompletionMark, DayPhase, DayRecord};
pub use roster::{Participant, ParticipantStatus};
pub use streak::{CompletionOutcome, StreakState, UndoOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::day_key::DayKey;

/// Unique identifier for a shared habit.
pub type HabitId = Uuid;

/// Unique identifier for a user.
pub type UserId = Uuid;

/// A resolved user identity, as returned by the identity collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
}

impl Identity {
    /// Name to use in human-facing notification text. Falls back to the
    /// local part of the email, like the rest of the product does.
    pub fn label(&self) -> &str {
        match &self.display_name {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Habit category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Spiritual,
    Health,
    Learning,
    Discipline,
    #[default]
    Custom,
}

/// Aggregate counters, recomputed after every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HabitStats {
    /// Unique days with at least one completion recorded.
    pub total_days: u32,
    /// Days every accepted participant completed.
    pub successful_days: u32,
    /// Days the reconciliation sweep counted as broken.
    pub failed_days: u32,
    /// `round(successful_days / total_days * 100)`, 0 when no days yet.
    pub success_rate: u32,
    /// 20 points per fully-completed day.
    pub total_points: u32,
}

impl HabitStats {
    pub(crate) fn recompute_success_rate(&mut self) {
        self.success_rate = if self.total_days > 0 {
            ((self.successful_days as f64 / self.total_days as f64) * 100.0).round() as u32
        } else {
            0
        };
    }
}

/// Per-habit notification preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub reminder_enabled: bool,
    /// Preferred reminder time as "HH:MM", display-layer concern.
    #[serde(default)]
    pub reminder_time: Option<String>,
    /// Gate for streak-milestone emissions.
    #[serde(default = "default_true")]
    pub notify_on_streak: bool,
    /// Gate for streak-broken emissions.
    #[serde(default = "default_true")]
    pub notify_on_break: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            reminder_enabled: true,
            reminder_time: None,
            notify_on_streak: true,
            notify_on_break: true,
        }
    }
}

/// Payload for creating a new shared habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub notifications: NotificationPrefs,
}

/// The shared-habit aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedHabit {
    pub id: HabitId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub created_by: UserId,
    /// Soft-delete flag; inactive habits keep their ledger but are
    /// skipped by the sweep and hidden from listings.
    pub is_active: bool,
    pub participants: Vec<Participant>,
    /// At most one entry per calendar day.
    pub daily_completions: Vec<DayRecord>,
    pub streak: StreakState,
    pub stats: HabitStats,
    pub notifications: NotificationPrefs,
    pub created_at: DateTime<Utc>,
}

impl SharedHabit {
    /// Create a habit with the owner as its first accepted participant.
    pub fn new(owner: &Identity, spec: HabitSpec, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: spec.title,
            description: spec.description,
            category: spec.category,
            created_by: owner.id,
            is_active: true,
            participants: vec![Participant::accepted_owner(owner, now)],
            daily_completions: Vec::new(),
            streak: StreakState::default(),
            stats: HabitStats::default(),
            notifications: spec.notifications,
            created_at: now,
        }
    }

    /// The ledger entry for one day, if any completion was recorded.
    pub fn day_record(&self, day: DayKey) -> Option<&DayRecord> {
        self.daily_completions.iter().find(|r| r.date == day)
    }

    pub(crate) fn day_index(&self, day: DayKey) -> Option<usize> {
        self.daily_completions.iter().position(|r| r.date == day)
    }
}
