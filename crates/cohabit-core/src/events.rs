//! Outbound notification events.
//!
//! Every committed state change that participants should hear about
//! produces an [`Event`]. The core hands events to the [`Notifier`]
//! collaborator fire-and-forget; delivery, storage, and real-time push
//! live outside this crate.
//!
//! [`Notifier`]: crate::gateway::Notifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::day_key::DayKey;
use crate::habit::{HabitId, UserId};

/// A notification event emitted after a committed state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A user was invited to join a shared habit.
    HabitInvitation {
        habit_id: HabitId,
        habit_title: String,
        inviter: UserId,
        invitee_email: String,
        at: DateTime<Utc>,
    },
    /// A pending participant accepted; sent to the habit owner.
    InvitationAccepted {
        habit_id: HabitId,
        habit_title: String,
        user: UserId,
        at: DateTime<Utc>,
    },
    /// A pending participant declined; sent to the habit owner.
    InvitationDeclined {
        habit_id: HabitId,
        habit_title: String,
        user: UserId,
        at: DateTime<Utc>,
    },
    /// Every accepted participant completed today; the streak grew.
    StreakMilestone {
        habit_id: HabitId,
        habit_title: String,
        streak: u32,
        day: DayKey,
        at: DateTime<Utc>,
    },
    /// Someone completed today; sent to participants who have not.
    PendingReminder {
        habit_id: HabitId,
        habit_title: String,
        completed_by: String,
        day: DayKey,
        at: DateTime<Utc>,
    },
    /// The reconciliation sweep reset the streak for a failed day.
    StreakBroken {
        habit_id: HabitId,
        habit_title: String,
        failed_day: DayKey,
        at: DateTime<Utc>,
    },
    /// The habit was permanently removed by its owner.
    HabitDeleted {
        habit_id: HabitId,
        habit_title: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable kind string, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::HabitInvitation { .. } => "habit_invitation",
            Event::InvitationAccepted { .. } => "invitation_accepted",
            Event::InvitationDeclined { .. } => "invitation_declined",
            Event::StreakMilestone { .. } => "streak_milestone",
            Event::PendingReminder { .. } => "pending_reminder",
            Event::StreakBroken { .. } => "streak_broken",
            Event::HabitDeleted { .. } => "habit_deleted",
        }
    }

    /// JSON payload as handed to the notification collaborator.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
