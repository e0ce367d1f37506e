//! Core error types for cohabit-core.
//!
//! All domain variants are expected, recoverable-by-caller conditions and
//! are surfaced to the invoking layer without retry. Collaborator failures
//! are split: a store failure propagates (the mutation stays uncommitted),
//! a notification failure is logged and swallowed at the emit boundary.

use thiserror::Error;

/// Core error type for cohabit-core.
#[derive(Error, Debug)]
pub enum HabitError {
    /// Habit id does not resolve.
    #[error("shared habit not found")]
    NotFound,

    /// Acting user is not an accepted participant of the habit.
    #[error("user is not an accepted participant of this habit")]
    NotParticipant,

    /// Invite called for an email that already has a live participant record.
    #[error("'{email}' is already a participant")]
    AlreadyParticipant { email: String },

    /// Accept/decline called with no matching pending participant.
    #[error("no pending invitation found for '{email}'")]
    NoPendingInvitation { email: String },

    /// Leave attempted by the habit's creator.
    #[error("the habit owner cannot leave; delete the habit instead")]
    OwnerCannotLeave,

    /// Duplicate completion by the same participant on the same day.
    #[error("task already completed for {day}")]
    AlreadyCompletedToday { day: crate::day_key::DayKey },

    /// Undo attempted with nothing to undo.
    #[error("no completion found to undo for {day}")]
    NoCompletionFound { day: crate::day_key::DayKey },

    /// Owner-only operation attempted by a non-owner.
    #[error("only the habit owner may perform this operation")]
    Forbidden,

    /// Persistence collaborator failure. Propagates; the in-memory
    /// mutation is discarded, never half-saved.
    #[error("store error: {0}")]
    Store(String),

    /// Notification collaborator failure. Only ever crosses the notify
    /// boundary, where it is logged and swallowed.
    #[error("notification error: {0}")]
    Notify(String),
}

/// Result type alias for HabitError.
pub type Result<T, E = HabitError> = std::result::Result<T, E>;
