//! # Cohabit Core Library
//!
//! This library provides the core business logic for Cohabit's shared
//! habits: multiple participants jointly completing a recurring task,
//! with a group streak derived from a per-day completion ledger. The
//! transport layer (HTTP, auth, real-time push) is a thin shell over
//! this crate.
//!
//! ## Architecture
//!
//! - **Aggregate**: [`SharedHabit`] owns the roster, the day ledger, and
//!   the streak state; all mutation is synchronous and per-aggregate
//! - **Service**: [`HabitService`] is the inbound operation surface,
//!   serializing each habit behind a [`LockRegistry`] and emitting
//!   notification events fire-and-forget after every committed save
//! - **Sweep**: [`SweepRunner`] breaks streaks for silently-failed days,
//!   once per day, one habit at a time
//! - **Gateway**: identity lookup, notification delivery, and persistence
//!   are traits; in-memory implementations ship for tests and embedding
//!
//! ## Key Components
//!
//! - [`SharedHabit`]: the aggregate root and its transition functions
//! - [`HabitService`]: invite/accept/decline/leave/complete/undo surface
//! - [`SweepRunner`] and [`run_daily`]: nightly reconciliation
//! - [`HabitStore`], [`Notifier`], [`IdentityDirectory`]: collaborator seams

pub mod day_key;
pub mod error;
pub mod events;
pub mod gateway;
pub mod habit;
pub mod service;
pub mod sweep;

pub use day_key::DayKey;
pub use error::{HabitError, Result};
pub use events::Event;
pub use gateway::{
    HabitStore, IdentityDirectory, MemoryDirectory, MemoryStore, Notifier, RecordingNotifier,
};
pub use habit::{
    Category, CompletionMark, CompletionOutcome, DayPhase, DayRecord, HabitId, HabitSpec,
    HabitStats, Identity, NotificationPrefs, Participant, ParticipantStatus, SharedHabit,
    StreakState, UndoOutcome, UserId,
};
pub use service::{CompletionSummary, HabitService, LockRegistry, UndoSummary};
pub use sweep::{reconcile, run_daily, SweepRunner, SweepSchedule, SweepSummary};
