//! Nightly reconciliation sweep.
//!
//! The synchronous completion/undo path only reverses streak state for
//! days it directly touched; this sweep is the safety net that catches
//! days nobody (or not everybody) completed. A day that is missing from
//! the ledger breaks the streak exactly like a day that exists but never
//! went complete -- the stricter of the two policies the product has
//! shipped with, kept deliberately.
//!
//! The decision itself is the pure [`reconcile`] function; [`SweepRunner`]
//! wraps it with storage, per-habit locking, and isolate-and-continue, and
//! [`run_daily`] is the thin scheduler adapter so the trigger mechanism
//! stays swappable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::day_key::DayKey;
use crate::error::Result;
use crate::events::Event;
use crate::gateway::{HabitStore, Notifier};
use crate::habit::{HabitId, SharedHabit};
use crate::service::LockRegistry;

/// Apply the streak-break rule for one habit and one "yesterday".
///
/// Returns true when the streak was reset (and `failed_days` counted).
/// Idempotent: a second invocation for the same day finds the streak at
/// zero and does nothing.
pub fn reconcile(habit: &mut SharedHabit, yesterday: DayKey) -> bool {
    let satisfied = habit
        .day_record(yesterday)
        .map(|r| r.is_complete())
        .unwrap_or(false);
    if satisfied {
        return false;
    }
    habit.break_streak()
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub habits_checked: usize,
    pub streaks_broken: usize,
    /// Habits that failed to process; the pass continued past them.
    pub errors: usize,
    /// Whether the pass stopped early on a cancellation signal.
    pub cancelled: bool,
}

/// Runs the sweep over every active habit, one atomic unit per habit.
pub struct SweepRunner<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    locks: Arc<LockRegistry>,
    in_flight: AtomicBool,
}

impl<S, N> SweepRunner<S, N>
where
    S: HabitStore,
    N: Notifier,
{
    /// The lock registry should be shared with the [`HabitService`]
    /// mutating the same habits.
    ///
    /// [`HabitService`]: crate::service::HabitService
    pub fn new(store: Arc<S>, notifier: Arc<N>, locks: Arc<LockRegistry>) -> Self {
        Self {
            store,
            notifier,
            locks,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one pass for the given "yesterday".
    ///
    /// Returns `None` if a pass is already in flight (single-flight
    /// guard). Manual invocation for operational testing goes through
    /// here as well.
    pub fn run(&self, yesterday: DayKey) -> Option<SweepSummary> {
        self.run_cancellable(yesterday, None)
    }

    /// Like [`run`](Self::run), stopping before the next habit once the
    /// cancellation channel reads true.
    pub fn run_cancellable(
        &self,
        yesterday: DayKey,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Option<SweepSummary> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("reconciliation sweep already in flight; skipping");
            return None;
        }
        let summary = self.pass(yesterday, cancel);
        self.in_flight.store(false, Ordering::SeqCst);
        tracing::info!(
            checked = summary.habits_checked,
            broken = summary.streaks_broken,
            errors = summary.errors,
            cancelled = summary.cancelled,
            %yesterday,
            "reconciliation sweep finished"
        );
        Some(summary)
    }

    fn pass(&self, yesterday: DayKey, cancel: Option<&watch::Receiver<bool>>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let ids = match self.store.active_habit_ids() {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(%err, "sweep could not list active habits");
                summary.errors += 1;
                return summary;
            }
        };

        for id in ids {
            if cancel.map(|rx| *rx.borrow()).unwrap_or(false) {
                summary.cancelled = true;
                break;
            }
            summary.habits_checked += 1;
            match self.sweep_one(id, yesterday) {
                Ok(true) => summary.streaks_broken += 1,
                Ok(false) => {}
                Err(err) => {
                    // One habit's failure never aborts the others.
                    summary.errors += 1;
                    tracing::warn!(habit_id = %id, %err, "sweep failed for habit; continuing");
                }
            }
        }
        summary
    }

    fn sweep_one(&self, id: HabitId, yesterday: DayKey) -> Result<bool> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(id)?;
        if !habit.is_active || !reconcile(&mut habit, yesterday) {
            return Ok(false);
        }
        self.store.save(&habit)?;

        if habit.notifications.notify_on_break {
            let recipients = habit.accepted_ids();
            let event = Event::StreakBroken {
                habit_id: habit.id,
                habit_title: habit.title.clone(),
                failed_day: yesterday,
                at: Utc::now(),
            };
            if let Err(err) = self.notifier.notify(&recipients, &event) {
                tracing::warn!(habit_id = %id, %err, "streak-broken notification failed");
            }
        }
        Ok(true)
    }
}

/// When the daily sweep fires, as a UTC wall-clock time.
///
/// Defaults to 00:01, one minute past midnight, so "yesterday" has just
/// closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSchedule {
    #[serde(default)]
    pub hour: u32,
    #[serde(default = "default_minute")]
    pub minute: u32,
}

fn default_minute() -> u32 {
    1
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self { hour: 0, minute: 1 }
    }
}

impl SweepSchedule {
    /// The next instant strictly after `now` at which the sweep fires.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = self.hour.min(23);
        let minute = self.minute.min(59);
        let candidate = now
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .unwrap_or(now.naive_utc());
        let candidate = if candidate <= now.naive_utc() {
            candidate + chrono::Duration::days(1)
        } else {
            candidate
        };
        Utc.from_utc_datetime(&candidate)
    }
}

/// Scheduler adapter: fire the sweep once per day until shutdown.
///
/// The scheduling mechanism is deliberately thin -- an external cron or
/// message queue can call [`SweepRunner::run`] directly instead.
pub async fn run_daily<S, N>(
    runner: Arc<SweepRunner<S, N>>,
    schedule: SweepSchedule,
    mut shutdown: watch::Receiver<bool>,
) where
    S: HabitStore + 'static,
    N: Notifier + 'static,
{
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = Utc::now();
        let wait = (schedule.next_run_after(now) - now)
            .to_std()
            .unwrap_or_default();
        let cancel = shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let runner = Arc::clone(&runner);
                let joined = tokio::task::spawn_blocking(move || {
                    runner.run_cancellable(DayKey::today().pred(), Some(&cancel))
                })
                .await;
                if let Err(err) = joined {
                    tracing::warn!(%err, "sweep task panicked");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
