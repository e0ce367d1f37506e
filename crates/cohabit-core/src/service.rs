//! Inbound operation surface for shared habits.
//!
//! Every mutating operation runs as load -> mutate -> save -> notify,
//! serialized per aggregate through a [`LockRegistry`]: two participants
//! completing "today" at the same instant cannot race the day's
//! check-and-set. Notification emission happens after the save and its
//! failures are logged and swallowed; a save failure propagates and the
//! in-memory mutation is simply dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::day_key::DayKey;
use crate::error::{HabitError, Result};
use crate::events::Event;
use crate::gateway::{HabitStore, IdentityDirectory, Notifier};
use crate::habit::{
    DayRecord, HabitId, HabitSpec, HabitStats, Identity, SharedHabit, StreakState, UserId,
};

/// Per-aggregate lock table. Different habits never contend; the sweep
/// and the request path share one registry so they serialize against
/// each other per habit id.
#[derive(Default)]
pub struct LockRegistry {
    inner: Mutex<HashMap<HabitId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for one habit id, created on first use.
    pub fn lock_for(&self, id: HabitId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(id).or_default().clone()
    }
}

/// View returned by [`HabitService::record_completion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub habit_id: HabitId,
    pub day: DayKey,
    pub current_streak: u32,
    pub all_completed: bool,
    pub completed_count: usize,
    pub total_participants: usize,
    pub points_earned: u32,
    pub stats: HabitStats,
}

/// View returned by [`HabitService::undo_completion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoSummary {
    pub habit_id: HabitId,
    pub day: DayKey,
    pub current_streak: u32,
    pub completed_count: usize,
    /// The undo removed the last remaining mark and deleted the day.
    pub day_removed: bool,
    pub stats: HabitStats,
}

/// The shared-habit operation surface, invoked by the transport layer.
pub struct HabitService<S, N, D> {
    store: Arc<S>,
    notifier: Arc<N>,
    directory: D,
    locks: Arc<LockRegistry>,
}

impl<S, N, D> HabitService<S, N, D>
where
    S: HabitStore,
    N: Notifier,
    D: IdentityDirectory,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, directory: D) -> Self {
        Self::with_locks(store, notifier, directory, Arc::new(LockRegistry::new()))
    }

    /// Construct with a shared lock registry, so the reconciliation
    /// sweep serializes against this service per habit.
    pub fn with_locks(
        store: Arc<S>,
        notifier: Arc<N>,
        directory: D,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            store,
            notifier,
            directory,
            locks,
        }
    }

    /// The lock registry, for wiring a sweep runner to this service.
    pub fn locks(&self) -> Arc<LockRegistry> {
        Arc::clone(&self.locks)
    }

    /// Create a habit with the owner as its first accepted participant.
    pub fn create_habit(&self, owner: &Identity, spec: HabitSpec) -> Result<SharedHabit> {
        let habit = SharedHabit::new(owner, spec, Utc::now());
        self.store.save(&habit)?;
        tracing::debug!(habit_id = %habit.id, title = %habit.title, "shared habit created");
        Ok(habit)
    }

    /// Invite an email address to a habit.
    pub fn invite(&self, habit_id: HabitId, inviter: &Identity, email: &str) -> Result<SharedHabit> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        let resolved = self.directory.resolve_by_email(email)?;
        habit.invite_participant(email, resolved.as_ref(), Utc::now())?;
        self.store.save(&habit)?;

        if let Some(invitee) = resolved {
            self.emit(
                &[invitee.id],
                &Event::HabitInvitation {
                    habit_id,
                    habit_title: habit.title.clone(),
                    inviter: inviter.id,
                    invitee_email: invitee.email,
                    at: Utc::now(),
                },
            );
        }
        Ok(habit)
    }

    /// Accept a pending invitation, looked up by the caller's email.
    pub fn accept(&self, habit_id: HabitId, user: &Identity) -> Result<SharedHabit> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        habit.accept_invitation(user, Utc::now())?;
        self.store.save(&habit)?;

        self.emit(
            &[habit.created_by],
            &Event::InvitationAccepted {
                habit_id,
                habit_title: habit.title.clone(),
                user: user.id,
                at: Utc::now(),
            },
        );
        Ok(habit)
    }

    /// Decline a pending invitation.
    pub fn decline(&self, habit_id: HabitId, user: &Identity) -> Result<SharedHabit> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        habit.decline_invitation(user)?;
        self.store.save(&habit)?;

        self.emit(
            &[habit.created_by],
            &Event::InvitationDeclined {
                habit_id,
                habit_title: habit.title.clone(),
                user: user.id,
                at: Utc::now(),
            },
        );
        Ok(habit)
    }

    /// Leave a habit. The owner cannot leave, only delete.
    pub fn leave(&self, habit_id: HabitId, user: &Identity) -> Result<()> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        habit.remove_participant(user.id)?;
        self.store.save(&habit)
    }

    /// Soft-delete a habit. The habit and its ledger are retained.
    pub fn delete_habit(&self, habit_id: HabitId, user: &Identity) -> Result<()> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        if habit.created_by != user.id {
            return Err(HabitError::Forbidden);
        }
        habit.is_active = false;
        self.store.save(&habit)
    }

    /// Hard-delete a habit and tell every other accepted participant.
    pub fn delete_habit_permanently(&self, habit_id: HabitId, user: &Identity) -> Result<()> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let habit = self.store.load(habit_id)?;
        if habit.created_by != user.id {
            return Err(HabitError::Forbidden);
        }
        let recipients: Vec<UserId> = habit
            .accepted_ids()
            .into_iter()
            .filter(|id| *id != user.id)
            .collect();
        self.store.delete(habit_id)?;

        self.emit(
            &recipients,
            &Event::HabitDeleted {
                habit_id,
                habit_title: habit.title,
                at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Record the acting user's completion for `now`'s calendar day.
    pub fn record_completion(
        &self,
        habit_id: HabitId,
        user: &Identity,
        now: DateTime<Utc>,
    ) -> Result<CompletionSummary> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        let outcome = habit.complete_task(user.id, now)?;
        self.store.save(&habit)?;

        if outcome.newly_complete {
            if habit.notifications.notify_on_streak {
                self.emit(
                    &habit.accepted_ids(),
                    &Event::StreakMilestone {
                        habit_id,
                        habit_title: habit.title.clone(),
                        streak: habit.streak.current,
                        day: outcome.day,
                        at: now,
                    },
                );
            }
        } else if !outcome.all_completed {
            self.emit(
                &outcome.pending,
                &Event::PendingReminder {
                    habit_id,
                    habit_title: habit.title.clone(),
                    completed_by: user.label().to_string(),
                    day: outcome.day,
                    at: now,
                },
            );
        }

        Ok(CompletionSummary {
            habit_id,
            day: outcome.day,
            current_streak: habit.streak.current,
            all_completed: outcome.all_completed,
            completed_count: outcome.completed_count,
            total_participants: outcome.participant_count,
            points_earned: outcome.points_earned,
            stats: habit.stats,
        })
    }

    /// Undo the acting user's completion for `now`'s calendar day.
    pub fn undo_completion(
        &self,
        habit_id: HabitId,
        user: &Identity,
        now: DateTime<Utc>,
    ) -> Result<UndoSummary> {
        let lock = self.locks.lock_for(habit_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut habit = self.store.load(habit_id)?;
        let outcome = habit.undo_task(user.id, DayKey::from_utc(now))?;
        self.store.save(&habit)?;

        Ok(UndoSummary {
            habit_id,
            day: outcome.day,
            current_streak: habit.streak.current,
            completed_count: outcome.completed_count,
            day_removed: outcome.day_removed,
            stats: habit.stats,
        })
    }

    /// Current streak state of a habit.
    pub fn streak_info(&self, habit_id: HabitId) -> Result<StreakState> {
        Ok(self.store.load(habit_id)?.streak)
    }

    /// Full per-day completion ledger. Accepted participants only.
    pub fn completion_history(
        &self,
        habit_id: HabitId,
        user: &Identity,
    ) -> Result<Vec<DayRecord>> {
        let habit = self.store.load(habit_id)?;
        if !habit.is_accepted(user.id) {
            return Err(HabitError::NotParticipant);
        }
        Ok(habit.daily_completions)
    }

    fn emit(&self, recipients: &[UserId], event: &Event) {
        if recipients.is_empty() {
            return;
        }
        if let Err(err) = self.notifier.notify(recipients, event) {
            tracing::warn!(
                kind = event.kind(),
                recipients = recipients.len(),
                %err,
                "notification emission failed; state transition already committed"
            );
        }
    }
}
