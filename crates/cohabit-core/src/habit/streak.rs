//! Streak engine: translates ledger transitions into aggregate state.
//!
//! The increment path (a day going `Partial -> Complete`) and the undo
//! rollback (`Complete -> Partial`) are exact mirrors of each other, and
//! both are guarded by the day's phase so neither can ever apply twice.
//! All counters saturate at zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::{CompletionMark, DayPhase, DayRecord};
use super::{SharedHabit, UserId};
use crate::day_key::DayKey;
use crate::error::{HabitError, Result};

/// Points awarded for a fully-completed day.
pub(crate) const POINTS_PER_SUCCESSFUL_DAY: u32 = 20;

/// Shared streak state of one habit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive fully-completed days, reset by undo or the sweep.
    pub current: u32,
    /// Historical maximum of `current`; never decreases.
    pub longest: u32,
    pub last_completed_date: Option<DayKey>,
    /// Day keys contributing to the current run.
    pub consecutive_days: Vec<DayKey>,
}

/// Result of recording one completion, drives event emission.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub day: DayKey,
    /// Whether the day is fully complete after this mark.
    pub all_completed: bool,
    /// Whether this particular mark performed the `Partial -> Complete`
    /// transition. Drives the streak-milestone emission.
    pub newly_complete: bool,
    pub completed_count: usize,
    pub participant_count: usize,
    pub points_earned: u32,
    /// Accepted participants who have not completed the day yet.
    pub pending: Vec<UserId>,
}

/// Result of undoing one completion.
#[derive(Debug, Clone)]
pub struct UndoOutcome {
    pub day: DayKey,
    /// Whether the undo reverted a counted day and rolled the streak back.
    pub streak_reverted: bool,
    /// Whether the day record was deleted (last mark removed).
    pub day_removed: bool,
    pub completed_count: usize,
}

impl SharedHabit {
    /// Record a completion mark for the given instant's calendar day.
    ///
    /// The first mark of a new day creates the ledger record and is the
    /// one-time `total_days` increment for that day. If the mark makes
    /// the day fully complete, the streak grows and the day is counted
    /// into `successful_days`, both exactly once.
    pub fn complete_task(&mut self, user: UserId, now: DateTime<Utc>) -> Result<CompletionOutcome> {
        if !self.is_accepted(user) {
            return Err(HabitError::NotParticipant);
        }
        let day = DayKey::from_utc(now);
        let accepted = self.accepted_ids();

        let idx = match self.day_index(day) {
            Some(idx) => idx,
            None => {
                self.daily_completions.push(DayRecord::open(day));
                // Record existence is the totalDays guard, not the phase:
                // totalDays tracks "a day was attempted."
                self.stats.total_days += 1;
                self.daily_completions.len() - 1
            }
        };

        let became_complete = {
            let record = &mut self.daily_completions[idx];
            if record.has_mark(user) {
                return Err(HabitError::AlreadyCompletedToday { day });
            }
            record.completed_by.push(CompletionMark {
                user_id: user,
                completed_at: now,
            });
            if record.phase == DayPhase::Partial && record.is_all_completed(&accepted) {
                record.phase = DayPhase::Complete;
                true
            } else {
                false
            }
        };

        let mut points_earned = 0;
        if became_complete {
            self.stats.successful_days += 1;
            self.stats.total_points += POINTS_PER_SUCCESSFUL_DAY;
            points_earned = POINTS_PER_SUCCESSFUL_DAY;
            self.streak.current += 1;
            self.streak.longest = self.streak.longest.max(self.streak.current);
            self.streak.last_completed_date = Some(day);
            self.streak.consecutive_days.push(day);
        }
        self.stats.recompute_success_rate();

        let record = &self.daily_completions[idx];
        let pending = accepted
            .iter()
            .copied()
            .filter(|id| !record.has_mark(*id))
            .collect();
        Ok(CompletionOutcome {
            day,
            all_completed: record.is_complete(),
            newly_complete: became_complete,
            completed_count: record.completed_by.len(),
            participant_count: accepted.len(),
            points_earned,
            pending,
        })
    }

    /// Undo a participant's completion mark for one day.
    ///
    /// If the day was counted as fully complete, this reverses the
    /// increment path exactly; if the last mark goes, the day record is
    /// deleted and `total_days` decrements. Calling undo again finds no
    /// mark and fails, so nothing ever double-reverses.
    pub fn undo_task(&mut self, user: UserId, day: DayKey) -> Result<UndoOutcome> {
        if !self.is_accepted(user) {
            return Err(HabitError::NotParticipant);
        }
        let idx = self
            .day_index(day)
            .ok_or(HabitError::NoCompletionFound { day })?;
        let accepted = self.accepted_ids();

        let (reverted, emptied, completed_count) = {
            let record = &mut self.daily_completions[idx];
            let pos = record
                .completed_by
                .iter()
                .position(|m| m.user_id == user)
                .ok_or(HabitError::NoCompletionFound { day })?;
            record.completed_by.remove(pos);

            let reverted = record.phase == DayPhase::Complete
                && !record.is_all_completed(&accepted);
            if reverted {
                record.phase = DayPhase::Partial;
            }
            (
                reverted,
                record.completed_by.is_empty(),
                record.completed_by.len(),
            )
        };

        if reverted {
            self.stats.successful_days = self.stats.successful_days.saturating_sub(1);
            self.stats.total_points = self
                .stats
                .total_points
                .saturating_sub(POINTS_PER_SUCCESSFUL_DAY);
            self.streak.current = self.streak.current.saturating_sub(1);
            if let Some(pos) = self.streak.consecutive_days.iter().position(|d| *d == day) {
                self.streak.consecutive_days.remove(pos);
            }
        }
        if emptied {
            self.daily_completions.remove(idx);
            self.stats.total_days = self.stats.total_days.saturating_sub(1);
        }
        self.stats.recompute_success_rate();

        Ok(UndoOutcome {
            day,
            streak_reverted: reverted,
            day_removed: emptied,
            completed_count,
        })
    }

    /// Break the current streak run, counting one failed day.
    ///
    /// No-op when the streak is already zero, which makes the
    /// reconciliation sweep idempotent. Used only by the sweep.
    pub fn break_streak(&mut self) -> bool {
        if self.streak.current == 0 {
            return false;
        }
        self.streak.current = 0;
        self.streak.consecutive_days.clear();
        self.stats.failed_days += 1;
        self.stats.recompute_success_rate();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::{HabitSpec, Identity};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn identity(email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name: None,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap()
    }

    fn solo_habit() -> (SharedHabit, Identity) {
        let owner = identity("solo@example.com");
        let habit = SharedHabit::new(
            &owner,
            HabitSpec {
                title: "Meditate".into(),
                description: String::new(),
                category: Default::default(),
                notifications: Default::default(),
            },
            at(1),
        );
        (habit, owner)
    }

    fn duo_habit() -> (SharedHabit, Identity, Identity) {
        let (mut habit, owner) = solo_habit();
        let friend = identity("friend@example.com");
        habit
            .invite_participant(&friend.email, Some(&friend), at(1))
            .unwrap();
        habit.accept_invitation(&friend, at(1)).unwrap();
        (habit, owner, friend)
    }

    #[test]
    fn solo_completion_counts_day_and_streak() {
        let (mut habit, owner) = solo_habit();
        let outcome = habit.complete_task(owner.id, at(1)).unwrap();

        assert!(outcome.all_completed);
        assert_eq!(outcome.points_earned, 20);
        assert_eq!(habit.streak.current, 1);
        assert_eq!(habit.streak.longest, 1);
        assert_eq!(habit.stats.total_days, 1);
        assert_eq!(habit.stats.successful_days, 1);
        assert_eq!(habit.stats.success_rate, 100);
        assert_eq!(habit.streak.consecutive_days.len(), 1);
    }

    #[test]
    fn partial_completion_leaves_streak_untouched() {
        let (mut habit, owner, friend) = duo_habit();
        let outcome = habit.complete_task(owner.id, at(1)).unwrap();

        assert!(!outcome.all_completed);
        assert_eq!(outcome.pending, vec![friend.id]);
        assert_eq!(habit.streak.current, 0);
        assert_eq!(habit.stats.total_days, 1);
        assert_eq!(habit.stats.successful_days, 0);
        assert_eq!(habit.stats.success_rate, 0);
    }

    #[test]
    fn second_participant_closes_the_day() {
        let (mut habit, owner, friend) = duo_habit();
        habit.complete_task(owner.id, at(1)).unwrap();
        let outcome = habit.complete_task(friend.id, at(1)).unwrap();

        assert!(outcome.all_completed);
        assert!(outcome.pending.is_empty());
        assert_eq!(habit.streak.current, 1);
        assert_eq!(habit.stats.successful_days, 1);
        // One record per calendar day regardless of mark count.
        assert_eq!(habit.daily_completions.len(), 1);
    }

    #[test]
    fn duplicate_completion_rejected_and_state_unchanged() {
        let (mut habit, owner) = solo_habit();
        habit.complete_task(owner.id, at(1)).unwrap();
        let snapshot = (habit.streak.current, habit.stats.total_days);

        let err = habit.complete_task(owner.id, at(1)).unwrap_err();
        assert!(matches!(err, HabitError::AlreadyCompletedToday { .. }));
        assert_eq!((habit.streak.current, habit.stats.total_days), snapshot);
    }

    #[test]
    fn total_days_counts_each_day_exactly_once() {
        let (mut habit, owner, friend) = duo_habit();
        habit.complete_task(owner.id, at(1)).unwrap();
        habit.complete_task(friend.id, at(1)).unwrap();
        assert_eq!(habit.stats.total_days, 1);

        habit.complete_task(owner.id, at(2)).unwrap();
        assert_eq!(habit.stats.total_days, 2);
        assert_eq!(habit.stats.success_rate, 50);
    }

    #[test]
    fn non_participant_cannot_complete() {
        let (mut habit, _owner) = solo_habit();
        let stranger = Uuid::new_v4();
        assert!(matches!(
            habit.complete_task(stranger, at(1)).unwrap_err(),
            HabitError::NotParticipant
        ));
    }

    #[test]
    fn undo_after_full_completion_restores_exact_state() {
        let (mut habit, owner, friend) = duo_habit();
        habit.complete_task(owner.id, at(1)).unwrap();
        let before = (
            habit.streak.current,
            habit.stats.successful_days,
            habit.streak.consecutive_days.clone(),
        );

        habit.complete_task(friend.id, at(1)).unwrap();
        let outcome = habit
            .undo_task(friend.id, DayKey::from_utc(at(1)))
            .unwrap();

        assert!(outcome.streak_reverted);
        assert!(!outcome.day_removed);
        assert_eq!(habit.streak.current, before.0);
        assert_eq!(habit.stats.successful_days, before.1);
        assert_eq!(habit.streak.consecutive_days, before.2);
        assert_eq!(habit.stats.total_days, 1);
    }

    #[test]
    fn undo_last_mark_deletes_the_day() {
        let (mut habit, owner) = solo_habit();
        let day = DayKey::from_utc(at(1));
        habit.complete_task(owner.id, at(1)).unwrap();
        let outcome = habit.undo_task(owner.id, day).unwrap();

        assert!(outcome.streak_reverted);
        assert!(outcome.day_removed);
        assert_eq!(habit.streak.current, 0);
        assert_eq!(habit.stats.total_days, 0);
        assert_eq!(habit.stats.successful_days, 0);
        assert!(habit.day_record(day).is_none());
    }

    #[test]
    fn undo_cannot_double_reverse() {
        let (mut habit, owner, friend) = duo_habit();
        let day = DayKey::from_utc(at(1));
        habit.complete_task(owner.id, at(1)).unwrap();
        habit.complete_task(friend.id, at(1)).unwrap();

        habit.undo_task(friend.id, day).unwrap();
        // Friend's mark is gone; the second undo finds nothing.
        assert!(matches!(
            habit.undo_task(friend.id, day).unwrap_err(),
            HabitError::NoCompletionFound { .. }
        ));
        assert_eq!(habit.stats.successful_days, 0);
        assert_eq!(habit.streak.current, 0);
    }

    #[test]
    fn undo_with_no_record_fails() {
        let (mut habit, owner) = solo_habit();
        assert!(matches!(
            habit.undo_task(owner.id, DayKey::from_utc(at(1))).unwrap_err(),
            HabitError::NoCompletionFound { .. }
        ));
    }

    #[test]
    fn roster_growth_never_demotes_a_counted_day() {
        let (mut habit, owner) = solo_habit();
        habit.complete_task(owner.id, at(1)).unwrap();
        assert_eq!(habit.streak.current, 1);

        let late = identity("late@example.com");
        habit
            .invite_participant(&late.email, Some(&late), at(2))
            .unwrap();
        habit.accept_invitation(&late, at(2)).unwrap();

        let day = DayKey::from_utc(at(1));
        assert!(habit.day_record(day).map(|r| r.is_complete()).unwrap_or(false));
        assert_eq!(habit.streak.current, 1);
        assert_eq!(habit.stats.successful_days, 1);
    }

    #[test]
    fn break_streak_is_idempotent() {
        let (mut habit, owner) = solo_habit();
        habit.complete_task(owner.id, at(1)).unwrap();

        assert!(habit.break_streak());
        assert_eq!(habit.streak.current, 0);
        assert_eq!(habit.stats.failed_days, 1);
        assert!(habit.streak.consecutive_days.is_empty());

        assert!(!habit.break_streak());
        assert_eq!(habit.stats.failed_days, 1);
    }

    #[test]
    fn longest_survives_a_break() {
        let (mut habit, owner) = solo_habit();
        for day in 1..=3 {
            habit.complete_task(owner.id, at(day)).unwrap();
        }
        assert_eq!(habit.streak.longest, 3);

        habit.break_streak();
        habit.complete_task(owner.id, at(5)).unwrap();
        assert_eq!(habit.streak.current, 1);
        assert_eq!(habit.streak.longest, 3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            CompleteOwner(u32),
            CompleteFriend(u32),
            UndoOwner(u32),
            UndoFriend(u32),
            Break,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1u32..=28).prop_map(Op::CompleteOwner),
                (1u32..=28).prop_map(Op::CompleteFriend),
                (1u32..=28).prop_map(Op::UndoOwner),
                (1u32..=28).prop_map(Op::UndoFriend),
                Just(Op::Break),
            ]
        }

        proptest! {
            // longest >= current after every operation, and longest
            // never decreases, for arbitrary operation sequences.
            #[test]
            fn longest_is_monotone_upper_bound(ops in prop::collection::vec(op_strategy(), 0..60)) {
                let (mut habit, owner, friend) = duo_habit();
                let mut prev_longest = 0;
                for op in ops {
                    let _ = match op {
                        Op::CompleteOwner(d) => habit.complete_task(owner.id, at(d)).map(|_| ()),
                        Op::CompleteFriend(d) => habit.complete_task(friend.id, at(d)).map(|_| ()),
                        Op::UndoOwner(d) => habit.undo_task(owner.id, DayKey::from_utc(at(d))).map(|_| ()),
                        Op::UndoFriend(d) => habit.undo_task(friend.id, DayKey::from_utc(at(d))).map(|_| ()),
                        Op::Break => {
                            habit.break_streak();
                            Ok(())
                        }
                    };
                    prop_assert!(habit.streak.longest >= habit.streak.current);
                    prop_assert!(habit.streak.longest >= prev_longest);
                    prev_longest = habit.streak.longest;
                }
            }

            // Success rate always matches its defining formula.
            #[test]
            fn success_rate_matches_formula(ops in prop::collection::vec(op_strategy(), 0..60)) {
                let (mut habit, owner, friend) = duo_habit();
                for op in ops {
                    let _ = match op {
                        Op::CompleteOwner(d) => habit.complete_task(owner.id, at(d)).map(|_| ()),
                        Op::CompleteFriend(d) => habit.complete_task(friend.id, at(d)).map(|_| ()),
                        Op::UndoOwner(d) => habit.undo_task(owner.id, DayKey::from_utc(at(d))).map(|_| ()),
                        Op::UndoFriend(d) => habit.undo_task(friend.id, DayKey::from_utc(at(d))).map(|_| ()),
                        Op::Break => {
                            habit.break_streak();
                            Ok(())
                        }
                    };
                    let expected = if habit.stats.total_days > 0 {
                        ((habit.stats.successful_days as f64 / habit.stats.total_days as f64) * 100.0).round() as u32
                    } else {
                        0
                    };
                    prop_assert_eq!(habit.stats.success_rate, expected);
                }
            }
        }
    }
}
