//! Participant roster: membership and acceptance-state truth.
//!
//! Email is the durable join key -- an invite can predate the invitee
//! having any resolvable identity. The identity reference attaches on
//! first acceptance; lookups during the pending phase always go through
//! the email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Identity, SharedHabit, UserId};
use crate::error::{HabitError, Result};

/// Invitation status of a roster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Invited, not yet answered.
    Pending,
    /// Counted toward "all completed" and streak computations.
    Accepted,
    /// Kept for audit, never counted again.
    Declined,
}

/// One membership record. Exactly one per unique email per habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Unset until the invited person is a known identity.
    pub user_id: Option<UserId>,
    pub email: String,
    pub status: ParticipantStatus,
    pub joined_at: Option<DateTime<Utc>>,
    pub invited_at: DateTime<Utc>,
}

impl Participant {
    pub(crate) fn accepted_owner(owner: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            user_id: Some(owner.id),
            email: owner.email.to_ascii_lowercase(),
            status: ParticipantStatus::Accepted,
            joined_at: Some(now),
            invited_at: now,
        }
    }

    fn pending(email: String, resolved: Option<&Identity>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: resolved.map(|i| i.id),
            email,
            status: ParticipantStatus::Pending,
            joined_at: None,
            invited_at: now,
        }
    }
}

impl SharedHabit {
    /// Invite an email address to the habit.
    ///
    /// Fails with [`HabitError::AlreadyParticipant`] for any existing
    /// record except a declined one; a declined record is re-armed to
    /// pending as a fresh invite.
    pub fn invite_participant(
        &mut self,
        email: &str,
        resolved: Option<&Identity>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let email = email.trim().to_ascii_lowercase();
        match self.participants.iter_mut().find(|p| p.email == email) {
            Some(p) if p.status == ParticipantStatus::Declined => {
                p.status = ParticipantStatus::Pending;
                p.invited_at = now;
                p.joined_at = None;
                if let Some(identity) = resolved {
                    p.user_id = Some(identity.id);
                }
                Ok(())
            }
            Some(_) => Err(HabitError::AlreadyParticipant { email }),
            None => {
                self.participants
                    .push(Participant::pending(email, resolved, now));
                Ok(())
            }
        }
    }

    /// Accept a pending invitation, resolved by the caller's email.
    ///
    /// Attaches the identity reference and stamps `joined_at`. A repeat
    /// call fails with [`HabitError::NoPendingInvitation`] because the
    /// status is no longer pending.
    pub fn accept_invitation(&mut self, who: &Identity, now: DateTime<Utc>) -> Result<()> {
        let email = who.email.trim().to_ascii_lowercase();
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.email == email && p.status == ParticipantStatus::Pending)
            .ok_or(HabitError::NoPendingInvitation {
                email: email.clone(),
            })?;
        participant.user_id = Some(who.id);
        participant.status = ParticipantStatus::Accepted;
        participant.joined_at = Some(now);
        Ok(())
    }

    /// Decline a pending invitation. The record stays on the roster for
    /// audit but is never counted again.
    pub fn decline_invitation(&mut self, who: &Identity) -> Result<()> {
        let email = who.email.trim().to_ascii_lowercase();
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.email == email && p.status == ParticipantStatus::Pending)
            .ok_or(HabitError::NoPendingInvitation {
                email: email.clone(),
            })?;
        participant.status = ParticipantStatus::Declined;
        Ok(())
    }

    /// Remove a participant record entirely. The owner can never leave,
    /// only delete the habit.
    pub fn remove_participant(&mut self, user: UserId) -> Result<()> {
        if user == self.created_by {
            return Err(HabitError::OwnerCannotLeave);
        }
        let before = self.participants.len();
        self.participants.retain(|p| p.user_id != Some(user));
        if self.participants.len() == before {
            return Err(HabitError::NotParticipant);
        }
        Ok(())
    }

    /// Accepted roster members, the only set counted by the streak engine.
    pub fn accepted_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Accepted)
    }

    /// Ids of accepted participants with a linked identity.
    pub fn accepted_ids(&self) -> Vec<UserId> {
        self.accepted_participants()
            .filter_map(|p| p.user_id)
            .collect()
    }

    /// Whether the user is an accepted participant.
    pub fn is_accepted(&self, user: UserId) -> bool {
        self.accepted_participants()
            .any(|p| p.user_id == Some(user))
    }
}
