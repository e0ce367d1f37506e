//! Collaborator seams: identity lookup, notification emission, persistence.
//!
//! The core is written against an in-memory aggregate and delegates
//! durability and delivery to these traits. In-memory implementations
//! ship here for tests and embedding; production backends live outside
//! the crate.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::error::{HabitError, Result};
use crate::events::Event;
use crate::habit::{HabitId, Identity, SharedHabit, UserId};

/// Identity lookup by email. Invites can predate a resolvable identity,
/// so `None` is a normal answer.
pub trait IdentityDirectory: Send + Sync {
    fn resolve_by_email(&self, email: &str) -> Result<Option<Identity>>;
}

/// Fire-and-forget notification emission.
///
/// Invoked only after a successful save. A failure here is logged and
/// swallowed by the caller; it must never roll back a committed
/// state transition.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipients: &[UserId], event: &Event) -> Result<()>;
}

/// Durable storage for shared-habit aggregates.
///
/// A `save` failure propagates to the caller and the in-memory mutation
/// is discarded; there is no partial save.
pub trait HabitStore: Send + Sync {
    fn load(&self, id: HabitId) -> Result<SharedHabit>;
    fn save(&self, habit: &SharedHabit) -> Result<()>;
    fn delete(&self, id: HabitId) -> Result<()>;
    /// Ids of active (not soft-deleted) habits, for the sweep.
    fn active_habit_ids(&self) -> Result<Vec<HabitId>>;
}

/// In-memory habit store backing the integration tests.
#[derive(Default)]
pub struct MemoryStore {
    habits: RwLock<HashMap<HabitId, SharedHabit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HabitStore for MemoryStore {
    fn load(&self, id: HabitId) -> Result<SharedHabit> {
        let habits = self.habits.read().unwrap_or_else(|e| e.into_inner());
        habits.get(&id).cloned().ok_or(HabitError::NotFound)
    }

    fn save(&self, habit: &SharedHabit) -> Result<()> {
        let mut habits = self.habits.write().unwrap_or_else(|e| e.into_inner());
        habits.insert(habit.id, habit.clone());
        Ok(())
    }

    fn delete(&self, id: HabitId) -> Result<()> {
        let mut habits = self.habits.write().unwrap_or_else(|e| e.into_inner());
        habits.remove(&id).map(|_| ()).ok_or(HabitError::NotFound)
    }

    fn active_habit_ids(&self) -> Result<Vec<HabitId>> {
        let habits = self.habits.read().unwrap_or_else(|e| e.into_inner());
        Ok(habits
            .values()
            .filter(|h| h.is_active)
            .map(|h| h.id)
            .collect())
    }
}

/// In-memory identity directory keyed by lowercased email.
#[derive(Default)]
pub struct MemoryDirectory {
    identities: RwLock<HashMap<String, Identity>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: Identity) {
        let mut map = self.identities.write().unwrap_or_else(|e| e.into_inner());
        map.insert(identity.email.to_ascii_lowercase(), identity);
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn resolve_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let map = self.identities.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(&email.trim().to_ascii_lowercase()).cloned())
    }
}

/// Recording notifier: stores every emission for later assertion.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Vec<UserId>, Event)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All emissions so far, in order.
    pub fn sent(&self) -> Vec<(Vec<UserId>, Event)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Emissions of one event kind.
    pub fn sent_of_kind(&self, kind: &str) -> Vec<(Vec<UserId>, Event)> {
        self.sent()
            .into_iter()
            .filter(|(_, e)| e.kind() == kind)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipients: &[UserId], event: &Event) -> Result<()> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push((recipients.to_vec(), event.clone()));
        Ok(())
    }
}
