//! # Schedule Store
//!
//! Reminder schedule records and the persistent store interface the sweep
//! engine runs against. The store's only concurrency primitive is the
//! conditional (compare-and-swap) update: a write succeeds only if the
//! guarded field still holds the value read at selection time. Rejected
//! writes mean another sweep already handled the row.
//!
//! - **Version**: 1.2.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Added lifecycle upserts for goal and habit reminder state
//! - 1.1.0: CAS guards on goal reschedule and habit sent-date stamp
//! - 1.0.0: Initial store interface

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{ScheduleError, StoreError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Recurrence frequency for a goal reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(ScheduleError::InvalidFrequency(other.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One goal's reminder schedule, joined with the goal facts that gate
/// eligibility. `next_trigger_at` is nullable in storage before first
/// scheduling; rows returned by `find_due_goal_reminders` always carry it.
#[derive(Debug, Clone)]
pub struct GoalReminderSchedule {
    pub goal_id: String,
    pub user_id: String,
    /// Linked Discord account, if any. Dispatch requires it.
    pub discord_user_id: Option<String>,
    pub goal_title: String,
    pub frequency: Frequency,
    pub next_trigger_at: DateTime<Utc>,
    pub last_trigger_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    // Read-only goal facts. A completed or inactive goal is never eligible,
    // regardless of `enabled`.
    pub is_completed: bool,
    pub is_active: bool,
    pub deadline: Option<DateTime<Utc>>,
}

/// Per-user habit reminder state. Never deleted on toggle-off, only flagged,
/// so re-enabling resumes with `last_sent_date` history intact.
#[derive(Debug, Clone)]
pub struct HabitReminderState {
    pub user_id: String,
    pub discord_user_id: Option<String>,
    /// IANA zone name. Unset or unresolvable zones are treated as UTC.
    pub timezone: String,
    pub habit_reminders_enabled: bool,
    /// Local calendar date of the last habit reminder, in the user's zone.
    pub last_sent_date: Option<NaiveDate>,
}

impl HabitReminderState {
    pub fn discord_connected(&self) -> bool {
        self.discord_user_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Fields written when a dispatched goal reminder is rescheduled.
#[derive(Debug, Clone, Copy)]
pub struct GoalReminderAdvance {
    pub last_trigger_at: DateTime<Utc>,
    pub next_trigger_at: DateTime<Utc>,
}

/// Persistent schedule store consumed by the sweep engine.
///
/// Implementations must make both `cas_` operations atomic: the guard
/// comparison and the write happen as one statement, so of two concurrent
/// sweeps holding the same row exactly one update succeeds.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All enabled goal reminders with `next_trigger_at <= now` whose goal is
    /// still active and not completed.
    async fn find_due_goal_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<GoalReminderSchedule>, StoreError>;

    /// Advance a schedule after a successful dispatch. Succeeds only if the
    /// row's `next_trigger_at` still equals `expected_next_trigger_at` and
    /// the schedule is still enabled. Returns whether the write landed.
    async fn cas_advance_goal_reminder(
        &self,
        goal_id: &str,
        expected_next_trigger_at: DateTime<Utc>,
        advance: GoalReminderAdvance,
    ) -> Result<bool, StoreError>;

    /// Unconditionally disable a goal reminder (user cancel, goal completed
    /// or deactivated).
    async fn disable_goal_reminder(&self, goal_id: &str) -> Result<(), StoreError>;

    /// All users with habit reminders enabled and a linked Discord account.
    async fn find_habit_reminder_candidates(&self) -> Result<Vec<HabitReminderState>, StoreError>;

    /// One user's habit reminder state, if any exists.
    async fn find_habit_state(
        &self,
        user_id: &str,
    ) -> Result<Option<HabitReminderState>, StoreError>;

    /// Stamp the local date of a sent habit reminder. Succeeds only if the
    /// stored `last_sent_date` still equals `expected_last_sent`. Returns
    /// whether the write landed.
    async fn cas_update_habit_sent_date(
        &self,
        user_id: &str,
        expected_last_sent: Option<NaiveDate>,
        new_date: NaiveDate,
    ) -> Result<bool, StoreError>;

    /// Create or replace a goal reminder schedule.
    async fn upsert_goal_reminder(
        &self,
        schedule: &GoalReminderSchedule,
    ) -> Result<(), StoreError>;

    /// Create or replace a user's habit reminder state.
    async fn upsert_habit_state(&self, state: &HabitReminderState) -> Result<(), StoreError>;
}
