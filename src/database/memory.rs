//! # In-Memory Schedule Store
//!
//! DashMap-backed `ScheduleStore` with the same conditional-update semantics
//! as the SQLite store. Used by the test harness and for ephemeral dev runs.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;

use crate::core::StoreError;
use crate::database::{
    GoalReminderAdvance, GoalReminderSchedule, HabitReminderState, ScheduleStore,
};

#[derive(Default)]
pub struct MemoryStore {
    goals: DashMap<String, GoalReminderSchedule>,
    habits: DashMap<String, HabitReminderState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Test/diagnostic accessor for a goal reminder row.
    pub fn goal_reminder(&self, goal_id: &str) -> Option<GoalReminderSchedule> {
        self.goals.get(goal_id).map(|entry| entry.clone())
    }

    /// Test/diagnostic accessor for a habit reminder row.
    pub fn habit_state(&self, user_id: &str) -> Option<HabitReminderState> {
        self.habits.get(user_id).map(|entry| entry.clone())
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn find_due_goal_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<GoalReminderSchedule>, StoreError> {
        let mut due: Vec<GoalReminderSchedule> = self
            .goals
            .iter()
            .filter(|entry| {
                let s = entry.value();
                s.enabled && !s.is_completed && s.is_active && s.next_trigger_at <= now
            })
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by(|a, b| a.next_trigger_at.cmp(&b.next_trigger_at));
        Ok(due)
    }

    async fn cas_advance_goal_reminder(
        &self,
        goal_id: &str,
        expected_next_trigger_at: DateTime<Utc>,
        advance: GoalReminderAdvance,
    ) -> Result<bool, StoreError> {
        // The comparison and write happen under the shard lock held by
        // `get_mut`, which makes the update atomic.
        match self.goals.get_mut(goal_id) {
            Some(mut entry) => {
                let schedule = entry.value_mut();
                if !schedule.enabled || schedule.next_trigger_at != expected_next_trigger_at {
                    return Ok(false);
                }
                schedule.last_trigger_at = Some(advance.last_trigger_at);
                schedule.next_trigger_at = advance.next_trigger_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn disable_goal_reminder(&self, goal_id: &str) -> Result<(), StoreError> {
        if let Some(mut entry) = self.goals.get_mut(goal_id) {
            entry.value_mut().enabled = false;
        }
        Ok(())
    }

    async fn find_habit_reminder_candidates(
        &self,
    ) -> Result<Vec<HabitReminderState>, StoreError> {
        let mut candidates: Vec<HabitReminderState> = self
            .habits
            .iter()
            .filter(|entry| {
                let s = entry.value();
                s.habit_reminders_enabled && s.discord_connected()
            })
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(candidates)
    }

    async fn find_habit_state(
        &self,
        user_id: &str,
    ) -> Result<Option<HabitReminderState>, StoreError> {
        Ok(self.habits.get(user_id).map(|entry| entry.clone()))
    }

    async fn cas_update_habit_sent_date(
        &self,
        user_id: &str,
        expected_last_sent: Option<NaiveDate>,
        new_date: NaiveDate,
    ) -> Result<bool, StoreError> {
        match self.habits.get_mut(user_id) {
            Some(mut entry) => {
                let state = entry.value_mut();
                if state.last_sent_date != expected_last_sent {
                    return Ok(false);
                }
                state.last_sent_date = Some(new_date);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_goal_reminder(
        &self,
        schedule: &GoalReminderSchedule,
    ) -> Result<(), StoreError> {
        self.goals.insert(schedule.goal_id.clone(), schedule.clone());
        Ok(())
    }

    async fn upsert_habit_state(&self, state: &HabitReminderState) -> Result<(), StoreError> {
        self.habits.insert(state.user_id.clone(), state.clone());
        Ok(())
    }
}
