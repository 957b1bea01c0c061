//! # Reminder Lifecycle Service
//!
//! Create/cancel operations invoked from user-facing surfaces. Goal reminder
//! schedules start with `next_trigger_at = now + interval(frequency)`; habit
//! reminder state is flagged off rather than deleted, so toggling back on
//! resumes with the last-sent history intact.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.1.0
//! - **Toggleable**: false

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::core::StoreError;
use crate::database::{Frequency, GoalReminderSchedule, HabitReminderState, ScheduleStore};
use crate::features::reminders::calculator;

/// Parameters for enabling reminders on a goal.
#[derive(Debug, Clone)]
pub struct EnableGoalReminders {
    pub goal_id: String,
    pub user_id: String,
    pub discord_user_id: Option<String>,
    pub goal_title: String,
    pub frequency: Frequency,
    pub deadline: Option<DateTime<Utc>>,
}

pub struct ReminderService {
    store: Arc<dyn ScheduleStore>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        ReminderService { store }
    }

    /// Enable reminders on a goal. The first trigger lands one full interval
    /// from `now`.
    pub async fn enable_goal_reminders(
        &self,
        request: EnableGoalReminders,
        now: DateTime<Utc>,
    ) -> Result<GoalReminderSchedule, StoreError> {
        let schedule = GoalReminderSchedule {
            goal_id: request.goal_id,
            user_id: request.user_id,
            discord_user_id: request.discord_user_id,
            goal_title: request.goal_title,
            frequency: request.frequency,
            next_trigger_at: calculator::next_trigger(request.frequency, now),
            last_trigger_at: None,
            enabled: true,
            is_completed: false,
            is_active: true,
            deadline: request.deadline,
        };
        self.store.upsert_goal_reminder(&schedule).await?;
        info!(
            "Enabled {} reminders for goal {} (first trigger {})",
            schedule.frequency, schedule.goal_id, schedule.next_trigger_at
        );
        Ok(schedule)
    }

    /// Cancel reminders on a goal. The schedule row stays around disabled.
    pub async fn cancel_goal_reminders(&self, goal_id: &str) -> Result<(), StoreError> {
        self.store.disable_goal_reminder(goal_id).await?;
        info!("Cancelled reminders for goal {goal_id}");
        Ok(())
    }

    /// Update a user's habit reminder settings, preserving the last-sent
    /// date across toggles and relinks.
    pub async fn update_habit_settings(
        &self,
        user_id: &str,
        discord_user_id: Option<String>,
        timezone: String,
        enabled: bool,
    ) -> Result<HabitReminderState, StoreError> {
        let previous = self.store.find_habit_state(user_id).await?;
        let state = HabitReminderState {
            user_id: user_id.to_string(),
            discord_user_id,
            timezone,
            habit_reminders_enabled: enabled,
            last_sent_date: previous.and_then(|p| p.last_sent_date),
        };
        self.store.upsert_habit_state(&state).await?;
        info!(
            "Habit reminders {} for user {user_id} (zone {})",
            if enabled { "enabled" } else { "disabled" },
            state.timezone
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::features::reminders::testing::instant;
    use chrono::NaiveDate;

    fn request(goal_id: &str, frequency: Frequency) -> EnableGoalReminders {
        EnableGoalReminders {
            goal_id: goal_id.to_string(),
            user_id: "u1".to_string(),
            discord_user_id: Some("100200300".to_string()),
            goal_title: "Read 12 books".to_string(),
            frequency,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn test_enable_schedules_one_interval_out() {
        let store = Arc::new(MemoryStore::new());
        let service = ReminderService::new(store.clone());
        let now = instant("2024-06-01T12:00:00Z");

        let schedule = service
            .enable_goal_reminders(request("g1", Frequency::Weekly), now)
            .await
            .unwrap();
        assert_eq!(schedule.next_trigger_at, instant("2024-06-08T12:00:00Z"));
        assert!(schedule.enabled);

        // Not yet due at creation time
        assert!(store.find_due_goal_reminders(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_disables_schedule() {
        let store = Arc::new(MemoryStore::new());
        let service = ReminderService::new(store.clone());
        let now = instant("2024-06-01T12:00:00Z");

        service
            .enable_goal_reminders(request("g1", Frequency::Daily), now)
            .await
            .unwrap();
        service.cancel_goal_reminders("g1").await.unwrap();

        assert!(!store.goal_reminder("g1").unwrap().enabled);
        assert!(store
            .find_due_goal_reminders(instant("2024-07-01T12:00:00Z"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_habit_toggle_preserves_sent_history() {
        let store = Arc::new(MemoryStore::new());
        let service = ReminderService::new(store.clone());
        let sent = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        store
            .upsert_habit_state(&HabitReminderState {
                user_id: "u1".to_string(),
                discord_user_id: Some("111".to_string()),
                timezone: "Europe/Berlin".to_string(),
                habit_reminders_enabled: true,
                last_sent_date: Some(sent),
            })
            .await
            .unwrap();

        let state = service
            .update_habit_settings("u1", Some("111".to_string()), "Europe/Berlin".to_string(), false)
            .await
            .unwrap();
        assert!(!state.habit_reminders_enabled);
        assert_eq!(state.last_sent_date, Some(sent));

        let state = service
            .update_habit_settings("u1", Some("111".to_string()), "Asia/Tokyo".to_string(), true)
            .await
            .unwrap();
        assert!(state.habit_reminders_enabled);
        assert_eq!(state.timezone, "Asia/Tokyo");
        assert_eq!(state.last_sent_date, Some(sent));
    }
}
