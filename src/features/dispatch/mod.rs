//! # Dispatch Feature
//!
//! Outbound notification gateway. Wraps the Discord channel behind a small
//! three-way outcome contract: `Sent`, `Skipped` (expected, e.g. channel not
//! linked), `Failed` (transport error, retried implicitly on the next sweep).
//! Nothing escapes the gateway boundary as an error.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: true

pub mod discord;

pub use discord::DiscordGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::GoalReminderSchedule;

/// What kind of reminder a dispatch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    GoalReminder,
    HabitSummary,
}

/// Why a dispatch was skipped. Skips are expected states, not errors, and
/// are excluded from failure statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ChannelNotLinked,
    FeatureDisabled,
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Skipped(SkipReason),
    Failed(String),
}

/// Message content handed to the gateway.
#[derive(Debug, Clone)]
pub struct DispatchPayload {
    pub content: String,
}

/// Notification channel boundary. Implementations never propagate errors;
/// transport problems are folded into `Outcome::Failed`. The gateway does
/// no retries of its own — retry is the next sweep cycle's job.
#[async_trait]
pub trait DispatchGateway: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        kind: MessageKind,
        payload: &DispatchPayload,
    ) -> Outcome;
}

/// Build the Discord message for a due goal reminder.
pub fn goal_reminder_payload(schedule: &GoalReminderSchedule, now: DateTime<Utc>) -> DispatchPayload {
    let mut content = format!(
        "⏰ **Goal reminder:** keep working toward **{}**!\n> Recurs {}.",
        schedule.goal_title, schedule.frequency
    );

    if let Some(deadline) = schedule.deadline {
        let days_left = (deadline.date_naive() - now.date_naive()).num_days();
        if days_left >= 0 {
            content.push_str(&format!(
                " Deadline {} ({} day{} left).",
                deadline.format("%Y-%m-%d"),
                days_left,
                if days_left == 1 { "" } else { "s" }
            ));
        } else {
            content.push_str(&format!(
                " Deadline {} has passed — consider updating the goal.",
                deadline.format("%Y-%m-%d")
            ));
        }
    }

    DispatchPayload { content }
}

/// Build the Discord message for the daily habit check-in.
pub fn habit_summary_payload() -> DispatchPayload {
    DispatchPayload {
        content: "🌙 **Evening check-in!** How did your habits go today?\n\
                  Log them now to keep your streaks alive."
            .to_string(),
    }
}
