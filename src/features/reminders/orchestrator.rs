//! # Sweep Orchestrator
//!
//! Externally-triggered entry point for one sweep: runs the overdue goal
//! sweeper and the daily habit sweeper concurrently (they touch disjoint
//! record sets) and folds their counters into one report. Per-item failures
//! stay inside the sweepers; the orchestrator errors only if a candidate
//! query fails before any item is processed.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core::StoreError;
use crate::database::ScheduleStore;
use crate::features::dispatch::DispatchGateway;
use crate::features::reminders::daily::DailyWindowSweeper;
use crate::features::reminders::overdue::OverdueSweeper;
use crate::features::reminders::stats::SweepReport;

pub struct SweepOrchestrator {
    overdue: OverdueSweeper,
    daily: DailyWindowSweeper,
}

impl SweepOrchestrator {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        gateway: Arc<dyn DispatchGateway>,
        habit_target_hour: u32,
        dispatch_concurrency: usize,
    ) -> Self {
        SweepOrchestrator {
            overdue: OverdueSweeper::new(store.clone(), gateway.clone(), dispatch_concurrency),
            daily: DailyWindowSweeper::new(
                store,
                gateway,
                habit_target_hour,
                dispatch_concurrency,
            ),
        }
    }

    /// Run one full sweep as of `now`. Safe to invoke concurrently with
    /// itself: every state mutation underneath is a conditional update, so
    /// overlapping sweeps agree on exactly one winner per due occurrence.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, StoreError> {
        info!("Reminder sweep starting at {now}");

        let (goal_stats, habit_stats) = tokio::join!(
            self.overdue.run(now, cancel),
            self.daily.run(now, cancel)
        );

        let report = SweepReport {
            goal_reminders: goal_stats?,
            habit_reminders: habit_stats?,
        };
        info!(
            "Reminder sweep finished: goals {}/{} sent ({} failed, {} skipped), habits {}/{} sent ({} failed, {} skipped)",
            report.goal_reminders.succeeded,
            report.goal_reminders.processed,
            report.goal_reminders.failed,
            report.goal_reminders.skipped,
            report.habit_reminders.succeeded,
            report.habit_reminders.processed,
            report.habit_reminders.failed,
            report.habit_reminders.skipped,
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Frequency, MemoryStore, ScheduleStore};
    use crate::features::reminders::testing::{due_goal, habit_user, instant, MockGateway};

    #[tokio::test]
    async fn test_sweep_covers_both_reminder_families() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());

        store
            .upsert_goal_reminder(&due_goal(
                "g1",
                Frequency::Daily,
                instant("2024-06-15T09:00:00Z"),
            ))
            .await
            .unwrap();
        store
            .upsert_habit_state(&habit_user("u1", "America/New_York"))
            .await
            .unwrap();

        let orchestrator =
            SweepOrchestrator::new(store, gateway.clone(), 19, 4);

        // 23:00 UTC: goal overdue, New York user inside the 19:00 window
        let report = orchestrator
            .run(instant("2024-06-15T23:00:00Z"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.goal_reminders.succeeded, 1);
        assert_eq!(report.habit_reminders.succeeded, 1);
        assert_eq!(gateway.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_one_bad_item_does_not_abort_the_batch() {
        let store = Arc::new(MemoryStore::new());
        // Dispatch fails for one goal owner; the other goal and the habit
        // user still get their reminders.
        let gateway = Arc::new(MockGateway::failing_for(&["100200300"]));

        let mut broken = due_goal("g1", Frequency::Daily, instant("2024-06-15T09:00:00Z"));
        broken.discord_user_id = Some("100200300".to_string());
        store.upsert_goal_reminder(&broken).await.unwrap();

        let mut fine = due_goal("g2", Frequency::Daily, instant("2024-06-15T09:00:00Z"));
        fine.discord_user_id = Some("400500600".to_string());
        store.upsert_goal_reminder(&fine).await.unwrap();

        store
            .upsert_habit_state(&habit_user("u1", "UTC"))
            .await
            .unwrap();

        let orchestrator = SweepOrchestrator::new(store, gateway.clone(), 19, 4);
        let report = orchestrator
            .run(instant("2024-06-15T19:05:00Z"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.goal_reminders.processed, 2);
        assert_eq!(report.goal_reminders.succeeded, 1);
        assert_eq!(report.goal_reminders.failed, 1);
        assert_eq!(report.habit_reminders.succeeded, 1);
    }

    #[tokio::test]
    async fn test_empty_stores_yield_empty_report() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = SweepOrchestrator::new(store, gateway, 19, 4);

        let report = orchestrator
            .run(instant("2024-06-15T19:00:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.goal_reminders.processed, 0);
        assert_eq!(report.habit_reminders.processed, 0);
    }
}
