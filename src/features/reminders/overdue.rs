//! # Overdue Goal Reminder Sweeper
//!
//! Finds enabled goal reminders whose trigger instant has elapsed, dispatches
//! each one independently, and advances the schedule through a conditional
//! store update. A dispatch failure leaves the row untouched so the next
//! sweep retries it; a lost conditional update means a concurrent sweep
//! already handled the occurrence.
//!
//! - **Version**: 1.2.0
//! - **Since**: 2.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Bounded dispatch concurrency and cooperative cancellation
//! - 1.1.0: Next trigger chained from the scheduled instant, not sweep time
//! - 1.0.0: Initial sweep loop

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::StoreError;
use crate::database::{GoalReminderAdvance, GoalReminderSchedule, ScheduleStore};
use crate::features::dispatch::{self, DispatchGateway, MessageKind, Outcome};
use crate::features::reminders::calculator;
use crate::features::reminders::stats::{ItemOutcome, SweepStats};

pub struct OverdueSweeper {
    store: Arc<dyn ScheduleStore>,
    gateway: Arc<dyn DispatchGateway>,
    concurrency: usize,
}

impl OverdueSweeper {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        gateway: Arc<dyn DispatchGateway>,
        concurrency: usize,
    ) -> Self {
        OverdueSweeper {
            store,
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Sweep all due goal reminders as of `now`.
    ///
    /// Fails only if the candidate query fails. Per-item problems are folded
    /// into the returned stats and never abort sibling items. Cancelling
    /// stops new items from starting; in-flight items finish and keep their
    /// store updates.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepStats, StoreError> {
        let due = self.store.find_due_goal_reminders(now).await?;
        let mut stats = SweepStats::default();
        if due.is_empty() {
            debug!("No goal reminders due at {now}");
            return Ok(stats);
        }
        debug!("{} goal reminder(s) due at {now}", due.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<ItemOutcome> = JoinSet::new();

        for schedule in due {
            if cancel.is_cancelled() {
                info!("Goal reminder sweep cancelled; remaining items retry next sweep");
                break;
            }
            let store = self.store.clone();
            let gateway = self.gateway.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ItemOutcome::Skipped,
                };
                process_goal_reminder(store, gateway, schedule, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    error!("Goal reminder task aborted: {e}");
                    stats.record(ItemOutcome::Failed);
                }
            }
        }
        Ok(stats)
    }
}

async fn process_goal_reminder(
    store: Arc<dyn ScheduleStore>,
    gateway: Arc<dyn DispatchGateway>,
    schedule: GoalReminderSchedule,
    now: DateTime<Utc>,
) -> ItemOutcome {
    // The goal may have been completed or deactivated after the row was
    // selected; such schedules are dead weight, so disable them in passing.
    if schedule.is_completed || !schedule.is_active {
        debug!(
            "Goal {} is {}; disabling its reminder",
            schedule.goal_id,
            if schedule.is_completed { "completed" } else { "inactive" }
        );
        if let Err(e) = store.disable_goal_reminder(&schedule.goal_id).await {
            warn!("Could not disable stale reminder for goal {}: {e}", schedule.goal_id);
        }
        return ItemOutcome::Skipped;
    }

    let recipient = match schedule.discord_user_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            debug!("Goal {} owner has no linked Discord account", schedule.goal_id);
            return ItemOutcome::Skipped;
        }
    };

    let payload = dispatch::goal_reminder_payload(&schedule, now);
    match gateway
        .send(&recipient, MessageKind::GoalReminder, &payload)
        .await
    {
        Outcome::Sent => {
            // Chain from the scheduled instant rather than `now`, so sweep
            // latency never accumulates as drift. If the result is still in
            // the past the next sweep immediately re-fires and re-advances,
            // catching up one interval at a time.
            let next = calculator::next_trigger(schedule.frequency, schedule.next_trigger_at);
            let advance = GoalReminderAdvance {
                last_trigger_at: now,
                next_trigger_at: next,
            };
            match store
                .cas_advance_goal_reminder(&schedule.goal_id, schedule.next_trigger_at, advance)
                .await
            {
                Ok(true) => {
                    info!(
                        "Sent {} reminder for goal {}; next trigger {}",
                        schedule.frequency, schedule.goal_id, next
                    );
                    ItemOutcome::Succeeded
                }
                Ok(false) => {
                    debug!(
                        "Goal {} already rescheduled by a concurrent sweep",
                        schedule.goal_id
                    );
                    ItemOutcome::Skipped
                }
                Err(e) => {
                    error!("Failed to reschedule goal {}: {e}", schedule.goal_id);
                    ItemOutcome::Failed
                }
            }
        }
        Outcome::Skipped(reason) => {
            debug!("Goal {} reminder skipped: {reason:?}", schedule.goal_id);
            ItemOutcome::Skipped
        }
        Outcome::Failed(reason) => {
            warn!(
                "Dispatch failed for goal {}: {reason}; schedule left untouched",
                schedule.goal_id
            );
            ItemOutcome::Failed
        }
    }
}
