//! # Daily Habit Window Sweeper
//!
//! Habit reminders fire once per user per local calendar day, at a fixed
//! local wall-clock hour. No per-user trigger timestamp exists; eligibility
//! is recomputed on every sweep from the current instant, the stored zone,
//! and the local date of the last send. The date comparison is what keeps
//! hourly sweeps from producing 24 sends.
//!
//! - **Version**: 1.1.0
//! - **Since**: 2.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.1.0: Bounded dispatch concurrency and cooperative cancellation
//! - 1.0.0: Initial window sweep

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::StoreError;
use crate::database::{HabitReminderState, ScheduleStore};
use crate::features::dispatch::{self, DispatchGateway, MessageKind, Outcome};
use crate::features::reminders::calculator;
use crate::features::reminders::stats::{ItemOutcome, SweepStats};

pub struct DailyWindowSweeper {
    store: Arc<dyn ScheduleStore>,
    gateway: Arc<dyn DispatchGateway>,
    target_hour: u32,
    concurrency: usize,
}

impl DailyWindowSweeper {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        gateway: Arc<dyn DispatchGateway>,
        target_hour: u32,
        concurrency: usize,
    ) -> Self {
        DailyWindowSweeper {
            store,
            gateway,
            target_hour: target_hour.min(23),
            concurrency: concurrency.max(1),
        }
    }

    /// Sweep all users currently inside their local target hour who have not
    /// been notified today (their local today).
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepStats, StoreError> {
        let candidates = self.store.find_habit_reminder_candidates().await?;
        let mut stats = SweepStats::default();

        // Window and date checks are pure; only users due right now become
        // dispatch items.
        let eligible: Vec<(HabitReminderState, NaiveDate)> = candidates
            .into_iter()
            .filter_map(|state| {
                let (local_date, local_hour) =
                    calculator::local_civil_or_utc(&state.timezone, now);
                if local_hour != self.target_hour {
                    return None;
                }
                match state.last_sent_date {
                    // `>=` also ignores rows stamped with a future date, so
                    // the sent-date only ever moves forward.
                    Some(last) if last >= local_date => None,
                    _ => Some((state, local_date)),
                }
            })
            .collect();

        if eligible.is_empty() {
            debug!("No habit reminders in window at {now}");
            return Ok(stats);
        }
        debug!("{} habit reminder(s) in window at {now}", eligible.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<ItemOutcome> = JoinSet::new();

        for (state, local_date) in eligible {
            if cancel.is_cancelled() {
                info!("Habit reminder sweep cancelled; remaining users retry next sweep");
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
                process_habit_reminder(store, gateway, state, local_date).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    error!("Habit reminder task aborted: {e}");
                    stats.record(ItemOutcome::Failed);
                }
            }
        }
        Ok(stats)
    }
}

async fn process_habit_reminder(
    store: Arc<dyn ScheduleStore>,
    gateway: Arc<dyn DispatchGateway>,
    state: HabitReminderState,
    local_date: NaiveDate,
) -> ItemOutcome {
    let recipient = match state.discord_user_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            debug!("User {} has no linked Discord account", state.user_id);
            return ItemOutcome::Skipped;
        }
    };

    let payload = dispatch::habit_summary_payload();
    match gateway
        .send(&recipient, MessageKind::HabitSummary, &payload)
        .await
    {
        Outcome::Sent => {
            // Guarded on the value read at selection time: a late-arriving
            // duplicate sweep holds a stale expected date and loses.
            match store
                .cas_update_habit_sent_date(&state.user_id, state.last_sent_date, local_date)
                .await
            {
                Ok(true) => {
                    info!(
                        "Sent habit reminder to user {} for {local_date}",
                        state.user_id
                    );
                    ItemOutcome::Succeeded
                }
                Ok(false) => {
                    debug!(
                        "User {} already stamped for {local_date} by a concurrent sweep",
                        state.user_id
                    );
                    ItemOutcome::Skipped
                }
                Err(e) => {
                    error!("Failed to stamp habit reminder for {}: {e}", state.user_id);
                    ItemOutcome::Failed
                }
            }
        }
        Outcome::Skipped(reason) => {
            debug!("Habit reminder for {} skipped: {reason:?}", state.user_id);
            ItemOutcome::Skipped
        }
        Outcome::Failed(reason) => {
            warn!(
                "Habit dispatch failed for {}: {reason}; date left unstamped",
                state.user_id
            );
            ItemOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::features::reminders::testing::{habit_user, instant, MockGateway};
    use chrono::Duration;

    fn sweeper(store: Arc<MemoryStore>, gateway: Arc<MockGateway>) -> DailyWindowSweeper {
        DailyWindowSweeper::new(store, gateway, 19, 4)
    }

    #[tokio::test]
    async fn test_new_york_evening_window() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        store
            .upsert_habit_state(&habit_user("u1", "America/New_York"))
            .await
            .unwrap();

        // 23:00 UTC in June = 19:00 EDT, no prior send: eligible
        let now = instant("2024-06-15T23:00:00Z");
        let stats = sweeper(store.clone(), gateway.clone())
            .run(now, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(
            store.habit_state("u1").unwrap().last_sent_date,
            Some(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
        );

        // Second sweep at 23:30 UTC the same local day: date unchanged, not eligible
        let stats = sweeper(store.clone(), gateway.clone())
            .run(instant("2024-06-15T23:30:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(gateway.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_24_hourly_sweeps_send_once() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        store
            .upsert_habit_state(&habit_user("u1", "America/New_York"))
            .await
            .unwrap();

        let sweeper = sweeper(store, gateway.clone());
        let start = instant("2024-06-15T05:00:00Z");
        for hour in 0..24 {
            let now = start + Duration::hours(hour);
            sweeper.run(now, &CancellationToken::new()).await.unwrap();
        }
        assert_eq!(gateway.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_outside_window_not_eligible() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        store
            .upsert_habit_state(&habit_user("u1", "America/New_York"))
            .await
            .unwrap();

        // 18:00 EDT
        let stats = sweeper(store, gateway.clone())
            .run(instant("2024-06-15T22:00:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(gateway.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_next_local_day_is_eligible_again() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        let mut state = habit_user("u1", "America/New_York");
        state.last_sent_date = NaiveDate::from_ymd_opt(2024, 6, 15);
        store.upsert_habit_state(&state).await.unwrap();

        let stats = sweeper(store.clone(), gateway.clone())
            .run(instant("2024-06-16T23:05:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(
            store.habit_state("u1").unwrap().last_sent_date,
            Some(NaiveDate::from_ymd_opt(2024, 6, 16).unwrap())
        );
    }

    #[tokio::test]
    async fn test_invalid_timezone_falls_back_to_utc() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        store
            .upsert_habit_state(&habit_user("u1", "Not/AZone"))
            .await
            .unwrap();

        // 19:00 UTC — inside the window under the UTC fallback
        let stats = sweeper(store, gateway.clone())
            .run(instant("2024-06-15T19:10:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_failed_dispatch_leaves_date_unstamped() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::failing_for(&["discord-u1"]));
        store
            .upsert_habit_state(&habit_user("u1", "UTC"))
            .await
            .unwrap();

        let now = instant("2024-06-15T19:10:00Z");
        let stats = sweeper(store.clone(), gateway)
            .run(now, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(store.habit_state("u1").unwrap().last_sent_date, None);

        // Still inside the window: the retry sweep reaches the user
        let gateway = Arc::new(MockGateway::new());
        let stats = sweeper(store.clone(), gateway)
            .run(now + Duration::minutes(20), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_users_in_different_zones_fire_independently() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        store
            .upsert_habit_state(&habit_user("ny", "America/New_York"))
            .await
            .unwrap();
        store
            .upsert_habit_state(&habit_user("berlin", "Europe/Berlin"))
            .await
            .unwrap();

        let sweeper = sweeper(store, gateway.clone());

        // 17:00 UTC in June: 19:00 CEST in Berlin, 13:00 EDT in New York
        let stats = sweeper
            .run(instant("2024-06-15T17:30:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);

        // 23:00 UTC: 19:00 EDT in New York; Berlin is past its window
        let stats = sweeper
            .run(instant("2024-06-15T23:00:00Z"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(gateway.sent_count(), 2);
    }
}
