//! # SQLite Schedule Store
//!
//! Reference implementation of `ScheduleStore` on the `sqlite` crate.
//! Instants are stored as `%Y-%m-%d %H:%M:%S` UTC strings (lexicographic
//! order matches chronological order, so due-row selection is a plain string
//! comparison) and local calendar dates as `%Y-%m-%d`. Both CAS operations
//! are single conditional UPDATE statements checked via `change_count`.
//!
//! - **Version**: 1.1.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Conditional-update guards on reschedule and habit stamp
//! - 1.0.0: Initial schema and queries

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;
use sqlite::{Connection, ConnectionThreadSafe, State};
use tokio::sync::Mutex;

use crate::core::StoreError;
use crate::database::{
    Frequency, GoalReminderAdvance, GoalReminderSchedule, HabitReminderState, ScheduleStore,
};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct SqliteStore {
    // One connection, serialized with an async mutex so each statement and
    // its change_count read stay paired.
    conn: Arc<Mutex<ConnectionThreadSafe>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_thread_safe(path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS goal_reminders (
                goal_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                discord_user_id TEXT,
                goal_title TEXT NOT NULL,
                frequency TEXT NOT NULL,
                next_trigger_at TEXT,
                last_trigger_at TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                is_completed INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                deadline TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_goal_reminders_due
                ON goal_reminders (enabled, next_trigger_at);
            CREATE TABLE IF NOT EXISTS habit_reminders (
                user_id TEXT PRIMARY KEY,
                discord_user_id TEXT,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                habit_reminders_enabled INTEGER NOT NULL DEFAULT 0,
                last_sent_date TEXT,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format(DATETIME_FORMAT).to_string()
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .map_err(|e| StoreError::Query(format!("bad datetime '{raw}': {e}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StoreError::Query(format!("bad date '{raw}': {e}")))
}

fn query_err(e: sqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl ScheduleStore for SqliteStore {
    async fn find_due_goal_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<GoalReminderSchedule>, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare(
                "SELECT goal_id, user_id, discord_user_id, goal_title, frequency,
                        next_trigger_at, last_trigger_at, enabled, is_completed,
                        is_active, deadline
                 FROM goal_reminders
                 WHERE enabled = 1 AND is_completed = 0 AND is_active = 1
                   AND next_trigger_at IS NOT NULL AND next_trigger_at <= ?
                 ORDER BY next_trigger_at",
            )
            .map_err(query_err)?;
        statement
            .bind((1, format_instant(now).as_str()))
            .map_err(query_err)?;

        let mut due = Vec::new();
        while statement.next().map_err(query_err)? == State::Row {
            let goal_id: String = statement.read("goal_id").map_err(query_err)?;
            let frequency_raw: String = statement.read("frequency").map_err(query_err)?;

            // A row with an unknown frequency cannot be rescheduled; skip it
            // rather than poison the whole sweep.
            let frequency = match Frequency::from_str(&frequency_raw) {
                Ok(f) => f,
                Err(e) => {
                    warn!("Skipping goal reminder {goal_id}: {e}");
                    continue;
                }
            };

            let next_raw: String = statement.read("next_trigger_at").map_err(query_err)?;
            let last_raw: Option<String> =
                statement.read("last_trigger_at").map_err(query_err)?;
            let deadline_raw: Option<String> = statement.read("deadline").map_err(query_err)?;

            due.push(GoalReminderSchedule {
                goal_id,
                user_id: statement.read("user_id").map_err(query_err)?,
                discord_user_id: statement.read("discord_user_id").map_err(query_err)?,
                goal_title: statement.read("goal_title").map_err(query_err)?,
                frequency,
                next_trigger_at: parse_instant(&next_raw)?,
                last_trigger_at: last_raw.as_deref().map(parse_instant).transpose()?,
                enabled: statement.read::<i64, _>("enabled").map_err(query_err)? != 0,
                is_completed: statement.read::<i64, _>("is_completed").map_err(query_err)? != 0,
                is_active: statement.read::<i64, _>("is_active").map_err(query_err)? != 0,
                deadline: deadline_raw.as_deref().map(parse_instant).transpose()?,
            });
        }
        Ok(due)
    }

    async fn cas_advance_goal_reminder(
        &self,
        goal_id: &str,
        expected_next_trigger_at: DateTime<Utc>,
        advance: GoalReminderAdvance,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare(
                "UPDATE goal_reminders
                 SET last_trigger_at = ?, next_trigger_at = ?, updated_at = ?
                 WHERE goal_id = ? AND enabled = 1 AND next_trigger_at = ?",
            )
            .map_err(query_err)?;
        statement
            .bind((1, format_instant(advance.last_trigger_at).as_str()))
            .map_err(query_err)?;
        statement
            .bind((2, format_instant(advance.next_trigger_at).as_str()))
            .map_err(query_err)?;
        statement
            .bind((3, format_instant(Utc::now()).as_str()))
            .map_err(query_err)?;
        statement.bind((4, goal_id)).map_err(query_err)?;
        statement
            .bind((5, format_instant(expected_next_trigger_at).as_str()))
            .map_err(query_err)?;
        while statement.next().map_err(query_err)? != State::Done {}
        Ok(conn.change_count() > 0)
    }

    async fn disable_goal_reminder(&self, goal_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare("UPDATE goal_reminders SET enabled = 0, updated_at = ? WHERE goal_id = ?")
            .map_err(query_err)?;
        statement
            .bind((1, format_instant(Utc::now()).as_str()))
            .map_err(query_err)?;
        statement.bind((2, goal_id)).map_err(query_err)?;
        while statement.next().map_err(query_err)? != State::Done {}
        Ok(())
    }

    async fn find_habit_reminder_candidates(
        &self,
    ) -> Result<Vec<HabitReminderState>, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare(
                "SELECT user_id, discord_user_id, timezone, habit_reminders_enabled,
                        last_sent_date
                 FROM habit_reminders
                 WHERE habit_reminders_enabled = 1
                   AND discord_user_id IS NOT NULL AND discord_user_id != ''
                 ORDER BY user_id",
            )
            .map_err(query_err)?;

        let mut candidates = Vec::new();
        while statement.next().map_err(query_err)? == State::Row {
            let last_raw: Option<String> =
                statement.read("last_sent_date").map_err(query_err)?;
            candidates.push(HabitReminderState {
                user_id: statement.read("user_id").map_err(query_err)?,
                discord_user_id: statement.read("discord_user_id").map_err(query_err)?,
                timezone: statement.read("timezone").map_err(query_err)?,
                habit_reminders_enabled: statement
                    .read::<i64, _>("habit_reminders_enabled")
                    .map_err(query_err)?
                    != 0,
                last_sent_date: last_raw.as_deref().map(parse_date).transpose()?,
            });
        }
        Ok(candidates)
    }

    async fn find_habit_state(
        &self,
        user_id: &str,
    ) -> Result<Option<HabitReminderState>, StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare(
                "SELECT user_id, discord_user_id, timezone, habit_reminders_enabled,
                        last_sent_date
                 FROM habit_reminders WHERE user_id = ?",
            )
            .map_err(query_err)?;
        statement.bind((1, user_id)).map_err(query_err)?;

        if statement.next().map_err(query_err)? == State::Row {
            let last_raw: Option<String> =
                statement.read("last_sent_date").map_err(query_err)?;
            Ok(Some(HabitReminderState {
                user_id: statement.read("user_id").map_err(query_err)?,
                discord_user_id: statement.read("discord_user_id").map_err(query_err)?,
                timezone: statement.read("timezone").map_err(query_err)?,
                habit_reminders_enabled: statement
                    .read::<i64, _>("habit_reminders_enabled")
                    .map_err(query_err)?
                    != 0,
                last_sent_date: last_raw.as_deref().map(parse_date).transpose()?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn cas_update_habit_sent_date(
        &self,
        user_id: &str,
        expected_last_sent: Option<NaiveDate>,
        new_date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        // `IS ?` matches NULL when the bound expected value is NULL, which a
        // bare `=` would not.
        let mut statement = conn
            .prepare(
                "UPDATE habit_reminders
                 SET last_sent_date = ?, updated_at = ?
                 WHERE user_id = ? AND last_sent_date IS ?",
            )
            .map_err(query_err)?;
        statement
            .bind((1, new_date.format(DATE_FORMAT).to_string().as_str()))
            .map_err(query_err)?;
        statement
            .bind((2, format_instant(Utc::now()).as_str()))
            .map_err(query_err)?;
        statement.bind((3, user_id)).map_err(query_err)?;
        let expected = expected_last_sent.map(|d| d.format(DATE_FORMAT).to_string());
        statement
            .bind((4, expected.as_deref()))
            .map_err(query_err)?;
        while statement.next().map_err(query_err)? != State::Done {}
        Ok(conn.change_count() > 0)
    }

    async fn upsert_goal_reminder(
        &self,
        schedule: &GoalReminderSchedule,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare(
                "INSERT INTO goal_reminders
                    (goal_id, user_id, discord_user_id, goal_title, frequency,
                     next_trigger_at, last_trigger_at, enabled, is_completed,
                     is_active, deadline, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(goal_id) DO UPDATE SET
                    user_id = excluded.user_id,
                    discord_user_id = excluded.discord_user_id,
                    goal_title = excluded.goal_title,
                    frequency = excluded.frequency,
                    next_trigger_at = excluded.next_trigger_at,
                    last_trigger_at = excluded.last_trigger_at,
                    enabled = excluded.enabled,
                    is_completed = excluded.is_completed,
                    is_active = excluded.is_active,
                    deadline = excluded.deadline,
                    updated_at = excluded.updated_at",
            )
            .map_err(query_err)?;
        statement.bind((1, schedule.goal_id.as_str())).map_err(query_err)?;
        statement.bind((2, schedule.user_id.as_str())).map_err(query_err)?;
        statement
            .bind((3, schedule.discord_user_id.as_deref()))
            .map_err(query_err)?;
        statement
            .bind((4, schedule.goal_title.as_str()))
            .map_err(query_err)?;
        statement
            .bind((5, schedule.frequency.as_str()))
            .map_err(query_err)?;
        statement
            .bind((6, format_instant(schedule.next_trigger_at).as_str()))
            .map_err(query_err)?;
        let last = schedule.last_trigger_at.map(format_instant);
        statement.bind((7, last.as_deref())).map_err(query_err)?;
        statement
            .bind((8, schedule.enabled as i64))
            .map_err(query_err)?;
        statement
            .bind((9, schedule.is_completed as i64))
            .map_err(query_err)?;
        statement
            .bind((10, schedule.is_active as i64))
            .map_err(query_err)?;
        let deadline = schedule.deadline.map(format_instant);
        statement.bind((11, deadline.as_deref())).map_err(query_err)?;
        statement
            .bind((12, format_instant(Utc::now()).as_str()))
            .map_err(query_err)?;
        while statement.next().map_err(query_err)? != State::Done {}
        Ok(())
    }

    async fn upsert_habit_state(&self, state: &HabitReminderState) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let mut statement = conn
            .prepare(
                "INSERT INTO habit_reminders
                    (user_id, discord_user_id, timezone, habit_reminders_enabled,
                     last_sent_date, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET
                    discord_user_id = excluded.discord_user_id,
                    timezone = excluded.timezone,
                    habit_reminders_enabled = excluded.habit_reminders_enabled,
                    last_sent_date = excluded.last_sent_date,
                    updated_at = excluded.updated_at",
            )
            .map_err(query_err)?;
        statement.bind((1, state.user_id.as_str())).map_err(query_err)?;
        statement
            .bind((2, state.discord_user_id.as_deref()))
            .map_err(query_err)?;
        statement.bind((3, state.timezone.as_str())).map_err(query_err)?;
        statement
            .bind((4, state.habit_reminders_enabled as i64))
            .map_err(query_err)?;
        let last = state
            .last_sent_date
            .map(|d| d.format(DATE_FORMAT).to_string());
        statement.bind((5, last.as_deref())).map_err(query_err)?;
        statement
            .bind((6, format_instant(Utc::now()).as_str()))
            .map_err(query_err)?;
        while statement.next().map_err(query_err)? != State::Done {}
        Ok(())
    }
}
