//! # Reminders Feature
//!
//! Reminder scheduling and sweep engine. There is no in-process scheduler
//! thread: the engine is a pure function of "now", invoked by an external
//! periodic trigger, and every state mutation is a conditional store update
//! so overlapping sweeps are safe.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Sweep-based engine with goal recurrence and daily habit windows
//! - 1.0.0: One-shot `/remind` scheduler

pub mod calculator;
pub mod daily;
pub mod orchestrator;
pub mod overdue;
pub mod service;
pub mod stats;

pub use daily::DailyWindowSweeper;
pub use orchestrator::SweepOrchestrator;
pub use overdue::OverdueSweeper;
pub use service::{EnableGoalReminders, ReminderService};
pub use stats::{SweepReport, SweepStats};
