//! # Features Layer
//!
//! Feature modules of the reminder engine.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod dispatch;
pub mod reminders;

pub use dispatch::{DiscordGateway, DispatchGateway, Outcome};
pub use reminders::{
    DailyWindowSweeper, OverdueSweeper, ReminderService, SweepOrchestrator, SweepReport,
    SweepStats,
};
