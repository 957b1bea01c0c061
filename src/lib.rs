// Core layer - configuration and error taxonomy
pub mod core;

// Features layer - scheduling engine and dispatch gateway
pub mod features;

// Infrastructure - schedule store interface and implementations
pub mod database;

// HTTP layer - externally-triggered sweep endpoint
pub mod api;

// Re-export core config for convenience
pub use core::Config;

// Re-export feature items
pub use features::{
    // Dispatch
    DiscordGateway, DispatchGateway, Outcome,
    // Reminders
    DailyWindowSweeper, OverdueSweeper, ReminderService, SweepOrchestrator, SweepReport,
    SweepStats,
};

// Re-export store items
pub use database::{MemoryStore, ScheduleStore, SqliteStore};
