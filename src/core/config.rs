//! # Configuration
//!
//! Process configuration loaded once from the environment at startup and
//! passed by reference into the components that need it. No module-level
//! mutable state.
//!
//! - **Version**: 1.1.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Added dispatch concurrency cap and habit reminder hour overrides
//! - 1.0.0: Initial release

use anyhow::{Context, Result};

/// Default local wall-clock hour for habit reminders.
pub const DEFAULT_HABIT_REMINDER_HOUR: u32 = 19;

/// Default cap on simultaneous outbound Discord calls per sweep.
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token used for DM dispatch.
    pub discord_token: String,
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Bind address for the sweep trigger HTTP listener, e.g. `0.0.0.0:8080`.
    pub http_bind_addr: String,
    /// Bearer secret for the sweep trigger endpoint. When unset the endpoint
    /// is open, which is the intended dev-mode behavior.
    pub sweep_auth_token: Option<String>,
    /// Local hour (0-23) at which habit reminders fire in each user's zone.
    pub habit_reminder_hour: u32,
    /// Maximum simultaneous outbound dispatch calls during a sweep.
    pub dispatch_concurrency: usize,
    /// Default log filter for env_logger.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables (a `.env` file is read
    /// by the binary before this is called).
    pub fn from_env() -> Result<Self> {
        let discord_token =
            std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?;

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "stride.db".to_string());

        let http_bind_addr =
            std::env::var("HTTP_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let sweep_auth_token = std::env::var("SWEEP_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        let habit_reminder_hour = match std::env::var("HABIT_REMINDER_HOUR") {
            Ok(raw) => {
                let hour: u32 = raw
                    .parse()
                    .with_context(|| format!("HABIT_REMINDER_HOUR '{raw}' is not a number"))?;
                anyhow::ensure!(hour < 24, "HABIT_REMINDER_HOUR must be 0-23, got {hour}");
                hour
            }
            Err(_) => DEFAULT_HABIT_REMINDER_HOUR,
        };

        let dispatch_concurrency = match std::env::var("DISPATCH_CONCURRENCY") {
            Ok(raw) => {
                let n: usize = raw
                    .parse()
                    .with_context(|| format!("DISPATCH_CONCURRENCY '{raw}' is not a number"))?;
                anyhow::ensure!(n > 0, "DISPATCH_CONCURRENCY must be at least 1");
                n
            }
            Err(_) => DEFAULT_DISPATCH_CONCURRENCY,
        };

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            discord_token,
            database_path,
            http_bind_addr,
            sweep_auth_token,
            habit_reminder_hour,
            dispatch_concurrency,
            log_level,
        })
    }
}
