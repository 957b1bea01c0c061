//! # Core Module
//!
//! Configuration and error taxonomy shared across the scheduling engine.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::Config;
pub use error::{ScheduleError, StoreError};
