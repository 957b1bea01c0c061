//! # Error Taxonomy
//!
//! Typed errors for the scheduling engine. Calculator errors are recovered
//! locally (invalid timezones fall back to UTC, bad frequency rows are
//! skipped); store errors abort only the current sweep invocation.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: false

use thiserror::Error;

/// Errors from schedule arithmetic and timezone resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A stored frequency string did not match any known recurrence.
    #[error("unrecognized reminder frequency '{0}'")]
    InvalidFrequency(String),

    /// An IANA zone name could not be resolved. Callers fall back to UTC
    /// instead of aborting the sweep.
    #[error("unrecognized IANA timezone '{0}'")]
    InvalidTimezone(String),
}

/// Errors from the persistent schedule store.
///
/// `Unavailable` means the store could not be reached at all; a sweep that
/// hits it before processing any item surfaces it to the caller. `Query`
/// covers malformed statements or row decoding problems.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schedule store unavailable: {0}")]
    Unavailable(String),

    #[error("schedule store query failed: {0}")]
    Query(String),
}
