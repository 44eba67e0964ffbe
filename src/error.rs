//! Error types for the store monitor.
//!
//! Stats accumulation itself is total: every event application succeeds by
//! construction, and producer contract violations (out-of-order delivery,
//! re-entrant scans) surface as wrong numbers, not errors. The only fallible
//! surface is the event feed lifecycle.

use thiserror::Error;

/// Main error type for monitor operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("event feed is closed")]
    FeedClosed,
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
