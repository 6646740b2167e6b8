//! Error types for the dispatch core
//!
//! Steady-state conditions (full ring, expired listener, blocked enqueue)
//! are not errors and never show up here. These variants only cover
//! construction and configuration problems.

use thiserror::Error;

/// Errors that can occur while setting up message dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Bounded channel capacity must be non-zero
    #[error("Invalid channel capacity {0}: must be at least 1")]
    InvalidCapacity(usize),

    /// Refresh interval must be non-zero
    #[error("Invalid refresh interval: {0}ms")]
    InvalidRefreshInterval(u64),

    /// Too many atoms for a single message
    #[error("Message has {count} atoms, at most {max} are supported")]
    TooManyAtoms { count: usize, max: usize },

    /// Failed to spawn a background service thread
    #[error("Failed to spawn {service}: {reason}")]
    ServiceSpawn { service: String, reason: String },

    /// Background service is no longer running
    #[error("Service '{0}' is not running")]
    ServiceStopped(String),
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
