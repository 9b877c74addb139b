//! Connection pool error types.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Pool errors.
///
/// Only acquisition can fail. Returning or retiring a connection never
/// reports an error to the caller.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Opening a new transport connection failed.
    ///
    /// The connector's error is passed through unchanged.
    #[error(transparent)]
    Open(#[from] io::Error),

    /// Timed out waiting for a connection to become available.
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    Timeout(Duration),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Check if this error is retryable.
    ///
    /// A failed open or a timeout leaves the pool untouched, so the
    /// caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Open(_) | Self::Timeout(_))
    }

    /// Check if this error is an acquire timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
