//! Shared error type for persistence collaborators.
//!
//! The crate never talks to a database directly; every durable read or
//! write goes through a store trait (`lifecycle::AccountStore`,
//! `hub::NotificationStore`). Implementations surface their failures
//! through [`StoreError`], which the sweeping and delivery loops treat as
//! transient: log, back off, retry on the next pass.

use thiserror::Error;

/// Failure reported by a store trait implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store was reachable but the operation failed.
    #[error("store query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// Creates an `Unavailable` error from any displayable cause.
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::Unavailable(cause.to_string())
    }

    /// Creates a `Query` error from any displayable cause.
    pub fn query(cause: impl std::fmt::Display) -> Self {
        Self::Query(cause.to_string())
    }
}
