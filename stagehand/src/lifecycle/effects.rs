//! Side-effect seams for the lifecycle sweep.
//!
//! The sweep fires two kinds of external effects: the irreversible data
//! erase and outbound dispatches (email, webhooks). Both live behind
//! traits so the crate never knows which purge pipeline or mail service
//! the host wired in.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use super::record::AccountRecord;

/// Failure of the erase call.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EraseError(String);

impl EraseError {
    /// Creates an erase error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Failure of an outbound dispatch.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DispatchError(String);

impl DispatchError {
    /// Creates a dispatch error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Kind tag for outbound dispatches.
///
/// Rendered as the snake_case template name the dispatch backend keys on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    /// Pre-deletion warning sent while the account can still be saved.
    DeletionReminder,
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeletionReminder => write!(f, "deletion_reminder"),
        }
    }
}

/// Performs the irreversible terminal action for an account.
///
/// Called exactly once per account before the store transition is
/// recorded; if it fails, the record stays `PendingDeletion` and the
/// next sweep retries.
pub trait AccountEraser: Send + Sync + 'static {
    /// Purges the account's data.
    fn erase(&self, record: &AccountRecord) -> impl Future<Output = Result<(), EraseError>> + Send;
}

/// Sends outbound side effects (email, webhooks).
pub trait Dispatcher: Send + Sync + 'static {
    /// Dispatches one effect of the given kind to `target`.
    ///
    /// `params` carries the template parameters as a JSON object.
    fn send(
        &self,
        kind: EffectKind,
        target: &str,
        params: Value,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}
