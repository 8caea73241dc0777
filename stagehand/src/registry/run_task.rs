//! Run key, status and error types for registry-tracked jobs.
//!
//! A run is one execution of a job body under a logical key. The registry
//! tracks each run through a watch channel carrying [`RunStatus`]; the
//! key is a caller-defined string wrapped in the [`RunKey`] newtype.

use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Logical key identifying a single-flight run.
///
/// Keys are caller-defined strings, typically constructed from meaningful
/// data (like `"render-{actor_id}"`), so that a retry of the same logical
/// work maps onto the same key.
///
/// # Example
///
/// ```ignore
/// use stagehand::registry::RunKey;
///
/// let key = RunKey::new("render-42");
/// assert_eq!(key.as_str(), "render-42");
/// ```
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct RunKey(String);

impl RunKey {
    /// Creates a new run key with the given string value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the string value of this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunKey({})", self.0)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for RunKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Execution status of a tracked run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunStatus {
    /// Claimed but not yet polled.
    #[default]
    Pending,

    /// The job body is executing.
    Running,

    /// Completed successfully.
    Done,

    /// Completed with an error or a panic.
    Failed,

    /// Wound down after cancellation.
    Cancelled,
}

impl RunStatus {
    /// Returns true if this is a terminal state (the run is complete).
    ///
    /// Terminal states are: Done, Failed, Cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the run is still live (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Error returned by a job body.
///
/// The registry logs the message at completion and records the run as
/// `Failed`; nothing is re-raised to the `start` caller.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct JobError(String);

impl JobError {
    /// Creates a job error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

impl From<String> for JobError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Registry-internal record of one tracked run.
pub(crate) struct RunTask {
    status_rx: watch::Receiver<RunStatus>,
    cancellation: CancellationToken,
}

impl RunTask {
    pub(crate) fn new(
        status_rx: watch::Receiver<RunStatus>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            status_rx,
            cancellation,
        }
    }

    /// Returns the most recently published status.
    pub(crate) fn status(&self) -> RunStatus {
        *self.status_rx.borrow()
    }

    /// Returns true once the run has published a terminal status.
    pub(crate) fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Returns a fresh receiver for awaiting status transitions.
    pub(crate) fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status_rx.clone()
    }

    /// Returns the cancellation token handed to the job body.
    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}
