//! Single-flight job registry.
//!
//! Tracks at most one live run per [`RunKey`]. The claim is an atomic
//! check-and-insert on the keyed map, so two concurrent `start` calls for
//! the same key can never both spawn.
//!
//! # Architecture
//!
//! ```text
//! start(key, job) ──► entry(key) vacant? ──► insert RunTask, spawn wrapper
//!                          │ occupied, live
//!                          ▼
//!                     debug! no-op
//!
//! wrapper: Running ──► await body ──► Done / Failed / Cancelled ──► purge key
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::run_task::{JobError, RunKey, RunStatus, RunTask};

/// Point-in-time view of the registry's tracked runs.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Number of live runs.
    pub count: usize,

    /// Keys of live runs, in map iteration order.
    pub keys: Vec<String>,
}

/// Keyed single-flight job executor.
///
/// The registry is a constructed value: the host builds one, injects it
/// where jobs are started, and drains it with [`shutdown`] on the way
/// out. It is cheap to clone; all clones share the same tracked map.
///
/// [`shutdown`]: JobRegistry::shutdown
#[derive(Clone)]
pub struct JobRegistry {
    tasks: Arc<DashMap<RunKey, RunTask>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// Starts a job under the given key.
    ///
    /// The job body receives a [`CancellationToken`] and must observe it
    /// cooperatively. If a live run already exists for the key this is a
    /// logged no-op and the existing run keeps going.
    ///
    /// Errors and panics from the body are recorded as `Failed` and
    /// logged; nothing propagates back to this call site.
    ///
    /// # Returns
    ///
    /// `true` if a new run was spawned, `false` if the key was busy.
    pub fn start<F, Fut>(&self, key: impl Into<RunKey>, job: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let key = key.into();
        let (status_tx, status_rx) = watch::channel(RunStatus::Pending);
        let cancellation = CancellationToken::new();
        let task = RunTask::new(status_rx, cancellation.clone());

        // Atomic claim: the vacancy check and the insert happen under the
        // same shard lock, so a concurrent start cannot slip in between.
        match self.tasks.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_terminal() {
                    debug!(key = %key, "run already in flight, start ignored");
                    return false;
                }
                // Terminal entry not yet purged by its wrapper; replace it.
                occupied.insert(task);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(task);
            }
        }

        info!(key = %key, "run started");

        let tasks = Arc::clone(&self.tasks);
        let token = cancellation.clone();
        tokio::spawn(async move {
            let _ = status_tx.send(RunStatus::Running);

            let outcome = AssertUnwindSafe(job(token.clone())).catch_unwind().await;

            let status = match outcome {
                Ok(Ok(())) => {
                    if token.is_cancelled() {
                        debug!(key = %key, "run wound down after cancellation");
                        RunStatus::Cancelled
                    } else {
                        debug!(key = %key, "run completed");
                        RunStatus::Done
                    }
                }
                Ok(Err(err)) => {
                    if token.is_cancelled() {
                        debug!(key = %key, error = %err, "run aborted during cancellation");
                        RunStatus::Cancelled
                    } else {
                        warn!(key = %key, error = %err, "run failed");
                        RunStatus::Failed
                    }
                }
                Err(_) => {
                    warn!(key = %key, "run panicked");
                    RunStatus::Failed
                }
            };

            let _ = status_tx.send(status);

            // Purge our own entry. The terminal guard keeps this from
            // deleting a replacement run that claimed the key after the
            // status above was published.
            tasks.remove_if(&key, |_, task| task.is_terminal());
        });

        true
    }

    /// Returns true iff a live (non-terminal) run exists for the key.
    pub fn is_running(&self, key: &str) -> bool {
        self.tasks
            .get(key)
            .map(|task| !task.is_terminal())
            .unwrap_or(false)
    }

    /// Cancels the run for the given key and awaits its wind-down.
    ///
    /// Cancellation is cooperative: the token is fired and this method
    /// waits until the run publishes a terminal status. The run body is
    /// never force-killed.
    ///
    /// # Returns
    ///
    /// `false` if the key is unknown or already terminal (no side
    /// effect), `true` once the run has wound down.
    pub async fn cancel(&self, key: &str) -> bool {
        let (token, mut status_rx) = match self.tasks.get(key) {
            Some(task) if !task.is_terminal() => (task.cancellation(), task.subscribe()),
            _ => return false,
        };

        info!(key, "run cancellation requested");
        token.cancel();

        while !status_rx.borrow().is_terminal() {
            if status_rx.changed().await.is_err() {
                // Sender dropped without a terminal send; the run is gone.
                break;
            }
        }

        debug!(key, "run cancellation complete");
        true
    }

    /// Snapshots the live runs.
    ///
    /// Entries already terminal but not yet purged by their wrappers are
    /// dropped here first, so the snapshot never reports finished keys.
    pub fn status(&self) -> RegistrySnapshot {
        self.tasks.retain(|_, task| !task.is_terminal());

        let keys: Vec<String> = self
            .tasks
            .iter()
            .map(|entry| entry.key().as_str().to_string())
            .collect();

        RegistrySnapshot {
            count: keys.len(),
            keys,
        }
    }

    /// Cancels every tracked run and awaits all of them terminal.
    ///
    /// Called by the host on the way out so no run outlives the
    /// registry's owner.
    pub async fn shutdown(&self) {
        let pending: Vec<(RunKey, CancellationToken, watch::Receiver<RunStatus>)> = self
            .tasks
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().cancellation(),
                    entry.value().subscribe(),
                )
            })
            .collect();

        if pending.is_empty() {
            debug!("registry shutdown with no live runs");
            return;
        }

        info!(count = pending.len(), "registry draining runs");

        for (key, token, mut status_rx) in pending {
            token.cancel();
            while !status_rx.borrow().is_terminal() {
                if status_rx.changed().await.is_err() {
                    break;
                }
            }
            debug!(key = %key, "run drained");
        }

        info!("registry shutdown complete");
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
