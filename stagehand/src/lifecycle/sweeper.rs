//! Deletion sweeper daemon.
//!
//! This module provides the background loop that advances account
//! lifecycle state. Each pass:
//!
//! 1. Terminal pass: erase and mark `Deleted` every account past its
//!    deadline
//! 2. Reminder pass: dispatch the one-shot warning to accounts whose
//!    remaining time is inside the reminder window
//!
//! Per-record failures are logged and the batch continues; a store
//! failure aborts the pass and the loop retries after a shortened
//! backoff interval.
//!
//! # Example
//!
//! ```ignore
//! use stagehand::lifecycle::{DeletionSweeper, SweepConfig};
//! use std::sync::Arc;
//!
//! let sweeper = DeletionSweeper::new(
//!     Arc::new(store),
//!     Arc::new(eraser),
//!     Arc::new(mailer),
//!     SweepConfig::default(),
//! )
//! .with_notifications(hub);
//!
//! sweeper.start().await;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SweepConfig;
use super::effects::{AccountEraser, Dispatcher, EffectKind};
use super::store::AccountStore;
use crate::hub::{Notification, NotificationSink};
use crate::store::StoreError;

/// Counts from one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Accounts transitioned to `Deleted` by this pass.
    pub deleted: usize,

    /// Reminders sent by this pass.
    pub reminded: usize,
}

/// Live loop task state, present only while the sweeper is started.
struct LoopState {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background daemon sweeping accounts scheduled for deletion.
///
/// Constructed with its collaborators and a [`SweepConfig`]; the loop is
/// spawned by [`start`] and wound down by [`stop`]. [`sweep_once`] runs a
/// single pass without the loop, for composition and tests.
///
/// [`start`]: DeletionSweeper::start
/// [`stop`]: DeletionSweeper::stop
/// [`sweep_once`]: DeletionSweeper::sweep_once
pub struct DeletionSweeper<S, E, D> {
    worker: SweepWorker<S, E, D>,
    loop_state: Mutex<Option<LoopState>>,
}

impl<S, E, D> DeletionSweeper<S, E, D>
where
    S: AccountStore,
    E: AccountEraser,
    D: Dispatcher,
{
    /// Creates a sweeper with the given collaborators.
    pub fn new(store: Arc<S>, eraser: Arc<E>, dispatcher: Arc<D>, config: SweepConfig) -> Self {
        Self {
            worker: SweepWorker {
                store,
                eraser,
                dispatcher,
                sink: None,
                config,
            },
            loop_state: Mutex::new(None),
        }
    }

    /// Attaches a live notification sink (typically the push hub).
    ///
    /// When present, every reminder sent also surfaces as a live
    /// notification to the account's connected clients.
    pub fn with_notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.worker.sink = Some(sink);
        self
    }

    /// Starts the sweep loop.
    ///
    /// Idempotent: if the loop is already live this is a logged no-op.
    pub async fn start(&self) {
        let mut state = self.loop_state.lock().await;
        if state.is_some() {
            warn!("deletion sweeper already running, start ignored");
            return;
        }

        let shutdown = CancellationToken::new();
        let worker = self.worker.clone();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        *state = Some(LoopState { shutdown, handle });
        info!(
            sweep_interval_secs = self.worker.config.sweep_interval.as_secs(),
            "deletion sweeper started"
        );
    }

    /// Stops the sweep loop and awaits its exit.
    ///
    /// Takes effect immediately during the inter-pass sleep, or at the
    /// end of the pass currently in flight.
    pub async fn stop(&self) {
        let state = self.loop_state.lock().await.take();
        match state {
            Some(LoopState { shutdown, handle }) => {
                shutdown.cancel();
                if let Err(err) = handle.await {
                    warn!(error = %err, "sweep loop terminated abnormally");
                }
                info!("deletion sweeper stopped");
            }
            None => {
                debug!("deletion sweeper not running, stop ignored");
            }
        }
    }

    /// Runs a single sweep pass outside the loop.
    pub async fn sweep_once(&self) -> Result<SweepStats, StoreError> {
        self.worker.sweep_once().await
    }
}

/// The loop body, cloneable so the spawned task owns its own handles.
struct SweepWorker<S, E, D> {
    store: Arc<S>,
    eraser: Arc<E>,
    dispatcher: Arc<D>,
    sink: Option<Arc<dyn NotificationSink>>,
    config: SweepConfig,
}

impl<S, E, D> Clone for SweepWorker<S, E, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            eraser: Arc::clone(&self.eraser),
            dispatcher: Arc::clone(&self.dispatcher),
            sink: self.sink.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, E, D> SweepWorker<S, E, D>
where
    S: AccountStore,
    E: AccountEraser,
    D: Dispatcher,
{
    /// Runs the sweep loop until shutdown is signalled.
    async fn run(self, shutdown: CancellationToken) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            error_backoff_secs = self.config.error_backoff.as_secs(),
            reminder_window_secs = self.config.reminder_window.as_secs(),
            "deletion sweep loop starting"
        );

        let mut delay = self.config.sweep_interval;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("deletion sweep loop shutting down");
                    break;
                }

                _ = tokio::time::sleep(delay) => {}
            }

            delay = match self.sweep_once().await {
                Ok(stats) if stats.deleted > 0 || stats.reminded > 0 => {
                    info!(
                        deleted = stats.deleted,
                        reminded = stats.reminded,
                        "sweep pass complete"
                    );
                    self.config.sweep_interval
                }
                Ok(_) => {
                    debug!("sweep pass complete, nothing due");
                    self.config.sweep_interval
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        backoff_secs = self.config.error_backoff.as_secs(),
                        "sweep pass failed, backing off"
                    );
                    self.config.error_backoff
                }
            };
        }
    }

    /// One full pass: terminal transitions, then reminders.
    async fn sweep_once(&self) -> Result<SweepStats, StoreError> {
        let now = Utc::now();
        let deleted = self.terminal_pass(now).await?;
        let reminded = self.reminder_pass(now).await?;
        Ok(SweepStats { deleted, reminded })
    }

    /// Erases and marks `Deleted` every account past its deadline.
    async fn terminal_pass(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let due = self.store.find_due_deletions(now).await?;
        let mut deleted = 0;

        for record in due {
            if let Err(err) = self.eraser.erase(&record).await {
                warn!(
                    account_id = %record.id,
                    error = %err,
                    "account erase failed, will retry next sweep"
                );
                continue;
            }

            // Conditional transition: false means another sweeper (or an
            // earlier crashed pass) already moved this record.
            let modified = self.store.mark_deleted(&record.id).await?;
            if modified {
                info!(account_id = %record.id, "account deleted");
                deleted += 1;
            } else {
                debug!(account_id = %record.id, "account already transitioned, mark skipped");
            }
        }

        Ok(deleted)
    }

    /// Sends the one-shot reminder to accounts inside the window.
    async fn reminder_pass(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let window = self.config.reminder_window_chrono();
        let due = self.store.find_due_reminders(now, window).await?;
        let mut reminded = 0;

        for record in due {
            let days_left = (record.delete_after - now).num_days().max(0);
            let params = serde_json::json!({
                "account_id": record.id,
                "days_left": days_left,
                "delete_after": record.delete_after.to_rfc3339(),
            });

            // Dispatch first; the flag is only set after a confirmed send,
            // so a failed send is retried next sweep.
            if let Err(err) = self
                .dispatcher
                .send(EffectKind::DeletionReminder, &record.email, params)
                .await
            {
                warn!(
                    account_id = %record.id,
                    error = %err,
                    "deletion reminder dispatch failed, will retry next sweep"
                );
                continue;
            }

            let modified = self.store.mark_reminder_sent(&record.id).await?;
            if modified {
                info!(account_id = %record.id, days_left, "deletion reminder sent");
                reminded += 1;

                if let Some(sink) = &self.sink {
                    let delivered = sink
                        .push_event(&record.id, Notification::deletion_reminder(days_left))
                        .await;
                    debug!(
                        account_id = %record.id,
                        delivered,
                        "reminder surfaced to live channels"
                    );
                }
            } else {
                debug!(account_id = %record.id, "reminder already recorded, mark skipped");
            }
        }

        Ok(reminded)
    }
}
