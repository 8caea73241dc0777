//! Keyed single-flight job execution.
//!
//! The registry runs at most one job per logical key at a time. Jobs are
//! plain async closures handed a [`CancellationToken`]; the registry owns
//! their lifecycle:
//!
//! 1. `start` atomically claims the key and spawns the job wrapper
//! 2. The wrapper publishes status transitions on a watch channel
//! 3. `cancel` fires the token and awaits the cooperative wind-down
//! 4. Completed keys are purged so the key can be reused
//!
//! # Example
//!
//! ```ignore
//! use stagehand::registry::JobRegistry;
//!
//! let registry = JobRegistry::new();
//!
//! registry.start("render-42", |cancel| async move {
//!     loop {
//!         if cancel.is_cancelled() {
//!             return Ok(());
//!         }
//!         // one unit of actor work
//!     }
//! });
//!
//! assert!(registry.is_running("render-42"));
//! registry.cancel("render-42").await;
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod job_registry;
mod run_task;

pub use job_registry::{JobRegistry, RegistrySnapshot};
pub use run_task::{JobError, RunKey, RunStatus};
