//! Scheduled account lifecycle sweeps.
//!
//! Accounts scheduled for deletion sit in `PendingDeletion` with a
//! `delete_after` deadline. A background loop owned by
//! [`DeletionSweeper`] periodically:
//!
//! 1. Erases and marks `Deleted` every account whose deadline has passed
//! 2. Sends a one-shot reminder to accounts approaching their deadline
//!
//! Both transitions are conditional updates in the backing store, so a
//! duplicate sweeper (or a crashed-and-restarted one) can never
//! double-fire the irreversible actions.
//!
//! # Example
//!
//! ```ignore
//! use stagehand::lifecycle::{DeletionSweeper, SweepConfig};
//!
//! let sweeper = DeletionSweeper::new(store, eraser, dispatcher, SweepConfig::default());
//! sweeper.start().await;
//! // ...
//! sweeper.stop().await;
//! ```

mod config;
mod effects;
mod record;
mod store;
mod sweeper;

pub use config::{
    SweepConfig, DEFAULT_ERROR_BACKOFF_SECS, DEFAULT_GRACE_PERIOD_SECS,
    DEFAULT_REMINDER_WINDOW_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
};
pub use effects::{AccountEraser, DispatchError, Dispatcher, EffectKind, EraseError};
pub use record::{AccountRecord, AccountState};
pub use store::{AccountStore, MemoryAccountStore};
pub use sweeper::{DeletionSweeper, SweepStats};
