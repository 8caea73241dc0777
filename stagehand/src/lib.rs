//! Stagehand - Asynchronous orchestration for an actor-job platform
//!
//! This library provides the background machinery the platform runs behind
//! its request handlers: keyed single-flight job execution, scheduled
//! account lifecycle sweeps, and live push delivery to connected clients.
//!
//! # High-Level API
//!
//! The three components are independent and composed by the host:
//!
//! ```ignore
//! use stagehand::registry::JobRegistry;
//! use stagehand::lifecycle::{DeletionSweeper, SweepConfig};
//! use stagehand::hub::PushHub;
//!
//! let registry = JobRegistry::new();
//! registry.start("render-42", |cancel| async move {
//!     // long-running actor job body
//!     Ok(())
//! });
//!
//! let sweeper = DeletionSweeper::new(store, eraser, dispatcher, SweepConfig::default());
//! sweeper.start().await;
//!
//! let hub = Arc::new(PushHub::new(verifier, notification_store));
//! let app = stagehand::hub::ws::routes(hub);
//! ```

pub mod hub;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod store;

/// Version of the stagehand library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
