//! Live push delivery to connected clients.
//!
//! The hub owns the subject → channel multimap. Each connected client is
//! one [`PushChannel`]; a subject (account) may hold any number of them
//! at once. Events are durable-first: a notification is persisted through
//! the [`NotificationStore`] before any live delivery is attempted, so a
//! subject with no open channels simply finds the event in history later.
//!
//! # Architecture
//!
//! ```text
//! ws upgrade ──► register(credential, channel) ──► verifier ──► subject map
//!                                                      │ reject
//!                                                      ▼
//!                                            close 4401, never mapped
//!
//! push(subject, notification) ──► store.insert ──► snapshot channels ──► fan-out
//!                                                        │ send error
//!                                                        ▼
//!                                                  unregister channel
//! ```

mod auth;
mod channel;
mod notification;
mod push_hub;
mod store;
pub mod ws;

pub use auth::{CredentialVerifier, HandshakeError, StaticTokenVerifier};
pub use channel::{
    ChannelError, ChannelId, PushChannel, REJECTION_CLOSE_CODE, REJECTION_CLOSE_REASON,
};
pub use notification::{EventEnvelope, Notification};
pub use push_hub::{NotificationSink, PushHub, Registration};
pub use store::{MemoryNotificationStore, NotificationStore};
