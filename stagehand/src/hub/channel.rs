//! Push channel abstraction and identity.
//!
//! A channel is one live client connection. The hub only ever talks to
//! the [`PushChannel`] trait; the WebSocket transport in [`ws`] is one
//! implementation, test doubles are another.
//!
//! [`ws`]: super::ws

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Close code sent when the handshake is rejected.
///
/// Private-use range, mirroring HTTP 401.
pub const REJECTION_CLOSE_CODE: u16 = 4401;

/// Close reason sent when the handshake is rejected.
pub const REJECTION_CLOSE_REASON: &str = "authentication failed";

/// Global counter for generating unique channel IDs.
static CHANNEL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of one registered channel.
///
/// IDs come from a monotonically increasing counter; they are never
/// reused within a process, so a stale unregister cannot hit a
/// newer channel.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocates the next channel id.
    pub fn next() -> Self {
        Self(CHANNEL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// Failure delivering to one channel.
///
/// Channel errors are per-peer: the hub evicts the failing channel and
/// keeps serving its siblings.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The peer is gone.
    #[error("channel closed")]
    Closed,

    /// The transport reported an error.
    #[error("channel transport failed: {0}")]
    Transport(String),
}

/// One live client connection, as seen by the hub.
///
/// Object-safe: the hub stores channels as `Arc<dyn PushChannel>`, so
/// the async methods return boxed futures.
pub trait PushChannel: Send + Sync {
    /// Sends one text frame to the peer.
    fn send(&self, text: String)
        -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>>;

    /// Closes the connection with the given code and reason.
    ///
    /// Best-effort: a peer that is already gone cannot be closed twice.
    fn close(&self, code: u16, reason: String) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
