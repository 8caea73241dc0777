//! The push hub: subject → channel multimap and fan-out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::auth::{CredentialVerifier, HandshakeError};
use super::channel::{
    ChannelError, ChannelId, PushChannel, REJECTION_CLOSE_CODE, REJECTION_CLOSE_REASON,
};
use super::notification::{EventEnvelope, Notification};
use super::store::NotificationStore;

/// One registered channel under a subject.
struct ChannelEntry {
    id: ChannelId,
    channel: Arc<dyn PushChannel>,
    connected_at: Instant,
}

/// Successful handshake result.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Subject the credential resolved to.
    pub subject_id: String,

    /// Identity of the registered channel, used to unregister it later.
    pub channel_id: ChannelId,
}

/// Fan-out hub multiplexing live channels per subject.
///
/// The hub owns only the mapping; channels are owned by their transport
/// and handed in as `Arc<dyn PushChannel>`. A hub restart loses live
/// connections and nothing else: durable history lives behind the
/// [`NotificationStore`].
pub struct PushHub<V, N> {
    verifier: Arc<V>,
    store: Arc<N>,
    connections: DashMap<String, Vec<ChannelEntry>>,
}

impl<V, N> PushHub<V, N>
where
    V: CredentialVerifier,
    N: NotificationStore,
{
    /// Creates a hub with the given verifier and notification store.
    pub fn new(verifier: Arc<V>, store: Arc<N>) -> Self {
        Self {
            verifier,
            store,
            connections: DashMap::new(),
        }
    }

    /// Registers a channel after verifying the handshake credential.
    ///
    /// On rejection the channel is closed with the rejection code and
    /// the map is never touched. On success the channel joins the
    /// subject's set; if the subject has no welcome record yet, the
    /// one-time greeting is persisted and delivered to this channel
    /// only.
    pub async fn register(
        &self,
        credential: &str,
        channel: Arc<dyn PushChannel>,
    ) -> Result<Registration, HandshakeError> {
        let subject_id = match self.verifier.verify(credential).await {
            Ok(subject_id) => subject_id,
            Err(err) => {
                warn!(error = %err, "push handshake rejected");
                channel
                    .close(REJECTION_CLOSE_CODE, REJECTION_CLOSE_REASON.to_string())
                    .await;
                return Err(err);
            }
        };

        let channel_id = ChannelId::next();
        self.connections
            .entry(subject_id.clone())
            .or_default()
            .push(ChannelEntry {
                id: channel_id,
                channel: Arc::clone(&channel),
                connected_at: Instant::now(),
            });

        info!(subject_id = %subject_id, channel_id = %channel_id, "push channel registered");

        self.welcome_if_first(&subject_id, channel_id, &channel)
            .await;

        Ok(Registration {
            subject_id,
            channel_id,
        })
    }

    /// Removes a channel from its subject's set.
    ///
    /// Unknown subject or channel is a no-op; safe to call repeatedly.
    /// The subject entry itself is dropped once its set empties.
    pub fn unregister(&self, subject_id: &str, channel_id: ChannelId) {
        let mut removed = None;
        if let Some(mut channels) = self.connections.get_mut(subject_id) {
            if let Some(position) = channels.iter().position(|entry| entry.id == channel_id) {
                removed = Some(channels.remove(position));
            }
            let now_empty = channels.is_empty();
            drop(channels);
            if now_empty {
                self.connections
                    .remove_if(subject_id, |_, channels| channels.is_empty());
            }
        }

        if let Some(entry) = removed {
            debug!(
                subject_id,
                channel_id = %channel_id,
                connected_secs = entry.connected_at.elapsed().as_secs(),
                "push channel unregistered"
            );
        }
    }

    /// Persists a notification, then fans it out to the subject's
    /// channels.
    ///
    /// Durable-first: if the persist fails nothing is sent, the event is
    /// not lost-but-invisible. The channel list is snapshotted before
    /// sending, so registrations racing the fan-out either make the
    /// snapshot or find the event in history. A failed send evicts that
    /// channel and the remaining channels are still served.
    ///
    /// # Returns
    ///
    /// The number of channels the event was delivered to.
    pub async fn push(&self, subject_id: &str, notification: Notification) -> usize {
        if let Err(err) = self.store.insert(subject_id, &notification).await {
            warn!(subject_id, error = %err, "notification persist failed, delivery skipped");
            return 0;
        }

        let text = match serde_json::to_string(&EventEnvelope::new_notification(notification)) {
            Ok(text) => text,
            Err(err) => {
                error!(subject_id, error = %err, "notification serialization failed");
                return 0;
            }
        };

        let targets: Vec<(ChannelId, Arc<dyn PushChannel>)> = match self.connections.get(subject_id)
        {
            Some(channels) => channels
                .iter()
                .map(|entry| (entry.id, Arc::clone(&entry.channel)))
                .collect(),
            None => Vec::new(),
        };

        if targets.is_empty() {
            debug!(subject_id, "no live channels, notification stored only");
            return 0;
        }

        let mut delivered = 0;
        for (channel_id, channel) in targets {
            match channel.send(text.clone()).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        subject_id,
                        channel_id = %channel_id,
                        error = %err,
                        "push delivery failed, evicting channel"
                    );
                    self.unregister(subject_id, channel_id);
                }
            }
        }

        debug!(subject_id, delivered, "notification fan-out complete");
        delivered
    }

    /// Returns the number of live channels for a subject.
    pub fn connection_count(&self, subject_id: &str) -> usize {
        self.connections
            .get(subject_id)
            .map(|channels| channels.len())
            .unwrap_or(0)
    }

    /// Returns the subjects with at least one live channel.
    pub fn subjects(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Delivers the one-time greeting if the subject has none recorded.
    async fn welcome_if_first(
        &self,
        subject_id: &str,
        channel_id: ChannelId,
        channel: &Arc<dyn PushChannel>,
    ) {
        let recorded = match self.store.welcome_recorded(subject_id).await {
            Ok(recorded) => recorded,
            Err(err) => {
                warn!(subject_id, error = %err, "welcome lookup failed, greeting skipped");
                return;
            }
        };
        if recorded {
            return;
        }

        let notification = Notification::welcome();
        if let Err(err) = self.store.insert(subject_id, &notification).await {
            warn!(subject_id, error = %err, "welcome persist failed, greeting skipped");
            return;
        }

        let text = match serde_json::to_string(&EventEnvelope::new_notification(notification)) {
            Ok(text) => text,
            Err(err) => {
                error!(subject_id, error = %err, "welcome serialization failed");
                return;
            }
        };

        // The greeting goes to the just-opened channel only; siblings
        // already received theirs when they connected.
        if let Err(err) = channel.send(text).await {
            warn!(
                subject_id,
                channel_id = %channel_id,
                error = %err,
                "welcome delivery failed, evicting channel"
            );
            self.unregister(subject_id, channel_id);
        } else {
            debug!(subject_id, "welcome delivered");
        }
    }
}

/// Narrow event-publishing view of the hub.
///
/// Object-safe so collaborators (the lifecycle sweeper) can hold the hub
/// as `Arc<dyn NotificationSink>` without carrying its type parameters.
pub trait NotificationSink: Send + Sync {
    /// Persists and fans out a notification; returns the delivered count.
    fn push_event<'a>(
        &'a self,
        subject_id: &'a str,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = usize> + Send + 'a>>;
}

impl<V, N> NotificationSink for PushHub<V, N>
where
    V: CredentialVerifier,
    N: NotificationStore,
{
    fn push_event<'a>(
        &'a self,
        subject_id: &'a str,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = usize> + Send + 'a>> {
        Box::pin(self.push(subject_id, notification))
    }
}
