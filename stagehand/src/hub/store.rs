//! Notification store trait and the in-memory reference implementation.
//!
//! Delivery is durable-first: the hub persists every notification here
//! before attempting any live send, so clients that reconnect later can
//! fetch what they missed from history.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use super::notification::Notification;
use crate::store::StoreError;

/// Persistence seam for notification history.
pub trait NotificationStore: Send + Sync + 'static {
    /// Appends a notification to the subject's history.
    fn insert(
        &self,
        subject_id: &str,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns true if the subject already has a welcome record.
    ///
    /// This gates the one-time greeting: record lookup, not connection
    /// count, so reconnects never produce a second welcome.
    fn welcome_recorded(
        &self,
        subject_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// In-memory [`NotificationStore`] for tests and embedders without a
/// database.
#[derive(Default)]
pub struct MemoryNotificationStore {
    history: Mutex<HashMap<String, Vec<Notification>>>,
}

impl MemoryNotificationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the subject's history, oldest first.
    pub fn for_subject(&self, subject_id: &str) -> Vec<Notification> {
        self.history
            .lock()
            .ok()
            .and_then(|history| history.get(subject_id).cloned())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Notification>>>, StoreError> {
        self.history
            .lock()
            .map_err(|_| StoreError::Unavailable("notification store mutex poisoned".to_string()))
    }
}

impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, subject_id: &str, notification: &Notification) -> Result<(), StoreError> {
        let mut history = self.lock()?;
        history
            .entry(subject_id.to_string())
            .or_default()
            .push(notification.clone());
        Ok(())
    }

    async fn welcome_recorded(&self, subject_id: &str) -> Result<bool, StoreError> {
        let history = self.lock()?;
        Ok(history
            .get(subject_id)
            .is_some_and(|notifications| notifications.iter().any(Notification::is_welcome)))
    }
}
