//! Account store trait and the in-memory reference implementation.
//!
//! The sweep never mutates records directly; every transition goes
//! through a conditional update on the store, which reports via its
//! boolean return whether this caller actually performed the change.
//! That is the whole duplicate-suppression story: a second sweeper (or
//! a re-run after a crash) sees `false` and does nothing more.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use super::record::{AccountRecord, AccountState};
use crate::store::StoreError;

/// Persistence seam for account lifecycle state.
///
/// Implementations are expected to make `mark_deleted` and
/// `mark_reminder_sent` conditional updates (compare-and-set on the
/// guarding field), returning `Ok(false)` when no row matched.
pub trait AccountStore: Send + Sync + 'static {
    /// Returns accounts whose terminal transition is due.
    ///
    /// Matches `state == PendingDeletion && delete_after <= now`.
    fn find_due_deletions(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<AccountRecord>, StoreError>> + Send;

    /// Returns accounts whose reminder is due.
    ///
    /// Matches `state == PendingDeletion && !reminder_sent &&
    /// delete_after <= now + window`.
    fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<AccountRecord>, StoreError>> + Send;

    /// Marks the account `Deleted`, guarded by `state == PendingDeletion`.
    ///
    /// Returns `Ok(true)` iff this call performed the transition.
    fn mark_deleted(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Sets the reminder flag, guarded by `reminder_sent == false`.
    ///
    /// Returns `Ok(true)` iff this call set the flag.
    fn mark_reminder_sent(&self, id: &str)
        -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// In-memory [`AccountStore`] for tests and embedders without a database.
///
/// A mutexed map stands in for the real backend; the conditional-update
/// contract is the same one a SQL implementation gets from a guarded
/// `UPDATE ... WHERE` row count.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<String, AccountRecord>>,
}

impl MemoryAccountStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: AccountRecord) {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(record.id.clone(), record);
        }
    }

    /// Returns a copy of the record for the given id.
    pub fn get(&self, id: &str) -> Option<AccountRecord> {
        self.accounts.lock().ok()?.get(id).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, AccountRecord>>, StoreError> {
        self.accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account store mutex poisoned".to_string()))
    }
}

impl AccountStore for MemoryAccountStore {
    async fn find_due_deletions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccountRecord>, StoreError> {
        let accounts = self.lock()?;
        Ok(accounts
            .values()
            .filter(|record| record.deletion_due(now))
            .cloned()
            .collect())
    }

    async fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<AccountRecord>, StoreError> {
        let cutoff = now + window;
        let accounts = self.lock()?;
        Ok(accounts
            .values()
            .filter(|record| {
                record.state == AccountState::PendingDeletion
                    && !record.reminder_sent
                    && record.delete_after <= cutoff
            })
            .cloned()
            .collect())
    }

    async fn mark_deleted(&self, id: &str) -> Result<bool, StoreError> {
        let mut accounts = self.lock()?;
        match accounts.get_mut(id) {
            Some(record) if record.state == AccountState::PendingDeletion => {
                record.state = AccountState::Deleted;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_reminder_sent(&self, id: &str) -> Result<bool, StoreError> {
        let mut accounts = self.lock()?;
        match accounts.get_mut(id) {
            Some(record) if !record.reminder_sent => {
                record.reminder_sent = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
