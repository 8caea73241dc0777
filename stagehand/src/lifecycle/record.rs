//! Account record and lifecycle state.

use chrono::{DateTime, Utc};
use std::fmt;

/// Lifecycle state of an account.
///
/// States only ever advance (`Active → PendingDeletion → Deleted`);
/// nothing in this crate moves a record backwards. Reinstating a pending
/// account is a host concern and happens outside the sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountState {
    /// Normal account, invisible to the sweep.
    Active,

    /// Deletion requested; erased once `delete_after` passes.
    PendingDeletion,

    /// Terminal. The account's data has been erased.
    Deleted,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::PendingDeletion => write!(f, "PendingDeletion"),
            Self::Deleted => write!(f, "Deleted"),
        }
    }
}

/// An account as seen by the sweep, loaded through [`AccountStore`].
///
/// The reminder flag is a sub-state parallel to the main transition: it
/// gates the one-shot "your account will be deleted soon" side effect
/// and is cleared by the host if the user postpones deletion.
///
/// [`AccountStore`]: super::AccountStore
#[derive(Clone, Debug, PartialEq)]
pub struct AccountRecord {
    /// Account id, the subject identity used across the platform.
    pub id: String,

    /// Current lifecycle state.
    pub state: AccountState,

    /// Deadline after which the terminal transition fires.
    pub delete_after: DateTime<Utc>,

    /// True once the pre-deletion reminder went out.
    pub reminder_sent: bool,

    /// Contact target for outbound side effects.
    pub email: String,
}

impl AccountRecord {
    /// Creates a record already scheduled for deletion.
    pub fn pending_deletion(
        id: impl Into<String>,
        email: impl Into<String>,
        delete_after: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            state: AccountState::PendingDeletion,
            delete_after,
            reminder_sent: false,
            email: email.into(),
        }
    }

    /// Returns true if the terminal transition is due at `now`.
    pub fn deletion_due(&self, now: DateTime<Utc>) -> bool {
        self.state == AccountState::PendingDeletion && self.delete_after <= now
    }
}
