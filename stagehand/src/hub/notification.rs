//! Notification record and wire envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification as persisted and as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique record id (uuid v4).
    pub id: String,

    /// Short headline.
    pub title: String,

    /// Body text.
    pub message: String,

    /// String tag the client keys presentation on
    /// (`"welcome"`, `"job"`, `"deletion_reminder"`, ...).
    pub kind: String,

    /// Read flag, always false at creation.
    pub read: bool,

    /// Creation timestamp, RFC 3339 UTC on the wire.
    pub created_at: DateTime<Utc>,

    /// Optional client-side navigation target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Optional icon hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Notification {
    /// Creates an unread notification with a fresh id.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            kind: kind.into(),
            read: false,
            created_at: Utc::now(),
            link: None,
            icon: None,
        }
    }

    /// Sets the navigation link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Sets the icon hint.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// The one-time greeting sent on a subject's first connection.
    pub fn welcome() -> Self {
        Self::new(
            "Welcome!",
            "You're connected. Live updates will appear here.",
            "welcome",
        )
    }

    /// Returns true if this is the one-time greeting.
    pub fn is_welcome(&self) -> bool {
        self.kind == "welcome"
    }

    /// The pre-deletion warning surfaced by the lifecycle sweep.
    pub fn deletion_reminder(days_left: i64) -> Self {
        let when = match days_left {
            0 => "today".to_string(),
            1 => "in 1 day".to_string(),
            n => format!("in {} days", n),
        };
        Self::new(
            "Account deletion scheduled",
            format!(
                "Your account will be permanently deleted {}. Sign in to keep it.",
                when
            ),
            "deletion_reminder",
        )
        .with_link("/settings/account")
    }
}

/// Wire envelope wrapping a notification for live delivery.
///
/// Serializes as `{"type": "new_notification", "notification": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event discriminator for the client.
    #[serde(rename = "type")]
    pub event_type: String,

    /// The notification payload.
    pub notification: Notification,
}

impl EventEnvelope {
    /// Wraps a notification in the `new_notification` envelope.
    pub fn new_notification(notification: Notification) -> Self {
        Self {
            event_type: "new_notification".to_string(),
            notification,
        }
    }
}
