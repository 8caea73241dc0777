//! Sweep timing configuration.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default interval between sweep passes (1 hour).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3_600;

/// Default shortened interval after a failed pass (5 minutes).
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 300;

/// Default reminder window before the deadline (2 days).
pub const DEFAULT_REMINDER_WINDOW_SECS: u64 = 2 * 24 * 3_600;

/// Default grace period between deletion request and deadline (7 days).
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 7 * 24 * 3_600;

/// Timing knobs for the deletion sweep.
///
/// The reminder window is forward-looking: a reminder fires once the
/// remaining time until `delete_after` drops to the window or less.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Interval between sweep passes.
    pub sweep_interval: Duration,

    /// Interval used instead after a pass fails.
    pub error_backoff: Duration,

    /// How long before the deadline the reminder goes out.
    pub reminder_window: Duration,

    /// How long a deletion request waits before becoming sweep-eligible.
    pub grace_period: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            error_backoff: Duration::from_secs(DEFAULT_ERROR_BACKOFF_SECS),
            reminder_window: Duration::from_secs(DEFAULT_REMINDER_WINDOW_SECS),
            grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
        }
    }
}

impl SweepConfig {
    /// Sets a custom sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets a custom error backoff interval.
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Sets a custom reminder window.
    pub fn with_reminder_window(mut self, window: Duration) -> Self {
        self.reminder_window = window;
        self
    }

    /// Sets a custom grace period.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Computes the deletion deadline for a request made at `requested_at`.
    ///
    /// Hosts use this when flipping an account to `PendingDeletion` so
    /// the stored deadline and the sweep's grace period stay consistent.
    pub fn deletion_deadline(&self, requested_at: DateTime<Utc>) -> DateTime<Utc> {
        requested_at + chrono::Duration::seconds(self.grace_period.as_secs() as i64)
    }

    /// Returns the reminder window as a chrono duration for store queries.
    pub fn reminder_window_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reminder_window.as_secs() as i64)
    }
}
