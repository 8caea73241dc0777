//! Integration tests for the deletion sweeper.
//!
//! These tests verify the complete lifecycle workflow including:
//! - Mixed batches advancing correctly in one pass
//! - Reminder send-once semantics across many passes
//! - The background loop wired to real collaborators
//! - Reminders surfacing live through the push hub

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use stagehand::hub::{
    MemoryNotificationStore, NotificationSink, PushChannel, PushHub, StaticTokenVerifier,
};
use stagehand::lifecycle::{
    AccountEraser, AccountRecord, AccountState, DeletionSweeper, DispatchError, Dispatcher,
    EffectKind, EraseError, MemoryAccountStore, SweepConfig,
};

// =============================================================================
// Test Helpers
// =============================================================================

/// Eraser recording every purged account id.
#[derive(Default)]
struct RecordingEraser {
    erased: Mutex<Vec<String>>,
}

impl RecordingEraser {
    fn erased(&self) -> Vec<String> {
        self.erased.lock().unwrap().clone()
    }
}

impl AccountEraser for RecordingEraser {
    async fn erase(&self, record: &AccountRecord) -> Result<(), EraseError> {
        self.erased.lock().unwrap().push(record.id.clone());
        Ok(())
    }
}

/// Dispatcher recording every reminder target.
#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Dispatcher for RecordingDispatcher {
    async fn send(
        &self,
        _kind: EffectKind,
        target: &str,
        params: serde_json::Value,
    ) -> Result<(), DispatchError> {
        assert!(params["days_left"].is_i64(), "params carry days_left");
        self.sent.lock().unwrap().push(target.to_string());
        Ok(())
    }
}

/// Channel collecting every frame it is handed.
#[derive(Default)]
struct CollectingChannel {
    frames: Mutex<Vec<String>>,
}

impl CollectingChannel {
    fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

impl PushChannel for CollectingChannel {
    fn send(
        &self,
        text: String,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), stagehand::hub::ChannelError>> + Send + '_>,
    > {
        Box::pin(async move {
            self.frames.lock().unwrap().push(text);
            Ok(())
        })
    }

    fn close(
        &self,
        _code: u16,
        _reason: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_sweep_advances_mixed_batch_in_one_pass() {
    let store = Arc::new(MemoryAccountStore::new());
    let eraser = Arc::new(RecordingEraser::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let now = Utc::now();
    // Past deadline: erased and deleted
    store.insert(AccountRecord::pending_deletion(
        "overdue",
        "overdue@example.com",
        now - chrono::Duration::hours(2),
    ));
    // Inside the two-day window: reminded
    store.insert(AccountRecord::pending_deletion(
        "soon",
        "soon@example.com",
        now + chrono::Duration::hours(30),
    ));
    // Outside the window: untouched
    store.insert(AccountRecord::pending_deletion(
        "later",
        "later@example.com",
        now + chrono::Duration::days(6),
    ));
    // Already reminded: not reminded again
    let mut nagged = AccountRecord::pending_deletion(
        "nagged",
        "nagged@example.com",
        now + chrono::Duration::hours(30),
    );
    nagged.reminder_sent = true;
    store.insert(nagged);

    let sweeper = DeletionSweeper::new(
        Arc::clone(&store),
        Arc::clone(&eraser),
        Arc::clone(&dispatcher),
        SweepConfig::default(),
    );

    let stats = sweeper.sweep_once().await.unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.reminded, 1);
    assert_eq!(eraser.erased(), vec!["overdue".to_string()]);
    assert_eq!(dispatcher.sent(), vec!["soon@example.com".to_string()]);

    assert_eq!(store.get("overdue").unwrap().state, AccountState::Deleted);
    assert!(store.get("soon").unwrap().reminder_sent);
    assert!(!store.get("later").unwrap().reminder_sent);

    // Second pass finds nothing left to do
    let stats = sweeper.sweep_once().await.unwrap();
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.reminded, 0);
}

#[tokio::test]
async fn test_reminded_account_is_still_deleted_at_deadline() {
    let store = Arc::new(MemoryAccountStore::new());
    let eraser = Arc::new(RecordingEraser::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let now = Utc::now();
    store.insert(AccountRecord::pending_deletion(
        "acct-1",
        "one@example.com",
        now + chrono::Duration::hours(12),
    ));

    let sweeper = DeletionSweeper::new(
        Arc::clone(&store),
        eraser,
        Arc::clone(&dispatcher),
        SweepConfig::default(),
    );

    let stats = sweeper.sweep_once().await.unwrap();
    assert_eq!(stats.reminded, 1);

    // Deadline passes
    let mut record = store.get("acct-1").unwrap();
    record.delete_after = now - chrono::Duration::minutes(1);
    store.insert(record);

    let stats = sweeper.sweep_once().await.unwrap();
    assert_eq!(stats.deleted, 1);
    assert_eq!(store.get("acct-1").unwrap().state, AccountState::Deleted);
    // The reminder was never repeated along the way
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn test_racing_sweeps_transition_exactly_once() {
    let store = Arc::new(MemoryAccountStore::new());
    let eraser = Arc::new(RecordingEraser::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    store.insert(AccountRecord::pending_deletion(
        "contested",
        "contested@example.com",
        Utc::now() - chrono::Duration::hours(1),
    ));

    let sweeper = Arc::new(DeletionSweeper::new(
        Arc::clone(&store),
        eraser,
        dispatcher,
        SweepConfig::default(),
    ));

    // Two passes racing over the same record: the conditional update
    // lets only one of them claim the transition
    let a = Arc::clone(&sweeper);
    let b = Arc::clone(&sweeper);
    let (stats_a, stats_b) = tokio::join!(a.sweep_once(), b.sweep_once());
    let total = stats_a.unwrap().deleted + stats_b.unwrap().deleted;

    assert_eq!(total, 1);
    assert_eq!(store.get("contested").unwrap().state, AccountState::Deleted);
}

#[tokio::test]
async fn test_loop_sweeps_repeatedly_until_stopped() {
    let store = Arc::new(MemoryAccountStore::new());
    let eraser = Arc::new(RecordingEraser::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let config = SweepConfig::default().with_sweep_interval(Duration::from_millis(20));
    let sweeper = DeletionSweeper::new(
        Arc::clone(&store),
        Arc::clone(&eraser),
        dispatcher,
        config,
    );

    sweeper.start().await;

    // Insert after start; a later pass must pick it up
    tokio::time::sleep(Duration::from_millis(30)).await;
    store.insert(AccountRecord::pending_deletion(
        "late-arrival",
        "late@example.com",
        Utc::now() - chrono::Duration::hours(1),
    ));

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(record) = store.get("late-arrival") {
                if record.state == AccountState::Deleted {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("loop should pick up the late arrival");

    sweeper.stop().await;

    // No further passes after stop
    let erased_at_stop = eraser.erased().len();
    store.insert(AccountRecord::pending_deletion(
        "after-stop",
        "after@example.com",
        Utc::now() - chrono::Duration::hours(1),
    ));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(eraser.erased().len(), erased_at_stop);
}

#[tokio::test]
async fn test_reminder_surfaces_live_through_push_hub() {
    let account_store = Arc::new(MemoryAccountStore::new());
    let eraser = Arc::new(RecordingEraser::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    // Real hub with the account's client connected
    let verifier = Arc::new(StaticTokenVerifier::new());
    verifier.insert("tok", "acct-1");
    let notification_store = Arc::new(MemoryNotificationStore::new());
    let hub = Arc::new(PushHub::new(verifier, Arc::clone(&notification_store)));

    let channel = Arc::new(CollectingChannel::default());
    hub.register("tok", Arc::clone(&channel) as Arc<dyn PushChannel>)
        .await
        .unwrap();

    account_store.insert(AccountRecord::pending_deletion(
        "acct-1",
        "one@example.com",
        Utc::now() + chrono::Duration::hours(30),
    ));

    let sweeper = DeletionSweeper::new(
        account_store,
        eraser,
        dispatcher,
        SweepConfig::default(),
    )
    .with_notifications(Arc::clone(&hub) as Arc<dyn NotificationSink>);

    let stats = sweeper.sweep_once().await.unwrap();
    assert_eq!(stats.reminded, 1);

    // Welcome on connect, then the live reminder
    let frames = channel.frames();
    assert_eq!(frames.len(), 2);
    assert!(frames[1].contains("\"deletion_reminder\""));

    // Durable copy alongside the live one
    let history = notification_store.for_subject("acct-1");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].kind, "deletion_reminder");
}

#[tokio::test]
async fn test_start_stop_cycles_are_clean() {
    let store = Arc::new(MemoryAccountStore::new());
    let eraser = Arc::new(RecordingEraser::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let config = SweepConfig::default().with_sweep_interval(Duration::from_millis(20));
    let sweeper = DeletionSweeper::new(store, eraser, dispatcher, config);

    for _ in 0..3 {
        sweeper.start().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        sweeper.stop().await;
    }
}
