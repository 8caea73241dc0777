//! Integration tests for the job registry.
//!
//! These tests verify the complete registry workflow including:
//! - Single-flight claims under concurrent submission
//! - Cooperative cancellation and wind-down
//! - Key reuse after terminal runs
//! - Status snapshots across many live runs
//! - Shutdown draining every tracked run

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stagehand::registry::{JobError, JobRegistry};

// =============================================================================
// Test Helpers
// =============================================================================

/// Polls until the registry reports no live runs, or panics on timeout.
async fn wait_until_drained(registry: &JobRegistry) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.status().count > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry should drain within timeout");
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_concurrent_starts_spawn_exactly_one_run() {
    let registry = JobRegistry::new();
    let executions = Arc::new(AtomicUsize::new(0));
    let accepted = Arc::new(AtomicUsize::new(0));

    // Hammer the same key from many tasks at once; the claim must admit
    // exactly one body.
    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        let executions = Arc::clone(&executions);
        let accepted = Arc::clone(&accepted);
        handles.push(tokio::spawn(async move {
            let started = registry.start("contended", move |cancel| async move {
                executions.fetch_add(1, Ordering::SeqCst);
                cancel.cancelled().await;
                Ok(())
            });
            if started {
                accepted.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.await.expect("submitter task should not panic");
    }

    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    registry.cancel("contended").await;
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_waits_for_cooperative_wind_down() {
    let registry = JobRegistry::new();
    let cleanup_done = Arc::new(AtomicUsize::new(0));

    let cleanup = Arc::clone(&cleanup_done);
    registry.start("slow-wind-down", move |cancel| async move {
        cancel.cancelled().await;
        // Simulate wind-down work after the cancel request
        tokio::time::sleep(Duration::from_millis(50)).await;
        cleanup.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    // Let the run reach its cancellation wait
    tokio::time::sleep(Duration::from_millis(10)).await;

    let cancelled = tokio::time::timeout(Duration::from_secs(2), registry.cancel("slow-wind-down"))
        .await
        .expect("cancel should not hang");

    assert!(cancelled);
    // cancel returned only after the body finished its wind-down
    assert_eq!(cleanup_done.load(Ordering::SeqCst), 1);
    assert!(!registry.is_running("slow-wind-down"));
}

#[tokio::test]
async fn test_key_cycles_through_run_cancel_rerun() {
    let registry = JobRegistry::new();
    let executions = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let exec = Arc::clone(&executions);
        let started = registry.start("cycled", move |cancel| async move {
            exec.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
            Ok(())
        });
        assert!(started, "key should be free after the previous cancel");

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.cancel("cycled").await);
    }

    assert_eq!(executions.load(Ordering::SeqCst), 3);
    wait_until_drained(&registry).await;
}

#[tokio::test]
async fn test_status_tracks_many_live_runs() {
    let registry = JobRegistry::new();

    for i in 0..5 {
        registry.start(format!("run-{}", i), |cancel| async move {
            cancel.cancelled().await;
            Ok(())
        });
    }

    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = registry.status();
    assert_eq!(snapshot.count, 5);
    for i in 0..5 {
        assert!(snapshot.keys.contains(&format!("run-{}", i)));
        assert!(registry.is_running(&format!("run-{}", i)));
    }

    registry.shutdown().await;
    assert_eq!(registry.status().count, 0);
}

#[tokio::test]
async fn test_shutdown_drains_all_runs() {
    let registry = JobRegistry::new();
    let wound_down = Arc::new(AtomicUsize::new(0));

    for i in 0..4 {
        let counter = Arc::clone(&wound_down);
        registry.start(format!("drain-{}", i), move |cancel| async move {
            cancel.cancelled().await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(2), registry.shutdown())
        .await
        .expect("shutdown should drain within timeout");

    assert_eq!(wound_down.load(Ordering::SeqCst), 4);
    assert_eq!(registry.status().count, 0);
}

#[tokio::test]
async fn test_failed_and_panicked_runs_free_their_keys() {
    let registry = JobRegistry::new();

    registry.start("fails", |_cancel| async move {
        Err(JobError::new("backend unreachable"))
    });
    registry.start("panics", |_cancel| async move {
        panic!("boom");
    });

    wait_until_drained(&registry).await;

    // Both keys are reusable and the registry itself is unharmed
    assert!(registry.start("fails", |_cancel| async move { Ok(()) }));
    assert!(registry.start("panics", |_cancel| async move { Ok(()) }));
    wait_until_drained(&registry).await;
}

#[tokio::test]
async fn test_is_running_tracks_job_duration() {
    let registry = JobRegistry::new();

    registry.start("timed", |_cancel| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    });

    assert!(registry.is_running("timed"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!registry.is_running("timed"));
}

#[tokio::test]
async fn test_independent_keys_run_concurrently() {
    let registry = JobRegistry::new();
    let running = Arc::new(AtomicUsize::new(0));

    for i in 0..3 {
        let counter = Arc::clone(&running);
        registry.start(format!("parallel-{}", i), move |cancel| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
            Ok(())
        });
    }

    tokio::time::timeout(Duration::from_secs(2), async {
        while running.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("all three runs should start concurrently");

    registry.shutdown().await;
}
