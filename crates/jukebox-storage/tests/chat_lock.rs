// Integration tests for the chat lock manager:
// - token write/read/delete primitives
// - staleness-based reclamation
// - mutual exclusion of concurrent with_lock bodies
// - with_lock error reporting, bypass, and release-on-failure

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use jukebox_core::{Context, Error, LockConfig, TracingReporter, LEVEL_ADVANCE, LEVEL_COMMAND};
use jukebox_storage::{LockManager, StorageModule as _};

use common::RecordingReporter;

async fn manager_with(config: LockConfig) -> (common::TestBed, LockManager) {
    let bed = common::testbed().await;
    let locks = LockManager::new(bed.db.pool().clone(), config, Arc::new(TracingReporter));
    bed.db.install(&[&locks]).await.expect("install locks");
    (bed, locks)
}

async fn manager() -> (common::TestBed, LockManager) {
    manager_with(common::fast_lock_config()).await
}

#[tokio::test]
async fn lock_writes_a_readable_token_and_unlock_clears_it() {
    let (_bed, locks) = manager().await;

    let token = locks.lock(7, LEVEL_COMMAND).await.unwrap();
    assert_eq!(locks.lock_time(7).await.unwrap(), Some(token));

    let row = locks.current(7).await.unwrap().unwrap();
    assert_eq!(row.level, LEVEL_COMMAND);
    assert_eq!(row.locked_at, token);

    locks.unlock(7).await.unwrap();
    assert_eq!(locks.lock_time(7).await.unwrap(), None);
}

#[tokio::test]
async fn relocking_replaces_level_and_token() {
    let (_bed, locks) = manager().await;

    let first = locks.lock(7, LEVEL_COMMAND).await.unwrap();
    let second = locks.lock(7, LEVEL_ADVANCE).await.unwrap();
    assert_ne!(first, second);

    let row = locks.current(7).await.unwrap().unwrap();
    assert_eq!(row.level, LEVEL_ADVANCE);
    assert_eq!(row.locked_at, second);
}

#[tokio::test]
async fn acquire_uncontended_returns_the_held_token() {
    let (_bed, locks) = manager().await;

    let token = locks.acquire(7, LEVEL_COMMAND).await.unwrap();
    assert_eq!(locks.lock_time(7).await.unwrap(), Some(token));
}

// A lock set at t0 is reclaimed by a different caller at t0 + threshold + ε.
#[tokio::test]
async fn stale_lock_is_reclaimed_by_next_acquire() {
    let (_bed, locks) = manager_with(LockConfig {
        stale_after_secs: 1,
        acquire_sleep_ms: 50,
        ..LockConfig::default()
    })
    .await;

    let abandoned = locks.lock(7, LEVEL_COMMAND).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let fresh = locks.acquire(7, LEVEL_COMMAND).await.unwrap();
    assert_ne!(fresh, abandoned);
    assert_eq!(locks.lock_time(7).await.unwrap(), Some(fresh));
}

// With auto-unlock disabled the bounded attempts never touch a held lock;
// only the unconditional fallback finally overwrites it. That steal is the
// protocol's documented weakness, pinned here so nobody fixes it silently.
#[tokio::test]
async fn fallback_overwrites_a_lock_that_never_goes_away() {
    let (_bed, locks) = manager_with(LockConfig {
        auto_unlock: false,
        stale_after_secs: 0,
        acquire_tries: 3,
        acquire_sleep_ms: 20,
    })
    .await;

    let held = locks.lock(7, LEVEL_COMMAND).await.unwrap();
    let stolen = locks.acquire(7, LEVEL_COMMAND).await.unwrap();
    assert_ne!(stolen, held);
}

#[tokio::test]
async fn zero_tries_goes_straight_to_the_fallback_loop() {
    let (_bed, locks) = manager_with(LockConfig {
        acquire_tries: 0,
        ..common::fast_lock_config()
    })
    .await;

    let token = locks.acquire(7, LEVEL_COMMAND).await.unwrap();
    assert_eq!(locks.lock_time(7).await.unwrap(), Some(token));
}

// N concurrent with_lock invocations on the same chat must produce
// non-overlapping handler execution windows.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn with_lock_serializes_concurrent_handlers() {
    let (_bed, locks) = manager().await;
    let windows: Arc<Mutex<Vec<(Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let locks = locks.clone();
        let windows = Arc::clone(&windows);
        tasks.push(tokio::spawn(async move {
            let ctx = Context {
                voice_id: 7,
                ..Context::default()
            };
            locks
                .with_lock(&ctx, LEVEL_COMMAND, false, "serialized_handler", || async move {
                    let start = Instant::now();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    windows
                        .lock()
                        .expect("window mutex")
                        .push((start, Instant::now()));
                    Ok(())
                })
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut windows = windows.lock().unwrap().clone();
    assert_eq!(windows.len(), 4);
    windows.sort_by_key(|(start, _)| *start);
    for pair in windows.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "handler windows overlap: {pair:?}"
        );
    }

    // Last release actually happened.
    assert_eq!(locks.lock_time(7).await.unwrap(), None);
}

#[tokio::test]
async fn with_lock_returns_handler_value_and_releases() {
    let (_bed, locks) = manager().await;
    let ctx = Context {
        voice_id: 7,
        ..Context::default()
    };

    let out = locks
        .with_lock(&ctx, LEVEL_COMMAND, false, "value_handler", || async {
            Ok(41 + 1)
        })
        .await
        .unwrap();

    assert_eq!(out, Some(42));
    assert_eq!(locks.lock_time(7).await.unwrap(), None);
}

// Handler failures are reported and swallowed; the lock is still released.
#[tokio::test]
async fn with_lock_reports_handler_errors_and_still_unlocks() {
    let bed = common::testbed().await;
    let reporter = Arc::new(RecordingReporter::default());
    let locks = LockManager::new(
        bed.db.pool().clone(),
        common::fast_lock_config(),
        Arc::clone(&reporter) as Arc<dyn jukebox_core::ErrorReporter>,
    );
    bed.db.install(&[&locks]).await.unwrap();

    let ctx = Context {
        voice_id: 7,
        ..Context::default()
    };
    let out: Option<()> = locks
        .with_lock(&ctx, LEVEL_ADVANCE, false, "failing_handler", || async {
            Err(Error::Handler("no audio source".into()))
        })
        .await
        .unwrap();

    assert_eq!(out, None);
    assert_eq!(locks.lock_time(7).await.unwrap(), None);

    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    let (voice_id, error, method) = &reports[0];
    assert_eq!(*voice_id, Some(7));
    assert!(error.contains("no audio source"));
    assert_eq!(method, "failing_handler");
}

// bypass = true asserts the caller already holds the lock: no acquisition,
// no release, existing token untouched.
#[tokio::test]
async fn with_lock_bypass_leaves_the_lock_alone() {
    let (_bed, locks) = manager().await;
    let ctx = Context {
        voice_id: 7,
        ..Context::default()
    };

    let held = locks.lock(7, LEVEL_ADVANCE).await.unwrap();

    let out = locks
        .with_lock(&ctx, LEVEL_ADVANCE, true, "reentrant_handler", || async {
            Ok("ran")
        })
        .await
        .unwrap();

    assert_eq!(out, Some("ran"));
    assert_eq!(locks.lock_time(7).await.unwrap(), Some(held));
}

#[tokio::test]
async fn reset_clears_all_lock_rows() {
    let (bed, locks) = manager().await;
    locks.lock(1, LEVEL_COMMAND).await.unwrap();
    locks.lock(2, LEVEL_COMMAND).await.unwrap();

    locks.reset(bed.db.pool()).await.unwrap();
    assert_eq!(locks.lock_time(1).await.unwrap(), None);
    assert_eq!(locks.lock_time(2).await.unwrap(), None);
}
