//! Shared fixtures for the storage integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use jukebox_core::{Context, Error, ErrorReporter, InboundEvent, LockConfig};
use jukebox_storage::Db;

/// A fresh on-disk database in a temp dir, kept alive for the test.
pub struct TestBed {
    _dir: TempDir,
    pub db: Db,
}

pub async fn testbed() -> TestBed {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Db::open_path(&dir.path().join("jukebox.db"))
        .await
        .expect("open database");
    TestBed { _dir: dir, db }
}

/// Lock settings tuned so contention tests finish quickly while keeping a
/// bounded budget comfortably larger than any handler body used in tests
/// (the post-budget fallback loop steals locks, which would break the
/// mutual-exclusion assertions).
pub fn fast_lock_config() -> LockConfig {
    LockConfig {
        acquire_sleep_ms: 50,
        acquire_tries: 30,
        ..LockConfig::default()
    }
}

/// Reporter that records every call for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(Option<i64>, String, String)>>,
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, context: Option<&Context>, error: &Error, method: &str) {
        self.reports.lock().expect("reporter mutex").push((
            context.map(|c| c.voice_id),
            error.to_string(),
            method.to_string(),
        ));
    }
}

/// Minimal inbound event: a chat id and an optional sender language.
pub struct TestEvent {
    pub chat: i64,
    pub lang: Option<String>,
}

impl TestEvent {
    pub fn in_chat(chat: i64) -> Self {
        Self { chat, lang: None }
    }

    pub fn with_lang(chat: i64, lang: &str) -> Self {
        Self {
            chat,
            lang: Some(lang.to_string()),
        }
    }
}

impl InboundEvent for TestEvent {
    fn chat_id(&self) -> i64 {
        self.chat
    }

    fn sender_lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}
