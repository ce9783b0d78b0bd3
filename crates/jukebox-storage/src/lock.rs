//! Advisory per-chat locks
//!
//! The platform does not serialize handlers for the same chat, so this
//! manager is the only mutual-exclusion mechanism in the system. The lock
//! is a single keyed row whose write timestamp doubles as a token: write a
//! token, wait a short settle interval, read back, and whoever's write
//! survived is the holder. The protocol relies on read-after-write
//! consistency of the shared store, not on row locking, and offers no
//! fairness among waiters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use jukebox_core::{ChatLock, Context, Error, ErrorReporter, LockConfig, LockToken, Result};

use crate::db::StorageModule;

/// Settle interval between writing a token and reading it back. A
/// concurrent writer inside this window is detected as a lost race.
/// Deliberately a fixed constant: the window is part of the protocol's
/// correctness envelope, not a tuning knob.
pub const RACE_WINDOW: Duration = Duration::from_millis(100);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chat_lock (
    voice_id  INTEGER PRIMARY KEY,
    level     INTEGER NOT NULL,
    locked_at INTEGER NOT NULL
)";

/// Manages per-chat advisory locks backed by the shared pool.
#[derive(Clone)]
pub struct LockManager {
    pool: SqlitePool,
    config: LockConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl LockManager {
    pub fn new(pool: SqlitePool, config: LockConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            pool,
            config,
            reporter,
        }
    }

    /// Unconditionally write a `(level, now)` lock row for the chat and
    /// return the written timestamp as the token. This does not check for
    /// an existing holder; use [`LockManager::acquire`] for that.
    pub async fn lock(&self, voice_id: i64, level: i64) -> Result<LockToken> {
        let token = LockToken::now();
        sqlx::query(
            "INSERT INTO chat_lock (voice_id, level, locked_at) VALUES (?, ?, ?)
             ON CONFLICT(voice_id) DO UPDATE
             SET level = excluded.level, locked_at = excluded.locked_at",
        )
        .bind(voice_id)
        .bind(level)
        .bind(token.as_micros())
        .execute(&self.pool)
        .await
        .map_err(Error::database)?;
        Ok(token)
    }

    /// Remove the chat's lock row.
    pub async fn unlock(&self, voice_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chat_lock WHERE voice_id = ?")
            .bind(voice_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }

    /// Token of the current lock, if the chat is locked.
    pub async fn lock_time(&self, voice_id: i64) -> Result<Option<LockToken>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT locked_at FROM chat_lock WHERE voice_id = ?")
            .bind(voice_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::database)?;
        Ok(row.map(|(micros,)| LockToken::from_micros(micros)))
    }

    /// Full lock row (level and token) for introspection.
    pub async fn current(&self, voice_id: i64) -> Result<Option<ChatLock>> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT level, locked_at FROM chat_lock WHERE voice_id = ?")
                .bind(voice_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::database)?;
        Ok(row.map(|(level, micros)| ChatLock {
            level,
            locked_at: LockToken::from_micros(micros),
        }))
    }

    /// Robust acquisition: bounded retries with staleness reclaim, then an
    /// unconditional fallback.
    ///
    /// Each attempt first reads the current holder. A live lock is waited
    /// out; a stale one is force-cleared when auto-unlock is enabled. The
    /// attempt then writes a token, settles for [`RACE_WINDOW`] and reads
    /// back; a mismatch means a concurrent writer won.
    ///
    /// Once the bounded budget is spent, the fallback loop keeps writing
    /// until a read-back matches. That guarantees eventual ownership but
    /// can starve this caller under sustained contention; a known,
    /// accepted trade-off of this protocol.
    pub async fn acquire(&self, voice_id: i64, level: i64) -> Result<LockToken> {
        let between_tries = Duration::from_millis(self.config.acquire_sleep_ms);

        for attempt in 0..self.config.acquire_tries {
            if attempt > 0 {
                tokio::time::sleep(between_tries).await;
            }

            if let Some(held) = self.lock_time(voice_id).await? {
                if !self.config.auto_unlock || !held.is_stale(self.config.stale_after_secs) {
                    continue;
                }
                tracing::debug!(voice_id, held_since = ?held.instant(), "reclaiming stale lock");
                self.unlock(voice_id).await?;
            }

            let token = self.lock(voice_id, level).await?;
            tokio::time::sleep(RACE_WINDOW).await;
            if self.lock_time(voice_id).await? == Some(token) {
                tracing::debug!(voice_id, level, token = %token, "lock acquired");
                return Ok(token);
            }
        }

        tracing::warn!(
            voice_id,
            level,
            tries = self.config.acquire_tries,
            "acquisition budget exhausted, entering unconditional retry"
        );

        loop {
            let token = self.lock(voice_id, level).await?;
            tokio::time::sleep(RACE_WINDOW).await;
            if self.lock_time(voice_id).await? == Some(token) {
                tracing::debug!(voice_id, level, token = %token, "lock acquired (fallback)");
                return Ok(token);
            }
        }
    }

    /// Execute `handler` under the chat's lock.
    ///
    /// With `bypass` set, no locking happens at all; the caller asserts it
    /// already holds the lock (a callback re-entering the same chat).
    /// Otherwise the lock is acquired at `level`, the handler runs, and
    /// the lock is always released afterwards. A handler failure is
    /// forwarded to the error reporter under `method` and surfaces as
    /// `Ok(None)`; it is never re-raised. Failures of acquisition or
    /// release themselves are real errors and propagate.
    pub async fn with_lock<F, Fut, T>(
        &self,
        context: &Context,
        level: i64,
        bypass: bool,
        method: &'static str,
        handler: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !bypass {
            self.acquire(context.voice_id, level).await?;
        }

        let data = match handler().await {
            Ok(value) => Some(value),
            Err(e) => {
                self.reporter.report(Some(context), &e, method).await;
                None
            }
        };

        if !bypass {
            self.unlock(context.voice_id).await?;
        }
        Ok(data)
    }
}

#[async_trait]
impl StorageModule for LockManager {
    fn name(&self) -> &'static str {
        "lock"
    }

    async fn init_schema(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }

    async fn reset(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query("DELETE FROM chat_lock")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }
}
