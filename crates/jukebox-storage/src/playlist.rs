//! Durable per-chat playback queues
//!
//! The queue is relational rather than in-process so multiple bot
//! instances can share it and it survives restarts. A status row per chat
//! keeps `size` (total ever enqueued) and `position` (dequeue cursor);
//! `size - position` is the number of items still waiting, with no need to
//! re-scan consumed rows.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};

use jukebox_core::{Error, Result, SongData};

use crate::db::StorageModule;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS playlist (
    voice_id INTEGER NOT NULL,
    seq      INTEGER NOT NULL,
    song     TEXT    NOT NULL,
    PRIMARY KEY (voice_id, seq)
);

CREATE TABLE IF NOT EXISTS playlist_status (
    voice_id INTEGER PRIMARY KEY,
    size     INTEGER NOT NULL,
    position INTEGER NOT NULL
)";

fn decode_song(raw: &str) -> Result<SongData> {
    serde_json::from_str(raw).map_err(Error::encoding)
}

/// Durable FIFO queue of playable items, one per chat.
#[derive(Debug, Clone)]
pub struct PlaylistQueue {
    pool: SqlitePool,
}

impl PlaylistQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a song to the chat's queue and return the 0-based index it
    /// occupies.
    pub async fn enqueue(&self, voice_id: i64, song: &SongData) -> Result<i64> {
        let encoded = serde_json::to_string(song).map_err(Error::encoding)?;

        let mut tx = self.pool.begin().await.map_err(Error::database)?;
        let size = read_size(&mut tx, voice_id).await?.unwrap_or(0);

        sqlx::query("INSERT INTO playlist (voice_id, seq, song) VALUES (?, ?, ?)")
            .bind(voice_id)
            .bind(size)
            .bind(&encoded)
            .execute(&mut *tx)
            .await
            .map_err(Error::database)?;

        sqlx::query(
            "INSERT INTO playlist_status (voice_id, size, position) VALUES (?, ?, 0)
             ON CONFLICT(voice_id) DO UPDATE SET size = excluded.size",
        )
        .bind(voice_id)
        .bind(size + 1)
        .execute(&mut *tx)
        .await
        .map_err(Error::database)?;

        tx.commit().await.map_err(Error::database)?;
        Ok(size)
    }

    /// Pop the song under the cursor, returning its index and data.
    ///
    /// `Ok(None)` means the queue is exhausted; callers normally follow up
    /// with [`PlaylistQueue::clean`].
    pub async fn dequeue(&self, voice_id: i64) -> Result<Option<(i64, SongData)>> {
        let mut tx = self.pool.begin().await.map_err(Error::database)?;

        let Some(position) = read_position(&mut tx, voice_id).await? else {
            return Ok(None);
        };

        let row: Option<(String,)> =
            sqlx::query_as("SELECT song FROM playlist WHERE voice_id = ? AND seq = ?")
                .bind(voice_id)
                .bind(position)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::database)?;
        let Some((encoded,)) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM playlist WHERE voice_id = ? AND seq = ?")
            .bind(voice_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(Error::database)?;

        sqlx::query("UPDATE playlist_status SET position = position + 1 WHERE voice_id = ?")
            .bind(voice_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::database)?;

        tx.commit().await.map_err(Error::database)?;
        Ok(Some((position, decode_song(&encoded)?)))
    }

    /// Up to `limit` songs in sequence order starting at `offset`, which
    /// defaults to the current cursor ("up next" view).
    pub async fn fetch(
        &self,
        voice_id: i64,
        limit: i64,
        offset: Option<i64>,
    ) -> Result<Vec<SongData>> {
        let offset = match offset {
            Some(o) => o,
            None => self.position(voice_id).await?.unwrap_or(0),
        };

        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT song FROM playlist
             WHERE voice_id = ? AND seq >= ?
             ORDER BY seq LIMIT ?",
        )
        .bind(voice_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::database)?;

        rows.iter().map(|(raw,)| decode_song(raw)).collect()
    }

    /// Drop the chat's queue entirely: all entries and the status row.
    pub async fn clean(&self, voice_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::database)?;
        sqlx::query("DELETE FROM playlist WHERE voice_id = ?")
            .bind(voice_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::database)?;
        sqlx::query("DELETE FROM playlist_status WHERE voice_id = ?")
            .bind(voice_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::database)?;
        tx.commit().await.map_err(Error::database)
    }

    /// Total number of songs ever enqueued, `None` before first enqueue.
    pub async fn size(&self, voice_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT size FROM playlist_status WHERE voice_id = ?")
                .bind(voice_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::database)?;
        Ok(row.map(|(size,)| size))
    }

    /// Dequeue cursor, `None` before first enqueue.
    pub async fn position(&self, voice_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT position FROM playlist_status WHERE voice_id = ?")
                .bind(voice_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::database)?;
        Ok(row.map(|(position,)| position))
    }
}

async fn read_size(tx: &mut Transaction<'_, Sqlite>, voice_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT size FROM playlist_status WHERE voice_id = ?")
        .bind(voice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::database)?;
    Ok(row.map(|(size,)| size))
}

async fn read_position(tx: &mut Transaction<'_, Sqlite>, voice_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT position FROM playlist_status WHERE voice_id = ?")
            .bind(voice_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::database)?;
    Ok(row.map(|(position,)| position))
}

#[async_trait]
impl StorageModule for PlaylistQueue {
    fn name(&self) -> &'static str {
        "playlist"
    }

    async fn init_schema(&self, pool: &SqlitePool) -> Result<()> {
        // Two statements; sqlx prepares single statements only.
        for ddl in SCHEMA.split(';') {
            if ddl.trim().is_empty() {
                continue;
            }
            sqlx::query(ddl)
                .execute(pool)
                .await
                .map_err(Error::database)?;
        }
        Ok(())
    }

    async fn reset(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query("DELETE FROM playlist")
            .execute(pool)
            .await
            .map_err(Error::database)?;
        sqlx::query("DELETE FROM playlist_status")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }
}
