//! Per-chat context records and the handler resolver
//!
//! CRUD over one [`Context`] row per chat, plus [`ContextStore::resolve`],
//! the wrapper every inbound event handler goes through to get a context
//! supplied (looked up or synthesized) and its mutations persisted.

use std::future::Future;

use async_trait::async_trait;
use sqlx::SqlitePool;

use jukebox_core::{Context, Error, InboundEvent, Result};

use crate::db::StorageModule;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chat_context (
    voice_id  INTEGER PRIMARY KEY,
    log_id    INTEGER NOT NULL,
    logging   INTEGER NOT NULL,
    lang_code TEXT    NOT NULL,
    status_id INTEGER NOT NULL
)";

type ContextRow = (i64, i64, bool, String, i64);

fn row_to_context((voice_id, log_id, logging, lang_code, status_id): ContextRow) -> Context {
    Context {
        voice_id,
        log_id,
        logging,
        lang_code,
        status_id,
    }
}

/// How [`ContextStore::resolve`] treats a handler invocation.
#[derive(Debug, Clone, Copy)]
pub struct ContextOptions {
    /// Persist the context after the handler signals a mutation.
    pub auto_update: bool,
    /// Skip the handler entirely when the chat has no stored context.
    pub required: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            auto_update: true,
            required: false,
        }
    }
}

impl ContextOptions {
    /// Options for handlers that only make sense in an established chat.
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }
}

/// Signal a handler returns to the resolver, carrying the context back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextFlow {
    /// Context untouched; nothing is persisted.
    Unchanged(Context),
    /// Context mutated; persisted when auto-update is enabled.
    Mutated(Context),
    /// This chat is being torn down; the stored row is deleted.
    Discard(Context),
}

impl ContextFlow {
    /// The context the handler finished with, whatever the signal.
    #[must_use]
    pub fn context(&self) -> &Context {
        match self {
            Self::Unchanged(ctx) | Self::Mutated(ctx) | Self::Discard(ctx) => ctx,
        }
    }
}

/// CRUD over per-chat context rows.
#[derive(Debug, Clone)]
pub struct ContextStore {
    pool: SqlitePool,
    default_lang: String,
}

impl ContextStore {
    pub fn new(pool: SqlitePool, default_lang: impl Into<String>) -> Self {
        Self {
            pool,
            default_lang: default_lang.into(),
        }
    }

    /// Build a context from the required data, filling defaults, and
    /// persist it.
    pub async fn new_context(
        &self,
        voice_id: i64,
        logging: bool,
        log_id: Option<i64>,
        lang_code: Option<String>,
        status_id: Option<i64>,
    ) -> Result<Context> {
        let context = Context {
            voice_id,
            log_id: log_id.unwrap_or(0),
            logging,
            lang_code: lang_code.unwrap_or_else(|| self.default_lang.clone()),
            status_id: status_id.unwrap_or(-1),
        };
        self.update(&context).await?;
        Ok(context)
    }

    /// Upsert the context row keyed by its `voice_id`.
    pub async fn update(&self, context: &Context) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_context (voice_id, log_id, logging, lang_code, status_id)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(voice_id) DO UPDATE SET
                 log_id = excluded.log_id,
                 logging = excluded.logging,
                 lang_code = excluded.lang_code,
                 status_id = excluded.status_id",
        )
        .bind(context.voice_id)
        .bind(context.log_id)
        .bind(context.logging)
        .bind(&context.lang_code)
        .bind(context.status_id)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(Error::database)
    }

    /// Delete the stored row for this context.
    pub async fn delete(&self, context: &Context) -> Result<()> {
        self.delete_by_voice(context.voice_id).await
    }

    /// Delete the stored row for a chat id.
    pub async fn delete_by_voice(&self, voice_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chat_context WHERE voice_id = ?")
            .bind(voice_id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }

    /// Look up a context by its primary chat id.
    pub async fn get_by_voice(&self, voice_id: i64) -> Result<Option<Context>> {
        let row: Option<ContextRow> = sqlx::query_as(
            "SELECT voice_id, log_id, logging, lang_code, status_id
             FROM chat_context WHERE voice_id = ?",
        )
        .bind(voice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::database)?;
        Ok(row.map(row_to_context))
    }

    /// Look up a context by its log chat id.
    pub async fn get_by_log(&self, log_id: i64) -> Result<Option<Context>> {
        let row: Option<ContextRow> = sqlx::query_as(
            "SELECT voice_id, log_id, logging, lang_code, status_id
             FROM chat_context WHERE log_id = ? LIMIT 1",
        )
        .bind(log_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::database)?;
        Ok(row.map(row_to_context))
    }

    /// Look up a context matching either the primary or the log chat id,
    /// returning the first match.
    ///
    /// Unreliable by construction: when some chat's log id numerically
    /// equals a different chat's primary id, either row may come back.
    /// Kept as-is because every inbound event funnels through it and the
    /// ambiguity has never been resolved at the product level.
    pub async fn get_by_any(&self, id: i64) -> Result<Option<Context>> {
        let row: Option<ContextRow> = sqlx::query_as(
            "SELECT voice_id, log_id, logging, lang_code, status_id
             FROM chat_context WHERE log_id = ? OR voice_id = ? LIMIT 1",
        )
        .bind(id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::database)?;
        Ok(row.map(row_to_context))
    }

    /// Run an inbound-event handler with a context supplied.
    ///
    /// The chat id is taken from the event and looked up via
    /// [`ContextStore::get_by_any`]. With no stored row, `required`
    /// options short-circuit to `Ok(None)` without invoking the handler;
    /// otherwise a transient context is synthesized from the sender's
    /// language (or the default) with the chat as its own log target.
    ///
    /// The handler owns the context for its lifetime and hands it back
    /// inside a [`ContextFlow`]; mutations are persisted when auto-update
    /// is on, and a discard signal deletes the stored row. Handler errors
    /// are not caught here; the lock layer is responsible for reporting.
    pub async fn resolve<E, F, Fut>(
        &self,
        event: &E,
        options: ContextOptions,
        handler: F,
    ) -> Result<Option<ContextFlow>>
    where
        E: InboundEvent,
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<ContextFlow>>,
    {
        let chat_id = event.chat_id();

        let context = match self.get_by_any(chat_id).await? {
            Some(ctx) => ctx,
            None if options.required => return Ok(None),
            None => {
                let lang = event.sender_lang().unwrap_or(&self.default_lang);
                Context::synthesized(chat_id, lang)
            }
        };

        let flow = handler(context).await?;
        match &flow {
            ContextFlow::Mutated(ctx) if options.auto_update => self.update(ctx).await?,
            ContextFlow::Discard(ctx) => self.delete(ctx).await?,
            _ => {}
        }
        Ok(Some(flow))
    }
}

#[async_trait]
impl StorageModule for ContextStore {
    fn name(&self) -> &'static str {
        "context"
    }

    async fn init_schema(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }

    async fn reset(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query("DELETE FROM chat_context")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(Error::database)
    }
}
