//! Storage gateway
//!
//! Owns the shared `SQLite` pool and runs one-time schema installation for
//! the components registered with it. This layer never retries: pool
//! exhaustion and connectivity failures propagate to the caller unchanged.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use jukebox_core::{Error, Result, StorageConfig};

/// A component that keeps rows in the shared database.
///
/// Installation runs each registered component's DDL exactly once at
/// startup; components own their table layout and row codecs themselves.
#[async_trait]
pub trait StorageModule: Send + Sync {
    /// Short name used in installation logs.
    fn name(&self) -> &'static str;

    /// Create this component's tables. Must be idempotent.
    async fn init_schema(&self, pool: &SqlitePool) -> Result<()>;

    /// Drop this component's row state. Called during installation when
    /// the gateway is configured to reset on start; a restarted bot has no
    /// calls in progress, so leftover coordination rows are garbage.
    async fn reset(&self, pool: &SqlitePool) -> Result<()>;
}

/// Storage gateway wrapping the shared connection pool.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
    reset_on_start: bool,
}

impl Db {
    /// Open (or create) the database described by `config`.
    ///
    /// WAL journaling and a busy timeout are set up front: every inbound
    /// event runs as its own task against this pool, so concurrent writers
    /// are the norm, not the exception.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(&config.db_path);
        Self::connect(options, config, &config.db_path.display().to_string()).await
    }

    /// Open (or create) a database file with default pool settings.
    pub async fn open_path(path: &Path) -> Result<Self> {
        let config = StorageConfig {
            db_path: path.to_path_buf(),
            ..StorageConfig::default()
        };
        Self::open(&config).await
    }

    /// Open a database from a `sqlite:` connection URL with default pool
    /// settings. A URL that does not parse is an [`Error::Parse`].
    pub async fn open_url(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Parse(format!("bad connection url {url}: {e}")))?;
        Self::connect(options, &StorageConfig::default(), url).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        config: &StorageConfig,
        target: &str,
    ) -> Result<Self> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("failed to connect to {target}: {e}")))?;
        Ok(Self {
            pool,
            reset_on_start: config.reset_on_start,
        })
    }

    /// Shared pool. Callers acquire scoped connections or transactions
    /// from it; release is guaranteed by drop.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run one-time schema installation for the given components, in
    /// order, applying the startup reset when configured.
    pub async fn install(&self, modules: &[&dyn StorageModule]) -> Result<()> {
        for module in modules {
            tracing::info!(module = module.name(), "installing storage module");
            module.init_schema(&self.pool).await?;
            if self.reset_on_start {
                tracing::info!(module = module.name(), "resetting storage module state");
                module.reset(&self.pool).await?;
            }
        }
        Ok(())
    }
}
