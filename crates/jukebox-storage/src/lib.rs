//! Jukebox-storage - SQLite-backed coordination state for the jukebox bot
//!
//! Four components share one connection pool:
//! - [`db::Db`] - the storage gateway owning the pool and schema setup
//! - [`lock::LockManager`] - advisory per-chat locks with staleness reclaim
//! - [`context::ContextStore`] - per-chat configuration records and the
//!   handler resolver
//! - [`playlist::PlaylistQueue`] - durable cursor-tracked playback queues
//!
//! Every inbound event runs as its own tokio task; the lock manager is the
//! only thing serializing handlers that touch the same chat.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod context;
pub mod db;
pub mod lock;
pub mod playlist;

pub use context::{ContextFlow, ContextOptions, ContextStore};
pub use db::{Db, StorageModule};
pub use lock::{LockManager, RACE_WINDOW};
pub use playlist::PlaylistQueue;
