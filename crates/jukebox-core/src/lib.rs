//! Jukebox-core - Domain types for the chat coordination layer
//!
//! This crate provides:
//! - Per-chat context and playlist item types
//! - Lock token and lock level types
//! - Error types
//! - Configuration loading
//! - Collaborator traits (event source, error reporter)

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod lock;
pub mod report;
pub mod song;

pub use config::{Config, LockConfig, StorageConfig, DEFAULT_LANG};
pub use context::Context;
pub use error::{Error, Result};
pub use event::InboundEvent;
pub use lock::{ChatLock, LockToken, LEVEL_ADVANCE, LEVEL_COMMAND};
pub use report::{ErrorReporter, TracingReporter};
pub use song::SongData;
