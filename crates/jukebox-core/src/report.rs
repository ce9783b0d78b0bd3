//! Error reporting collaborator
//!
//! Handler failures under a chat lock are reported through this trait and
//! then dropped; the reporter is fire-and-forget telemetry, not control
//! flow.

use async_trait::async_trait;

use crate::{Context, Error};

/// Sink for handler failures.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// Report a failure of `method`. `context` is present when the failure
    /// happened inside a contextualized handler.
    async fn report(&self, context: Option<&Context>, error: &Error, method: &str);
}

/// Reporter that forwards failures to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

#[async_trait]
impl ErrorReporter for TracingReporter {
    async fn report(&self, context: Option<&Context>, error: &Error, method: &str) {
        match context {
            Some(ctx) => {
                tracing::error!(voice_id = ctx.voice_id, method, %error, "handler failed");
            }
            None => tracing::error!(method, %error, "handler failed"),
        }
    }
}
