//! Per-chat configuration and status record

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_LANG;

/// The configuration and status record of one chat.
///
/// One row per chat; created lazily on the first inbound event and removed
/// on explicit teardown. Prefer [`Context::synthesized`] or the context
/// store's `new_context` over building this by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Chat ID the player runs its logic against. Primary key.
    pub voice_id: i64,
    /// Chat ID that receives status messages.
    pub log_id: i64,
    /// Whether status messages are sent at all; `log_id` is only
    /// meaningful while this is set.
    pub logging: bool,
    /// Language the bot answers in.
    pub lang_code: String,
    /// ID of the last status message, so it can be edited in place
    /// instead of posting a new message every time. `-1` means none.
    pub status_id: i64,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            voice_id: 0,
            log_id: 0,
            logging: false,
            lang_code: DEFAULT_LANG.to_string(),
            status_id: -1,
        }
    }
}

impl Context {
    /// Transient context for a chat that has no stored row yet: the chat
    /// doubles as its own log target and logging starts enabled.
    pub fn synthesized(chat_id: i64, lang_code: impl Into<String>) -> Self {
        Self {
            voice_id: chat_id,
            log_id: chat_id,
            logging: true,
            lang_code: lang_code.into(),
            status_id: -1,
        }
    }
}
