//! Inbound event abstraction
//!
//! The bot platform delivers message- and callback-style events; this core
//! only ever needs the chat they belong to and, when present, the sender's
//! language. Everything else about the event stays opaque.

/// An inbound platform event (message, callback, stream-ended, ...).
pub trait InboundEvent {
    /// The chat the event was triggered in; unit of locking, context and
    /// queue ownership.
    fn chat_id(&self) -> i64;

    /// Language code of the sender, when the platform provides one.
    fn sender_lang(&self) -> Option<&str> {
        None
    }
}
