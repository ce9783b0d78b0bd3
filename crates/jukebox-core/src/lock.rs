//! Chat lock token and level types

use chrono::{DateTime, Utc};

/// Lock level for ordinary user commands.
pub const LEVEL_COMMAND: i64 = 1;

/// Lock level for queue-advance operations. Both the stream-ended
/// callback and a user-initiated skip must lock at this level so the
/// cursor is never advanced twice for one track.
pub const LEVEL_ADVANCE: i64 = 2;

/// A lock token: the microsecond timestamp written during acquisition.
///
/// Whoever's write is the last one read back is considered the holder,
/// so the only operation that matters on a token is equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(i64);

impl LockToken {
    /// Token for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_micros())
    }

    /// Rebuild a token from its stored representation.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Stored representation: microseconds since the Unix epoch.
    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// The instant the token encodes, if it is in range for `chrono`.
    #[must_use]
    pub fn instant(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }

    /// Whether more than `threshold_secs` have elapsed since this token
    /// was written. Drives abandoned-lock reclamation.
    #[must_use]
    pub fn is_stale(self, threshold_secs: i64) -> bool {
        Utc::now().timestamp_micros() - self.0 > threshold_secs.saturating_mul(1_000_000)
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One chat's advisory lock row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLock {
    /// Operation class holding the lock; opaque beyond ordering.
    pub level: i64,
    /// When the lock was written; doubles as the token.
    pub locked_at: LockToken,
}
