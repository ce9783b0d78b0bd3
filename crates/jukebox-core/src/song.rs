//! Playable item metadata

use serde::{Deserialize, Serialize};

/// Immutable metadata of one queued item.
///
/// Stored as a JSON value inside a playlist row; everything except `url`
/// is advisory display data coming from whatever extracted the track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongData {
    pub author: String,
    pub title: String,
    pub album: String,
    pub genre: String,
    pub year: i64,
    pub lyricist: String,
    /// Track length in seconds.
    pub duration: i64,
    pub url: String,
}

impl SongData {
    /// A song known only by its URL; metadata fields stay empty until
    /// an extractor fills them in.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
