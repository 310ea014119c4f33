#![allow(clippy::module_name_repetitions)]
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

pub const TABLE_NAME: &str = "audio_cache";

/// The id of the record holding the audio of song `song_id`.
///
/// Song ids are stored as signed integers, so there is no record for ids above [`i64::MAX`].
#[must_use]
pub fn record_id(song_id: u64) -> Option<RecordId> {
    let key = i64::try_from(song_id).ok()?;
    Some(RecordId::from_table_key(TABLE_NAME, key))
}

/// A downloaded song, stored for offline playback.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheEntry {
    pub id: RecordId,
    pub song_id: u64,
    pub blob: Vec<u8>,
    pub mime: String,
    pub size_bytes: u64,
    /// Milliseconds since the unix epoch.
    pub cached_at_ms: u64,
}

impl CacheEntry {
    /// Returns `None` if `song_id` has no record id (see [`record_id`]).
    #[must_use]
    pub fn new(song_id: u64, blob: Vec<u8>, mime: impl Into<String>) -> Option<Self> {
        Some(Self {
            id: record_id(song_id)?,
            song_id,
            size_bytes: blob.len() as u64,
            blob,
            mime: mime.into(),
            cached_at_ms: now_timestamp_millis(),
        })
    }
}

/// The metadata of a [`CacheEntry`], without the audio itself.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSummary {
    pub song_id: u64,
    pub size_bytes: u64,
}

fn now_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
