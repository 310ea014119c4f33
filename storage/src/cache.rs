//! The offline audio cache.
//!
//! Downloaded songs are stored in the embedded database keyed by song id, and handed back to
//! the player as object URLs (see [`crate::object_url`]).

use std::{future::Future, path::PathBuf, sync::Arc};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use surrealdb::{Connection, Surreal, engine::local::Db};
use tracing::instrument;

use crate::{
    db::{
        init_database, init_memory_database,
        schemas::{
            cache_entry::{CacheEntry, CacheSummary, TABLE_NAME, record_id},
            track::Track,
        },
    },
    errors::{CacheError, Error},
    fetch::{AudioFetcher, FetchedAudio},
    object_url::ObjectUrlRegistry,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_size_bytes: u64,
}

/// Durable per-song storage of audio for offline playback.
pub struct AudioCache<C: Connection = Db> {
    db: Surreal<C>,
    fetcher: Arc<dyn AudioFetcher>,
    urls: ObjectUrlRegistry,
}

impl<C: Connection> Clone for AudioCache<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            fetcher: self.fetcher.clone(),
            urls: self.urls.clone(),
        }
    }
}

impl AudioCache<Db> {
    /// Open a cache persisted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the database cannot be opened.
    pub async fn open(path: PathBuf, fetcher: Arc<dyn AudioFetcher>) -> Result<Self, CacheError> {
        let db = init_database(path).await?;
        Ok(Self::new(db, fetcher))
    }

    /// Create a cache that is lost when the last clone of it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the database cannot be created.
    pub async fn in_memory(fetcher: Arc<dyn AudioFetcher>) -> Result<Self, CacheError> {
        let db = init_memory_database().await?;
        Ok(Self::new(db, fetcher))
    }
}

impl<C: Connection> AudioCache<C> {
    #[must_use]
    pub fn new(db: Surreal<C>, fetcher: Arc<dyn AudioFetcher>) -> Self {
        Self {
            db,
            fetcher,
            urls: ObjectUrlRegistry::new(),
        }
    }

    /// The registry holding every URL this cache has handed out.
    #[must_use]
    pub const fn urls(&self) -> &ObjectUrlRegistry {
        &self.urls
    }

    /// Download `source_url` and store it as the audio of `song_id`, replacing any previous entry.
    ///
    /// Returns a fresh object URL for the stored audio.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SongIdOutOfRange`] without downloading anything if `song_id` is above
    /// [`i64::MAX`], [`CacheError::Fetch`] if the download fails, or [`CacheError::Storage`] if the
    /// write fails. In every case any previous entry for `song_id` is left as it was.
    #[instrument(skip(self))]
    pub async fn save(&self, song_id: u64, source_url: &str) -> Result<String, CacheError> {
        self.save_cancellable(song_id, source_url, std::future::pending())
            .await
    }

    /// Like [`AudioCache::save`], but gives up as soon as `cancel` completes.
    ///
    /// Cancellation is only observed while downloading; once the bytes are in hand the write
    /// runs to completion.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Cancelled`] if `cancel` finished first, otherwise see [`AudioCache::save`].
    #[instrument(skip(self, cancel))]
    pub async fn save_cancellable<F>(
        &self,
        song_id: u64,
        source_url: &str,
        cancel: F,
    ) -> Result<String, CacheError>
    where
        F: Future<Output = ()>,
    {
        if record_id(song_id).is_none() {
            warn!("Song {song_id} can't be stored in the offline cache");
            return Err(CacheError::SongIdOutOfRange(song_id));
        }

        let fetched = tokio::select! {
            biased;
            () = cancel => {
                warn!("Download of song {song_id} cancelled");
                return Err(CacheError::Cancelled);
            }
            fetched = self.fetcher.fetch(source_url) => fetched,
        };

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Failed to download song {song_id}: {e}");
                return Err(e.into());
            }
        };

        self.store(song_id, fetched).await
    }

    async fn store(&self, song_id: u64, fetched: FetchedAudio) -> Result<String, CacheError> {
        let entry = CacheEntry::new(song_id, fetched.bytes, fetched.mime)
            .ok_or(CacheError::SongIdOutOfRange(song_id))?;

        let stored: Option<CacheEntry> = self
            .db
            .upsert(entry.id.clone())
            .content(entry)
            .await?;
        let stored = stored.ok_or(Error::NotFound)?;

        info!(
            "Saved song {song_id} for offline listening ({} bytes)",
            stored.size_bytes
        );
        Ok(self.urls.create(stored.blob, stored.mime))
    }

    /// Get a fresh object URL for the stored audio of `song_id`, if there is any.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the read fails.
    #[instrument(skip(self))]
    pub async fn get_cached_url(&self, song_id: u64) -> Result<Option<String>, CacheError> {
        let Some(id) = record_id(song_id) else {
            return Ok(None);
        };
        let entry: Option<CacheEntry> = self.db.select(id).await?;

        Ok(entry.map(|entry| self.urls.create(entry.blob, entry.mime)))
    }

    /// Delete the stored audio of `song_id`. Deleting a song that is not cached is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, song_id: u64) -> Result<(), CacheError> {
        let Some(id) = record_id(song_id) else {
            return Ok(());
        };
        let removed: Option<CacheEntry> = self.db.delete(id).await?;
        if removed.is_some() {
            debug!("Removed song {song_id} from the offline cache");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the read fails.
    #[instrument(skip(self))]
    pub async fn is_cached(&self, song_id: u64) -> Result<bool, CacheError> {
        Ok(self
            .get_cached_url(song_id)
            .await?
            .map(|url| self.urls.revoke(&url))
            .is_some())
    }

    /// Swap the audio URL of `track` for a cached object URL, if its song has been downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the read fails.
    #[instrument(skip(self, track), fields(id = ?track.id))]
    pub async fn resolve_playable(&self, track: Track) -> Result<Track, CacheError> {
        let Some(song_id) = track.id else {
            return Ok(track);
        };

        Ok(match self.get_cached_url(song_id).await? {
            Some(audio_url) => Track { audio_url, ..track },
            None => track,
        })
    }

    async fn summaries(&self) -> Result<Vec<CacheSummary>, CacheError> {
        let mut response = self
            .db
            .query(format!("SELECT song_id, size_bytes FROM {TABLE_NAME}"))
            .await?;
        Ok(response.take(0)?)
    }

    /// The ids of every cached song, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the read fails.
    pub async fn cached_song_ids(&self) -> Result<Vec<u64>, CacheError> {
        let mut ids: Vec<u64> = self
            .summaries()
            .await?
            .into_iter()
            .map(|summary| summary.song_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the read fails.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let summaries = self.summaries().await?;
        Ok(CacheStats {
            entry_count: summaries.len(),
            total_size_bytes: summaries.iter().map(|summary| summary.size_bytes).sum(),
        })
    }

    /// Delete every cached song.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CacheError> {
        let removed: Vec<CacheEntry> = self.db.delete(TABLE_NAME).await?;
        info!("Cleared {} songs from the offline cache", removed.len());
        Ok(())
    }
}
