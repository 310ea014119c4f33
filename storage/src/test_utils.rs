use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    cache::AudioCache,
    db::schemas::track::{AccessTier, Track},
    errors::FetchError,
    fetch::{AudioFetcher, FetchedAudio},
};

/// Serves canned responses keyed by URL; unknown URLs answer with a 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Result<FetchedAudio, FetchError>>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_audio(mut self, url: &str, bytes: &[u8], mime: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(FetchedAudio {
                bytes: bytes.to_vec(),
                mime: mime.to_string(),
            }),
        );
        self
    }

    #[must_use]
    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    /// How many times [`AudioFetcher::fetch`] has been called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAudio, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            })
    }
}

/// A fetcher whose downloads never finish.
#[derive(Debug, Default)]
pub struct PendingFetcher;

#[async_trait]
impl AudioFetcher for PendingFetcher {
    async fn fetch(&self, _: &str) -> Result<FetchedAudio, FetchError> {
        std::future::pending().await
    }
}

/// Create an in-memory cache backed by `fetcher`.
///
/// # Errors
///
/// Returns an error if the in-memory database cannot be created.
pub async fn memory_cache(fetcher: Arc<dyn AudioFetcher>) -> anyhow::Result<AudioCache> {
    Ok(AudioCache::in_memory(fetcher).await?)
}

/// A track with an id, streaming from `https://cdn.test/audio/{id}.mp3`.
#[must_use]
pub fn track(id: u64) -> Track {
    Track::new(
        Some(id),
        format!("Song {id}"),
        format!("Artist {id}"),
        format!("https://cdn.test/audio/{id}.mp3"),
    )
    .with_image(format!("https://cdn.test/covers/{id}.jpg"))
}

/// A premium track owned by artist `owner`.
#[must_use]
pub fn premium_track(id: u64, owner: u64) -> Track {
    track(id).with_access(AccessTier::Premium, Some(owner))
}
