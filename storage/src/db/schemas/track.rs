#![allow(clippy::module_name_repetitions)]
use serde::{Deserialize, Serialize};

/// Who may listen to a [`Track`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessTier {
    #[default]
    Free,
    Premium,
}

/// One playable unit, as handed to the player by the catalog views.
///
/// Field names follow the REST DTOs (`audioUrl`, `accessTier`, ...), so a [`Track`]
/// can be deserialized straight from a song listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// The song id, absent for ad-hoc entries that were never persisted.
    #[serde(default)]
    pub id: Option<u64>,
    pub title: String,
    /// Display name of the artist.
    pub artist: String,
    /// Cover art URL.
    #[serde(default)]
    pub image: String,
    /// Network URL, or an object URL pointing into the offline cache.
    pub audio_url: String,
    #[serde(default)]
    pub access_tier: Option<AccessTier>,
    #[serde(default)]
    pub owner_artist_id: Option<u64>,
}

impl Track {
    #[must_use]
    pub fn new(
        id: Option<u64>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            audio_url: audio_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    #[must_use]
    pub const fn with_access(mut self, tier: AccessTier, owner_artist_id: Option<u64>) -> Self {
        self.access_tier = Some(tier);
        self.owner_artist_id = owner_artist_id;
        self
    }

    /// A track can only be queued if it has somewhere to stream from.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.access_tier == Some(AccessTier::Premium)
    }

    /// Whether `self` and `other` refer to the same track.
    ///
    /// Tracks match when their audio URLs are equal, or, failing that, when both carry the same id.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if self.audio_url == other.audio_url {
            return true;
        }
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}
