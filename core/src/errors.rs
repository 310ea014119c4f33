use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cadence_storage::errors::{CacheError, FetchError};

pub const DEFAULT_PREMIUM_REASON: &str = "This track is only available to premium subscribers.";

/// Errors that can occur with finding the config or data directories.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Unable to find the config directory for cadence.")]
    Config,
    #[error("Unable to find the data directory for cadence.")]
    Data,
}

/// The offline cache named in the settings could not be opened.
#[derive(Error, Debug)]
pub enum CacheSetupError {
    #[error("{0}")]
    Directory(#[from] DirectoryError),
    #[error("{0}")]
    Cache(#[from] CacheError),
}

/// The underlying media element could not start.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum PlaybackError {
    #[error("Playback failed to start: {0}")]
    StartFailed(String),
    #[error("Unsupported media: {0}")]
    Unsupported(String),
}

/// The entitlement service could not answer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum EntitlementError {
    #[error("Entitlement service error: {0}")]
    Service(String),
    #[error("Not signed in.")]
    Unauthenticated,
}

/// Errors surfaced by the players when asked to start a track.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Premium required: {reason}")]
    PremiumRequired { reason: String },
    #[error("{0}")]
    Entitlement(#[from] EntitlementError),
    #[error("{0}")]
    Playback(#[from] PlaybackError),
}

impl PlayerError {
    /// The message shown to the listener.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PremiumRequired { reason } => format!("{reason} Upgrade to keep listening."),
            Self::Entitlement(_) => {
                "We couldn't check your subscription. Please try again.".to_string()
            }
            Self::Playback(_) => "This track couldn't be played.".to_string(),
        }
    }

    /// Whether the listener should be offered the upgrade flow.
    #[must_use]
    pub const fn offers_upgrade(&self) -> bool {
        matches!(self, Self::PremiumRequired { .. })
    }
}

/// A [`PlayerError`] or [`CacheError`] flattened to strings, so it can be handed to a UI layer.
#[derive(Error, Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum SerializablePlayerError {
    #[error("Premium required: {0}")]
    PremiumRequired(String),
    #[error("Entitlement error: {0}")]
    Entitlement(String),
    #[error("Playback error: {0}")]
    Playback(String),
    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<PlayerError> for SerializablePlayerError {
    fn from(e: PlayerError) -> Self {
        match e {
            PlayerError::PremiumRequired { reason } => Self::PremiumRequired(reason),
            PlayerError::Entitlement(e) => Self::Entitlement(e.to_string()),
            PlayerError::Playback(e) => Self::Playback(e.to_string()),
        }
    }
}

impl From<CacheError> for SerializablePlayerError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e.to_string())
    }
}
