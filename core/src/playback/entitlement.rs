//! Premium gating of inline playback.

use std::rc::Rc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cadence_storage::db::schemas::track::{AccessTier, Track};

use crate::errors::{DEFAULT_PREMIUM_REASON, EntitlementError, PlayerError};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementRequest {
    pub access_tier: AccessTier,
    pub owner_artist_id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub can_play: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Entitlement {
    #[must_use]
    pub const fn granted() -> Self {
        Self {
            can_play: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            can_play: false,
            reason: Some(reason.into()),
        }
    }
}

/// The backend that decides whether the signed-in listener may play a track.
#[async_trait(?Send)]
pub trait EntitlementService {
    async fn check(&self, request: EntitlementRequest) -> Result<Entitlement, EntitlementError>;
}

/// Who is listening.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    /// Set when the listener is signed in as an artist.
    pub artist_id: Option<u64>,
}

impl Viewer {
    #[must_use]
    pub const fn owns(&self, track: &Track) -> bool {
        matches!(
            (self.artist_id, track.owner_artist_id),
            (Some(viewer), Some(owner)) if viewer == owner
        )
    }
}

pub struct PremiumGate {
    service: Rc<dyn EntitlementService>,
    viewer: Viewer,
}

impl PremiumGate {
    #[must_use]
    pub fn new(service: Rc<dyn EntitlementService>, viewer: Viewer) -> Self {
        Self { service, viewer }
    }

    #[must_use]
    pub const fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Decide whether `track` may start.
    ///
    /// Free tracks, and premium tracks owned by the viewing artist, are allowed without asking the
    /// service.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::PremiumRequired`] if the service denies playback, or
    /// [`PlayerError::Entitlement`] if it could not be reached.
    #[instrument(skip(self, track), fields(id = track.id))]
    pub async fn authorize(&self, track: &Track) -> Result<(), PlayerError> {
        if !track.is_premium() {
            return Ok(());
        }
        if self.viewer.owns(track) {
            debug!("Owner bypass for track {:?}", track.id);
            return Ok(());
        }

        let request = EntitlementRequest {
            access_tier: AccessTier::Premium,
            owner_artist_id: track.owner_artist_id,
        };

        let entitlement = self
            .service
            .check(request)
            .await
            .inspect_err(|e| warn!("Entitlement check failed: {e}"))?;

        if entitlement.can_play {
            Ok(())
        } else {
            Err(PlayerError::PremiumRequired {
                reason: entitlement
                    .reason
                    .unwrap_or_else(|| DEFAULT_PREMIUM_REASON.to_string()),
            })
        }
    }
}
