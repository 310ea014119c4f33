use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use cadence_storage::db::schemas::track::Track;

#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Deserialize, Serialize, EnumIter, EnumString,
)]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    None,
    /// Wrap around at either end of the queue.
    All,
    /// Restart the current track instead of advancing.
    One,
}

#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Deserialize, Serialize, EnumIter, EnumString,
)]
pub enum PlaybackStatus {
    /// No track selected.
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Deserialize, Serialize, EnumIter, EnumString)]
pub enum SeekType {
    Absolute,
    Relative,
}

/// Notifications sent to coordinator subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum StateChange {
    /// The currently playing track was (re)selected.
    TrackChanged(Option<Track>),
    QueueChanged,
    ShuffleChanged(bool),
    RepeatModeChanged(RepeatMode),
}

/// A snapshot of the coordinator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatePlayback {
    pub queue: Vec<Track>,
    pub active_queue: Vec<Track>,
    pub current_index: Option<usize>,
    pub currently_playing: Option<Track>,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub status: PlaybackStatus,
}
