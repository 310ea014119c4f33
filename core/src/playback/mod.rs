//! Client-side playback: the shared [`coordinator::Coordinator`], the per-row
//! [`player::TrackPlayer`], and the app-wide [`now_playing::NowPlayingBar`].
#![allow(clippy::module_name_repetitions)]

pub mod coordinator;
pub mod entitlement;
pub mod handle;
pub mod now_playing;
pub mod player;
pub mod shuffle;

use std::fmt::Display;

/// Volume commands, volumes are fractions where `1.0` is full volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum VolumeCommand {
    Up(f32),
    Down(f32),
    Set(f32),
    Mute,
    Unmute,
    ToggleMute,
}

impl Display for VolumeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up(amount) => write!(f, "+{percent:.0}%", percent = amount * 100.0),
            Self::Down(amount) => write!(f, "-{percent:.0}%", percent = amount * 100.0),
            Self::Set(amount) => write!(f, "={percent:.0}%", percent = amount * 100.0),
            Self::Mute => write!(f, "Mute"),
            Self::Unmute => write!(f, "Unmute"),
            Self::ToggleMute => write!(f, "Toggle Mute"),
        }
    }
}

/// Clamp a requested position to `[0, duration]`.
///
/// A `duration` that is not known yet counts as `0`.
#[must_use]
pub fn clamp_position(seconds: f64, duration: f64) -> f64 {
    let duration = handle::known_duration(duration);
    if seconds.is_nan() {
        return 0.0;
    }
    seconds.clamp(0.0, duration)
}
