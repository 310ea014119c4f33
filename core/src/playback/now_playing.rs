//! The app-wide now-playing bar.
//!
//! The bar follows the coordinator: whenever a track is elected it loads and starts it, and when
//! a track ends it asks the coordinator for the next one. Tracks only reach the coordinator after
//! the UI (or an inline player) has gated them, so the bar never asks about entitlements.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::{debug, warn};
use tracing::instrument;

use cadence_storage::db::schemas::track::Track;

use super::{
    VolumeCommand, clamp_position,
    coordinator::{Coordinator, ElementId, Registration, Subscription},
    handle::{Binding, MediaEvent, PlayableHandle, bind, known_duration},
};
use crate::{
    config::PlayerSettings,
    errors::PlayerError,
    state::{SeekType, StateChange},
};

struct BarInner {
    coordinator: Rc<Coordinator>,
    handle: Rc<dyn PlayableHandle>,
    element_id: ElementId,
    track: RefCell<Option<Track>>,
    is_playing: Cell<bool>,
    current_time: Cell<f64>,
    duration: Cell<f64>,
    last_error: RefCell<Option<PlayerError>>,
}

impl BarInner {
    /// Silence everything else, then start our element.
    fn start(&self) -> Result<(), PlayerError> {
        self.coordinator.stop_all_audio(Some(self.element_id));

        match self.handle.play() {
            Ok(()) => {
                self.is_playing.set(true);
                self.last_error.replace(None);
                Ok(())
            }
            Err(e) => {
                warn!("Now playing failed to start: {e}");
                self.is_playing.set(false);
                let error = PlayerError::from(e);
                self.last_error.replace(Some(error.clone()));
                Err(error)
            }
        }
    }

    #[instrument(skip(self, track), fields(title = %track.title))]
    fn load(&self, track: Track) {
        self.handle.pause();
        self.handle.set_source(&track.audio_url);
        self.handle.set_current_time(0.0);
        self.current_time.set(0.0);
        self.duration.set(known_duration(self.handle.duration()));
        self.track.replace(Some(track));

        // the error is kept in `last_error` for the UI
        let _ = self.start();
    }

    fn on_state_change(&self, change: &StateChange) {
        match change {
            StateChange::TrackChanged(Some(track)) => self.load(track.clone()),
            StateChange::TrackChanged(None) => {
                debug!("Nothing to play, pausing");
                self.handle.pause();
                self.is_playing.set(false);
                self.track.replace(None);
            }
            _ => {}
        }
    }

    fn on_media_event(&self, event: &MediaEvent) {
        match event {
            MediaEvent::Play => self.is_playing.set(true),
            MediaEvent::Pause => self.is_playing.set(false),
            MediaEvent::TimeUpdate(seconds) => self.current_time.set(*seconds),
            MediaEvent::LoadedMetadata(duration) => self.duration.set(known_duration(*duration)),
            MediaEvent::Ended => {
                self.is_playing.set(false);
                self.coordinator.play_next();
            }
            MediaEvent::Error(message) => {
                warn!("Media error in now playing: {message}");
                self.is_playing.set(false);
            }
        }
    }
}

pub struct NowPlayingBar {
    inner: Rc<BarInner>,
    skip_seconds: f64,
    volume: Cell<f32>,
    muted: Cell<bool>,
    _registration: Registration,
    _binding: Binding,
    _subscription: Subscription,
}

impl NowPlayingBar {
    /// Attach the bar to `handle` and start following `coordinator`.
    pub fn mount(
        coordinator: &Rc<Coordinator>,
        handle: Rc<dyn PlayableHandle>,
        settings: &PlayerSettings,
    ) -> Self {
        let registration = coordinator.register(handle.clone());

        let volume = settings.default_volume.clamp(0.0, 1.0);
        handle.set_volume(volume);
        handle.set_muted(false);

        let inner = Rc::new(BarInner {
            coordinator: coordinator.clone(),
            handle: handle.clone(),
            element_id: registration.id(),
            track: RefCell::new(None),
            is_playing: Cell::new(handle.is_playing()),
            current_time: Cell::new(0.0),
            duration: Cell::new(0.0),
            last_error: RefCell::new(None),
        });

        let binding = bind(&handle, {
            let inner = Rc::downgrade(&inner);
            move |event| {
                if let Some(inner) = inner.upgrade() {
                    inner.on_media_event(event);
                }
            }
        });

        let subscription = coordinator.subscribe({
            let inner = Rc::downgrade(&inner);
            move |change| {
                if let Some(inner) = inner.upgrade() {
                    inner.on_state_change(change);
                }
            }
        });

        Self {
            inner,
            skip_seconds: settings.skip_seconds,
            volume: Cell::new(volume),
            muted: Cell::new(false),
            _registration: registration,
            _binding: binding,
            _subscription: subscription,
        }
    }

    /// Resume the loaded track. Does nothing if no track is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the element fails to start.
    pub fn play(&self) -> Result<(), PlayerError> {
        if self.inner.track.borrow().is_none() {
            return Ok(());
        }
        self.inner.start()
    }

    pub fn pause(&self) {
        self.inner.handle.pause();
        self.inner.is_playing.set(false);
    }

    /// # Errors
    ///
    /// See [`NowPlayingBar::play`].
    pub fn toggle(&self) -> Result<(), PlayerError> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn seek(&self, seconds: f64) {
        let position = clamp_position(seconds, self.inner.handle.duration());
        self.inner.handle.set_current_time(position);
        self.inner.current_time.set(position);
    }

    pub fn seek_with(&self, seek: SeekType, seconds: f64) {
        match seek {
            SeekType::Absolute => self.seek(seconds),
            SeekType::Relative => self.seek(self.inner.handle.current_time() + seconds),
        }
    }

    pub fn skip_back(&self) {
        self.seek_with(SeekType::Relative, -self.skip_seconds);
    }

    pub fn skip_forward(&self) {
        self.seek_with(SeekType::Relative, self.skip_seconds);
    }

    pub fn next(&self) {
        self.inner.coordinator.play_next();
    }

    pub fn previous(&self) {
        self.inner.coordinator.play_previous();
    }

    /// Change the volume or mute state.
    ///
    /// Volume and mute are independent: changing the volume never unmutes.
    #[instrument(skip(self))]
    pub fn volume_control(&self, command: VolumeCommand) {
        match command {
            VolumeCommand::Up(amount) => self.set_volume(self.volume.get() + amount),
            VolumeCommand::Down(amount) => self.set_volume(self.volume.get() - amount),
            VolumeCommand::Set(volume) => self.set_volume(volume),
            VolumeCommand::Mute => self.set_muted(true),
            VolumeCommand::Unmute => self.set_muted(false),
            VolumeCommand::ToggleMute => self.set_muted(!self.muted.get()),
        }
        debug!("Volume {command} -> {:.2} (muted: {})", self.volume.get(), self.muted.get());
    }

    fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume.set(volume);
        self.inner.handle.set_volume(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
        self.inner.handle.set_muted(muted);
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    #[must_use]
    pub fn muted(&self) -> bool {
        self.muted.get()
    }

    #[must_use]
    pub fn track(&self) -> Option<Track> {
        self.inner.track.borrow().clone()
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.inner.is_playing.get()
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.inner.current_time.get()
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.inner.duration.get()
    }

    /// The reason the last attempt to start a track failed, cleared by the next successful start.
    #[must_use]
    pub fn last_error(&self) -> Option<PlayerError> {
        self.inner.last_error.borrow().clone()
    }

    #[must_use]
    pub fn element_id(&self) -> ElementId {
        self.inner.element_id
    }
}

impl Drop for NowPlayingBar {
    fn drop(&mut self) {
        self.inner.handle.pause();
    }
}
