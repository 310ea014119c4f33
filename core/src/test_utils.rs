use std::{
    cell::{Cell, RefCell},
    sync::Once,
};

use async_trait::async_trait;

use cadence_storage::{db::schemas::track::Track, test_utils::track};

use crate::{
    errors::{EntitlementError, PlaybackError},
    logger::{init_logger, init_tracing},
    playback::{
        entitlement::{Entitlement, EntitlementRequest, EntitlementService},
        handle::{ListenerId, MediaEvent, MediaListener, PlayableHandle},
        shuffle::Shuffler,
    },
};

static INIT: Once = Once::new();

/// Set up logging and tracing for a test run, at most once per process.
pub fn init() {
    INIT.call_once(|| {
        init_logger(log::LevelFilter::Debug);
        if let Err(e) = tracing::subscriber::set_global_default(init_tracing()) {
            log::warn!("Tracing was already set up: {e}");
        }
    });
}

/// Tracks `1..=len` (see [`track`]).
#[must_use]
pub fn tracks(len: u64) -> Vec<Track> {
    (1..=len).map(track).collect()
}

/// A shuffler that simply reverses the queue, so tests can predict shuffled positions.
#[must_use]
pub fn reversed() -> Shuffler {
    Box::new(|tracks| tracks.iter().rev().cloned().collect())
}

/// An in-memory media element.
///
/// Behaves like an audio element that loads instantly: `play` starts immediately (or fails if told
/// to), and the duration stays unknown until [`MockHandle::load_metadata`] is called.
pub struct MockHandle {
    playing: Cell<bool>,
    current_time: Cell<f64>,
    duration: Cell<f64>,
    volume: Cell<f32>,
    muted: Cell<bool>,
    source: RefCell<Option<String>>,
    fail_play: RefCell<Option<PlaybackError>>,
    fail_once: Cell<bool>,
    play_calls: Cell<usize>,
    listeners: RefCell<Vec<(ListenerId, MediaListener)>>,
    next_id: Cell<ListenerId>,
}

impl Default for MockHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            playing: Cell::new(false),
            current_time: Cell::new(0.0),
            duration: Cell::new(f64::NAN),
            volume: Cell::new(1.0),
            muted: Cell::new(false),
            source: RefCell::new(None),
            fail_play: RefCell::new(None),
            fail_once: Cell::new(false),
            play_calls: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Deliver `event` to every listener.
    pub fn emit(&self, event: &MediaEvent) {
        let listeners: Vec<MediaListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// The source has loaded and is `duration` seconds long.
    pub fn load_metadata(&self, duration: f64) {
        self.duration.set(duration);
        self.emit(&MediaEvent::LoadedMetadata(duration));
    }

    /// Play through to the end of the source.
    pub fn finish(&self) {
        self.playing.set(false);
        if self.duration.get().is_finite() {
            self.current_time.set(self.duration.get());
        }
        self.emit(&MediaEvent::Ended);
    }

    /// Make the next call to `play` fail with `error`.
    pub fn fail_next_play(&self, error: PlaybackError) {
        self.fail_play.replace(Some(error));
        self.fail_once.set(true);
    }

    /// Make every call to `play` fail with `error` until cleared with `None`.
    pub fn set_fail_play(&self, error: Option<PlaybackError>) {
        self.fail_play.replace(error);
        self.fail_once.set(false);
    }

    #[must_use]
    pub fn source(&self) -> Option<String> {
        self.source.borrow().clone()
    }

    #[must_use]
    pub fn play_calls(&self) -> usize {
        self.play_calls.get()
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    #[must_use]
    pub fn muted(&self) -> bool {
        self.muted.get()
    }
}

impl PlayableHandle for MockHandle {
    fn play(&self) -> Result<(), PlaybackError> {
        self.play_calls.set(self.play_calls.get() + 1);

        let failure = if self.fail_once.replace(false) {
            self.fail_play.take()
        } else {
            self.fail_play.borrow().clone()
        };
        if let Some(error) = failure {
            self.playing.set(false);
            self.emit(&MediaEvent::Error(error.to_string()));
            return Err(error);
        }

        if !self.playing.replace(true) {
            self.emit(&MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&self) {
        if self.playing.replace(false) {
            self.emit(&MediaEvent::Pause);
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }

    fn current_time(&self) -> f64 {
        self.current_time.get()
    }

    fn set_current_time(&self, seconds: f64) {
        self.current_time.set(seconds);
        self.emit(&MediaEvent::TimeUpdate(seconds));
    }

    fn duration(&self) -> f64 {
        self.duration.get()
    }

    fn set_source(&self, url: &str) {
        if self.playing.replace(false) {
            self.emit(&MediaEvent::Pause);
        }
        self.source.replace(Some(url.to_string()));
        self.current_time.set(0.0);
        self.duration.set(f64::NAN);
    }

    fn set_volume(&self, volume: f32) {
        self.volume.set(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }

    fn subscribe(&self, listener: MediaListener) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(listener, _)| *listener != id);
    }
}

/// An entitlement service with a fixed answer that records every request.
pub struct CountingEntitlements {
    response: Result<Entitlement, EntitlementError>,
    requests: RefCell<Vec<EntitlementRequest>>,
}

impl CountingEntitlements {
    #[must_use]
    pub const fn granting() -> Self {
        Self::answering(Ok(Entitlement::granted()))
    }

    #[must_use]
    pub const fn denying(reason: Option<String>) -> Self {
        Self::answering(Ok(Entitlement {
            can_play: false,
            reason,
        }))
    }

    #[must_use]
    pub const fn failing(error: EntitlementError) -> Self {
        Self::answering(Err(error))
    }

    const fn answering(response: Result<Entitlement, EntitlementError>) -> Self {
        Self {
            response,
            requests: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<EntitlementRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl EntitlementService for CountingEntitlements {
    async fn check(&self, request: EntitlementRequest) -> Result<Entitlement, EntitlementError> {
        self.requests.borrow_mut().push(request);
        self.response.clone()
    }
}
