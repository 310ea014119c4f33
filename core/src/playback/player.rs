//! The inline player shown next to a single track (song rows, song pages, artist pages).

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::{debug, warn};
use tracing::instrument;

use cadence_storage::db::schemas::track::Track;

use super::{
    clamp_position,
    coordinator::{Coordinator, ElementId, Registration, Subscription},
    entitlement::PremiumGate,
    handle::{Binding, MediaEvent, PlayableHandle, bind, known_duration},
};
use crate::{
    config::PlayerSettings,
    errors::PlayerError,
    state::{SeekType, StateChange},
};

/// Called with the track every time a player successfully starts it.
pub type PlayEventSink = Rc<dyn Fn(&Track)>;

struct PlayerInner {
    track: Track,
    handle: Rc<dyn PlayableHandle>,
    is_playing: Cell<bool>,
    current_time: Cell<f64>,
    duration: Cell<f64>,
}

impl PlayerInner {
    fn on_media_event(&self, event: &MediaEvent) {
        match event {
            MediaEvent::Play => self.is_playing.set(true),
            MediaEvent::Pause | MediaEvent::Ended => self.is_playing.set(false),
            MediaEvent::TimeUpdate(seconds) => self.current_time.set(*seconds),
            MediaEvent::LoadedMetadata(duration) => self.duration.set(known_duration(*duration)),
            MediaEvent::Error(message) => {
                warn!("Media error on {:?}: {message}", self.track.title);
                self.is_playing.set(false);
            }
        }
    }

    fn on_state_change(&self, change: &StateChange) {
        // clearing the current track doesn't elect anything else, so there is nothing to yield to
        let StateChange::TrackChanged(Some(current)) = change else {
            return;
        };

        if !current.matches(&self.track) && self.handle.is_playing() {
            debug!("{:?} is now playing elsewhere, pausing", current.title);
            self.handle.pause();
            self.is_playing.set(false);
        }
    }
}

pub struct TrackPlayer {
    inner: Rc<PlayerInner>,
    coordinator: Rc<Coordinator>,
    gate: Rc<PremiumGate>,
    skip_seconds: f64,
    on_play: RefCell<Option<PlayEventSink>>,
    registration: Registration,
    _binding: Binding,
    _subscription: Subscription,
}

impl TrackPlayer {
    /// Attach a player for `track` to `handle`.
    ///
    /// The element is registered with the coordinator and bound to the player until the player is
    /// dropped.
    pub fn mount(
        coordinator: &Rc<Coordinator>,
        handle: Rc<dyn PlayableHandle>,
        track: Track,
        gate: Rc<PremiumGate>,
        settings: &PlayerSettings,
    ) -> Self {
        let registration = coordinator.register(handle.clone());
        handle.set_source(&track.audio_url);

        let inner = Rc::new(PlayerInner {
            track,
            handle: handle.clone(),
            is_playing: Cell::new(handle.is_playing()),
            current_time: Cell::new(0.0),
            duration: Cell::new(known_duration(handle.duration())),
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
            coordinator: coordinator.clone(),
            gate,
            skip_seconds: settings.skip_seconds,
            on_play: RefCell::new(None),
            registration,
            _binding: binding,
            _subscription: subscription,
        }
    }

    pub fn set_on_play<F>(&self, on_play: F)
    where
        F: Fn(&Track) + 'static,
    {
        self.on_play.replace(Some(Rc::new(on_play)));
    }

    /// Start the track, silencing every other element first.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener may not play the track, in which case no audio is touched,
    /// or if the element fails to start.
    #[instrument(skip(self), fields(title = %self.inner.track.title))]
    pub async fn play(&self) -> Result<(), PlayerError> {
        let track = &self.inner.track;

        self.gate.authorize(track).await?;

        self.coordinator.stop_all_audio(Some(self.registration.id()));

        if let Err(e) = self.inner.handle.play() {
            warn!("Failed to start {:?}: {e}", track.title);
            self.inner.is_playing.set(false);
            return Err(e.into());
        }
        self.inner.is_playing.set(true);

        let on_play = self.on_play.borrow().clone();
        if let Some(on_play) = on_play {
            on_play(track);
        }

        Ok(())
    }

    pub fn pause(&self) {
        self.inner.handle.pause();
        self.inner.is_playing.set(false);
    }

    /// # Errors
    ///
    /// See [`TrackPlayer::play`].
    pub async fn toggle(&self) -> Result<(), PlayerError> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play().await
        }
    }

    /// Jump to `seconds`, clamped to the length of the track.
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

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.inner.is_playing.get()
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.inner.current_time.get()
    }

    /// Length of the track in seconds, `0` until known.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.inner.duration.get()
    }

    #[must_use]
    pub fn track(&self) -> &Track {
        &self.inner.track
    }

    #[must_use]
    pub const fn element_id(&self) -> ElementId {
        self.registration.id()
    }
}

impl Drop for TrackPlayer {
    fn drop(&mut self) {
        self.inner.handle.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::{EntitlementError, PlaybackError},
        playback::entitlement::Viewer,
        test_utils::{CountingEntitlements, MockHandle},
    };
    use cadence_storage::test_utils::{premium_track, track};

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn gate(service: CountingEntitlements, artist_id: Option<u64>) -> Rc<PremiumGate> {
        Rc::new(PremiumGate::new(Rc::new(service), Viewer { artist_id }))
    }

    fn open_gate() -> Rc<PremiumGate> {
        gate(CountingEntitlements::granting(), None)
    }

    fn mount(coordinator: &Rc<Coordinator>, track: Track) -> (Rc<MockHandle>, TrackPlayer) {
        let mock = Rc::new(MockHandle::new());
        let player = TrackPlayer::mount(
            coordinator,
            mock.clone(),
            track,
            open_gate(),
            &PlayerSettings::default(),
        );
        (mock, player)
    }

    #[test]
    fn test_mount_and_drop() {
        let coordinator = Coordinator::new();

        let (mock, player) = mount(&coordinator, track(1));
        assert_eq!(mock.source(), Some(track(1).audio_url));
        assert_eq!(mock.listener_count(), 1);
        assert_eq!(coordinator.registered_elements(), 1);
        assert!(!player.is_playing());
        assert_eq!(player.duration(), 0.0);

        drop(player);
        assert_eq!(mock.listener_count(), 0);
        assert_eq!(coordinator.registered_elements(), 0);
    }

    #[tokio::test]
    async fn test_drop_stops_audio() {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));
        player.play().await.unwrap();

        drop(player);

        assert!(!mock.is_playing());
    }

    #[tokio::test]
    async fn test_play_silences_other_players_first() {
        crate::test_utils::init();
        let coordinator = Coordinator::new();
        let (first_mock, first) = mount(&coordinator, track(1));
        let (second_mock, second) = mount(&coordinator, track(2));

        first.play().await.unwrap();
        assert!(first.is_playing());

        let second_was_playing = Rc::new(Cell::new(None));
        let first_handle: Rc<dyn PlayableHandle> = first_mock.clone();
        let _probe = bind(&first_handle, {
            let second_mock = second_mock.clone();
            let second_was_playing = second_was_playing.clone();
            move |event| {
                if *event == MediaEvent::Pause {
                    second_was_playing.set(Some(second_mock.is_playing()));
                }
            }
        });

        second.play().await.unwrap();

        assert_eq!(second_was_playing.get(), Some(false));
        assert!(!first.is_playing());
        assert!(!first_mock.is_playing());
        assert!(second.is_playing());
        assert!(second_mock.is_playing());
    }

    #[tokio::test]
    async fn test_at_most_one_player_plays() {
        let coordinator = Coordinator::new();
        let players: Vec<(Rc<MockHandle>, TrackPlayer)> =
            (1..=4).map(|id| mount(&coordinator, track(id))).collect();

        for index in [0, 2, 1, 3, 3, 0] {
            players[index].1.play().await.unwrap();

            let playing: Vec<usize> = players
                .iter()
                .enumerate()
                .filter(|(_, (mock, _))| mock.is_playing())
                .map(|(i, _)| i)
                .collect();
            assert_eq!(playing, vec![index]);
        }
    }

    #[tokio::test]
    async fn test_premium_refusal_leaves_audio_alone() {
        let coordinator = Coordinator::new();
        let (other_mock, other) = mount(&coordinator, track(1));
        other.play().await.unwrap();

        let mock = Rc::new(MockHandle::new());
        let player = TrackPlayer::mount(
            &coordinator,
            mock.clone(),
            premium_track(2, 7),
            gate(CountingEntitlements::denying(Some("Premium only".into())), None),
            &PlayerSettings::default(),
        );

        let result = player.play().await;

        assert_eq!(
            result,
            Err(PlayerError::PremiumRequired {
                reason: "Premium only".into()
            })
        );
        assert!(result.unwrap_err().offers_upgrade());
        assert_eq!(mock.play_calls(), 0);
        assert!(!player.is_playing());
        assert!(other_mock.is_playing());
    }

    #[tokio::test]
    async fn test_owner_plays_premium_without_a_check() {
        let coordinator = Coordinator::new();
        let service = Rc::new(CountingEntitlements::denying(None));
        let mock = Rc::new(MockHandle::new());
        let player = TrackPlayer::mount(
            &coordinator,
            mock.clone(),
            premium_track(2, 7),
            Rc::new(PremiumGate::new(service.clone(), Viewer { artist_id: Some(7) })),
            &PlayerSettings::default(),
        );

        player.play().await.unwrap();

        assert!(mock.is_playing());
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_entitlement_errors_surface() {
        let coordinator = Coordinator::new();
        let mock = Rc::new(MockHandle::new());
        let player = TrackPlayer::mount(
            &coordinator,
            mock.clone(),
            premium_track(2, 7),
            gate(CountingEntitlements::failing(EntitlementError::Service("down".into())), None),
            &PlayerSettings::default(),
        );

        let result = player.play().await;

        assert_eq!(
            result,
            Err(PlayerError::Entitlement(EntitlementError::Service(
                "down".into()
            )))
        );
        assert_eq!(mock.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_failure_resets_state() {
        let coordinator = Coordinator::new();
        coordinator.play_from(vec![track(1), track(2)], 1);
        let (mock, player) = mount(&coordinator, track(1));
        let plays = Rc::new(Cell::new(0));
        player.set_on_play({
            let plays = plays.clone();
            move |_| plays.set(plays.get() + 1)
        });
        mock.fail_next_play(PlaybackError::StartFailed("NotAllowedError".into()));

        let result = player.play().await;

        assert_eq!(
            result,
            Err(PlayerError::Playback(PlaybackError::StartFailed(
                "NotAllowedError".into()
            )))
        );
        assert!(!player.is_playing());
        assert_eq!(plays.get(), 0);
        assert_eq!(coordinator.current_index(), Some(1));
        assert_eq!(coordinator.queue(), vec![track(1), track(2)]);

        player.play().await.unwrap();
        assert!(player.is_playing());
        assert_eq!(plays.get(), 1);
    }

    #[tokio::test]
    async fn test_on_play_receives_the_track() {
        let coordinator = Coordinator::new();
        let (_mock, player) = mount(&coordinator, track(5));
        let played = Rc::new(RefCell::new(Vec::new()));
        player.set_on_play({
            let played = played.clone();
            move |track| played.borrow_mut().push(track.id)
        });

        player.play().await.unwrap();

        assert_eq!(*played.borrow(), vec![Some(5)]);
    }

    #[tokio::test]
    async fn test_toggle() {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));

        player.toggle().await.unwrap();
        assert!(mock.is_playing());

        player.toggle().await.unwrap();
        assert!(!mock.is_playing());
        assert!(!player.is_playing());
    }

    #[rstest]
    #[case::inside(42.0, 42.0)]
    #[case::negative(-3.0, 0.0)]
    #[case::past_end(500.0, 180.0)]
    fn test_seek_is_clamped(#[case] target: f64, #[case] expected: f64) {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));
        mock.load_metadata(180.0);

        player.seek(target);

        assert_eq!(player.current_time(), expected);
        assert_eq!(mock.current_time(), expected);
    }

    #[test]
    fn test_seek_before_metadata_stays_at_start() {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));

        player.seek(30.0);

        assert_eq!(mock.current_time(), 0.0);
    }

    #[rstest]
    #[case::default_skip(PlayerSettings::default(), 60.0, 70.0, 50.0)]
    #[case::custom_skip(PlayerSettings { skip_seconds: 15.0, ..PlayerSettings::default() }, 60.0, 75.0, 45.0)]
    #[case::clamped_at_end(PlayerSettings::default(), 175.0, 180.0, 165.0)]
    #[case::clamped_at_start(PlayerSettings::default(), 4.0, 14.0, 0.0)]
    fn test_skip(
        #[case] settings: PlayerSettings,
        #[case] start: f64,
        #[case] after_forward: f64,
        #[case] after_back: f64,
    ) {
        let coordinator = Coordinator::new();
        let mock = Rc::new(MockHandle::new());
        let player =
            TrackPlayer::mount(&coordinator, mock.clone(), track(1), open_gate(), &settings);
        mock.load_metadata(180.0);

        player.seek(start);
        player.skip_forward();
        assert_eq!(player.current_time(), after_forward);

        player.seek(start);
        player.skip_back();
        assert_eq!(player.current_time(), after_back);
    }

    #[test]
    fn test_media_events_update_state() {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));

        mock.load_metadata(f64::NAN);
        assert_eq!(player.duration(), 0.0);
        mock.load_metadata(212.5);
        assert_eq!(player.duration(), 212.5);
        mock.emit(&MediaEvent::TimeUpdate(12.0));
        assert_eq!(player.current_time(), 12.0);

        mock.play().unwrap();
        assert!(player.is_playing());
        mock.finish();
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_pauses_when_another_track_is_elected() {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));
        player.play().await.unwrap();

        coordinator.set_currently_playing(Some(track(1)));
        assert!(mock.is_playing());

        coordinator.set_currently_playing(Some(track(2)));
        assert!(!mock.is_playing());
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_keeps_playing_when_the_current_track_is_cleared() {
        let coordinator = Coordinator::new();
        let (mock, player) = mount(&coordinator, track(1));
        player.play().await.unwrap();

        coordinator.set_currently_playing(None);
        assert!(mock.is_playing());
        assert!(player.is_playing());
    }
}
