//! The shared playback state of the client.
//!
//! One [`Coordinator`] is created per app and handed by reference (`Rc<Coordinator>`) to every
//! player. It owns the queue, the position in it, the shuffle and repeat modes, and the track the
//! now-playing bar should be playing. It also keeps a registry of every mounted media element so
//! that starting one can silence all the others.
//!
//! Everything here runs on the UI thread. Listener and element lists are copied out of their
//! cells before any callback runs, so callbacks are free to call back into the coordinator.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use log::{debug, warn};
use tracing::instrument;

use cadence_storage::db::schemas::track::Track;

use super::{
    handle::PlayableHandle,
    shuffle::{Shuffler, shuffle},
};
use crate::state::{PlaybackStatus, RepeatMode, StateChange, StatePlayback};

pub type ElementId = u64;
pub type SubscriptionId = u64;
pub type StateListener = Rc<dyn Fn(&StateChange)>;

#[derive(Debug, Default)]
struct PlaybackState {
    queue: Vec<Track>,
    shuffled: Vec<Track>,
    current_index: Option<usize>,
    currently_playing: Option<Track>,
    shuffle: bool,
    repeat_mode: RepeatMode,
}

impl PlaybackState {
    fn active(&self) -> &[Track] {
        if self.shuffle {
            &self.shuffled
        } else {
            &self.queue
        }
    }

    fn locate(&self, track: &Track) -> Option<usize> {
        self.active().iter().position(|queued| queued.matches(track))
    }

    /// The current index if it points into the active queue, otherwise wherever the currently
    /// playing track sits in it, otherwise the start.
    fn valid_index(&self) -> usize {
        match self.current_index {
            Some(index) if index < self.active().len() => index,
            _ => self
                .currently_playing
                .as_ref()
                .and_then(|track| self.locate(track))
                .unwrap_or(0),
        }
    }
}

enum Navigation {
    Restart(Track),
    Select(usize),
    Stay,
}

pub struct Coordinator {
    state: RefCell<PlaybackState>,
    shuffler: Shuffler,
    elements: RefCell<Vec<(ElementId, Rc<dyn PlayableHandle>)>>,
    listeners: RefCell<Vec<(SubscriptionId, StateListener)>>,
    next_id: Cell<u64>,
}

impl Coordinator {
    /// A coordinator that shuffles with [`shuffle`].
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::with_shuffler(Box::new(shuffle))
    }

    #[must_use]
    pub fn with_shuffler(shuffler: Shuffler) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(PlaybackState::default()),
            shuffler,
            elements: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        })
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn notify(&self, change: &StateChange) {
        let listeners: Vec<StateListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(change);
        }
    }

    // ---------------------------------------------------------------------------- queue

    /// Replace the queue and draw a fresh shuffle of it.
    ///
    /// Tracks without an audio URL are dropped. The current index and track are left alone.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub fn set_queue(&self, tracks: Vec<Track>) {
        let queue: Vec<Track> = tracks.into_iter().filter(Track::is_playable).collect();
        let shuffled = (self.shuffler)(&queue);

        {
            let mut state = self.state.borrow_mut();
            state.queue = queue;
            state.shuffled = shuffled;
        }

        self.notify(&StateChange::QueueChanged);
    }

    /// Index into the active queue, `None` for no selection.
    #[instrument(skip(self))]
    pub fn set_current_index(&self, index: Option<usize>) {
        self.state.borrow_mut().current_index = index;
    }

    /// Elect `track` as the currently playing track.
    ///
    /// Subscribers are always notified, even if `track` is already playing, so re-selecting a
    /// track restarts it.
    #[instrument(skip(self, track), fields(title = track.as_ref().map(|t| t.title.as_str())))]
    pub fn set_currently_playing(&self, track: Option<Track>) {
        self.state.borrow_mut().currently_playing.clone_from(&track);
        self.notify(&StateChange::TrackChanged(track));
    }

    /// Queue `tracks` and start the one at `index` (an index into `tracks`).
    ///
    /// With shuffle on, the index is translated to wherever that track landed in the shuffled queue.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub fn play_from(&self, tracks: Vec<Track>, index: usize) {
        let chosen = tracks.get(index).filter(|track| track.is_playable()).cloned();
        self.set_queue(tracks);

        let Some(track) = chosen else {
            warn!("Nothing playable at index {index}");
            return;
        };

        let position = self.state.borrow().locate(&track);
        self.set_current_index(position);
        self.set_currently_playing(Some(track));
    }

    // ---------------------------------------------------------------------------- navigation

    fn select(&self, index: usize) {
        let track = {
            let mut state = self.state.borrow_mut();
            let Some(track) = state.active().get(index).cloned() else {
                return;
            };
            state.current_index = Some(index);
            state.currently_playing = Some(track.clone());
            track
        };

        self.notify(&StateChange::TrackChanged(Some(track)));
    }

    fn navigate(&self, navigation: Navigation) {
        match navigation {
            Navigation::Restart(track) => self.set_currently_playing(Some(track)),
            Navigation::Select(index) => self.select(index),
            Navigation::Stay => debug!("Reached the end of the queue"),
        }
    }

    /// Advance to the next track of the active queue.
    #[instrument(skip(self))]
    pub fn play_next(&self) {
        let navigation = {
            let state = self.state.borrow();
            let len = state.active().len();

            if len == 0 {
                Navigation::Stay
            } else if state.repeat_mode == RepeatMode::One {
                state
                    .currently_playing
                    .clone()
                    .map_or(Navigation::Stay, Navigation::Restart)
            } else {
                let index = state.valid_index();
                if index + 1 < len {
                    Navigation::Select(index + 1)
                } else if state.repeat_mode == RepeatMode::All {
                    Navigation::Select(0)
                } else {
                    Navigation::Stay
                }
            }
        };

        self.navigate(navigation);
    }

    /// Step back to the previous track of the active queue.
    #[instrument(skip(self))]
    pub fn play_previous(&self) {
        let navigation = {
            let state = self.state.borrow();
            let len = state.active().len();

            if len == 0 {
                Navigation::Stay
            } else if state.repeat_mode == RepeatMode::One {
                state
                    .currently_playing
                    .clone()
                    .map_or(Navigation::Stay, Navigation::Restart)
            } else {
                match state.valid_index() {
                    0 if state.repeat_mode == RepeatMode::All => Navigation::Select(len - 1),
                    0 => Navigation::Stay,
                    index => Navigation::Select(index - 1),
                }
            }
        };

        self.navigate(navigation);
    }

    // ---------------------------------------------------------------------------- modes

    /// Switch between the original and the shuffled queue, keeping the current track selected.
    #[instrument(skip(self))]
    pub fn set_shuffle(&self, shuffle: bool) {
        {
            let mut state = self.state.borrow_mut();
            if state.shuffle == shuffle {
                return;
            }
            state.shuffle = shuffle;

            if let Some(track) = state.currently_playing.clone() {
                state.current_index = state.locate(&track);
            }
        }

        self.notify(&StateChange::ShuffleChanged(shuffle));
    }

    pub fn toggle_shuffle(&self) {
        let shuffle = self.state.borrow().shuffle;
        self.set_shuffle(!shuffle);
    }

    #[instrument(skip(self))]
    pub fn set_repeat_mode(&self, repeat_mode: RepeatMode) {
        self.state.borrow_mut().repeat_mode = repeat_mode;
        self.notify(&StateChange::RepeatModeChanged(repeat_mode));
    }

    // ---------------------------------------------------------------------------- exclusion

    /// Add `handle` to the live registry for as long as the returned [`Registration`] lives.
    pub fn register(self: &Rc<Self>, handle: Rc<dyn PlayableHandle>) -> Registration {
        let id = self.next_id();
        self.elements.borrow_mut().push((id, handle));
        debug!("Registered media element {id}");

        Registration {
            coordinator: Rc::downgrade(self),
            id,
        }
    }

    fn unregister(&self, id: ElementId) {
        self.elements.borrow_mut().retain(|(element, _)| *element != id);
        debug!("Unregistered media element {id}");
    }

    /// Pause every registered element except `except`.
    ///
    /// Must be called right before an element starts playing.
    #[instrument(skip(self))]
    pub fn stop_all_audio(&self, except: Option<ElementId>) {
        let others: Vec<Rc<dyn PlayableHandle>> = self
            .elements
            .borrow()
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .map(|(_, handle)| handle.clone())
            .collect();

        for handle in others {
            handle.pause();
        }
    }

    #[must_use]
    pub fn registered_elements(&self) -> usize {
        self.elements.borrow().len()
    }

    // ---------------------------------------------------------------------------- pub/sub

    /// Call `listener` on every [`StateChange`] for as long as the returned [`Subscription`] lives.
    pub fn subscribe<F>(self: &Rc<Self>, listener: F) -> Subscription
    where
        F: Fn(&StateChange) + 'static,
    {
        let id = self.next_id();
        self.listeners.borrow_mut().push((id, Rc::new(listener)));

        Subscription {
            coordinator: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(listener, _)| *listener != id);
    }

    // ---------------------------------------------------------------------------- accessors

    #[must_use]
    pub fn queue(&self) -> Vec<Track> {
        self.state.borrow().queue.clone()
    }

    /// The permutation drawn by the last [`Coordinator::set_queue`], whether or not shuffle is on.
    #[must_use]
    pub fn shuffled_queue(&self) -> Vec<Track> {
        self.state.borrow().shuffled.clone()
    }

    #[must_use]
    pub fn active_queue(&self) -> Vec<Track> {
        self.state.borrow().active().to_vec()
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.state.borrow().current_index
    }

    #[must_use]
    pub fn currently_playing(&self) -> Option<Track> {
        self.state.borrow().currently_playing.clone()
    }

    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.state.borrow().shuffle
    }

    #[must_use]
    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.borrow().repeat_mode
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        if self.state.borrow().currently_playing.is_none() {
            return PlaybackStatus::Idle;
        }

        let handles: Vec<Rc<dyn PlayableHandle>> = self
            .elements
            .borrow()
            .iter()
            .map(|(_, handle)| handle.clone())
            .collect();

        if handles.iter().any(|handle| handle.is_playing()) {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        }
    }

    #[must_use]
    pub fn state(&self) -> StatePlayback {
        let status = self.status();
        let state = self.state.borrow();

        StatePlayback {
            queue: state.queue.clone(),
            active_queue: state.active().to_vec(),
            current_index: state.current_index,
            currently_playing: state.currently_playing.clone(),
            shuffle: state.shuffle,
            repeat_mode: state.repeat_mode,
            status,
        }
    }
}

/// Membership of a media element in the coordinator's registry, released on drop.
#[must_use = "the element is unregistered as soon as the registration is dropped"]
pub struct Registration {
    coordinator: Weak<Coordinator>,
    id: ElementId,
}

impl Registration {
    #[must_use]
    pub const fn id(&self) -> ElementId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.unregister(self.id);
        }
    }
}

/// A coordinator listener, removed on drop.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    coordinator: Weak<Coordinator>,
    id: SubscriptionId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        playback::shuffle::seeded,
        test_utils::{MockHandle, reversed, tracks},
    };
    use cadence_storage::test_utils::track;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// A coordinator over `[A, B, C, ...]` (`len` tracks) with track `index` playing.
    fn playing_at(len: u64, index: usize, repeat_mode: RepeatMode) -> Rc<Coordinator> {
        let coordinator = Coordinator::with_shuffler(reversed());
        coordinator.play_from(tracks(len), index);
        coordinator.set_repeat_mode(repeat_mode);
        coordinator
    }

    fn changes(coordinator: &Rc<Coordinator>) -> (Rc<RefCell<Vec<StateChange>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let subscription = coordinator.subscribe({
            let seen = seen.clone();
            move |change| seen.borrow_mut().push(change.clone())
        });
        (seen, subscription)
    }

    #[test]
    fn test_new_coordinator_is_idle() {
        let coordinator = Coordinator::new();

        assert_eq!(coordinator.current_index(), None);
        assert_eq!(coordinator.currently_playing(), None);
        assert_eq!(coordinator.status(), PlaybackStatus::Idle);
        assert!(!coordinator.shuffle());
        assert_eq!(coordinator.repeat_mode(), RepeatMode::None);

        coordinator.play_next();
        coordinator.play_previous();
        assert_eq!(coordinator.currently_playing(), None);
    }

    #[test]
    fn test_set_queue_filters_unplayable_tracks() {
        let coordinator = Coordinator::new();
        let mut silent = track(9);
        silent.audio_url = String::new();

        coordinator.set_queue(vec![track(1), silent, track(2)]);

        assert_eq!(coordinator.queue(), vec![track(1), track(2)]);
        assert_eq!(coordinator.shuffled_queue().len(), 2);
    }

    #[test]
    fn test_set_queue_keeps_current_track_and_reshuffles() {
        let coordinator = Coordinator::with_shuffler(seeded(3));
        let mock = Rc::new(MockHandle::new());
        let _registration = coordinator.register(mock.clone());
        coordinator.play_from(tracks(3), 1);
        mock.play().unwrap();

        let new_tracks: Vec<Track> = (1..=6).map(track).collect();
        coordinator.set_queue(new_tracks.clone());

        assert_eq!(coordinator.currently_playing(), Some(track(2)));
        assert!(mock.is_playing());
        assert_eq!(coordinator.status(), PlaybackStatus::Playing);

        let mut shuffled_ids: Vec<_> = coordinator
            .shuffled_queue()
            .iter()
            .map(|track| track.id)
            .collect();
        shuffled_ids.sort_unstable();
        let new_ids: Vec<_> = new_tracks.iter().map(|track| track.id).collect();
        assert_eq!(shuffled_ids, new_ids);
    }

    #[test]
    fn test_set_queue_draws_a_fresh_shuffle_each_time() {
        let calls = Rc::new(Cell::new(0));
        let coordinator = Coordinator::with_shuffler({
            let calls = calls.clone();
            Box::new(move |tracks: &[Track]| {
                calls.set(calls.get() + 1);
                tracks.to_vec()
            })
        });

        coordinator.set_queue(tracks(3));
        coordinator.set_queue(tracks(3));
        coordinator.toggle_shuffle();

        assert_eq!(calls.get(), 2);
    }

    #[rstest]
    #[case::first(0, Some(1))]
    #[case::middle(1, Some(2))]
    fn test_play_next_advances(#[case] from: usize, #[case] expected: Option<usize>) {
        let coordinator = playing_at(3, from, RepeatMode::None);

        coordinator.play_next();

        assert_eq!(coordinator.current_index(), expected);
        assert_eq!(
            coordinator.currently_playing(),
            expected.map(|index| tracks(3)[index].clone())
        );
    }

    #[test]
    fn test_play_next_wraps_with_repeat_all() {
        let coordinator = playing_at(3, 2, RepeatMode::All);

        coordinator.play_next();

        assert_eq!(coordinator.current_index(), Some(0));
        assert_eq!(coordinator.currently_playing(), Some(track(1)));
    }

    #[test]
    fn test_play_next_stops_at_end_without_repeat() {
        let coordinator = playing_at(3, 2, RepeatMode::None);
        let (seen, _subscription) = changes(&coordinator);

        coordinator.play_next();

        assert_eq!(coordinator.current_index(), Some(2));
        assert_eq!(coordinator.currently_playing(), Some(track(3)));
        assert!(seen.borrow().is_empty());
    }

    #[rstest]
    #[case::next(true)]
    #[case::previous(false)]
    fn test_repeat_one_restarts_current_track(#[case] forward: bool) {
        let coordinator = playing_at(3, 1, RepeatMode::One);
        let (seen, _subscription) = changes(&coordinator);

        if forward {
            coordinator.play_next();
        } else {
            coordinator.play_previous();
        }

        assert_eq!(coordinator.currently_playing(), Some(track(2)));
        assert_eq!(coordinator.current_index(), Some(1));
        assert_eq!(
            *seen.borrow(),
            vec![StateChange::TrackChanged(Some(track(2)))]
        );
    }

    #[test]
    fn test_play_previous_steps_back() {
        let coordinator = playing_at(3, 2, RepeatMode::None);

        coordinator.play_previous();

        assert_eq!(coordinator.current_index(), Some(1));
        assert_eq!(coordinator.currently_playing(), Some(track(2)));
    }

    #[rstest]
    #[case::wraps(RepeatMode::All, Some(2), Some(3))]
    #[case::stays(RepeatMode::None, Some(0), Some(1))]
    fn test_play_previous_at_start(
        #[case] repeat_mode: RepeatMode,
        #[case] expected_index: Option<usize>,
        #[case] expected_id: Option<u64>,
    ) {
        let coordinator = playing_at(3, 0, repeat_mode);

        coordinator.play_previous();

        assert_eq!(coordinator.current_index(), expected_index);
        assert_eq!(coordinator.currently_playing(), expected_id.map(track));
    }

    #[test]
    fn test_play_next_relocates_out_of_bounds_index() {
        let coordinator = Coordinator::new();
        coordinator.set_queue(tracks(4));
        coordinator.set_currently_playing(Some(track(2)));
        coordinator.set_current_index(Some(17));

        coordinator.play_next();

        assert_eq!(coordinator.current_index(), Some(2));
        assert_eq!(coordinator.currently_playing(), Some(track(3)));
    }

    #[test]
    fn test_play_next_without_selection_starts_after_first() {
        let coordinator = Coordinator::new();
        coordinator.set_queue(tracks(3));

        coordinator.play_next();

        assert_eq!(coordinator.current_index(), Some(1));
        assert_eq!(coordinator.currently_playing(), Some(track(2)));
    }

    #[test]
    fn test_play_next_matches_by_id_when_urls_differ() {
        let coordinator = Coordinator::new();
        coordinator.set_queue(tracks(3));
        let mut cached = track(2);
        cached.audio_url = "blob:cadence/local-copy".into();
        coordinator.set_currently_playing(Some(cached));

        coordinator.play_next();

        assert_eq!(coordinator.currently_playing(), Some(track(3)));
    }

    #[test]
    fn test_shuffle_toggle_keeps_current_track() {
        // reversed: [A, B, C, D] -> [D, C, B, A]
        let coordinator = playing_at(4, 1, RepeatMode::None);
        assert_eq!(coordinator.currently_playing(), Some(track(2)));

        coordinator.toggle_shuffle();

        assert!(coordinator.shuffle());
        assert_eq!(coordinator.current_index(), Some(2));
        assert_eq!(coordinator.currently_playing(), Some(track(2)));
        assert_eq!(coordinator.active_queue()[2], track(2));

        coordinator.play_next();
        assert_eq!(coordinator.currently_playing(), Some(track(1)));

        coordinator.toggle_shuffle();
        assert!(!coordinator.shuffle());
        assert_eq!(coordinator.current_index(), Some(0));
        assert_eq!(coordinator.currently_playing(), Some(track(1)));
    }

    #[test]
    fn test_shuffle_continuity_with_random_shuffle() {
        let coordinator = Coordinator::new();
        coordinator.play_from(tracks(4), 1);

        coordinator.set_shuffle(true);

        let index = coordinator.current_index().unwrap();
        assert_eq!(coordinator.active_queue()[index], track(2));
        assert_eq!(coordinator.currently_playing(), Some(track(2)));
    }

    #[test]
    fn test_play_from_with_shuffle_on_translates_index() {
        let coordinator = Coordinator::with_shuffler(reversed());
        coordinator.set_shuffle(true);

        coordinator.play_from(tracks(4), 0);

        assert_eq!(coordinator.current_index(), Some(3));
        assert_eq!(coordinator.currently_playing(), Some(track(1)));
    }

    #[test]
    fn test_play_from_out_of_range_only_queues() {
        let coordinator = Coordinator::new();

        coordinator.play_from(tracks(2), 5);

        assert_eq!(coordinator.queue().len(), 2);
        assert_eq!(coordinator.currently_playing(), None);
    }

    #[test]
    fn test_stop_all_audio_spares_the_exception() {
        let coordinator = Coordinator::new();
        let handles: Vec<Rc<MockHandle>> = (0..3).map(|_| Rc::new(MockHandle::new())).collect();
        let registrations: Vec<Registration> = handles
            .iter()
            .map(|handle| coordinator.register(handle.clone()))
            .collect();
        for handle in &handles {
            handle.play().unwrap();
        }

        coordinator.stop_all_audio(Some(registrations[1].id()));

        let playing: Vec<bool> = handles.iter().map(|handle| handle.is_playing()).collect();
        assert_eq!(playing, vec![false, true, false]);

        coordinator.stop_all_audio(None);
        assert!(handles.iter().all(|handle| !handle.is_playing()));
    }

    #[test]
    fn test_registration_is_released_on_drop() {
        let coordinator = Coordinator::new();
        let handle = Rc::new(MockHandle::new());

        let registration = coordinator.register(handle.clone());
        assert_eq!(coordinator.registered_elements(), 1);

        drop(registration);
        assert_eq!(coordinator.registered_elements(), 0);

        handle.play().unwrap();
        coordinator.stop_all_audio(None);
        assert!(handle.is_playing());
    }

    #[test]
    fn test_status_follows_elements() {
        let coordinator = Coordinator::new();
        let handle = Rc::new(MockHandle::new());
        let _registration = coordinator.register(handle.clone());
        assert_eq!(coordinator.status(), PlaybackStatus::Idle);

        coordinator.play_from(tracks(2), 0);
        assert_eq!(coordinator.status(), PlaybackStatus::Paused);

        handle.play().unwrap();
        assert_eq!(coordinator.status(), PlaybackStatus::Playing);
        assert_eq!(coordinator.state().status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_subscribers_are_notified_until_dropped() {
        let coordinator = Coordinator::new();
        let (seen, subscription) = changes(&coordinator);

        coordinator.set_queue(tracks(2));
        coordinator.set_repeat_mode(RepeatMode::All);
        coordinator.set_shuffle(true);
        coordinator.set_shuffle(true);
        drop(subscription);
        coordinator.set_repeat_mode(RepeatMode::None);

        assert_eq!(
            *seen.borrow(),
            vec![
                StateChange::QueueChanged,
                StateChange::RepeatModeChanged(RepeatMode::All),
                StateChange::ShuffleChanged(true),
            ]
        );
    }

    #[test]
    fn test_listener_may_call_back_into_coordinator() {
        let coordinator = Coordinator::new();
        coordinator.set_queue(tracks(3));
        let weak = Rc::downgrade(&coordinator);
        let _subscription = coordinator.subscribe(move |change| {
            if let (StateChange::TrackChanged(Some(track)), Some(coordinator)) =
                (change, weak.upgrade())
            {
                if track.id == Some(1) {
                    coordinator.play_next();
                }
            }
        });

        coordinator.play_from(tracks(3), 0);

        assert_eq!(coordinator.currently_playing(), Some(track(2)));
    }
}
