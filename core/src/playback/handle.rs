//! The seam between the players and whatever actually makes sound.
//!
//! A [`PlayableHandle`] is one media element: a browser audio element behind an adapter in
//! production, a [`crate::test_utils::MockHandle`] in tests.

use std::rc::{Rc, Weak};

use crate::errors::PlaybackError;

pub type ListenerId = u64;
pub type MediaListener = Rc<dyn Fn(&MediaEvent)>;

/// Events a media element reports back to whoever is bound to it.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    Play,
    Pause,
    TimeUpdate(f64),
    /// The element now knows the duration of its source, in seconds.
    LoadedMetadata(f64),
    Ended,
    Error(String),
}

pub trait PlayableHandle {
    /// # Errors
    ///
    /// Returns an error if the element could not start.
    fn play(&self) -> Result<(), PlaybackError>;
    /// Pausing an element that is not playing, or whose backing element is gone, is a no-op.
    fn pause(&self);
    fn is_playing(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// Duration in seconds, `NaN` until the metadata of the source has loaded.
    fn duration(&self) -> f64;
    fn set_source(&self, url: &str);
    fn set_volume(&self, volume: f32);
    fn set_muted(&self, muted: bool);
    fn subscribe(&self, listener: MediaListener) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);
}

/// A duration that is safe to use as a progress bar maximum.
#[must_use]
pub fn known_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

/// A listener attached to a [`PlayableHandle`], detached when dropped.
#[must_use = "the listener is detached as soon as the binding is dropped"]
pub struct Binding {
    handle: Weak<dyn PlayableHandle>,
    id: ListenerId,
}

impl Binding {
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.upgrade() {
            handle.unsubscribe(self.id);
        }
    }
}

/// Attach `listener` to `handle` for as long as the returned [`Binding`] lives.
pub fn bind<F>(handle: &Rc<dyn PlayableHandle>, listener: F) -> Binding
where
    F: Fn(&MediaEvent) + 'static,
{
    let id = handle.subscribe(Rc::new(listener));
    Binding {
        handle: Rc::downgrade(handle),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockHandle;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::cell::RefCell;

    #[rstest]
    #[case(f64::NAN, 0.0)]
    #[case(f64::INFINITY, 0.0)]
    #[case(-1.0, 0.0)]
    #[case(0.0, 0.0)]
    #[case(184.5, 184.5)]
    fn test_known_duration(#[case] duration: f64, #[case] expected: f64) {
        assert_eq!(known_duration(duration), expected);
    }

    #[test]
    fn test_binding_detaches_on_drop() {
        let mock = Rc::new(MockHandle::new());
        let handle: Rc<dyn PlayableHandle> = mock.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let binding = bind(&handle, {
            let seen = seen.clone();
            move |event| seen.borrow_mut().push(event.clone())
        });
        mock.emit(&MediaEvent::Ended);
        assert_eq!(mock.listener_count(), 1);

        drop(binding);
        mock.emit(&MediaEvent::Ended);

        assert_eq!(*seen.borrow(), vec![MediaEvent::Ended]);
        assert_eq!(mock.listener_count(), 0);
    }

    #[test]
    fn test_binding_outliving_handle_does_not_panic() {
        let handle: Rc<dyn PlayableHandle> = Rc::new(MockHandle::new());
        let binding = bind(&handle, |_| {});

        drop(handle);
        drop(binding);
    }
}
