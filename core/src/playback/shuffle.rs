//! Shuffle policies.
//!
//! The coordinator recomputes the shuffled queue from scratch every time the queue is replaced,
//! using whichever [`Shuffler`] it was built with.

use rand::{SeedableRng, prelude::SliceRandom, rngs::StdRng, thread_rng};

use cadence_storage::db::schemas::track::Track;

pub type Shuffler = Box<dyn Fn(&[Track]) -> Vec<Track>>;

/// A uniformly random permutation of `tracks`.
#[must_use]
pub fn shuffle(tracks: &[Track]) -> Vec<Track> {
    let mut shuffled = tracks.to_vec();
    shuffled.shuffle(&mut thread_rng());
    shuffled
}

/// A shuffler that always produces the same permutation for the same input.
#[must_use]
pub fn seeded(seed: u64) -> Shuffler {
    Box::new(move |tracks| {
        let mut shuffled = tracks.to_vec();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        shuffled
    })
}
