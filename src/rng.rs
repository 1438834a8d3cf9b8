//! Deterministic RNG with named per-step substreams (spec §5).
//!
//! A single seeded `ChaCha8Rng` would make any draw order-sensitive: adding
//! an unrelated draw earlier in a step would perturb every draw after it,
//! breaking reproducibility under partial re-execution. Instead each named
//! substream gets its own `ChaCha8Rng` seeded by hashing `(config.seed,
//! step_index, stream_name)`, so a given (step, stream) draw is stable
//! regardless of what else runs that step.

use bevy_ecs::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Names of the substreams drawn by engine systems. Keeping these as an enum
/// (rather than raw strings at call sites) prevents a typo from silently
/// creating a new, undocumented stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Agent action-processing shuffle order within a step.
    Shuffle,
    /// Tumor branch/spread decisions.
    TumorBranch,
    /// Wildlife/goblin AI decisions.
    AnimalAi,
    /// Terrain/market scatter and other misc draws.
    Misc,
}

impl Stream {
    fn tag(self) -> &'static str {
        match self {
            Stream::Shuffle => "shuffle",
            Stream::TumorBranch => "tumor_branch",
            Stream::AnimalAi => "animal_ai",
            Stream::Misc => "misc",
        }
    }
}

/// Resource providing seeded, per-(step, stream) RNGs.
#[derive(Resource, Debug)]
pub struct SimRng {
    seed: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns a freshly-seeded RNG for `stream` at `step`. Cheap enough to
    /// call per use; callers should not cache the returned RNG across steps.
    pub fn stream(&self, step: u64, stream: Stream) -> ChaCha8Rng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        step.hash(&mut hasher);
        stream.tag().hash(&mut hasher);
        let mixed = hasher.finish();
        ChaCha8Rng::seed_from_u64(mixed)
    }
}

/// Shuffles `items` in place using a substream RNG, via a standard
/// Fisher-Yates pass (avoids pulling in `rand::seq` just for `shuffle`).
pub fn shuffle_in_place<T>(items: &mut [T], rng: &mut ChaCha8Rng) {
    let len = items.len();
    for i in (1..len).rev() {
        let j = (rng.next_u32() as usize) % (i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_step_same_stream_is_deterministic() {
        let rng = SimRng::new(42);
        let mut a = rng.stream(7, Stream::Shuffle);
        let mut b = rng.stream(7, Stream::Shuffle);
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn different_streams_diverge() {
        let rng = SimRng::new(42);
        let mut a = rng.stream(7, Stream::Shuffle);
        let mut b = rng.stream(7, Stream::TumorBranch);
        assert_ne!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn unrelated_draw_does_not_perturb_other_streams() {
        let rng = SimRng::new(1);
        let mut a = rng.stream(3, Stream::AnimalAi);
        let first = a.next_u32();

        // Simulate "something else drew from Misc first" - AnimalAi at the
        // same step must still produce the same first value.
        let _ = rng.stream(3, Stream::Misc).next_u32();
        let mut a2 = rng.stream(3, Stream::AnimalAi);
        assert_eq!(first, a2.next_u32());
    }

    #[test]
    fn shuffle_is_deterministic_for_seed() {
        let rng = SimRng::new(99);
        let mut v1: Vec<u32> = (0..10).collect();
        let mut v2: Vec<u32> = (0..10).collect();
        shuffle_in_place(&mut v1, &mut rng.stream(1, Stream::Shuffle));
        shuffle_in_place(&mut v2, &mut rng.stream(1, Stream::Shuffle));
        assert_eq!(v1, v2);
    }
}
