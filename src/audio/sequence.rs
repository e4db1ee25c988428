//! Feature-driven sequence generators
//!
//! Procedural generation (terrain, resource slots) draws its randomness from a
//! `FeatureSequence`. In a real match the values come from the analysed track;
//! tests and headless runs plug in a seeded generator instead.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

use crate::audio::feed::AudioFeed;

/// Source of bounded pseudo-random values
pub trait FeatureSequence: Send {
    /// Value in `0..bound` (0 when `bound` is 0)
    fn next_below(&mut self, bound: u32) -> u32;

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        (self.next_below(10_000) as f64) < p * 10_000.0
    }

    /// Pick an index into a non-empty slice
    fn pick(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.next_below(len as u32) as usize)
        }
    }
}

/// Derives values from the notes and levels of the analysed track
pub struct AudioSequence {
    feed: Arc<AudioFeed>,
    point: usize,
    note: usize,
    state: u64,
}

impl AudioSequence {
    pub fn new(feed: Arc<AudioFeed>) -> Self {
        Self {
            feed,
            point: 0,
            note: 0,
            state: 0,
        }
    }

    /// Next raw feature value: walks the notes of each time point, falling back
    /// to the loudness level for points without notes.
    fn next_feature(&mut self) -> u64 {
        let points = self.feed.time_points();
        let point = &points[self.point % points.len()];
        let value = match point.notes.get(self.note) {
            Some(note) => {
                self.note += 1;
                note.midi_like().unsigned_abs() as u64
            }
            None => {
                self.note = 0;
                self.point += 1;
                (point.level * 1000.0).abs() as u64
            }
        };
        value + self.point as u64
    }
}

impl FeatureSequence for AudioSequence {
    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        // splitmix-style mixing so neighbouring notes do not produce neighbouring values
        self.state = self
            .state
            .wrapping_add(self.next_feature())
            .wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z % bound as u64) as u32
    }
}

/// Deterministic generator for tests and headless matches
pub struct SeededSequence {
    rng: ChaCha8Rng,
}

impl SeededSequence {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl FeatureSequence for SeededSequence {
    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }
}

/// Always yields the same value; useful to force worst-case generation
pub struct ConstantSequence(pub u32);

impl FeatureSequence for ConstantSequence {
    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.0.min(bound - 1)
        }
    }
}
