//! Synthetic feature feed
//!
//! Stands in for the external analyser in headless runs and tests: one time
//! point per beat, a new interval every eight bars, a loudness curve with
//! periodic swells so the AI sees level excursions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::audio::feed::{beat_ms, AudioFeed, AudioTimePoint, Interval, Note, Signature};
use crate::core::error::Result;
use crate::core::types::TimeMs;

const BEATS_PER_INTERVAL: u64 = 32;

/// Generate a feed of `duration_ms` around the given tempo
pub fn generate_feed(seed: u64, duration_ms: TimeMs, bpm: f64) -> Result<AudioFeed> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let bpm = if bpm > 0.0 { bpm } else { 120.0 };

    let mut intervals: Vec<Interval> = Vec::new();
    let mut points = Vec::new();
    let mut offset: TimeMs = 0;
    let mut beat: u64 = 0;

    while offset < duration_ms.max(1) {
        if beat % BEATS_PER_INTERVAL == 0 {
            intervals.push(random_interval(&mut rng, intervals.len(), offset));
        }
        let interval = intervals.len() - 1;
        let key = intervals[interval].key_note;

        let local_bpm = bpm + rng.gen_range(-4.0..4.0);
        let swell = ((beat as f64) / 6.0).sin().max(0.0) * 0.6;
        let level = 0.4 + swell + rng.gen_range(0.0..0.2);

        let note_count = rng.gen_range(1..=3);
        let notes = (0..note_count)
            .map(|_| {
                // mostly in key, sometimes chromatic
                let step: u8 = if rng.gen_bool(0.8) {
                    [0, 2, 4, 5, 7, 9, 11][rng.gen_range(0..7)]
                } else {
                    rng.gen_range(0..12)
                };
                Note::new(key + step, rng.gen_range(2..6))
            })
            .collect();

        points.push(AudioTimePoint {
            offset_ms: offset,
            bpm: local_bpm,
            level,
            notes,
            interval,
        });

        offset += beat_ms(local_bpm);
        beat += 1;
    }

    AudioFeed::new(points, intervals)
}

fn random_interval(rng: &mut ChaCha8Rng, id: usize, start_ms: TimeMs) -> Interval {
    let signature = match rng.gen_range(0..3) {
        0 => Signature::Sharp,
        1 => Signature::Flat,
        _ => Signature::Unsigned,
    };
    Interval {
        id,
        start_ms,
        key_note: rng.gen_range(0..12),
        major: rng.gen_bool(0.5),
        signature,
        darkness: rng.gen_range(0..8),
        notes_out_of_key: rng.gen_range(0..6),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_requested_duration() {
        let feed = generate_feed(1, 60_000, 120.0).unwrap();
        assert!(feed.duration_ms() >= 60_000);
        assert!(feed.time_points().len() > 100);
        assert!(feed.intervals().len() >= 3);
    }

    #[test]
    fn test_same_seed_same_feed() {
        let a = generate_feed(9, 10_000, 100.0).unwrap();
        let b = generate_feed(9, 10_000, 100.0).unwrap();
        assert_eq!(a.time_points().len(), b.time_points().len());
        assert_eq!(a.average_level(), b.average_level());
    }

    #[test]
    fn test_levels_have_excursions() {
        let feed = generate_feed(4, 30_000, 120.0).unwrap();
        let avg = feed.average_level();
        assert!(feed.time_points().iter().any(|p| p.level > avg * 1.2));
        assert!(feed.time_points().iter().any(|p| p.level < avg));
    }
}
