//! Audio-feature feed - the externally analysed track as a replayable cursor
//!
//! The simulation never looks at samples. It reads discrete time points
//! (tempo, loudness, detected notes) that reference coarser intervals
//! (key, mode, accidental signature).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::{DissonanceError, Result};
use crate::core::types::TimeMs;

/// Accidental signature of an interval's key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signature {
    Sharp,
    Flat,
    Unsigned,
}

/// A detected note: pitch class (0 = C .. 11 = B) and octave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub octave: i8,
}

impl Note {
    pub fn new(pitch: u8, octave: i8) -> Self {
        Self {
            pitch: pitch % 12,
            octave,
        }
    }

    /// Semitone index counted from C0
    pub fn midi_like(&self) -> i32 {
        self.octave as i32 * 12 + self.pitch as i32
    }
}

/// Coarse window of the track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interval {
    pub id: usize,
    pub start_ms: TimeMs,
    pub key_note: u8,
    pub major: bool,
    pub signature: Signature,
    pub darkness: u32,
    pub notes_out_of_key: u32,
}

/// One analysed sample point of the track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTimePoint {
    pub offset_ms: TimeMs,
    pub bpm: f64,
    pub level: f64,
    pub notes: Vec<Note>,
    /// Index into `AudioFeed::intervals`
    pub interval: usize,
}

/// The complete analysed track
///
/// Deserialisation goes through `AudioFeed::new`, so a loaded feed is never
/// empty and every interval reference resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawAudioFeed")]
pub struct AudioFeed {
    time_points: Vec<AudioTimePoint>,
    intervals: Vec<Interval>,
    average_bpm: f64,
    average_level: f64,
}

/// Wire shape of a feed before validation; stored averages are recomputed
#[derive(Deserialize)]
pub struct RawAudioFeed {
    time_points: Vec<AudioTimePoint>,
    intervals: Vec<Interval>,
}

impl TryFrom<RawAudioFeed> for AudioFeed {
    type Error = DissonanceError;

    fn try_from(raw: RawAudioFeed) -> Result<Self> {
        Self::new(raw.time_points, raw.intervals)
    }
}

impl AudioFeed {
    /// Build a feed, checking ordering and interval references
    pub fn new(time_points: Vec<AudioTimePoint>, intervals: Vec<Interval>) -> Result<Self> {
        if time_points.is_empty() || intervals.is_empty() {
            return Err(DissonanceError::InvalidState(
                "audio feed needs at least one time point and one interval".into(),
            ));
        }
        if time_points
            .windows(2)
            .any(|w| w[1].offset_ms < w[0].offset_ms)
        {
            return Err(DissonanceError::InvalidState(
                "audio time points are not ordered by offset".into(),
            ));
        }
        if let Some(bad) = time_points.iter().find(|p| p.interval >= intervals.len()) {
            return Err(DissonanceError::InvalidState(format!(
                "time point at {}ms references missing interval {}",
                bad.offset_ms, bad.interval
            )));
        }

        let count = time_points.len() as f64;
        let average_bpm = time_points.iter().map(|p| p.bpm).sum::<f64>() / count;
        let average_level = time_points.iter().map(|p| p.level).sum::<f64>() / count;

        Ok(Self {
            time_points,
            intervals,
            average_bpm,
            average_level,
        })
    }

    pub fn time_points(&self) -> &[AudioTimePoint] {
        &self.time_points
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn interval(&self, id: usize) -> Option<&Interval> {
        self.intervals.get(id)
    }

    pub fn average_bpm(&self) -> f64 {
        self.average_bpm
    }

    pub fn average_level(&self) -> f64 {
        self.average_level
    }

    /// Length of one pass over the feed (last offset plus one beat)
    pub fn duration_ms(&self) -> TimeMs {
        let last = &self.time_points[self.time_points.len() - 1];
        last.offset_ms + beat_ms(last.bpm)
    }
}

/// Length of one beat at the given tempo
pub fn beat_ms(bpm: f64) -> TimeMs {
    if bpm <= 0.0 {
        return 500;
    }
    (60_000.0 / bpm).round() as TimeMs
}

/// Read cursor over a shared feed
///
/// Offsets returned by `next_looping` keep increasing across loops so that the
/// simulated clock never runs backwards.
#[derive(Debug, Clone)]
pub struct FeatureCursor {
    feed: Arc<AudioFeed>,
    index: usize,
    loops: u64,
}

impl FeatureCursor {
    pub fn new(feed: Arc<AudioFeed>) -> Self {
        Self {
            feed,
            index: 0,
            loops: 0,
        }
    }

    pub fn feed(&self) -> &Arc<AudioFeed> {
        &self.feed
    }

    /// Next time point, or None once the feed is exhausted
    pub fn next(&mut self) -> Option<AudioTimePoint> {
        let point = self.feed.time_points.get(self.index)?.clone();
        self.index += 1;
        Some(self.shifted(point))
    }

    /// Next time point, rewinding to the start when the feed is exhausted
    pub fn next_looping(&mut self) -> AudioTimePoint {
        if self.index >= self.feed.time_points.len() {
            self.rewind();
            self.loops += 1;
        }
        let point = self.feed.time_points[self.index].clone();
        self.index += 1;
        self.shifted(point)
    }

    pub fn peek(&self) -> Option<AudioTimePoint> {
        self.feed
            .time_points
            .get(self.index)
            .cloned()
            .map(|p| self.shifted(p))
    }

    pub fn rewind(&mut self) {
        self.index = 0;
    }

    pub fn loops(&self) -> u64 {
        self.loops
    }

    fn shifted(&self, mut point: AudioTimePoint) -> AudioTimePoint {
        point.offset_ms += self.loops * self.feed.duration_ms();
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_feed() -> Arc<AudioFeed> {
        let interval = Interval {
            id: 0,
            start_ms: 0,
            key_note: 0,
            major: true,
            signature: Signature::Unsigned,
            darkness: 0,
            notes_out_of_key: 0,
        };
        let points = (0..3)
            .map(|i| AudioTimePoint {
                offset_ms: i * 500,
                bpm: 120.0,
                level: i as f64,
                notes: vec![Note::new(i as u8, 4)],
                interval: 0,
            })
            .collect();
        Arc::new(AudioFeed::new(points, vec![interval]).unwrap())
    }

    #[test]
    fn test_averages() {
        let feed = small_feed();
        assert_eq!(feed.average_bpm(), 120.0);
        assert_eq!(feed.average_level(), 1.0);
        assert_eq!(feed.duration_ms(), 1500);
    }

    #[test]
    fn test_cursor_exhausts_then_rewinds() {
        let mut cursor = FeatureCursor::new(small_feed());
        assert_eq!(cursor.next().map(|p| p.offset_ms), Some(0));
        assert_eq!(cursor.next().map(|p| p.offset_ms), Some(500));
        assert_eq!(cursor.next().map(|p| p.offset_ms), Some(1000));
        assert!(cursor.next().is_none());
        cursor.rewind();
        assert_eq!(cursor.next().map(|p| p.offset_ms), Some(0));
    }

    #[test]
    fn test_looping_offsets_keep_increasing() {
        let mut cursor = FeatureCursor::new(small_feed());
        let offsets: Vec<TimeMs> = (0..5).map(|_| cursor.next_looping().offset_ms).collect();
        assert_eq!(offsets, vec![0, 500, 1000, 1500, 2000]);
        assert_eq!(cursor.loops(), 1);
    }

    #[test]
    fn test_rejects_dangling_interval() {
        let points = vec![AudioTimePoint {
            offset_ms: 0,
            bpm: 100.0,
            level: 1.0,
            notes: Vec::new(),
            interval: 3,
        }];
        let interval = Interval {
            id: 0,
            start_ms: 0,
            key_note: 0,
            major: false,
            signature: Signature::Flat,
            darkness: 1,
            notes_out_of_key: 0,
        };
        assert!(AudioFeed::new(points, vec![interval]).is_err());
    }

    #[test]
    fn test_loaded_feed_is_validated() {
        let empty = r#"{"time_points":[],"intervals":[],"average_bpm":0.0,"average_level":0.0}"#;
        assert!(serde_json::from_str::<AudioFeed>(empty).is_err());

        let dangling = r#"{
            "time_points":[{"offset_ms":0,"bpm":120.0,"level":1.0,"notes":[],"interval":2}],
            "intervals":[{"id":0,"start_ms":0,"key_note":0,"major":true,"signature":"Sharp","darkness":0,"notes_out_of_key":0}]
        }"#;
        assert!(serde_json::from_str::<AudioFeed>(dangling).is_err());
        let fixed = dangling.replace(r#""interval":2"#, r#""interval":0"#);
        assert!(serde_json::from_str::<AudioFeed>(&fixed).is_ok());
    }

    #[test]
    fn test_serialized_feed_loads_back() {
        let feed = small_feed();
        let json = serde_json::to_string(feed.as_ref()).unwrap();
        let loaded: AudioFeed = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.duration_ms(), feed.duration_ms());
        assert_eq!(loaded.average_level(), feed.average_level());
        let mut cursor = FeatureCursor::new(Arc::new(loaded));
        assert_eq!(cursor.next_looping().offset_ms, 0);
    }

    #[test]
    fn test_beat_ms() {
        assert_eq!(beat_ms(120.0), 500);
        assert_eq!(beat_ms(0.0), 500);
        assert_eq!(beat_ms(60.0), 1000);
    }
}
