//! Audio-feature feed consumed by the simulation
//!
//! Feature extraction happens outside this crate. What arrives here is an
//! ordered, replayable list of time points plus the generators that turn
//! those features into procedural randomness.

pub mod feed;
pub mod sequence;
pub mod synthetic;

pub use feed::{beat_ms, AudioFeed, AudioTimePoint, FeatureCursor, Interval, Note, Signature};
pub use sequence::{AudioSequence, ConstantSequence, FeatureSequence, SeededSequence};
pub use synthetic::generate_feed;
