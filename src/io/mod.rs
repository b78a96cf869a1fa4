//! Input adapters
//!
//! Pitch tracks from melody extractors and SymbTr score rows.

pub mod pitch_track;
pub mod symbtr;

pub use pitch_track::{parse_pitch_text, read_pitch_track, PitchSample, PitchTrack};
pub use symbtr::{parse_symbtr, read_symbtr};
