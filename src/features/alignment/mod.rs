//! Score-to-audio alignment
//!
//! Maps every performable score event to an audio time interval with a
//! semi-Markov dynamic program over (score event, frame boundary) states.
//! Alignments are monotone: links ordered by score index have
//! non-decreasing, non-overlapping time intervals.
//!
//! # Algorithm
//!
//! 1. Decimate the pitch track into frames (median voiced pitch per frame)
//! 2. For each target event, cost every candidate interval by pitch
//!    mismatch (modulo octave) and duration deviation from the tempo
//! 3. Find the cheapest monotone segmentation, allowing events to be skipped
//! 4. Backtrace and group the aligned events into sections
//!
//! # Example
//!
//! ```no_run
//! use makam_joint::features::alignment::ScoreAudioAligner;
//! use makam_joint::config::AnalysisConfig;
//! # use makam_joint::features::tonic_tempo::{TonicEstimate, TempoEstimate};
//! # fn run(events: &[makam_joint::score::ScoreEvent], track: &makam_joint::io::PitchTrack,
//! #        tonic: &TonicEstimate, tempo: &TempoEstimate) -> Result<(), makam_joint::AnalysisError> {
//! let config = AnalysisConfig::default();
//! let aligner = ScoreAudioAligner::new(config.alignment, config.tonic_tempo.beat_unit);
//! let result = aligner.align(events, track, tonic, tempo)?;
//! println!("{} notes, {} sections", result.links.len(), result.sections.len());
//! # Ok(())
//! # }
//! ```

pub mod aligner;
pub mod cost;
pub mod sections;

pub use aligner::ScoreAudioAligner;

use crate::theory::NoteSymbol;
use serde::{Deserialize, Serialize};

/// One aligned score event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentLink {
    /// Index of the score event
    pub score_index: u32,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// Notated pitch, `None` for rests
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub symbol: Option<NoteSymbol>,
    /// Notated pitch transposed by the tonic
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expected_pitch_hz: Option<f64>,
    /// Median voiced pitch inside the interval
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub performed_pitch_hz: Option<f64>,
    /// Path cost of this link
    pub cost: f64,
}

impl AlignmentLink {
    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Aligned section or phrase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionLink {
    /// Section label, `None` before the first section marker
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
    /// Index of the section marker
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub marker_index: Option<u32>,
    /// Score indices of the aligned events in the section
    pub note_indices: Vec<u32>,
    /// Start of the first aligned event
    pub start_time: f64,
    /// End of the last aligned event
    pub end_time: f64,
}

/// Alignment output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Aligned events in score order
    pub links: Vec<AlignmentLink>,
    /// Aligned sections in score order
    pub sections: Vec<SectionLink>,
    /// Total path cost
    pub total_cost: f64,
    /// Path cost per second of audio
    pub normalized_cost: f64,
    /// Fraction of target events that were aligned
    pub aligned_fraction: f64,
}

/// Check that links are ordered and non-overlapping
pub fn is_monotone(links: &[AlignmentLink]) -> bool {
    const TOLERANCE: f64 = 1e-9;
    links.iter().all(|l| l.start_time <= l.end_time + TOLERANCE)
        && links.windows(2).all(|w| {
            w[0].score_index < w[1].score_index && w[0].end_time <= w[1].start_time + TOLERANCE
        })
}
