//! # Makam Joint
//!
//! Score-informed analysis of Turkish makam music recordings: joint tonic and
//! tempo estimation, score-to-audio alignment, aligned pitch filtering and
//! note models.
//!
//! ## Features
//!
//! - **Tonic and tempo**: hypotheses from audio pitch-class peaks and the
//!   notated scale degrees, selected by timing residual at the beginning and
//!   end of the piece
//! - **Alignment**: banded semi-Markov dynamic program with octave-tolerant
//!   pitch costs and rubato-tolerant duration costs
//! - **Pitch filtering**: octave correction and boundary refinement driven by
//!   the alignment
//! - **Note models**: stable performed pitch of every scale degree and a
//!   refined tonic
//!
//! ## Quick Start
//!
//! ```no_run
//! use makam_joint::{analyze_joint, AnalysisConfig};
//! use makam_joint::io::{read_pitch_track, read_symbtr};
//!
//! let events = read_symbtr("ussak--sarki--aksak--bak_kadehe--.txt")?;
//! let track = read_pitch_track("recording.pitch.txt")?;
//!
//! let record = analyze_joint(&events, &track, "ussak", AnalysisConfig::default())?;
//! if let Some(tonic) = &record.audio.tonic {
//!     println!("Tonic: {:.2} Hz", tonic.frequency_hz);
//! }
//! println!("{}", record.to_value()?);
//! # Ok::<(), makam_joint::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Score + Pitch track → Tonic/Tempo → Alignment → Pitch filter → Note models → Summary
//! ```
//!
//! Every joint step may fail without failing the run; the summary then falls
//! back to score-only and audio-only features.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod score;
pub mod theory;

// Re-export main types
pub use analysis::{
    AudioFeatures, JointAnalyzer, JointFeatures, JointInputs, ScoreFeatures, Stage, Step,
    SummaryRecord,
};
pub use cancel::CancelToken;
pub use config::AnalysisConfig;
pub use error::AnalysisError;

use io::PitchTrack;
use score::ScoreEvent;

/// Main analysis function
///
/// Extracts score features from `events`, audio-only features from `track`
/// and runs the complete joint pipeline with the built-in makam table.
///
/// # Arguments
///
/// * `events` - Score events in performance order
/// * `track` - Predominant melody of the recording
/// * `makam` - Makam slug of the score (e.g. `"ussak"`)
/// * `config` - Analysis configuration parameters
///
/// # Errors
///
/// Returns `AnalysisError` only for fatal problems: invalid configuration,
/// malformed score or invalid pitch track. Joint failures are reported in
/// the record metadata.
pub fn analyze_joint(
    events: &[ScoreEvent],
    track: &PitchTrack,
    makam: &str,
    config: AnalysisConfig,
) -> Result<SummaryRecord, AnalysisError> {
    let score = ScoreFeatures::from_events(makam, events, config.tonic_tempo.beat_unit);
    let audio = analysis::audio_only_features(track, &config);
    let analyzer = JointAnalyzer::with_builtin_theory(config)?;
    analyzer.run(events, track, score, Some(audio))
}
