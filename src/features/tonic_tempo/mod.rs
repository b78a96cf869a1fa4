//! Score-informed tonic and tempo estimation
//!
//! Jointly estimates the performed tonic frequency and the average tempo so
//! that both agree with the score. See [`estimator`] for the search.

pub mod estimator;

pub use estimator::TonicTempoEstimator;

use crate::theory::NoteSymbol;
use serde::{Deserialize, Serialize};

/// Estimated tonic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TonicEstimate {
    /// Tonic frequency in Hz
    pub frequency_hz: f64,
    /// Karar symbol of the makam
    pub symbol: NoteSymbol,
    /// Recording the estimate was computed from
    pub source: String,
    /// Estimation procedure
    pub procedure: String,
}

/// Estimated tempo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Average performed tempo in beats per minute
    pub average_bpm: f64,
    /// Performed over notated tempo, always positive
    pub relative_to_notated: f64,
    /// Notated tempo, when the score carries timing information
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notated_bpm: Option<f64>,
    /// Time in the recording where the first notated pitched event starts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub onset_seconds: Option<f64>,
    /// Recording the estimate was computed from
    pub source: String,
}
