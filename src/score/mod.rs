//! Symbolic score events
//!
//! A score is an ordered sequence of [`ScoreEvent`]s as produced by the
//! symbolic extractor. Notes, rests and grace notes are performable; section
//! markers, usul changes and other markers are structural and consume no time.

use crate::error::AnalysisError;
use crate::theory::NoteSymbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Duration in score units (numerator over denominator of a whole note)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    /// Numerator
    pub num: u32,
    /// Denominator
    pub den: u32,
}

impl Fraction {
    /// Create a fraction, rejecting a zero denominator
    pub fn new(num: u32, den: u32) -> Result<Self, AnalysisError> {
        if den == 0 {
            return Err(AnalysisError::InvalidInput(format!(
                "Zero denominator in duration {}/{}",
                num, den
            )));
        }
        Ok(Self { num, den })
    }

    /// Zero duration
    pub fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    /// Value as a float, `None` for a zero denominator
    pub fn as_f64(&self) -> Option<f64> {
        (self.den != 0).then(|| self.num as f64 / self.den as f64)
    }

    /// True for a zero numerator
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Kind of a score event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Pitched note
    Note,
    /// Rest
    Rest,
    /// Grace note (no notated duration)
    Grace,
    /// Start of a section or phrase
    Section,
    /// Usul (rhythmic cycle) change
    UsulChange,
    /// Any other structural marker
    Marker,
}

/// One notated musical event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    /// 1-based position in the score
    pub index: u32,

    /// Event kind
    pub kind: EventKind,

    /// Notated duration in score units
    pub duration: Fraction,

    /// Nominal duration in milliseconds at the notated tempo
    pub elapsed_ms: f64,

    /// Notated pitch, `None` for rests and markers
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitch: Option<NoteSymbol>,

    /// Lyric or annotation (section name for section markers)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

impl ScoreEvent {
    /// Create a note event
    pub fn note(index: u32, pitch: NoteSymbol, duration: Fraction, elapsed_ms: f64) -> Self {
        Self {
            index,
            kind: EventKind::Note,
            duration,
            elapsed_ms,
            pitch: Some(pitch),
            label: None,
        }
    }

    /// Create a rest event
    pub fn rest(index: u32, duration: Fraction, elapsed_ms: f64) -> Self {
        Self {
            index,
            kind: EventKind::Rest,
            duration,
            elapsed_ms,
            pitch: None,
            label: None,
        }
    }

    /// Create a section marker
    pub fn section(index: u32, label: &str) -> Self {
        Self {
            index,
            kind: EventKind::Section,
            duration: Fraction::zero(),
            elapsed_ms: 0.0,
            pitch: None,
            label: Some(label.to_string()),
        }
    }

    /// Section, usul or other marker
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Section | EventKind::UsulChange | EventKind::Marker
        )
    }

    /// Notes and rests with a positive duration take part in alignment
    pub fn is_alignment_target(&self) -> bool {
        matches!(self.kind, EventKind::Note | EventKind::Rest) && !self.duration.is_zero()
    }
}

/// Check ordering and uniqueness of the event sequence
///
/// Indices must be strictly increasing (hence unique), every note must carry
/// a pitch, durations must have non-zero denominators and nominal elapsed
/// times must be finite and non-negative.
pub fn validate_events(events: &[ScoreEvent]) -> Result<(), AnalysisError> {
    let mut previous: Option<u32> = None;
    for event in events {
        if let Some(prev) = previous {
            if event.index <= prev {
                return Err(AnalysisError::MalformedScore(format!(
                    "Event index {} does not increase after {}",
                    event.index, prev
                )));
            }
        }
        previous = Some(event.index);

        if event.duration.den == 0 {
            return Err(AnalysisError::MalformedScore(format!(
                "Event {} has a zero duration denominator",
                event.index
            )));
        }
        if !event.elapsed_ms.is_finite() || event.elapsed_ms < 0.0 {
            return Err(AnalysisError::MalformedScore(format!(
                "Event {} has invalid elapsed time {}",
                event.index, event.elapsed_ms
            )));
        }
        if event.kind == EventKind::Note && event.pitch.is_none() {
            return Err(AnalysisError::MalformedScore(format!(
                "Note event {} has no pitch",
                event.index
            )));
        }
    }
    Ok(())
}

/// Events that are aligned against the audio, in score order
pub fn alignment_targets(events: &[ScoreEvent]) -> Vec<&ScoreEvent> {
    events.iter().filter(|e| e.is_alignment_target()).collect()
}

/// Notated tempo in beats per minute
///
/// Computed from the total notated duration of the targets and their total
/// nominal elapsed time. Returns `None` without elapsed time information.
pub fn notated_bpm(events: &[ScoreEvent], beat_unit: Fraction) -> Option<f64> {
    let unit = beat_unit.as_f64().filter(|u| *u > 0.0)?;
    let (beats, ms) = events
        .iter()
        .filter(|e| e.is_alignment_target() && e.elapsed_ms > 0.0)
        .filter_map(|e| Some((e.duration.as_f64()?, e.elapsed_ms)))
        .fold((0.0, 0.0), |(b, m), (d, ms)| (b + d / unit, m + ms));
    if ms <= 0.0 || beats <= 0.0 {
        return None;
    }
    Some(beats * 60_000.0 / ms)
}
