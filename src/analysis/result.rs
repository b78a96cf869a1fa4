//! Analysis result types
//!
//! A [`SummaryRecord`] has three parts: score features, audio features and
//! joint features. Every part is plain data; the record converts to and from
//! a `serde_json::Value` tree without loss.

use crate::error::AnalysisError;
use crate::features::alignment::{AlignmentLink, SectionLink};
use crate::features::distribution::PitchDistribution;
use crate::features::melodic_progression::MelodicProgression;
use crate::features::note_model::NoteModel;
use crate::features::tonic_tempo::{TempoEstimate, TonicEstimate};
use crate::features::transposition::Transposition;
use crate::io::PitchTrack;
use crate::score::{alignment_targets, notated_bpm, EventKind, Fraction, ScoreEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Section of the score as notated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSection {
    /// Section label, `None` before the first section marker
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
    /// Index of the first event of the section
    pub start_index: u32,
    /// Index of the last event of the section
    pub end_index: u32,
}

/// Score-only features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFeatures {
    /// Makam slug
    pub makam: String,
    /// First notated usul
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usul: Option<String>,
    /// Number of notes and rests with a duration
    pub num_notes: usize,
    /// Notated tempo in beats per minute
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notated_bpm: Option<f64>,
    /// Sections in score order
    #[serde(default)]
    pub sections: Vec<ScoreSection>,
}

impl ScoreFeatures {
    /// Extract score features from events
    pub fn from_events(makam: &str, events: &[ScoreEvent], beat_unit: Fraction) -> Self {
        let usul = events
            .iter()
            .find(|e| e.kind == EventKind::UsulChange)
            .and_then(|e| e.label.clone());

        let mut sections: Vec<ScoreSection> = Vec::new();
        for event in events {
            let opens = event.kind == EventKind::Section;
            match sections.last_mut() {
                Some(current) if !opens => current.end_index = event.index,
                _ => sections.push(ScoreSection {
                    label: if opens { event.label.clone() } else { None },
                    start_index: event.index,
                    end_index: event.index,
                }),
            }
        }

        Self {
            makam: makam.to_string(),
            usul,
            num_notes: alignment_targets(events).len(),
            notated_bpm: notated_bpm(events, beat_unit),
            sections,
        }
    }
}

/// Audio features, audio-only or score-informed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Makam slug
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub makam: Option<String>,
    /// Pitch track, filtered when the alignment succeeded
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitch: Option<PitchTrack>,
    /// Pitch distribution in Hz
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitch_distribution: Option<PitchDistribution>,
    /// Pitch-class distribution in cents from the tonic
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitch_class_distribution: Option<PitchDistribution>,
    /// Tonic
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tonic: Option<TonicEstimate>,
    /// Transposition of the tonic
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transposition: Option<Transposition>,
    /// Melodic progression
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub melodic_progression: Option<MelodicProgression>,
    /// Note models keyed by degree symbol
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note_models: Option<BTreeMap<String, NoteModel>>,
    /// Tempo
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tempo: Option<TempoEstimate>,
}

impl AudioFeatures {
    /// Prefer the fields of `self`, filling the gaps from `fallback`
    pub fn or(self, fallback: AudioFeatures) -> AudioFeatures {
        AudioFeatures {
            makam: self.makam.or(fallback.makam),
            pitch: self.pitch.or(fallback.pitch),
            pitch_distribution: self.pitch_distribution.or(fallback.pitch_distribution),
            pitch_class_distribution: self
                .pitch_class_distribution
                .or(fallback.pitch_class_distribution),
            tonic: self.tonic.or(fallback.tonic),
            transposition: self.transposition.or(fallback.transposition),
            melodic_progression: self.melodic_progression.or(fallback.melodic_progression),
            note_models: self.note_models.or(fallback.note_models),
            tempo: self.tempo.or(fallback.tempo),
        }
    }
}

/// Features that need both the score and the recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointFeatures {
    /// Aligned sections
    pub sections: Vec<SectionLink>,
    /// Aligned notes, refined by the pitch filter when it ran
    pub notes: Vec<AlignmentLink>,
    /// Note models computed from the alignment
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note_models: Option<BTreeMap<String, NoteModel>>,
}

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Nothing computed
    Init,
    /// Tonic and tempo are known
    TonicTempoEstimated,
    /// Score and audio are aligned
    Aligned,
    /// Pitch track is filtered
    PitchFiltered,
    /// Note models are computed
    NoteModelsComputed,
    /// Results are merged
    Summarized,
    /// A step after `at` failed; results up to `at` are kept
    Failed {
        /// Last stage reached
        at: Box<Stage>,
    },
}

/// Bookkeeping of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Final pipeline state
    pub stage: Stage,
    /// Reason of the failure, if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure: Option<String>,
    /// Non-fatal problems and skipped steps
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: f64,
    /// Crate version
    pub algorithm_version: String,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            stage: Stage::Init,
            failure: None,
            warnings: Vec::new(),
            processing_time_ms: 0.0,
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Complete analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Score features as given
    pub score: ScoreFeatures,
    /// Audio features, score-informed where available
    pub audio: AudioFeatures,
    /// Joint features, `None` when the alignment did not succeed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub joint: Option<JointFeatures>,
    /// Run bookkeeping
    pub metadata: RunMetadata,
}

impl SummaryRecord {
    /// Convert to a plain JSON tree
    pub fn to_value(&self) -> Result<serde_json::Value, AnalysisError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild from a plain JSON tree
    pub fn from_value(value: serde_json::Value) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_value(value)?)
    }
}
