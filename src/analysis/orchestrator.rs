//! Joint analysis pipeline
//!
//! ```text
//! Init -> TonicTempoEstimated -> Aligned -> PitchFiltered -> NoteModelsComputed -> Summarized
//!   \            \                   \             \
//!    +------------+-------------------+-------------+--> Failed { at }
//! ```
//!
//! Every non-fatal error stops the pipeline at the stage it happened in. The
//! results computed so far are kept and merged field by field with the
//! audio-only features. Fatal errors (malformed score, invalid input) are
//! returned to the caller.

use super::audio::score_informed_features;
use super::result::{
    AudioFeatures, JointFeatures, RunMetadata, ScoreFeatures, Stage, SummaryRecord,
};
use crate::cancel::CancelToken;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::alignment::{AlignmentLink, AlignmentResult, ScoreAudioAligner};
use crate::features::note_model::{AlignedNoteModel, NoteModelOutput};
use crate::features::pitch_filter::AlignedPitchFilter;
use crate::features::tonic_tempo::{TempoEstimate, TonicEstimate, TonicTempoEstimator};
use crate::io::PitchTrack;
use crate::score::{validate_events, ScoreEvent};
use crate::theory::{ModeLookup, TheoryTable};
use std::time::Instant;

/// How a resumable step is obtained
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Step<T> {
    /// Do not run the step
    Skip,
    /// Run the step
    #[default]
    Compute,
    /// Use a result from an earlier run
    Precomputed(T),
}

/// Per-step instructions for a joint run
#[derive(Debug, Clone, Default)]
pub struct JointInputs {
    /// Tonic and tempo
    pub tonic_tempo: Step<(TonicEstimate, TempoEstimate)>,
    /// Score-to-audio alignment
    pub alignment: Step<AlignmentResult>,
    /// Filtered pitch track and refined links
    pub pitch_filter: Step<(PitchTrack, Vec<AlignmentLink>)>,
    /// Note models
    pub note_models: Step<NoteModelOutput>,
}

/// Intermediate results of one run
#[derive(Debug, Default)]
struct Partial {
    tonic: Option<TonicEstimate>,
    tempo: Option<TempoEstimate>,
    alignment: Option<AlignmentResult>,
    filtered: Option<(PitchTrack, Vec<AlignmentLink>)>,
    models: Option<NoteModelOutput>,
}

/// Joint audio-score analyzer
///
/// Holds configuration and the mode table only, so one analyzer may serve
/// concurrent runs.
#[derive(Debug, Clone)]
pub struct JointAnalyzer<L: ModeLookup = TheoryTable> {
    config: AnalysisConfig,
    lookup: L,
}

impl JointAnalyzer<TheoryTable> {
    /// Analyzer with the built-in makam table
    pub fn with_builtin_theory(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::new(config, TheoryTable::builtin())
    }
}

impl<L: ModeLookup> JointAnalyzer<L> {
    /// Create an analyzer
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an invalid configuration.
    pub fn new(config: AnalysisConfig, lookup: L) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config, lookup })
    }

    /// Configuration of the analyzer
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every joint step
    pub fn run(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        score: ScoreFeatures,
        audio: Option<AudioFeatures>,
    ) -> Result<SummaryRecord, AnalysisError> {
        self.run_with(events, track, score, audio, JointInputs::default(), &CancelToken::new())
    }

    /// Run with precomputed or skipped steps and a cancellation token
    ///
    /// # Errors
    ///
    /// Only fatal errors: `MalformedScore` for invalid events and
    /// `InvalidInput` for an invalid pitch track. Everything else degrades
    /// the record.
    pub fn run_with(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        score: ScoreFeatures,
        audio: Option<AudioFeatures>,
        inputs: JointInputs,
        cancel: &CancelToken,
    ) -> Result<SummaryRecord, AnalysisError> {
        let start_time = Instant::now();
        log::debug!(
            "Joint analysis of {} score events and {} pitch samples ({})",
            events.len(),
            track.len(),
            score.makam
        );

        validate_events(events)?;
        track.validate()?;

        let mut metadata = RunMetadata::default();
        let mut partial = Partial::default();
        self.joint_steps(
            events,
            track,
            &score.makam,
            inputs,
            cancel,
            &mut partial,
            &mut metadata,
        )?;

        let summary = self.summarize(track, score, audio, partial, metadata, start_time);
        log::info!(
            "Joint analysis finished at {:?} in {:.2}ms",
            summary.metadata.stage,
            summary.metadata.processing_time_ms
        );
        Ok(summary)
    }

    /// Advance through the pipeline, stopping at the first failure
    #[allow(clippy::too_many_arguments)]
    fn joint_steps(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        makam: &str,
        inputs: JointInputs,
        cancel: &CancelToken,
        partial: &mut Partial,
        metadata: &mut RunMetadata,
    ) -> Result<(), AnalysisError> {
        let mode = match self.lookup.mode(makam) {
            Some(mode) => mode,
            None => {
                let err =
                    AnalysisError::AlignmentPrerequisite(format!("Unknown makam '{}'", makam));
                return fail(err, Stage::Init, metadata);
            }
        };

        // tonic and tempo
        let estimated = match inputs.tonic_tempo {
            Step::Skip => return skip("tonic and tempo estimation", metadata),
            Step::Precomputed(v) => Ok(v),
            Step::Compute => TonicTempoEstimator::new(self.config.tonic_tempo.clone())
                .estimate_with_cancel(events, track, &mode, cancel),
        };
        let (tonic, tempo) = match estimated {
            Ok(v) => v,
            Err(e) => return fail(e, Stage::Init, metadata),
        };
        partial.tonic = Some(tonic.clone());
        partial.tempo = Some(tempo.clone());
        metadata.stage = Stage::TonicTempoEstimated;

        // alignment
        let aligned = match inputs.alignment {
            Step::Skip => return skip("alignment", metadata),
            Step::Precomputed(v) => Ok(v),
            Step::Compute => ScoreAudioAligner::new(
                self.config.alignment.clone(),
                self.config.tonic_tempo.beat_unit,
            )
            .align_with_cancel(events, track, &tonic, &tempo, cancel),
        };
        let alignment = match aligned {
            Ok(v) => v,
            Err(e) => return fail(e, Stage::TonicTempoEstimated, metadata),
        };
        let links = alignment.links.clone();
        partial.alignment = Some(alignment);
        metadata.stage = Stage::Aligned;

        // pitch filter
        let filtered = match inputs.pitch_filter {
            Step::Skip => {
                metadata.warnings.push("Skipped pitch filtering".to_string());
                None
            }
            Step::Precomputed(v) => Some(Ok(v)),
            Step::Compute => Some(cancel.check("Pitch filtering").and_then(|_| {
                AlignedPitchFilter::new(self.config.pitch_filter.clone()).filter(track, &links)
            })),
        };
        let (model_track, model_links) = match filtered {
            None => (track.clone(), links),
            Some(Ok((filtered_track, refined))) => {
                partial.filtered = Some((filtered_track.clone(), refined.clone()));
                metadata.stage = Stage::PitchFiltered;
                (filtered_track, refined)
            }
            Some(Err(e)) => return fail(e, Stage::Aligned, metadata),
        };

        // note models
        let modelled = match inputs.note_models {
            Step::Skip => return skip("note modelling", metadata),
            Step::Precomputed(v) => Ok(v),
            Step::Compute => cancel.check("Note modelling").and_then(|_| {
                AlignedNoteModel::new(self.config.note_model.clone()).compute(
                    &model_track,
                    &model_links,
                    &mode,
                    tonic.symbol,
                )
            }),
        };
        match modelled {
            Ok(v) => {
                partial.models = Some(v);
                metadata.stage = Stage::NoteModelsComputed;
                Ok(())
            }
            Err(e) => {
                let at = metadata.stage.clone();
                fail(e, at, metadata)
            }
        }
    }

    /// Merge the partial results with the given feature sets
    fn summarize(
        &self,
        track: &PitchTrack,
        score: ScoreFeatures,
        audio: Option<AudioFeatures>,
        partial: Partial,
        mut metadata: RunMetadata,
        start_time: Instant,
    ) -> SummaryRecord {
        let informed = match &partial.tonic {
            Some(estimated) => {
                let tonic = partial.models.as_ref().map(|m| &m.tonic).unwrap_or(estimated);
                let pitch = partial.filtered.as_ref().map(|(t, _)| t).unwrap_or(track);
                let mode = self.lookup.mode(&score.makam);
                let mut informed = score_informed_features(
                    &score.makam,
                    pitch,
                    tonic,
                    mode.as_ref(),
                    &self.config,
                );
                // aligned note models replace the distribution ones
                if let Some(models) = &partial.models {
                    informed.note_models = Some(models.models.clone());
                }
                informed.tempo = partial.tempo.clone();
                informed
            }
            None => AudioFeatures {
                makam: Some(score.makam.clone()),
                ..Default::default()
            },
        };

        let joint = partial.alignment.map(|alignment| JointFeatures {
            sections: alignment.sections,
            notes: match partial.filtered {
                Some((_, refined)) => refined,
                None => alignment.links,
            },
            note_models: partial.models.map(|m| m.models),
        });

        if metadata.failure.is_none() {
            metadata.stage = Stage::Summarized;
        }
        metadata.processing_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        SummaryRecord {
            score,
            audio: informed.or(audio.unwrap_or_default()),
            joint,
            metadata,
        }
    }
}

/// Record a non-fatal failure, or return a fatal one
fn fail(err: AnalysisError, at: Stage, metadata: &mut RunMetadata) -> Result<(), AnalysisError> {
    if err.is_fatal() {
        return Err(err);
    }
    log::warn!("Joint analysis stopped after {:?}: {}", at, err);
    metadata.failure = Some(err.to_string());
    metadata.stage = Stage::Failed { at: Box::new(at) };
    Ok(())
}

fn skip(what: &str, metadata: &mut RunMetadata) -> Result<(), AnalysisError> {
    log::debug!("Skipping {}", what);
    metadata.warnings.push(format!("Skipped {}", what));
    Ok(())
}
