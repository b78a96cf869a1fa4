//! Configuration parameters for joint analysis
//!
//! All parameters are static for the lifetime of an analyzer. Every group has
//! a `Default` and the whole tree deserializes with missing fields filled in.

use crate::error::AnalysisError;
use crate::score::Fraction;
use serde::{Deserialize, Serialize};

/// Analysis configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Tonic and tempo estimation
    pub tonic_tempo: TonicTempoConfig,

    /// Score-to-audio alignment
    pub alignment: AlignmentConfig,

    /// Aligned pitch filtering
    pub pitch_filter: PitchFilterConfig,

    /// Aligned note models
    pub note_model: NoteModelConfig,

    /// Audio pitch distributions
    pub distribution: DistributionConfig,

    /// Melodic progression
    pub melodic_progression: MelodicProgressionConfig,

    /// Transposition (ahenk) identification
    pub transposition: TranspositionConfig,
}

impl AnalysisConfig {
    /// Check every group for out-of-range values
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.tonic_tempo.validate()?;
        self.alignment.validate()?;
        self.pitch_filter.validate()?;
        self.note_model.validate()?;
        self.distribution.validate()?;
        self.melodic_progression.validate()?;
        self.transposition.validate()?;
        Ok(())
    }
}

fn require(cond: bool, what: &str) -> Result<(), AnalysisError> {
    if cond {
        Ok(())
    } else {
        Err(AnalysisError::InvalidInput(format!("Invalid configuration: {}", what)))
    }
}

/// Tonic and tempo estimation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TonicTempoConfig {
    /// Score duration of one beat (default: 1/4)
    pub beat_unit: Fraction,

    /// Gaussian kernel width of the audio pitch distribution in cents (default: 7.5)
    pub kernel_width_cents: f64,

    /// Bin width of the audio pitch distribution in cents (default: 7.5)
    pub step_size_cents: f64,

    /// Number of distribution peaks used as tonic candidates (default: 5)
    pub max_distribution_peaks: usize,

    /// Minimum peak height relative to the highest peak (default: 0.15)
    pub min_peak_ratio: f64,

    /// Tonic hypotheses kept for the timing search (default: 8)
    pub max_hypotheses: usize,

    /// Fraction of the piece used for the begin and end segments (default: 0.2)
    pub segment_fraction: f64,

    /// Relative tempo deviation of the opening and closing passages from the
    /// average tempo (default: 0.25)
    pub tempo_search_tolerance: f64,

    /// Number of tempo scales tried per segment (default: 21)
    pub tempo_search_steps: usize,

    /// Pitch distance in cents below which a note matches (default: 50)
    pub pitch_tolerance_cents: f64,

    /// Weight of the log tempo deviation in the residual (default: 0.5)
    pub timing_weight: f64,

    /// Audio span in seconds searched for the final note (default: 2.0)
    pub anchor_window_seconds: f64,

    /// Highest performed tempo relative to the tempo implied by the whole
    /// voiced span; bounds the search for the opening onset (default: 3.0)
    pub max_tempo_ratio: f64,

    /// Resolution of the opening onset search in seconds (default: 0.05)
    pub onset_step_seconds: f64,

    /// Opening onsets tried in the coarse pass (default: 200)
    pub max_onset_candidates: usize,
}

impl Default for TonicTempoConfig {
    fn default() -> Self {
        Self {
            beat_unit: Fraction { num: 1, den: 4 },
            kernel_width_cents: 7.5,
            step_size_cents: 7.5,
            max_distribution_peaks: 5,
            min_peak_ratio: 0.15,
            max_hypotheses: 8,
            segment_fraction: 0.2,
            tempo_search_tolerance: 0.25,
            tempo_search_steps: 21,
            pitch_tolerance_cents: 50.0,
            timing_weight: 0.5,
            anchor_window_seconds: 2.0,
            max_tempo_ratio: 3.0,
            onset_step_seconds: 0.05,
            max_onset_candidates: 200,
        }
    }
}

impl TonicTempoConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        require(self.beat_unit.num > 0 && self.beat_unit.den > 0, "beat_unit")?;
        require(self.kernel_width_cents >= 0.0, "tonic_tempo.kernel_width_cents")?;
        require(self.step_size_cents > 0.0, "tonic_tempo.step_size_cents")?;
        require(self.max_distribution_peaks > 0, "max_distribution_peaks")?;
        require((0.0..1.0).contains(&self.min_peak_ratio), "tonic_tempo.min_peak_ratio")?;
        require(self.max_hypotheses > 0, "max_hypotheses")?;
        require(
            self.segment_fraction > 0.0 && self.segment_fraction <= 0.5,
            "segment_fraction",
        )?;
        require(
            self.tempo_search_tolerance >= 0.0 && self.tempo_search_tolerance < 1.0,
            "tempo_search_tolerance",
        )?;
        require(self.tempo_search_steps > 0, "tempo_search_steps")?;
        require(self.pitch_tolerance_cents > 0.0, "tonic_tempo.pitch_tolerance_cents")?;
        require(self.timing_weight >= 0.0, "timing_weight")?;
        require(self.anchor_window_seconds > 0.0, "anchor_window_seconds")?;
        require(self.max_tempo_ratio >= 1.0, "max_tempo_ratio")?;
        require(self.onset_step_seconds > 0.0, "onset_step_seconds")?;
        require(self.max_onset_candidates > 0, "max_onset_candidates")
    }
}

/// Score-to-audio alignment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Duration of one alignment frame in seconds (default: 0.02)
    pub frame_seconds: f64,

    /// Pitch distance in cents at which a frame reaches full mismatch cost (default: 40)
    pub pitch_tolerance_cents: f64,

    /// Extra cost of a frame in another octave than notated (default: 0.05)
    pub octave_penalty: f64,

    /// Cost of an unvoiced frame inside a note (default: 0.6)
    pub unvoiced_cost: f64,

    /// Cost of a voiced frame inside a rest (default: 0.5)
    pub rest_voiced_cost: f64,

    /// Cost of a voiced frame outside every aligned event (default: 0.6)
    pub unaligned_voiced_cost: f64,

    /// Weight of the pitch term (default: 1.0)
    pub pitch_weight: f64,

    /// Weight of the duration term (default: 0.1)
    pub duration_weight: f64,

    /// Relative duration deviation with unit duration cost (default: 0.5)
    pub rubato_tolerance: f64,

    /// Longest allowed stretch of an event relative to its expected duration (default: 4.0)
    pub max_stretch: f64,

    /// Cost of leaving an event unaligned (default: 1.0)
    pub skip_penalty: f64,

    /// Search band around the expected event boundaries in seconds (default: 30.0)
    pub band_seconds: f64,

    /// Highest accepted path cost per second of audio (default: 0.5)
    pub max_normalized_cost: f64,

    /// Lowest accepted fraction of aligned events (default: 0.5)
    pub min_aligned_fraction: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            frame_seconds: 0.02,
            pitch_tolerance_cents: 40.0,
            octave_penalty: 0.05,
            unvoiced_cost: 0.6,
            rest_voiced_cost: 0.5,
            unaligned_voiced_cost: 0.6,
            pitch_weight: 1.0,
            duration_weight: 0.1,
            rubato_tolerance: 0.5,
            max_stretch: 4.0,
            skip_penalty: 1.0,
            band_seconds: 30.0,
            max_normalized_cost: 0.5,
            min_aligned_fraction: 0.5,
        }
    }
}

impl AlignmentConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        require(self.frame_seconds > 0.0, "alignment.frame_seconds")?;
        require(self.pitch_tolerance_cents > 0.0, "alignment.pitch_tolerance_cents")?;
        require(self.octave_penalty >= 0.0, "octave_penalty")?;
        require(self.unvoiced_cost >= 0.0, "unvoiced_cost")?;
        require(self.rest_voiced_cost >= 0.0, "rest_voiced_cost")?;
        require(self.unaligned_voiced_cost >= 0.0, "unaligned_voiced_cost")?;
        require(self.pitch_weight >= 0.0, "pitch_weight")?;
        require(self.duration_weight >= 0.0, "duration_weight")?;
        require(self.rubato_tolerance > 0.0, "rubato_tolerance")?;
        require(self.max_stretch >= 1.0, "max_stretch")?;
        require(self.skip_penalty >= 0.0, "skip_penalty")?;
        require(self.band_seconds > 0.0, "band_seconds")?;
        require(self.max_normalized_cost >= 0.0, "max_normalized_cost")?;
        require(
            (0.0..=1.0).contains(&self.min_aligned_fraction),
            "min_aligned_fraction",
        )
    }
}

/// Aligned pitch filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchFilterConfig {
    /// Largest distance from the expected pitch class kept as voiced (default: 60)
    pub tolerance_cents: f64,

    /// Largest octave displacement that is corrected (default: 2)
    pub max_octave_shift: i32,

    /// Boundary refinement search radius in seconds (default: 0.1)
    pub refine_window_seconds: f64,

    /// Distance charged to unvoiced samples during refinement (default: 600)
    pub unvoiced_distance_cents: f64,
}

impl Default for PitchFilterConfig {
    fn default() -> Self {
        Self {
            tolerance_cents: 60.0,
            max_octave_shift: 2,
            refine_window_seconds: 0.1,
            unvoiced_distance_cents: 600.0,
        }
    }
}

impl PitchFilterConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        require(self.tolerance_cents > 0.0, "pitch_filter.tolerance_cents")?;
        require(self.max_octave_shift >= 0, "max_octave_shift")?;
        require(self.refine_window_seconds >= 0.0, "refine_window_seconds")?;
        require(self.unvoiced_distance_cents >= 0.0, "unvoiced_distance_cents")
    }
}

/// Aligned note model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteModelConfig {
    /// Gaussian kernel width in cents (default: 7.5)
    pub kernel_width_cents: f64,

    /// Bin width in cents (default: 7.5)
    pub step_size_cents: f64,

    /// Search radius around the theoretical pitch in cents (default: 50)
    pub pitch_threshold_cents: f64,

    /// Minimum peak height relative to the highest peak (default: 0.1)
    pub min_peak_ratio: f64,

    /// Minimum number of voiced aligned samples (default: 50)
    pub min_voiced_samples: usize,
}

impl Default for NoteModelConfig {
    fn default() -> Self {
        Self {
            kernel_width_cents: 7.5,
            step_size_cents: 7.5,
            pitch_threshold_cents: 50.0,
            min_peak_ratio: 0.1,
            min_voiced_samples: 50,
        }
    }
}

impl NoteModelConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        require(self.kernel_width_cents >= 0.0, "note_model.kernel_width_cents")?;
        require(self.step_size_cents > 0.0, "note_model.step_size_cents")?;
        require(self.pitch_threshold_cents > 0.0, "pitch_threshold_cents")?;
        require((0.0..1.0).contains(&self.min_peak_ratio), "note_model.min_peak_ratio")
    }
}

/// Audio pitch distribution parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Gaussian kernel width in cents (default: 7.5)
    pub kernel_width_cents: f64,

    /// Bin width in cents (default: 7.5)
    pub step_size_cents: f64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            kernel_width_cents: 7.5,
            step_size_cents: 7.5,
        }
    }
}

impl DistributionConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        require(self.kernel_width_cents >= 0.0, "distribution.kernel_width_cents")?;
        require(self.step_size_cents > 0.0, "distribution.step_size_cents")
    }
}

/// Melodic progression parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelodicProgressionConfig {
    /// Frame duration in seconds; `None` derives it from the recording length
    pub frame_seconds: Option<f64>,

    /// Hop as a fraction of the frame duration (default: 0.5)
    pub hop_ratio: f64,

    /// Number of frames the derived frame duration aims for (default: 40)
    pub min_num_frames: usize,

    /// Upper clamp of the derived frame duration (default: 30)
    pub max_frame_seconds: f64,

    /// Lower clamp of the derived frame duration (default: 5)
    pub min_frame_seconds: f64,
}

impl Default for MelodicProgressionConfig {
    fn default() -> Self {
        Self {
            frame_seconds: None,
            hop_ratio: 0.5,
            min_num_frames: 40,
            max_frame_seconds: 30.0,
            min_frame_seconds: 5.0,
        }
    }
}

impl MelodicProgressionConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        if let Some(frame) = self.frame_seconds {
            require(frame > 0.0, "melodic_progression.frame_seconds")?;
        }
        require(self.hop_ratio > 0.0 && self.hop_ratio <= 1.0, "hop_ratio")?;
        require(self.min_num_frames > 0, "min_num_frames")?;
        require(
            self.min_frame_seconds > 0.0 && self.min_frame_seconds <= self.max_frame_seconds,
            "min_frame_seconds/max_frame_seconds",
        )
    }
}

/// Named transposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AhenkName {
    /// Transposition in cents, folded into one octave and rounded to 100
    pub cents: i32,
    /// Ahenk name
    pub name: String,
}

/// Transposition identification parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspositionConfig {
    /// Reference symbol of the concert tuning (default: "A4")
    pub reference_symbol: String,

    /// Frequency of the reference symbol in bolahenk (default: 440.0)
    pub reference_hz: f64,

    /// Ahenk names by cent transposition
    pub ahenk_names: Vec<AhenkName>,
}

impl Default for TranspositionConfig {
    fn default() -> Self {
        let names = [
            (0, "Bolahenk"),
            (200, "Yıldız"),
            (500, "Şah"),
            (600, "Davud"),
            (700, "Mansur"),
            (800, "Müstahsen"),
            (900, "Kız"),
            (1000, "Sipürde"),
        ];
        Self {
            reference_symbol: "A4".to_string(),
            reference_hz: 440.0,
            ahenk_names: names
                .iter()
                .map(|(cents, name)| AhenkName {
                    cents: *cents,
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

impl TranspositionConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        require(self.reference_hz > 0.0, "reference_hz")?;
        self.reference_symbol
            .parse::<crate::theory::NoteSymbol>()
            .map(|_| ())
            .map_err(|_| {
                AnalysisError::InvalidInput(format!(
                    "Invalid configuration: reference_symbol '{}'",
                    self.reference_symbol
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AnalysisConfig::default();
        config.alignment.frame_seconds = 0.0;
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidInput(_))));

        let mut config = AnalysisConfig::default();
        config.transposition.reference_symbol = "X9".to_string();
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.melodic_progression.min_frame_seconds = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let json = r#"{"alignment": {"skip_penalty": 2.0}}"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.alignment.skip_penalty, 2.0);
        assert_eq!(config.alignment.frame_seconds, 0.02);
        assert_eq!(config.note_model, NoteModelConfig::default());
    }
}
