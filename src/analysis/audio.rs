//! Audio feature sets
//!
//! Audio-only features need nothing but the pitch track. Score-informed
//! features are recomputed from the filtered track and the refined tonic
//! after a joint run. With the mode known, they carry note models taken from
//! the peaks of the tonic-referenced distribution; aligned note models
//! replace these when the alignment succeeds.

use crate::analysis::result::AudioFeatures;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::distribution::PitchDistribution;
use crate::features::melodic_progression;
use crate::features::note_model;
use crate::features::tonic_tempo::TonicEstimate;
use crate::features::transposition;
use crate::io::PitchTrack;
use crate::theory::ModeTheory;

/// Reference of the audio-only pitch distribution
const REF_FREQ: f64 = 440.0;

/// Features computable from the pitch track alone
///
/// Steps that fail are logged and left out.
pub fn audio_only_features(track: &PitchTrack, config: &AnalysisConfig) -> AudioFeatures {
    let pitch_distribution = hz_distribution(track, REF_FREQ, config)
        .map_err(|e| log::warn!("Audio-only pitch distribution unavailable: {}", e))
        .ok();
    let melodic_progression = melodic_progression::analyze(
        track,
        &config.melodic_progression,
        &config.distribution,
    )
    .map_err(|e| log::warn!("Melodic progression unavailable: {}", e))
    .ok();

    AudioFeatures {
        pitch: Some(track.clone()),
        pitch_distribution,
        melodic_progression,
        ..Default::default()
    }
}

/// Features recomputed with a known tonic
///
/// Distributions are referenced to the tonic; the transposition is
/// identified from it.
pub fn score_informed_features(
    makam: &str,
    track: &PitchTrack,
    tonic: &TonicEstimate,
    mode: Option<&ModeTheory>,
    config: &AnalysisConfig,
) -> AudioFeatures {
    let cents = PitchDistribution::from_hz_samples(
        &track.voiced_frequencies(),
        tonic.frequency_hz,
        config.distribution.kernel_width_cents,
        config.distribution.step_size_cents,
    );
    let pitch_class_distribution = cents
        .as_ref()
        .map_err(|e| e.clone())
        .and_then(|pd| pd.to_pcd())
        .map_err(|e| log::warn!("Pitch-class distribution unavailable: {}", e))
        .ok();
    let note_models = match (cents.as_ref(), mode) {
        (Ok(pd), Some(mode)) => {
            note_model::distribution_note_models(pd, tonic.frequency_hz, mode, &config.note_model)
                .map_err(|e| log::warn!("Distribution note models unavailable: {}", e))
                .ok()
        }
        _ => None,
    };
    let pitch_distribution = cents
        .and_then(|mut pd| {
            pd.cent_to_hz()?;
            Ok(pd)
        })
        .map_err(|e| log::warn!("Pitch distribution unavailable: {}", e))
        .ok();

    let transposition =
        transposition::identify(tonic.frequency_hz, &tonic.symbol, &config.transposition)
            .map_err(|e| log::warn!("Transposition unavailable: {}", e))
            .ok();
    let melodic_progression = melodic_progression::analyze(
        track,
        &config.melodic_progression,
        &config.distribution,
    )
    .map_err(|e| log::warn!("Melodic progression unavailable: {}", e))
    .ok();

    AudioFeatures {
        makam: Some(makam.to_string()),
        pitch: Some(track.clone()),
        pitch_distribution,
        pitch_class_distribution,
        tonic: Some(tonic.clone()),
        transposition,
        melodic_progression,
        note_models,
        tempo: None,
    }
}

fn hz_distribution(
    track: &PitchTrack,
    ref_freq: f64,
    config: &AnalysisConfig,
) -> Result<PitchDistribution, AnalysisError> {
    let mut pd = PitchDistribution::from_hz_samples(
        &track.voiced_frequencies(),
        ref_freq,
        config.distribution.kernel_width_cents,
        config.distribution.step_size_cents,
    )?;
    pd.cent_to_hz()?;
    Ok(pd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::distribution::BinUnit;
    use crate::theory::{ModeLookup, TheoryTable};

    fn track() -> PitchTrack {
        let freqs: Vec<f64> = (0..2000)
            .map(|i| if (i / 100) % 2 == 0 { 220.0 } else { 330.0 })
            .collect();
        PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap()
    }

    #[test]
    fn test_audio_only_features() {
        let features = audio_only_features(&track(), &AnalysisConfig::default());
        assert!(features.pitch.is_some());
        assert_eq!(features.pitch_distribution.unwrap().unit, BinUnit::Hz);
        assert!(features.melodic_progression.is_some());
        assert!(features.tonic.is_none());
        assert!(features.pitch_class_distribution.is_none());
    }

    #[test]
    fn test_score_informed_features() {
        let tonic = TonicEstimate {
            frequency_hz: 220.0,
            symbol: "A4".parse().unwrap(),
            source: "audio".to_string(),
            procedure: "test".to_string(),
        };
        let mode = TheoryTable::builtin().mode("ussak");
        let features = score_informed_features(
            "ussak",
            &track(),
            &tonic,
            mode.as_ref(),
            &AnalysisConfig::default(),
        );
        let pcd = features.pitch_class_distribution.unwrap();
        assert!(pcd.is_pcd);
        // tonic and fifth dominate the pitch classes
        let peaks = pcd.peak_positions(0.5);
        assert!(peaks.iter().any(|p| p.abs() < 7.5 || (1200.0 - p).abs() < 7.5));
        assert!(peaks.iter().any(|p| (p - 702.0).abs() < 7.5));

        let transposition = features.transposition.unwrap();
        // A4 at 220 Hz is one octave below bolahenk
        assert_eq!(transposition.theoretical_cents, 0);
        assert_eq!(features.makam.as_deref(), Some("ussak"));

        // tonic and fifth are the only stable pitches
        let models = features.note_models.unwrap();
        assert_eq!(models.keys().collect::<Vec<_>>(), ["A4", "E5"]);
        assert!((models["A4"].stable_pitch_hz - 220.0).abs() < 1.0);
        assert!((models["E5"].stable_pitch_hz - 330.0).abs() < 2.0);
        assert!((models["E5"].relative_occurrence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_no_note_models_without_mode() {
        let tonic = TonicEstimate {
            frequency_hz: 220.0,
            symbol: "A4".parse().unwrap(),
            source: "audio".to_string(),
            procedure: "test".to_string(),
        };
        let features =
            score_informed_features("ussak", &track(), &tonic, None, &AnalysisConfig::default());
        assert!(features.note_models.is_none());
        assert!(features.pitch_class_distribution.is_some());
    }
}
