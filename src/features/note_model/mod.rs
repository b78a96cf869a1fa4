//! Aligned note models
//!
//! Per scale degree statistics of the performed pitch, computed only from the
//! samples that the alignment assigned to notes of that degree.
//!
//! # Algorithm
//!
//! 1. Collect the voiced samples inside all aligned notes; too few samples
//!    mean the recording carries no usable evidence
//! 2. Build the aligned pitch distribution over these samples
//! 3. For every degree of the mode, build the distribution of the samples
//!    aligned to notes of that degree and take the peak nearest to the
//!    theoretical pitch within a threshold as the stable pitch
//! 4. The stable pitch of the karar is the refined tonic
//!
//! Degrees without aligned notes or without a peak near the theoretical
//! pitch have no model.
//!
//! Without a usable alignment, [`distribution_note_models`] derives the
//! models from the peaks of an unconstrained pitch distribution and a known
//! tonic instead.

use crate::config::NoteModelConfig;
use crate::error::AnalysisError;
use crate::features::alignment::AlignmentLink;
use crate::features::distribution::{BinUnit, PitchDistribution};
use crate::features::tonic_tempo::TonicEstimate;
use crate::io::PitchTrack;
use crate::theory::{cent_to_hz, hz_to_cent, ModeTheory, NoteSymbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PROCEDURE: &str = "Tonic refinement from aligned note models";

/// Performed statistics of one scale degree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteModel {
    /// Interval from the karar in theory, in cents
    pub theoretical_interval_cents: f64,
    /// Interval from the refined tonic as performed, in cents
    pub performed_interval_cents: f64,
    /// Theoretical pitch transposed by the estimated tonic
    pub theoretical_pitch_hz: f64,
    /// Most prominent performed pitch near the theoretical pitch
    pub stable_pitch_hz: f64,
    /// Share of the aligned voiced samples that belong to this degree
    pub relative_occurrence: f64,
    /// Distribution of the samples aligned to this degree, in Hz
    pub pitch_sub_distribution: PitchDistribution,
}

/// Output of [`AlignedNoteModel::compute`]
#[derive(Debug, Clone, PartialEq)]
pub struct NoteModelOutput {
    /// Models keyed by degree symbol
    pub models: BTreeMap<String, NoteModel>,
    /// Distribution of all aligned voiced samples, in Hz
    pub pitch_distribution: PitchDistribution,
    /// Refined tonic
    pub tonic: TonicEstimate,
}

/// Note model estimator
#[derive(Debug, Clone, Default)]
pub struct AlignedNoteModel {
    config: NoteModelConfig,
}

impl AlignedNoteModel {
    /// Create an estimator
    pub fn new(config: NoteModelConfig) -> Self {
        Self { config }
    }

    /// Compute note models from a filtered track and refined links
    ///
    /// # Errors
    ///
    /// `InsufficientEvidence` when fewer than `min_voiced_samples` voiced
    /// samples fall inside aligned notes, no link carries an expected pitch,
    /// or no degree produced a model.
    pub fn compute(
        &self,
        track: &PitchTrack,
        links: &[AlignmentLink],
        mode: &ModeTheory,
        tonic_symbol: NoteSymbol,
    ) -> Result<NoteModelOutput, AnalysisError> {
        let start = std::time::Instant::now();

        let tonic_hz = links
            .iter()
            .find_map(|l| match (l.symbol, l.expected_pitch_hz) {
                (Some(s), Some(e)) => Some(cent_to_hz(-s.cents_from(&tonic_symbol), e)),
                _ => None,
            })
            .ok_or_else(|| {
                AnalysisError::InsufficientEvidence("No aligned pitched notes".to_string())
            })?;

        // aligned voiced samples per notated symbol, in cents from the tonic
        let mut by_symbol: BTreeMap<NoteSymbol, Vec<f64>> = BTreeMap::new();
        for link in links {
            let symbol = match link.symbol {
                Some(s) => s,
                None => continue,
            };
            let range = track.index_at(link.start_time)..track.index_at(link.end_time);
            let entry = by_symbol.entry(symbol).or_default();
            entry.extend(
                track.samples[range]
                    .iter()
                    .filter_map(|s| hz_to_cent(s.frequency, tonic_hz, 0.0)),
            );
        }
        let all: Vec<f64> = by_symbol.values().flatten().copied().collect();
        if all.len() < self.config.min_voiced_samples {
            return Err(AnalysisError::InsufficientEvidence(format!(
                "{} voiced aligned samples, need {}",
                all.len(),
                self.config.min_voiced_samples
            )));
        }

        let mut pitch_distribution = self.distribution(&all, tonic_hz)?;
        pitch_distribution.cent_to_hz()?;

        let mut models = BTreeMap::new();
        for (degree, interval) in mode.intervals() {
            let samples = match by_symbol.get(&degree) {
                Some(s) if !s.is_empty() => s,
                _ => continue,
            };
            let mut sub = self.distribution(samples, tonic_hz)?;
            let stable = sub
                .peak_positions(self.config.min_peak_ratio)
                .into_iter()
                .map(|p| (p, (p - interval).abs()))
                .filter(|(_, d)| *d <= self.config.pitch_threshold_cents)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(p, _)| p);
            let stable = match stable {
                Some(p) => p,
                None => {
                    log::debug!("No stable pitch near {} ({:.1} cents)", degree, interval);
                    continue;
                }
            };
            sub.cent_to_hz()?;
            models.insert(
                degree.to_string(),
                NoteModel {
                    theoretical_interval_cents: interval,
                    performed_interval_cents: stable,
                    theoretical_pitch_hz: cent_to_hz(interval, tonic_hz),
                    stable_pitch_hz: cent_to_hz(stable, tonic_hz),
                    relative_occurrence: samples.len() as f64 / all.len() as f64,
                    pitch_sub_distribution: sub,
                },
            );
        }

        let refined_hz = match models.get(&tonic_symbol.to_string()) {
            Some(m) => m.stable_pitch_hz,
            None => {
                let fallback = models
                    .values()
                    .max_by(|a, b| {
                        a.relative_occurrence
                            .partial_cmp(&b.relative_occurrence)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .ok_or_else(|| {
                        AnalysisError::InsufficientEvidence(
                            "No scale degree has a stable pitch".to_string(),
                        )
                    })?;
                log::warn!("Karar {} has no note model; tonic derived from another degree", tonic_symbol);
                cent_to_hz(-fallback.theoretical_interval_cents, fallback.stable_pitch_hz)
            }
        };

        // performed intervals relative to the refined tonic
        let shift = 1200.0 * (tonic_hz / refined_hz).log2();
        for model in models.values_mut() {
            model.performed_interval_cents += shift;
        }

        log::debug!(
            "{} note models from {} samples in {:.2}ms",
            models.len(),
            all.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(NoteModelOutput {
            models,
            pitch_distribution,
            tonic: TonicEstimate {
                frequency_hz: refined_hz,
                symbol: tonic_symbol,
                source: track.source.clone().unwrap_or_else(|| "audio".to_string()),
                procedure: PROCEDURE.to_string(),
            },
        })
    }

    fn distribution(&self, cents: &[f64], ref_freq: f64) -> Result<PitchDistribution, AnalysisError> {
        PitchDistribution::from_cent_samples(
            cents,
            self.config.kernel_width_cents,
            self.config.step_size_cents,
            Some(ref_freq),
        )
    }
}

/// Note models from the stable pitches of a pitch distribution
///
/// `distribution` holds cent bins; every peak is assigned to the nearest
/// theoretical degree of `mode` within `pitch_threshold_cents` of it, the
/// highest peak first. The sub-distribution of a degree is the window of
/// `distribution` within the threshold around its peak.
///
/// # Errors
///
/// `InvalidInput` for Hz, folded or unreferenced distributions and
/// `InsufficientEvidence` when no peak lies near a degree.
pub fn distribution_note_models(
    distribution: &PitchDistribution,
    tonic_hz: f64,
    mode: &ModeTheory,
    config: &NoteModelConfig,
) -> Result<BTreeMap<String, NoteModel>, AnalysisError> {
    if distribution.unit != BinUnit::Cent || distribution.is_pcd {
        return Err(AnalysisError::InvalidInput(
            "Note models need an unfolded cent distribution".to_string(),
        ));
    }
    let ref_freq = distribution.ref_freq.ok_or_else(|| {
        AnalysisError::InvalidInput("Distribution has no reference frequency".to_string())
    })?;
    if !(tonic_hz > 0.0) {
        return Err(AnalysisError::InvalidInput(format!("Invalid tonic {} Hz", tonic_hz)));
    }
    // bin positions relative to the tonic
    let shift = 1200.0 * (ref_freq / tonic_hz).log2();
    let threshold = config.pitch_threshold_cents;
    let intervals = mode.intervals();

    let mut models = BTreeMap::new();
    for position in distribution.peak_positions(config.min_peak_ratio) {
        let performed = position + shift;
        let nearest = intervals
            .iter()
            .map(|(degree, interval)| (degree, *interval, (performed - interval).abs()))
            .filter(|(_, _, d)| *d < threshold)
            .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
        let (degree, interval) = match nearest {
            Some((degree, interval, _)) => (degree.to_string(), interval),
            None => continue,
        };
        if models.contains_key(&degree) {
            continue;
        }
        let (mut sub, share) = match distribution.window(position - threshold, position + threshold)
        {
            Some(w) => w,
            None => continue,
        };
        sub.cent_to_hz()?;
        models.insert(
            degree,
            NoteModel {
                theoretical_interval_cents: interval,
                performed_interval_cents: performed,
                theoretical_pitch_hz: cent_to_hz(interval, tonic_hz),
                stable_pitch_hz: cent_to_hz(performed, tonic_hz),
                relative_occurrence: share,
                pitch_sub_distribution: sub,
            },
        );
    }

    if models.is_empty() {
        return Err(AnalysisError::InsufficientEvidence(
            "No distribution peak near a scale degree".to_string(),
        ));
    }
    log::debug!("{} note models from distribution peaks", models.len());
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::{ModeLookup, TheoryTable};

    fn sym(s: &str) -> NoteSymbol {
        s.parse().unwrap()
    }

    /// Notes at their theoretical pitches with a tonic of 220 Hz, B4b1 sung 10 cents flat
    fn setup() -> (PitchTrack, Vec<AlignmentLink>) {
        let karar = sym("A4");
        let notes = ["A4", "B4b1", "C5", "B4b1", "A4"];
        let mut freqs = Vec::new();
        let mut links = Vec::new();
        for (i, n) in notes.iter().enumerate() {
            let s = sym(n);
            let expected = cent_to_hz(s.cents_from(&karar), 220.0);
            let sung = if *n == "B4b1" {
                cent_to_hz(s.cents_from(&karar) - 10.0, 220.0)
            } else {
                expected
            };
            freqs.extend(std::iter::repeat(sung).take(50));
            links.push(AlignmentLink {
                score_index: i as u32 + 1,
                start_time: i as f64 * 0.5,
                end_time: (i + 1) as f64 * 0.5,
                symbol: Some(s),
                expected_pitch_hz: Some(expected),
                performed_pitch_hz: Some(sung),
                cost: 0.0,
            });
        }
        (PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap(), links)
    }

    #[test]
    fn test_models_and_refined_tonic() {
        let (track, links) = setup();
        let mode = TheoryTable::builtin().mode("ussak").unwrap();
        let out = AlignedNoteModel::default()
            .compute(&track, &links, &mode, sym("A4"))
            .unwrap();

        assert_eq!(out.models.len(), 3);
        assert!((out.tonic.frequency_hz - 220.0).abs() < 1.0);

        let b = &out.models["B4b1"];
        assert!((b.performed_interval_cents - (b.theoretical_interval_cents - 10.0)).abs() < 4.0);
        assert!((b.relative_occurrence - 0.4).abs() < 1e-9);
        assert!((b.theoretical_pitch_hz - cent_to_hz(sym("B4b1").cents_from(&sym("A4")), 220.0)).abs() < 1e-6);

        let occurrence: f64 = out.models.values().map(|m| m.relative_occurrence).sum();
        assert!((occurrence - 1.0).abs() < 1e-9);
        assert_eq!(out.pitch_distribution.unit, crate::features::distribution::BinUnit::Hz);
        assert!(!out.models.contains_key("D5"));
    }

    #[test]
    fn test_too_few_samples() {
        let (track, links) = setup();
        let silent = track.with_frequencies(&vec![0.0; track.len()]).unwrap();
        let mode = TheoryTable::builtin().mode("ussak").unwrap();
        assert!(matches!(
            AlignedNoteModel::default().compute(&silent, &links, &mode, sym("A4")),
            Err(AnalysisError::InsufficientEvidence(_))
        ));
    }

    #[test]
    fn test_models_from_distribution_peaks() {
        // tonic 220 Hz; A4 on pitch, E5 sung 12 cents sharp, a stray peak
        // between the degrees
        let mut cents = vec![0.0; 300];
        cents.extend(vec![714.0; 200]);
        cents.extend(vec![400.0; 100]);
        let pd = PitchDistribution::from_cent_samples(&cents, 7.5, 7.5, Some(440.0)).unwrap();
        // referenced to 440 Hz, one octave above the tonic
        let pd = PitchDistribution {
            bins: pd.bins.iter().map(|b| b - 1200.0).collect(),
            ..pd
        };
        let mode = TheoryTable::builtin().mode("ussak").unwrap();
        let models =
            distribution_note_models(&pd, 220.0, &mode, &NoteModelConfig::default()).unwrap();

        assert_eq!(models.len(), 2, "{:?}", models.keys().collect::<Vec<_>>());
        let a = &models["A4"];
        assert!(a.performed_interval_cents.abs() < 4.0);
        assert!((a.stable_pitch_hz - 220.0).abs() < 1.0);
        assert!((a.relative_occurrence - 0.5).abs() < 1e-6);

        let e = &models["E5"];
        assert!((e.performed_interval_cents - 714.0).abs() < 4.0);
        let theoretical = cent_to_hz(e.theoretical_interval_cents, 220.0);
        assert!((e.theoretical_pitch_hz - theoretical).abs() < 1e-9);
        assert_eq!(e.pitch_sub_distribution.unit, BinUnit::Hz);
    }

    #[test]
    fn test_distribution_models_need_cent_bins() {
        let mut pd =
            PitchDistribution::from_cent_samples(&[0.0; 10], 7.5, 7.5, Some(220.0)).unwrap();
        let mode = TheoryTable::builtin().mode("ussak").unwrap();
        let config = NoteModelConfig::default();
        assert!(distribution_note_models(&pd, 220.0, &mode, &config).is_ok());
        pd.cent_to_hz().unwrap();
        assert!(matches!(
            distribution_note_models(&pd, 220.0, &mode, &config),
            Err(AnalysisError::InvalidInput(_))
        ));

        let far =
            PitchDistribution::from_cent_samples(&[400.0; 10], 7.5, 7.5, Some(220.0)).unwrap();
        assert!(matches!(
            distribution_note_models(&far, 220.0, &mode, &config),
            Err(AnalysisError::InsufficientEvidence(_))
        ));
    }

    #[test]
    fn test_tonic_falls_back_without_karar() {
        let (track, links) = setup();
        let links: Vec<AlignmentLink> = links.into_iter().filter(|l| l.symbol != Some(sym("A4"))).collect();
        let mode = TheoryTable::builtin().mode("ussak").unwrap();
        let out = AlignedNoteModel::default()
            .compute(&track, &links, &mode, sym("A4"))
            .unwrap();
        assert!(!out.models.contains_key("A4"));
        // B4b1 occurs most and is sung 10 cents flat
        let expected = cent_to_hz(-10.0, 220.0);
        assert!((out.tonic.frequency_hz - expected).abs() < 1.0);
    }
}
