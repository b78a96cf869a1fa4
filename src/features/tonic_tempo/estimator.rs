//! Joint tonic and tempo search
//!
//! # Algorithm
//!
//! 1. Tonic pitch classes: every audio pitch-class peak paired with every
//!    theoretical scale degree of the makam gives a candidate; candidates are
//!    ranked by how well the duration-weighted score degrees fall on the
//!    audio PCD
//! 2. Octave: chosen so that the last notated note lands on the final voiced
//!    run of the recording, the most reliable synchronisation anchor
//! 3. Timing fit: the closing passage is anchored at the end of the last
//!    voiced run and the opening passage at a searched onset. Each onset
//!    implies an average tempo; both passages may deviate from it by a local
//!    tempo scale. The candidate and onset with the smallest summed residual
//!    win
//! 4. Tempo: notated beats from the first to the last pitched event over the
//!    audio span between the fitted onset and the end anchor
//!
//! Voiced audio before the opening onset (an improvised introduction, for
//! instance) does not bias the tempo.

use super::{TempoEstimate, TonicEstimate};
use crate::cancel::CancelToken;
use crate::config::TonicTempoConfig;
use crate::error::AnalysisError;
use crate::features::distribution::PitchDistribution;
use crate::features::median;
use crate::features::transposition::{MAX_TONIC_HZ, MIN_TONIC_HZ};
use crate::io::PitchTrack;
use crate::score::{alignment_targets, notated_bpm, validate_events, ScoreEvent};
use crate::theory::{
    cent_to_hz, hz_to_cent, octave_wrapped_distance, ModeTheory, CENTS_PER_COMMA,
    CENTS_PER_OCTAVE, COMMAS_PER_OCTAVE,
};
use std::collections::BTreeMap;

/// Reference frequency of the intermediate cent scale
const REF_FREQ: f64 = 440.0;

/// Frequencies below this are treated as silence
const MIN_FREQ: f64 = 20.0;

/// Spacing of the pitch samples compared in a passage, in seconds
const RESIDUAL_STEP_SECONDS: f64 = 0.02;

const PROCEDURE: &str = "Score-informed joint tonic and tempo estimation";

/// A pitched or rest target on the notated beat axis
#[derive(Debug, Clone)]
struct BeatNote {
    start: f64,
    beats: f64,
    interval: Option<f64>,
}

impl BeatNote {
    fn end(&self) -> f64 {
        self.start + self.beats
    }
}

/// Tonic candidate with its octave resolved
#[derive(Debug, Clone, Copy)]
struct Hypothesis {
    tonic_cents: f64,
    anchor_residual: f64,
}

/// Voiced audio prepared for the timing fit
struct Audio<'a> {
    track: &'a PitchTrack,
    cents: Vec<Option<f64>>,
    stride: usize,
    start: f64,
    end: f64,
}

/// Opening and closing passages on the beat axis
struct Passages<'a> {
    begin: Vec<&'a BeatNote>,
    end: Vec<&'a BeatNote>,
    total_beats: f64,
}

/// Best opening onset of one hypothesis
#[derive(Debug, Clone, Copy)]
struct TimingFit {
    onset: f64,
    residual: f64,
}

/// Score-informed tonic and tempo estimator
#[derive(Debug, Clone, Default)]
pub struct TonicTempoEstimator {
    config: TonicTempoConfig,
}

impl TonicTempoEstimator {
    /// Create an estimator
    pub fn new(config: TonicTempoConfig) -> Self {
        Self { config }
    }

    /// Estimate tonic and tempo
    pub fn estimate(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        mode: &ModeTheory,
    ) -> Result<(TonicEstimate, TempoEstimate), AnalysisError> {
        self.estimate_with_cancel(events, track, mode, &CancelToken::new())
    }

    /// Estimate tonic and tempo, checking `cancel` for every hypothesis
    ///
    /// # Errors
    ///
    /// `AlignmentPrerequisite` when the track has no voiced samples, the score
    /// has no pitched events with duration, or no tonic hypothesis yields a
    /// plausible frequency and a finite, positive tempo.
    pub fn estimate_with_cancel(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        mode: &ModeTheory,
        cancel: &CancelToken,
    ) -> Result<(TonicEstimate, TempoEstimate), AnalysisError> {
        validate_events(events)?;
        track.validate()?;

        let notes = self.beat_notes(events, mode)?;
        let total_beats = notes.last().map(|n| n.end()).unwrap_or(0.0);
        if !(total_beats > 0.0) {
            return Err(AnalysisError::AlignmentPrerequisite(
                "Score has no duration information".to_string(),
            ));
        }

        let (first, last) = track.voiced_bounds().ok_or_else(|| {
            AnalysisError::AlignmentPrerequisite("Pitch track has no voiced samples".to_string())
        })?;
        let audio = Audio {
            track,
            cents: track
                .samples
                .iter()
                .map(|s| hz_to_cent(s.frequency, REF_FREQ, MIN_FREQ))
                .collect(),
            stride: ((RESIDUAL_STEP_SECONDS / track.hop_seconds).round() as usize).max(1),
            start: track.samples[first].time,
            end: track.samples[last].time + track.hop_seconds,
        };
        let span_bpm = total_beats * 60.0 / (audio.end - audio.start);
        if !(span_bpm.is_finite() && span_bpm > 0.0) {
            return Err(AnalysisError::AlignmentPrerequisite(format!(
                "Implied tempo {} BPM is not finite and positive",
                span_bpm
            )));
        }
        log::debug!(
            "{:.2} notated beats over {:.2}s of voiced audio ({:.2} BPM)",
            total_beats,
            audio.end - audio.start,
            span_bpm
        );

        let hypotheses = self.tonic_hypotheses(&notes, mode, &audio)?;
        log::debug!("{} tonic hypotheses", hypotheses.len());

        let passages = Passages {
            begin: notes
                .iter()
                .filter(|n| n.start < self.config.segment_fraction * total_beats)
                .collect(),
            end: notes
                .iter()
                .filter(|n| n.end() > (1.0 - self.config.segment_fraction) * total_beats)
                .collect(),
            total_beats,
        };
        let scales = self.tempo_scales();

        let mut best: Option<(Hypothesis, TimingFit, f64)> = None;
        for hyp in hypotheses {
            cancel.check("Tonic and tempo estimation")?;

            let fit = match self.timing_fit(&hyp, &passages, &audio, &scales) {
                Some(fit) => fit,
                None => continue,
            };
            let total = fit.residual + hyp.anchor_residual;
            log::debug!(
                "Tonic hypothesis {:.2} Hz: onset {:.2}s, residual {:.4}",
                cent_to_hz(hyp.tonic_cents, REF_FREQ),
                fit.onset,
                total
            );
            if total.is_finite() && best.map(|(_, _, b)| total < b).unwrap_or(true) {
                best = Some((hyp, fit, total));
            }
        }

        let (hyp, fit, residual) = best.ok_or_else(|| {
            AnalysisError::AlignmentPrerequisite("No plausible tonic hypothesis".to_string())
        })?;
        let bpm = total_beats * 60.0 / (audio.end - fit.onset);
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(AnalysisError::AlignmentPrerequisite(format!(
                "Fitted tempo {} BPM is not finite and positive",
                bpm
            )));
        }

        let source = track.source.clone().unwrap_or_else(|| "audio".to_string());
        let notated = notated_bpm(events, self.config.beat_unit);
        let relative = match notated {
            Some(n) if n > 0.0 => bpm / n,
            _ => {
                log::warn!("Score has no nominal timing; relative tempo set to 1");
                1.0
            }
        };

        let tonic = TonicEstimate {
            frequency_hz: cent_to_hz(hyp.tonic_cents, REF_FREQ),
            symbol: mode.karar,
            source: source.clone(),
            procedure: PROCEDURE.to_string(),
        };
        let tempo = TempoEstimate {
            average_bpm: bpm,
            relative_to_notated: relative,
            notated_bpm: notated,
            onset_seconds: Some(fit.onset),
            source,
        };
        log::info!(
            "Tonic {:.2} Hz ({}), tempo {:.2} BPM (x{:.3}) from {:.2}s, residual {:.4}",
            tonic.frequency_hz,
            tonic.symbol,
            tempo.average_bpm,
            tempo.relative_to_notated,
            fit.onset,
            residual
        );
        Ok((tonic, tempo))
    }

    /// Targets from the first to the last pitched event on the beat axis
    fn beat_notes(
        &self,
        events: &[ScoreEvent],
        mode: &ModeTheory,
    ) -> Result<Vec<BeatNote>, AnalysisError> {
        let unit = self
            .config
            .beat_unit
            .as_f64()
            .filter(|u| *u > 0.0)
            .ok_or_else(|| AnalysisError::InvalidInput("Beat unit must be positive".to_string()))?;
        let targets = alignment_targets(events);
        let first = targets.iter().position(|e| e.pitch.is_some());
        let last = targets.iter().rposition(|e| e.pitch.is_some());
        let (first, last) = match (first, last) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(AnalysisError::AlignmentPrerequisite(
                    "Score has no pitched events with duration".to_string(),
                ))
            }
        };

        let mut beat = 0.0;
        let mut notes = Vec::with_capacity(last - first + 1);
        for event in &targets[first..=last] {
            let duration = event.duration.as_f64().ok_or_else(|| {
                AnalysisError::MalformedScore(format!("Event {} has no duration", event.index))
            })?;
            let beats = duration / unit;
            notes.push(BeatNote {
                start: beat,
                beats,
                interval: event.pitch.map(|p| p.cents_from(&mode.karar)),
            });
            beat += beats;
        }
        Ok(notes)
    }

    /// Tonic hypotheses in cents relative to the reference, best first
    fn tonic_hypotheses(
        &self,
        notes: &[BeatNote],
        mode: &ModeTheory,
        audio: &Audio<'_>,
    ) -> Result<Vec<Hypothesis>, AnalysisError> {
        let voiced: Vec<f64> = audio.cents.iter().flatten().copied().collect();
        let pcd = PitchDistribution::from_cent_samples(
            &voiced,
            self.config.kernel_width_cents,
            self.config.step_size_cents,
            Some(REF_FREQ),
        )
        .and_then(|pd| pd.to_pcd())
        .map_err(|e| AnalysisError::AlignmentPrerequisite(format!("Audio distribution: {}", e)))?;

        let peaks: Vec<f64> = pcd
            .peak_positions(self.config.min_peak_ratio)
            .into_iter()
            .take(self.config.max_distribution_peaks)
            .collect();

        // notated scale degrees weighted by duration, keyed by comma class
        let mut weights: BTreeMap<i32, f64> = BTreeMap::new();
        for note in notes {
            if let Some(interval) = note.interval {
                *weights.entry(comma_class(interval)).or_insert(0.0) += note.beats;
            }
        }

        let mut candidates: Vec<(f64, f64)> = Vec::new();
        for peak in &peaks {
            for degree in degree_classes(mode) {
                let pc = (peak - degree as f64 * CENTS_PER_COMMA).rem_euclid(CENTS_PER_OCTAVE);
                let score: f64 = weights
                    .iter()
                    .map(|(c, w)| w * pcd.value_at(pc + *c as f64 * CENTS_PER_COMMA))
                    .sum();
                candidates.push((pc, score));
            }
        }
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut unique: Vec<f64> = Vec::new();
        for (pc, _) in candidates {
            if unique
                .iter()
                .all(|u| octave_wrapped_distance(*u, pc) >= self.config.step_size_cents)
            {
                unique.push(pc);
            }
            if unique.len() >= self.config.max_hypotheses {
                break;
            }
        }

        // last-note anchor: median pitch of the closing voiced audio
        let last_interval = notes.iter().rev().find_map(|n| n.interval).unwrap_or(0.0);
        let window_start = audio.end - self.config.anchor_window_seconds;
        let mut closing: Vec<f64> = audio
            .track
            .samples
            .iter()
            .zip(&audio.cents)
            .filter(|(s, _)| s.time >= window_start && s.time < audio.end)
            .filter_map(|(_, c)| *c)
            .collect();
        let anchor = median(&mut closing).ok_or_else(|| {
            AnalysisError::AlignmentPrerequisite("No voiced audio at the end".to_string())
        })?;

        let min_cents = 1200.0 * (MIN_TONIC_HZ / REF_FREQ).log2();
        let max_cents = 1200.0 * (MAX_TONIC_HZ / REF_FREQ).log2();
        Ok(unique
            .into_iter()
            .filter_map(|pc| {
                let octaves = ((anchor - last_interval - pc) / CENTS_PER_OCTAVE).round();
                let tonic_cents = pc + octaves * CENTS_PER_OCTAVE;
                if tonic_cents < min_cents || tonic_cents > max_cents {
                    return None;
                }
                let d = octave_wrapped_distance(anchor, tonic_cents + last_interval);
                Some(Hypothesis {
                    tonic_cents,
                    anchor_residual: (d / self.config.pitch_tolerance_cents).powi(2).min(1.0),
                })
            })
            .collect())
    }

    /// Search the opening onset of a hypothesis
    ///
    /// A coarse pass covers every onset whose implied tempo is at most
    /// `max_tempo_ratio` times the voiced-span tempo; a fine pass refines
    /// around the best coarse onset.
    fn timing_fit(
        &self,
        hyp: &Hypothesis,
        passages: &Passages<'_>,
        audio: &Audio<'_>,
        scales: &[f64],
    ) -> Option<TimingFit> {
        let latest = audio.end - (audio.end - audio.start) / self.config.max_tempo_ratio;
        let range = (latest - audio.start).max(0.0);
        let fine_step = self.config.onset_step_seconds;
        let coarse_step = fine_step.max(range / self.config.max_onset_candidates as f64);

        let residual_at = |onset: f64| -> f64 {
            let spb = (audio.end - onset) / passages.total_beats;
            let fit = |passage: &[&BeatNote], place: &dyn Fn(&BeatNote, f64) -> (f64, f64)| {
                self.passage_fit(passage, spb, scales, hyp.tonic_cents, audio, place)
            };
            let begin = fit(&passages.begin, &|n, s| (onset + n.start * s, onset + n.end() * s));
            let end = fit(&passages.end, &|n, s| {
                let total = passages.total_beats;
                (audio.end - (total - n.start) * s, audio.end - (total - n.end()) * s)
            });
            begin + end
        };
        let search = |onsets: &mut dyn Iterator<Item = f64>| -> Option<TimingFit> {
            let mut best: Option<TimingFit> = None;
            for onset in onsets {
                let residual = residual_at(onset);
                if residual.is_finite() && best.map(|b| residual < b.residual).unwrap_or(true) {
                    best = Some(TimingFit { onset, residual });
                }
            }
            best
        };

        let n_coarse = (range / coarse_step).floor() as usize;
        let coarse = search(&mut (0..=n_coarse).map(|k| audio.start + k as f64 * coarse_step))?;
        if coarse_step <= fine_step {
            return Some(coarse);
        }
        let n_fine = (coarse_step / fine_step).ceil() as i64;
        search(
            &mut (-n_fine..=n_fine)
                .map(|k| coarse.onset + k as f64 * fine_step)
                .filter(|t| (audio.start..=latest).contains(t)),
        )
    }

    /// Residual of a passage under the best local tempo scale
    ///
    /// `place` maps a note and seconds per beat to its time span.
    fn passage_fit(
        &self,
        passage: &[&BeatNote],
        spb: f64,
        scales: &[f64],
        tonic_cents: f64,
        audio: &Audio<'_>,
        place: &dyn Fn(&BeatNote, f64) -> (f64, f64),
    ) -> f64 {
        scales
            .iter()
            .map(|&alpha| {
                let local = spb / alpha;
                let residual =
                    self.segment_residual(passage, |n| place(n, local), tonic_cents, audio);
                residual + self.config.timing_weight * alpha.ln().abs()
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Local tempo scales searched around the average tempo, geometric and symmetric
    fn tempo_scales(&self) -> Vec<f64> {
        let steps = self.config.tempo_search_steps;
        if steps <= 1 || self.config.tempo_search_tolerance <= 0.0 {
            return vec![1.0];
        }
        let hi = (1.0 + self.config.tempo_search_tolerance).ln();
        (0..steps)
            .map(|k| (-hi + 2.0 * hi * k as f64 / (steps - 1) as f64).exp())
            .collect()
    }

    /// Mean pitch mismatch of the pitched notes of a segment
    ///
    /// Unvoiced samples inside notes count as full mismatch.
    fn segment_residual<F>(
        &self,
        segment: &[&BeatNote],
        interval_of: F,
        tonic_cents: f64,
        audio: &Audio<'_>,
    ) -> f64
    where
        F: Fn(&BeatNote) -> (f64, f64),
    {
        let mut total = 0.0;
        let mut count = 0usize;
        for &note in segment {
            let interval = match note.interval {
                Some(i) => i,
                None => continue,
            };
            let (a, b) = interval_of(note);
            let expected = tonic_cents + interval;
            let from = audio.track.index_at(a);
            let to = audio.track.index_at(b).max(from);
            for c in audio.cents[from..to].iter().step_by(audio.stride) {
                total += match c {
                    Some(c) => {
                        let d = octave_wrapped_distance(*c, expected);
                        (d / self.config.pitch_tolerance_cents).powi(2).min(1.0)
                    }
                    None => 1.0,
                };
                count += 1;
            }
        }
        if count == 0 {
            1.0
        } else {
            total / count as f64
        }
    }
}

/// Pitch class of an interval in commas
fn comma_class(interval_cents: f64) -> i32 {
    ((interval_cents / CENTS_PER_COMMA).round() as i32).rem_euclid(COMMAS_PER_OCTAVE)
}

/// Distinct pitch classes of the theoretical scale degrees, in commas from the karar
fn degree_classes(mode: &ModeTheory) -> Vec<i32> {
    let mut classes: Vec<i32> = mode.intervals().iter().map(|(_, c)| comma_class(*c)).collect();
    classes.sort_unstable();
    classes.dedup();
    classes
}
