//! Dynamic programming aligner
//!
//! State `D[j][t]` is the cheapest cost of explaining the audio up to frame
//! boundary `t` with the first `j + 1` target events:
//!
//! ```text
//! D[-1][t] = unaligned cost of frames [0, t)
//! D[j][t]  = min( D[j-1][t] + skip_penalty,
//!                 min_{t-w_j <= s < t} D[j-1][s] + cost_j(s, t) )
//! total    = min_t D[J-1][t] + unaligned cost of frames [t, F)
//! ```
//!
//! `cost_j(s, t)` is the weighted pitch cost of frames `[s, t)` plus the
//! duration cost of the interval. Each row is evaluated only inside a band
//! of `band_seconds` around the boundary where the row is expected to end:
//! the first row follows the notated timeline from the estimated onset, every
//! later row follows the cheapest boundary of the previous row plus the
//! expected duration of its event. The band therefore moves with the
//! performance when the tempo changes between sections.
//!
//! The last pitched event may be held for up to `band_seconds` beyond its
//! usual stretch limit; performers commonly extend the final note.
//!
//! Row cells are independent given the previous row and are computed in
//! parallel; ties resolve to the skip transition, then to the earliest
//! start, so the result is deterministic.

use super::cost::{CostModel, Frames, Target};
use super::sections::link_sections;
use super::{AlignmentLink, AlignmentResult};
use crate::cancel::CancelToken;
use crate::config::AlignmentConfig;
use crate::error::AnalysisError;
use crate::features::median;
use crate::features::tonic_tempo::{TempoEstimate, TonicEstimate};
use crate::features::transposition::{MAX_TONIC_HZ, MIN_TONIC_HZ};
use crate::io::PitchTrack;
use crate::score::{alignment_targets, validate_events, Fraction, ScoreEvent};
use crate::theory::cent_to_hz;
use rayon::prelude::*;

/// Backpointer of a DP cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Back {
    /// Event not aligned; boundary unchanged
    Skip,
    /// Event aligned to frames `[s, t)`
    From(u32),
}

/// Banded DP row covering boundaries `lo..lo + cost.len()`
#[derive(Debug)]
struct Row {
    lo: usize,
    cost: Vec<f64>,
    back: Vec<Back>,
}

impl Row {
    fn get(&self, t: usize) -> f64 {
        if t < self.lo {
            return f64::INFINITY;
        }
        self.cost.get(t - self.lo).copied().unwrap_or(f64::INFINITY)
    }

    fn back_at(&self, t: usize) -> Back {
        if t < self.lo {
            return Back::Skip;
        }
        self.back.get(t - self.lo).copied().unwrap_or(Back::Skip)
    }

    fn hi(&self) -> usize {
        self.lo + self.cost.len().saturating_sub(1)
    }

    /// Earliest boundary with the largest gain over leaving the audio
    /// before it unaligned
    ///
    /// `lead[t]` is the unaligned cost of frames `[0, t)`.
    fn best_boundary(&self, lead: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &c) in self.cost.iter().enumerate() {
            let excess = c - lead[self.lo + i];
            if excess.is_finite() && best.map(|(_, b)| excess < b).unwrap_or(true) {
                best = Some((self.lo + i, excess));
            }
        }
        best.map(|(t, _)| t)
    }
}

/// Monotone score-to-audio aligner
///
/// Holds only configuration; one instance may be shared across runs.
#[derive(Debug, Clone)]
pub struct ScoreAudioAligner {
    config: AlignmentConfig,
    beat_unit: Fraction,
}

impl ScoreAudioAligner {
    /// Create an aligner
    ///
    /// `beat_unit` is the score duration of one beat of the tempo estimate.
    pub fn new(config: AlignmentConfig, beat_unit: Fraction) -> Self {
        Self { config, beat_unit }
    }

    /// Align score events to a pitch track
    pub fn align(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        tonic: &TonicEstimate,
        tempo: &TempoEstimate,
    ) -> Result<AlignmentResult, AnalysisError> {
        self.align_with_cancel(events, track, tonic, tempo, &CancelToken::new())
    }

    /// Align score events to a pitch track, checking `cancel` at every row
    ///
    /// # Errors
    ///
    /// - `MalformedScore` / `InvalidInput` for invalid events or track
    /// - `AlignmentPrerequisite` for an implausible tonic or tempo
    /// - `AlignmentFailed` when the audio is unvoiced, the path cost per
    ///   second exceeds `max_normalized_cost`, or fewer than
    ///   `min_aligned_fraction` of the events are aligned
    /// - `Cancelled` when `cancel` fires
    pub fn align_with_cancel(
        &self,
        events: &[ScoreEvent],
        track: &PitchTrack,
        tonic: &TonicEstimate,
        tempo: &TempoEstimate,
        cancel: &CancelToken,
    ) -> Result<AlignmentResult, AnalysisError> {
        use std::time::Instant;
        let start_time = Instant::now();

        validate_events(events)?;
        track.validate()?;
        if !(MIN_TONIC_HZ..=MAX_TONIC_HZ).contains(&tonic.frequency_hz) {
            return Err(AnalysisError::AlignmentPrerequisite(format!(
                "Tonic frequency {:.2} Hz is not plausible",
                tonic.frequency_hz
            )));
        }
        if !(tempo.average_bpm.is_finite() && tempo.average_bpm > 0.0) {
            return Err(AnalysisError::AlignmentPrerequisite(format!(
                "Tempo {} BPM is not plausible",
                tempo.average_bpm
            )));
        }

        let targets = self.build_targets(events, tonic, tempo)?;
        if targets.is_empty() {
            return Err(AnalysisError::AlignmentFailed(
                "Score has no performable events".to_string(),
            ));
        }

        let frames = Frames::from_track(track, tonic.frequency_hz, self.config.frame_seconds);
        if !frames.has_voiced() {
            return Err(AnalysisError::AlignmentFailed(
                "Pitch track has no voiced frames".to_string(),
            ));
        }

        let num_frames = frames.len();
        let frame_dur = frames.samples_per_frame as f64 * track.hop_seconds;
        log::debug!(
            "Aligning {} events to {} frames of {:.3}s",
            targets.len(),
            num_frames,
            frame_dur
        );

        let model = CostModel::new(&self.config);
        let onset = tempo.onset_seconds;
        let first_end = self.first_expected_end(&targets, &frames, onset, frame_dur);
        let band = (self.config.band_seconds / frame_dur).ceil() as i64;
        let final_note = targets.iter().rposition(|t| t.interval_cents.is_some());

        // unaligned cost prefix: lead[t] covers frames [0, t)
        let mut lead = vec![0.0; num_frames + 1];
        for f in 0..num_frames {
            lead[f + 1] = lead[f]
                + self.config.pitch_weight * model.unaligned_cost(frames.pitch[f]) * frames.weight(f);
        }

        let initial = Row {
            lo: 0,
            cost: lead.clone(),
            back: Vec::new(),
        };
        let mut rows: Vec<Row> = Vec::with_capacity(targets.len());
        for (j, target) in targets.iter().enumerate() {
            cancel.check("Alignment")?;
            let prev = if j == 0 { &initial } else { &rows[j - 1] };
            let center = match (j, prev.best_boundary(&lead)) {
                (0, _) | (_, None) => first_end,
                (_, Some(b)) => b as i64 + (target.expected_seconds / frame_dur).round() as i64,
            };
            let clamp = |x: i64| x.clamp(0, num_frames as i64) as usize;
            let lo = clamp(center - band);
            let hi = clamp(center + band);
            let max_width = self.max_width(target, frame_dur, band, final_note == Some(j));
            let row = self.compute_row(&model, target, prev, &frames, lo, hi, max_width);
            rows.push(row);
        }

        // close the path with the unaligned tail
        let last = rows.last().ok_or_else(|| {
            AnalysisError::AlignmentFailed("No alignment rows computed".to_string())
        })?;
        let mut best: Option<(usize, f64)> = None;
        for t in last.lo..=last.hi() {
            let c = last.get(t) + (lead[num_frames] - lead[t]);
            if c.is_finite() && best.map(|(_, b)| c < b).unwrap_or(true) {
                best = Some((t, c));
            }
        }
        let (end_boundary, total_cost) = best.ok_or_else(|| {
            AnalysisError::AlignmentFailed("No finite-cost alignment path".to_string())
        })?;

        let links = self.backtrace(&rows, &targets, &frames, track, tonic, &model, end_boundary);

        let duration = track.duration();
        let normalized_cost = if duration > 0.0 {
            total_cost / duration
        } else {
            f64::INFINITY
        };
        let aligned_fraction = links.len() as f64 / targets.len() as f64;

        log::debug!(
            "Alignment path: cost {:.4} ({:.4}/s), {}/{} events aligned",
            total_cost,
            normalized_cost,
            links.len(),
            targets.len()
        );

        if normalized_cost > self.config.max_normalized_cost {
            return Err(AnalysisError::AlignmentFailed(format!(
                "Path cost {:.3} per second exceeds {:.3}",
                normalized_cost, self.config.max_normalized_cost
            )));
        }
        if aligned_fraction < self.config.min_aligned_fraction {
            return Err(AnalysisError::AlignmentFailed(format!(
                "Only {:.1}% of the events aligned",
                aligned_fraction * 100.0
            )));
        }

        let sections = link_sections(events, &links);
        log::info!(
            "Aligned {} events in {} sections in {:.1} ms",
            links.len(),
            sections.len(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        Ok(AlignmentResult {
            links,
            sections,
            total_cost,
            normalized_cost,
            aligned_fraction,
        })
    }

    fn build_targets(
        &self,
        events: &[ScoreEvent],
        tonic: &TonicEstimate,
        tempo: &TempoEstimate,
    ) -> Result<Vec<Target>, AnalysisError> {
        let unit = self
            .beat_unit
            .as_f64()
            .filter(|u| *u > 0.0)
            .ok_or_else(|| AnalysisError::InvalidInput("Beat unit must be positive".to_string()))?;
        let beat_seconds = 60.0 / tempo.average_bpm;
        alignment_targets(events)
            .into_iter()
            .map(|e| {
                let duration = e.duration.as_f64().ok_or_else(|| {
                    AnalysisError::MalformedScore(format!("Event {} has no duration", e.index))
                })?;
                Ok(Target {
                    index: e.index,
                    symbol: e.pitch,
                    interval_cents: e.pitch.map(|p| p.cents_from(&tonic.symbol)),
                    expected_seconds: duration / unit * beat_seconds,
                })
            })
            .collect()
    }

    /// Expected end boundary of the first target, in frames
    ///
    /// The notated timeline is anchored so that the first pitched event
    /// starts at `onset`, or at the first voiced frame without one.
    fn first_expected_end(
        &self,
        targets: &[Target],
        frames: &Frames,
        onset: Option<f64>,
        frame_dur: f64,
    ) -> i64 {
        let first_pitched_offset: f64 = targets
            .iter()
            .take_while(|t| t.interval_cents.is_none())
            .map(|t| t.expected_seconds)
            .sum();
        let first_seconds = targets.first().map(|t| t.expected_seconds).unwrap_or(0.0);

        let t0 = frames.bounds[0];
        let first_voiced = frames
            .pitch
            .iter()
            .position(|p| p.is_some())
            .map(|f| frames.bounds[f])
            .unwrap_or(t0);
        let anchor = (onset.unwrap_or(first_voiced) - first_pitched_offset).max(t0);
        ((anchor + first_seconds - t0) / frame_dur).round() as i64
    }

    /// Longest interval of a target in frames
    fn max_width(&self, target: &Target, frame_dur: f64, band: i64, is_final: bool) -> usize {
        let width = ((target.expected_seconds * self.config.max_stretch / frame_dur).ceil()
            as usize
            + 1)
        .max(1);
        if is_final {
            width + band.max(0) as usize
        } else {
            width
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_row(
        &self,
        model: &CostModel<'_>,
        target: &Target,
        prev: &Row,
        frames: &Frames,
        lo: usize,
        hi: usize,
        max_width: usize,
    ) -> Row {
        let plo = lo.saturating_sub(max_width);

        // prefix[i] = pitch cost of frames [plo, plo + i)
        let mut prefix = Vec::with_capacity(hi - plo + 1);
        prefix.push(0.0);
        for f in plo..hi {
            let c = model.frame_cost(target.interval_cents, frames.pitch[f]) * frames.weight(f);
            prefix.push(prefix[f - plo] + c);
        }

        let skip = model.skip_penalty();
        let cells: Vec<(f64, Back)> = (lo..=hi)
            .into_par_iter()
            .map(|t| {
                let mut best = prev.get(t) + skip;
                let mut back = Back::Skip;
                let s_min = t.saturating_sub(max_width).max(plo);
                for s in s_min..t {
                    let p = prev.get(s);
                    if !p.is_finite() {
                        continue;
                    }
                    let pitch_sum = prefix[t - plo] - prefix[s - plo];
                    let actual = frames.bounds[t] - frames.bounds[s];
                    let c = p + model.segment_cost(pitch_sum, actual, target.expected_seconds);
                    if c < best {
                        best = c;
                        back = Back::From(s as u32);
                    }
                }
                (best, back)
            })
            .collect();

        let (cost, back): (Vec<f64>, Vec<Back>) = cells.into_iter().unzip();
        Row { lo, cost, back }
    }

    #[allow(clippy::too_many_arguments)]
    fn backtrace(
        &self,
        rows: &[Row],
        targets: &[Target],
        frames: &Frames,
        track: &PitchTrack,
        tonic: &TonicEstimate,
        model: &CostModel<'_>,
        end_boundary: usize,
    ) -> Vec<AlignmentLink> {
        let mut links = Vec::new();
        let mut t = end_boundary;
        for j in (0..rows.len()).rev() {
            if let Back::From(s) = rows[j].back_at(t) {
                let s = s as usize;
                let target = &targets[j];

                let pitch_sum: f64 = (s..t)
                    .map(|f| model.frame_cost(target.interval_cents, frames.pitch[f]) * frames.weight(f))
                    .sum();
                let actual = frames.bounds[t] - frames.bounds[s];
                let cost = model.segment_cost(pitch_sum, actual, target.expected_seconds);

                let n = track.samples.len();
                let mut voiced: Vec<f64> = track.samples
                    [frames.sample_index(s, n)..frames.sample_index(t, n)]
                    .iter()
                    .filter(|x| x.is_voiced())
                    .map(|x| x.frequency)
                    .collect();

                links.push(AlignmentLink {
                    score_index: target.index,
                    start_time: frames.bounds[s],
                    end_time: frames.bounds[t],
                    symbol: target.symbol,
                    expected_pitch_hz: target
                        .interval_cents
                        .map(|i| cent_to_hz(i, tonic.frequency_hz)),
                    performed_pitch_hz: median(&mut voiced),
                    cost,
                });
                t = s;
            }
        }
        links.reverse();
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::alignment::is_monotone;
    use crate::theory::NoteSymbol;

    fn sym(s: &str) -> NoteSymbol {
        s.parse().unwrap()
    }

    fn tonic() -> TonicEstimate {
        TonicEstimate {
            frequency_hz: 440.0,
            symbol: sym("A4"),
            source: "test".to_string(),
            procedure: "given".to_string(),
        }
    }

    fn tempo(bpm: f64) -> TempoEstimate {
        TempoEstimate {
            average_bpm: bpm,
            relative_to_notated: 1.0,
            notated_bpm: Some(bpm),
            onset_seconds: None,
            source: "test".to_string(),
        }
    }

    fn quarter() -> Fraction {
        Fraction { num: 1, den: 4 }
    }

    /// Pitch track rendering `(frequency, seconds)` segments at 10 ms hop
    fn render(segments: &[(f64, f64)]) -> PitchTrack {
        let hop = 0.01;
        let mut freqs = Vec::new();
        for (f, d) in segments {
            let n = (d / hop).round() as usize;
            freqs.extend(std::iter::repeat(*f).take(n));
        }
        PitchTrack::from_frequencies(0.0, hop, &freqs).unwrap()
    }

    #[test]
    fn test_three_note_alignment() {
        let events = vec![
            ScoreEvent::note(1, sym("A4"), quarter(), 500.0),
            ScoreEvent::note(2, sym("C5"), quarter(), 500.0),
            ScoreEvent::note(3, sym("D5"), Fraction { num: 1, den: 2 }, 1000.0),
        ];
        let c5 = cent_to_hz(sym("C5").cents_from(&sym("A4")), 440.0);
        let d5 = cent_to_hz(sym("D5").cents_from(&sym("A4")), 440.0);
        let track = render(&[(440.0, 0.5), (c5, 0.5), (d5, 1.0)]);

        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        let result = aligner.align(&events, &track, &tonic(), &tempo(120.0)).unwrap();

        assert_eq!(result.links.len(), 3);
        let expected = [(0.0, 0.5), (0.5, 1.0), (1.0, 2.0)];
        for (link, (s, e)) in result.links.iter().zip(expected) {
            assert!((link.start_time - s).abs() < 1e-9, "{:?}", link);
            assert!((link.end_time - e).abs() < 1e-9, "{:?}", link);
        }
        assert!(result.total_cost < 1e-9);
        assert_eq!(result.aligned_fraction, 1.0);
    }

    #[test]
    fn test_octave_displaced_audio_aligns() {
        let events = vec![
            ScoreEvent::note(1, sym("A4"), quarter(), 500.0),
            ScoreEvent::note(2, sym("C5"), quarter(), 500.0),
        ];
        let c5 = cent_to_hz(sym("C5").cents_from(&sym("A4")), 440.0);
        let track = render(&[(220.0, 0.5), (c5 / 2.0, 0.5)]);

        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        let result = aligner.align(&events, &track, &tonic(), &tempo(120.0)).unwrap();
        assert_eq!(result.links.len(), 2);
        assert!((result.links[1].start_time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rubato_and_monotonicity() {
        let pitches = ["A4", "B4b1", "C5", "D5", "C5", "B4b1", "A4"];
        let events: Vec<ScoreEvent> = pitches
            .iter()
            .enumerate()
            .map(|(i, p)| ScoreEvent::note(i as u32 + 1, sym(p), quarter(), 500.0))
            .collect();
        // performed slower with uneven note lengths
        let lengths = [0.6, 0.7, 0.5, 0.8, 0.6, 0.55, 0.9];
        let segments: Vec<(f64, f64)> = pitches
            .iter()
            .zip(lengths)
            .map(|(p, d)| (cent_to_hz(sym(p).cents_from(&sym("A4")), 440.0), d))
            .collect();
        let track = render(&segments);

        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        let result = aligner.align(&events, &track, &tonic(), &tempo(100.0)).unwrap();
        assert_eq!(result.links.len(), pitches.len());
        assert!(is_monotone(&result.links));

        let mut boundary = 0.0;
        for (link, d) in result.links.iter().zip(lengths) {
            assert!((link.start_time - boundary).abs() < 0.021, "{:?}", link);
            boundary += d;
        }
    }

    #[test]
    fn test_band_follows_tempo_change() {
        // first half slower, second half faster than the estimated tempo;
        // the drift from the notated timeline exceeds the band
        let cycle = ["A4", "B4b1", "C5", "D5"];
        let pitches: Vec<&str> = (0..100).map(|i| cycle[i % 4]).collect();
        let events: Vec<ScoreEvent> = pitches
            .iter()
            .enumerate()
            .map(|(i, p)| ScoreEvent::note(i as u32 + 1, sym(p), quarter(), 500.0))
            .collect();
        let lengths: Vec<f64> = (0..100).map(|i| if i < 50 { 0.7 } else { 0.3 }).collect();
        let segments: Vec<(f64, f64)> = pitches
            .iter()
            .zip(&lengths)
            .map(|(p, d)| (cent_to_hz(sym(p).cents_from(&sym("A4")), 440.0), *d))
            .collect();
        let track = render(&segments);

        let config = AlignmentConfig {
            band_seconds: 5.0,
            ..Default::default()
        };
        let aligner = ScoreAudioAligner::new(config, quarter());
        let result = aligner.align(&events, &track, &tonic(), &tempo(120.0)).unwrap();
        assert_eq!(result.links.len(), 100);

        let mut boundary = 0.0;
        for (link, d) in result.links.iter().zip(&lengths) {
            assert!((link.start_time - boundary).abs() < 0.021, "{:?}", link);
            boundary += d;
        }
    }

    #[test]
    fn test_held_final_note_keeps_its_audio() {
        let events = vec![
            ScoreEvent::note(1, sym("A4"), quarter(), 500.0),
            ScoreEvent::note(2, sym("C5"), quarter(), 500.0),
            ScoreEvent::note(3, sym("A4"), quarter(), 500.0),
        ];
        let c5 = cent_to_hz(sym("C5").cents_from(&sym("A4")), 440.0);
        let track = render(&[(440.0, 0.5), (c5, 0.5), (440.0, 3.0)]);

        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        let result = aligner.align(&events, &track, &tonic(), &tempo(120.0)).unwrap();
        assert_eq!(result.links.len(), 3);
        let last = &result.links[2];
        assert!((last.start_time - 1.0).abs() < 1e-6, "{:?}", last);
        assert!((last.end_time - 4.0).abs() < 1e-6, "{:?}", last);
    }

    #[test]
    fn test_first_row_starts_at_estimated_onset() {
        let events = vec![
            ScoreEvent::note(1, sym("A4"), quarter(), 500.0),
            ScoreEvent::note(2, sym("C5"), quarter(), 500.0),
            ScoreEvent::note(3, sym("D5"), Fraction { num: 1, den: 2 }, 1000.0),
        ];
        let c5 = cent_to_hz(sym("C5").cents_from(&sym("A4")), 440.0);
        let d5 = cent_to_hz(sym("D5").cents_from(&sym("A4")), 440.0);
        // unscored voiced audio before the piece
        let track = render(&[(330.0, 3.0), (440.0, 0.5), (c5, 0.5), (d5, 1.0)]);

        let config = AlignmentConfig {
            band_seconds: 1.0,
            ..Default::default()
        };
        let aligner = ScoreAudioAligner::new(config, quarter());
        let with_onset = TempoEstimate {
            onset_seconds: Some(3.0),
            ..tempo(120.0)
        };
        let result = aligner.align(&events, &track, &tonic(), &with_onset).unwrap();
        let starts: Vec<f64> = result.links.iter().map(|l| l.start_time).collect();
        assert_eq!(starts.len(), 3);
        for (s, e) in starts.iter().zip([3.0, 3.5, 4.0]) {
            assert!((s - e).abs() < 1e-6, "{:?}", starts);
        }
    }

    #[test]
    fn test_silent_track_fails() {
        let events = vec![ScoreEvent::note(1, sym("A4"), quarter(), 500.0)];
        let track = PitchTrack::from_frequencies(0.0, 0.01, &[0.0; 100]).unwrap();
        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        assert!(matches!(
            aligner.align(&events, &track, &tonic(), &tempo(120.0)),
            Err(AnalysisError::AlignmentFailed(_))
        ));
    }

    #[test]
    fn test_mismatched_audio_fails() {
        let events: Vec<ScoreEvent> = (1..=8)
            .map(|i| ScoreEvent::note(i, sym("A4"), quarter(), 500.0))
            .collect();
        // a tritone away for the whole piece
        let track = render(&[(440.0 * 2f64.powf(0.5), 4.0)]);
        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        assert!(matches!(
            aligner.align(&events, &track, &tonic(), &tempo(120.0)),
            Err(AnalysisError::AlignmentFailed(_))
        ));
    }

    #[test]
    fn test_cancelled() {
        let events = vec![ScoreEvent::note(1, sym("A4"), quarter(), 500.0)];
        let track = render(&[(440.0, 0.5)]);
        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            aligner.align_with_cancel(&events, &track, &tonic(), &tempo(120.0), &cancel),
            Err(AnalysisError::Cancelled(_))
        ));
    }

    #[test]
    fn test_implausible_tempo() {
        let events = vec![ScoreEvent::note(1, sym("A4"), quarter(), 500.0)];
        let track = render(&[(440.0, 0.5)]);
        let aligner = ScoreAudioAligner::new(AlignmentConfig::default(), quarter());
        assert!(matches!(
            aligner.align(&events, &track, &tonic(), &tempo(0.0)),
            Err(AnalysisError::AlignmentPrerequisite(_))
        ));
    }
}
