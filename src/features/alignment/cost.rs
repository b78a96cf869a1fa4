//! Alignment costs
//!
//! Frame-level pitch costs are computed modulo octave: a frame one octave
//! away from the notated pitch only pays `octave_penalty`. Duration costs are
//! squared log-ratios scaled so that a deviation of `rubato_tolerance` costs 1.
//! Beyond that a stretched event grows only linearly, so a held note stays
//! cheaper than the voiced audio it would otherwise leave unaligned.

use crate::config::AlignmentConfig;
use crate::features::median;
use crate::io::PitchTrack;
use crate::theory::{hz_to_cent, octave_offset, octave_wrapped_distance, NoteSymbol};

/// Frequencies below this are treated as unvoiced
const MIN_FREQ: f64 = 20.0;

/// A score event to align
#[derive(Debug, Clone)]
pub struct Target {
    /// Score index
    pub index: u32,
    /// Notated pitch, `None` for rests
    pub symbol: Option<NoteSymbol>,
    /// Notated pitch relative to the tonic in cents
    pub interval_cents: Option<f64>,
    /// Expected duration at the estimated tempo in seconds
    pub expected_seconds: f64,
}

/// Decimated pitch track
#[derive(Debug, Clone)]
pub struct Frames {
    /// Median voiced pitch per frame in cents relative to the tonic
    pub pitch: Vec<Option<f64>>,
    /// Frame boundary times, one more than frames
    pub bounds: Vec<f64>,
    /// Pitch samples per frame
    pub samples_per_frame: usize,
}

impl Frames {
    /// Group consecutive samples into frames of about `frame_seconds`
    ///
    /// A frame is voiced when at least half of its samples are voiced.
    pub fn from_track(track: &PitchTrack, tonic_hz: f64, frame_seconds: f64) -> Self {
        let k = ((frame_seconds / track.hop_seconds).round() as usize).max(1);
        let n = track.samples.len();
        let num_frames = (n + k - 1) / k;

        let mut pitch = Vec::with_capacity(num_frames);
        let mut bounds = Vec::with_capacity(num_frames + 1);
        for f in 0..num_frames {
            let group = &track.samples[f * k..((f + 1) * k).min(n)];
            bounds.push(group[0].time);
            let mut cents: Vec<f64> = group
                .iter()
                .filter_map(|s| hz_to_cent(s.frequency, tonic_hz, MIN_FREQ))
                .collect();
            pitch.push(if cents.len() * 2 >= group.len() {
                median(&mut cents)
            } else {
                None
            });
        }
        bounds.push(track.end_time());

        Self {
            pitch,
            bounds,
            samples_per_frame: k,
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.pitch.len()
    }

    /// True without frames
    pub fn is_empty(&self) -> bool {
        self.pitch.is_empty()
    }

    /// Duration of frame `f` in seconds
    pub fn weight(&self, f: usize) -> f64 {
        self.bounds[f + 1] - self.bounds[f]
    }

    /// First pitch sample of frame boundary `b`
    pub fn sample_index(&self, b: usize, num_samples: usize) -> usize {
        (b * self.samples_per_frame).min(num_samples)
    }

    /// True when any frame is voiced
    pub fn has_voiced(&self) -> bool {
        self.pitch.iter().any(|p| p.is_some())
    }
}

/// Cost functions parameterised by the alignment configuration
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    config: &'a AlignmentConfig,
}

impl<'a> CostModel<'a> {
    /// Wrap a configuration
    pub fn new(config: &'a AlignmentConfig) -> Self {
        Self { config }
    }

    /// Cost of one frame inside an event, per second
    pub fn frame_cost(&self, interval_cents: Option<f64>, frame: Option<f64>) -> f64 {
        match (interval_cents, frame) {
            (Some(expected), Some(observed)) => {
                let d = octave_wrapped_distance(observed, expected);
                let mismatch = (d / self.config.pitch_tolerance_cents).powi(2).min(1.0);
                if octave_offset(observed, expected) != 0 {
                    mismatch + self.config.octave_penalty
                } else {
                    mismatch
                }
            }
            (Some(_), None) => self.config.unvoiced_cost,
            (None, Some(_)) => self.config.rest_voiced_cost,
            (None, None) => 0.0,
        }
    }

    /// Cost of a voiced frame outside every event, per second
    pub fn unaligned_cost(&self, frame: Option<f64>) -> f64 {
        if frame.is_some() {
            self.config.unaligned_voiced_cost
        } else {
            0.0
        }
    }

    /// Cost of performing an event of `expected` seconds in `actual` seconds
    pub fn duration_cost(&self, actual: f64, expected: f64) -> f64 {
        if actual <= 0.0 || expected <= 0.0 {
            return f64::INFINITY;
        }
        let scale = (1.0 + self.config.rubato_tolerance).ln();
        let x = (actual / expected).ln() / scale;
        if x > 1.0 {
            2.0 * x - 1.0
        } else {
            x * x
        }
    }

    /// Cost of an interval given its summed frame cost and duration
    pub fn segment_cost(&self, pitch_sum: f64, actual: f64, expected: f64) -> f64 {
        self.config.pitch_weight * pitch_sum
            + self.config.duration_weight * self.duration_cost(actual, expected)
    }

    /// Cost of leaving an event unaligned
    pub fn skip_penalty(&self) -> f64 {
        self.config.skip_penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_cost_modulo_octave() {
        let config = AlignmentConfig::default();
        let model = CostModel::new(&config);

        assert_eq!(model.frame_cost(Some(0.0), Some(0.0)), 0.0);
        // octave displacement is nearly free
        let octave = model.frame_cost(Some(0.0), Some(1200.0));
        assert!((octave - config.octave_penalty).abs() < 1e-12);
        // half the tolerance costs a quarter
        assert!((model.frame_cost(Some(0.0), Some(20.0)) - 0.25).abs() < 1e-12);
        // far away saturates
        assert_eq!(model.frame_cost(Some(0.0), Some(300.0)), 1.0);
    }

    #[test]
    fn test_frame_cost_voicing() {
        let config = AlignmentConfig::default();
        let model = CostModel::new(&config);
        assert_eq!(model.frame_cost(Some(0.0), None), config.unvoiced_cost);
        assert_eq!(model.frame_cost(None, Some(100.0)), config.rest_voiced_cost);
        assert_eq!(model.frame_cost(None, None), 0.0);
        assert_eq!(model.unaligned_cost(None), 0.0);
    }

    #[test]
    fn test_duration_cost() {
        let config = AlignmentConfig::default();
        let model = CostModel::new(&config);
        assert_eq!(model.duration_cost(0.5, 0.5), 0.0);
        let stretched = model.duration_cost(0.75, 0.5);
        assert!((stretched - 1.0).abs() < 1e-9);
        // symmetric in log scale within the tolerance
        assert!((model.duration_cost(0.6, 0.5) - model.duration_cost(0.5 / 1.2, 0.5)).abs() < 1e-9);
        assert!(model.duration_cost(0.0, 0.5).is_infinite());
    }

    #[test]
    fn test_holding_costs_less_than_shrinking() {
        let config = AlignmentConfig::default();
        let model = CostModel::new(&config);
        assert!(model.duration_cost(1.0, 0.5) < model.duration_cost(0.25, 0.5));

        // a final note held six times its value, against cutting it at 0.7 s
        // and leaving 2.3 s of voiced audio unaligned
        let held = config.duration_weight * model.duration_cost(3.0, 0.5);
        let cut = config.duration_weight * model.duration_cost(0.7, 0.5)
            + 2.3 * config.unaligned_voiced_cost;
        assert!(held < cut, "held {} cut {}", held, cut);

        // linear growth beyond the tolerance
        let a = model.duration_cost(2.0, 0.5) - model.duration_cost(1.0, 0.5);
        let b = model.duration_cost(4.0, 0.5) - model.duration_cost(2.0, 0.5);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_frames_from_track() {
        let track = PitchTrack::from_frequencies(0.0, 0.01, &[440.0, 440.0, 0.0, 0.0, 880.0]).unwrap();
        let frames = Frames::from_track(&track, 440.0, 0.02);
        assert_eq!(frames.samples_per_frame, 2);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.pitch[0], Some(0.0));
        assert_eq!(frames.pitch[1], None);
        assert!((frames.pitch[2].unwrap() - 1200.0).abs() < 1e-9);
        assert!((frames.bounds[3] - 0.05).abs() < 1e-12);
        assert!((frames.weight(2) - 0.01).abs() < 1e-12);
    }
}
