//! Melodic progression (seyir) analysis
//!
//! Slides overlapping frames over the pitch track and describes each frame
//! by its average pitch, its pitch distribution and the stable pitches
//! (distribution peaks) played in it.
//!
//! # Frame duration
//!
//! Unless configured, the frame duration is the recording duration divided
//! by `min_num_frames`, rounded to a multiple of 5 seconds and clamped to
//! `[min_frame_seconds, max_frame_seconds]`. The first frame is centred on
//! the start of the track.

use crate::config::{DistributionConfig, MelodicProgressionConfig};
use crate::error::AnalysisError;
use crate::features::distribution::PitchDistribution;
use crate::io::PitchTrack;
use crate::theory::{cent_to_hz, hz_to_cent};
use serde::{Deserialize, Serialize};

/// Reference frequency of the intermediate cent scale
const REF_FREQ: f64 = 440.0;

/// Frequencies below this are treated as silence
const MIN_FREQ: f64 = 20.0;

/// Minimum stable pitch height relative to the frame maximum
const STABLE_PITCH_RATIO: f64 = 0.15;

/// Peak of a frame distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablePitch {
    /// Frequency in Hz
    pub frequency: f64,
    /// Scaled peak height
    pub value: f64,
}

/// Features of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionFrame {
    /// Start and end time in seconds
    pub time_interval: (f64, f64),
    /// Frame centre in seconds
    pub time_center: f64,
    /// Average voiced pitch in Hz, `None` for silent frames
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub average_pitch: Option<f64>,
    /// Stable pitches, highest first
    pub stable_pitches: Vec<StablePitch>,
    /// Frame distribution in Hz, scaled by voiced ratio and frame length
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pitch_distribution: Option<PitchDistribution>,
}

/// Melodic progression of a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodicProgression {
    /// Frame duration in seconds
    pub frame_seconds: f64,
    /// Hop between frames in seconds
    pub hop_seconds: f64,
    /// Frames in time order
    pub frames: Vec<ProgressionFrame>,
}

/// Frame duration for a recording of `duration` seconds
pub fn frame_duration(duration: f64, config: &MelodicProgressionConfig) -> f64 {
    if let Some(frame) = config.frame_seconds {
        return frame;
    }
    let raw = duration / config.min_num_frames as f64;
    let rounded = 5.0 * (raw / 5.0).round();
    rounded.clamp(config.min_frame_seconds, config.max_frame_seconds)
}

/// Compute the melodic progression of a pitch track
pub fn analyze(
    track: &PitchTrack,
    config: &MelodicProgressionConfig,
    distribution: &DistributionConfig,
) -> Result<MelodicProgression, AnalysisError> {
    track.validate()?;
    let frame = frame_duration(track.duration(), config);
    let hop = frame * config.hop_ratio;
    let t0 = track.start_time();
    let t_last = track.samples.last().map(|s| s.time).unwrap_or(t0);

    log::debug!(
        "Melodic progression: frame {:.1}s, hop {:.1}s over {:.1}s",
        frame,
        hop,
        track.duration()
    );

    let mut intervals = Vec::new();
    let mut tb = t0 - frame / 2.0;
    while tb < t_last {
        let interval = (tb.max(t0), (tb + frame).min(t_last));
        let center = (tb + frame / 2.0).max(t0).min(t_last);
        intervals.push((interval, center));
        tb += hop;
    }
    if intervals.is_empty() {
        intervals.push(((t0, t_last), t0));
    }

    let max_dur = intervals
        .iter()
        .map(|((a, b), _)| b - a)
        .fold(0.0f64, f64::max);

    let mut frames = Vec::with_capacity(intervals.len());
    for ((start, end), center) in intervals {
        let sliced: Vec<f64> = track
            .samples
            .iter()
            .filter(|s| s.time >= start && s.time < end)
            .map(|s| s.frequency)
            .collect();
        let cents: Vec<f64> = sliced
            .iter()
            .filter_map(|&f| hz_to_cent(f, REF_FREQ, MIN_FREQ))
            .collect();

        if cents.is_empty() {
            frames.push(ProgressionFrame {
                time_interval: (start, end),
                time_center: center,
                average_pitch: None,
                stable_pitches: Vec::new(),
                pitch_distribution: None,
            });
            continue;
        }

        let mut pd = PitchDistribution::from_cent_samples(
            &cents,
            distribution.kernel_width_cents,
            distribution.step_size_cents,
            Some(REF_FREQ),
        )?;
        pd.cent_to_hz()?;

        let max_val = pd.vals.iter().copied().fold(0.0f64, f64::max);
        let num_ratio = cents.len() as f64 / sliced.len() as f64;
        let time_ratio = if max_dur > 0.0 { (end - start) / max_dur } else { 1.0 };
        if max_val > 0.0 {
            for v in pd.vals.iter_mut() {
                *v *= num_ratio * time_ratio / max_val;
            }
        }

        let stable_pitches = pd
            .detect_peaks(STABLE_PITCH_RATIO)
            .into_iter()
            .map(|(i, v)| StablePitch {
                frequency: pd.bins[i],
                value: v,
            })
            .collect();
        let mean = cents.iter().sum::<f64>() / cents.len() as f64;

        frames.push(ProgressionFrame {
            time_interval: (start, end),
            time_center: center,
            average_pitch: Some(cent_to_hz(mean, REF_FREQ)),
            stable_pitches,
            pitch_distribution: Some(pd),
        });
    }

    Ok(MelodicProgression {
        frame_seconds: frame,
        hop_seconds: hop,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration_rule() {
        let config = MelodicProgressionConfig::default();
        // 400 s / 40 frames = 10 s
        assert_eq!(frame_duration(400.0, &config), 10.0);
        // short recordings use the minimum
        assert_eq!(frame_duration(30.0, &config), 5.0);
        // long recordings are capped
        assert_eq!(frame_duration(3600.0, &config), 30.0);
        // 13 s rounds to 15 s
        assert_eq!(frame_duration(520.0, &config), 15.0);

        let fixed = MelodicProgressionConfig {
            frame_seconds: Some(7.0),
            ..Default::default()
        };
        assert_eq!(frame_duration(400.0, &fixed), 7.0);
    }

    #[test]
    fn test_progression_follows_pitch() {
        // 20 s at 220 Hz then 20 s at 330 Hz
        let hop = 0.05;
        let mut freqs = vec![220.0; 400];
        freqs.extend(vec![330.0; 400]);
        let track = PitchTrack::from_frequencies(0.0, hop, &freqs).unwrap();

        let mp = analyze(
            &track,
            &MelodicProgressionConfig::default(),
            &DistributionConfig::default(),
        )
        .unwrap();
        assert_eq!(mp.frame_seconds, 5.0);
        assert!(!mp.frames.is_empty());

        let first = &mp.frames[0];
        assert!((first.average_pitch.unwrap() - 220.0).abs() < 0.5);
        let last = mp.frames.last().unwrap();
        assert!((last.average_pitch.unwrap() - 330.0).abs() < 0.5);
        assert!((last.stable_pitches[0].frequency - 330.0).abs() < 5.0);

        for w in mp.frames.windows(2) {
            assert!(w[0].time_center <= w[1].time_center);
        }
    }

    #[test]
    fn test_silent_frames() {
        let track = PitchTrack::from_frequencies(0.0, 0.1, &[0.0; 200]).unwrap();
        let mp = analyze(
            &track,
            &MelodicProgressionConfig::default(),
            &DistributionConfig::default(),
        )
        .unwrap();
        assert!(mp.frames.iter().all(|f| f.average_pitch.is_none()));
    }
}
