//! Pitch tracks
//!
//! A [`PitchTrack`] is the output of a predominant melody extractor: one
//! `(time, frequency, confidence)` sample per hop, with `frequency == 0`
//! marking unvoiced samples. Construction checks that times are strictly
//! increasing and evenly spaced, which every frame-based stage relies on.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Allowed deviation of a time step from the hop size, relative to the hop
const HOP_TOLERANCE: f64 = 0.05;

/// A single pitch estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchSample {
    /// Time in seconds
    pub time: f64,
    /// Fundamental frequency in Hz, 0 when unvoiced
    pub frequency: f64,
    /// Confidence or energy of the estimate
    pub confidence: f64,
}

impl PitchSample {
    /// True for a positive frequency
    pub fn is_voiced(&self) -> bool {
        self.frequency > 0.0
    }
}

/// Evenly spaced sequence of pitch samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchTrack {
    /// Recording the track was extracted from
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
    /// Time between consecutive samples in seconds
    pub hop_seconds: f64,
    /// Samples in time order
    pub samples: Vec<PitchSample>,
}

impl PitchTrack {
    /// Build a track from samples, inferring the hop size
    ///
    /// # Errors
    ///
    /// `InvalidInput` when fewer than two samples are given, times are not
    /// strictly increasing or unevenly spaced, or any value is not finite or
    /// a frequency is negative.
    pub fn from_samples(samples: Vec<PitchSample>) -> Result<Self, AnalysisError> {
        if samples.len() < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "Pitch track needs at least 2 samples, got {}",
                samples.len()
            )));
        }
        let n = samples.len();
        let hop = (samples[n - 1].time - samples[0].time) / (n - 1) as f64;
        let track = Self {
            source: None,
            hop_seconds: hop,
            samples,
        };
        track.validate()?;
        Ok(track)
    }

    /// Build a track from frequencies on a regular grid
    pub fn from_frequencies(
        start_time: f64,
        hop_seconds: f64,
        frequencies: &[f64],
    ) -> Result<Self, AnalysisError> {
        let samples = frequencies
            .iter()
            .enumerate()
            .map(|(i, &f)| PitchSample {
                time: start_time + i as f64 * hop_seconds,
                frequency: f,
                confidence: if f > 0.0 { 1.0 } else { 0.0 },
            })
            .collect();
        let track = Self {
            source: None,
            hop_seconds,
            samples,
        };
        track.validate()?;
        Ok(track)
    }

    /// Check the track invariants
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.hop_seconds.is_finite() && self.hop_seconds > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid hop size {}",
                self.hop_seconds
            )));
        }
        if self.samples.is_empty() {
            return Err(AnalysisError::InvalidInput("Empty pitch track".to_string()));
        }
        for (i, s) in self.samples.iter().enumerate() {
            if !s.time.is_finite() || !s.frequency.is_finite() || !s.confidence.is_finite() {
                return Err(AnalysisError::InvalidInput(format!(
                    "Non-finite value in pitch sample {}",
                    i
                )));
            }
            if s.frequency < 0.0 {
                return Err(AnalysisError::InvalidInput(format!(
                    "Negative frequency in pitch sample {}",
                    i
                )));
            }
        }
        for (i, w) in self.samples.windows(2).enumerate() {
            let step = w[1].time - w[0].time;
            if step <= 0.0 {
                return Err(AnalysisError::InvalidInput(format!(
                    "Pitch track times not strictly increasing at sample {}",
                    i + 1
                )));
            }
            if (step - self.hop_seconds).abs() > HOP_TOLERANCE * self.hop_seconds {
                return Err(AnalysisError::InvalidInput(format!(
                    "Uneven time step {:.6}s at sample {} (hop {:.6}s)",
                    step,
                    i + 1,
                    self.hop_seconds
                )));
            }
        }
        Ok(())
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True for a track without samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the first sample
    pub fn start_time(&self) -> f64 {
        self.samples.first().map(|s| s.time).unwrap_or(0.0)
    }

    /// End of the last sample (its time plus one hop)
    pub fn end_time(&self) -> f64 {
        self.samples
            .last()
            .map(|s| s.time + self.hop_seconds)
            .unwrap_or(0.0)
    }

    /// Covered duration in seconds
    pub fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    /// Number of voiced samples
    pub fn voiced_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_voiced()).count()
    }

    /// Indices of the first and last voiced samples
    pub fn voiced_bounds(&self) -> Option<(usize, usize)> {
        let first = self.samples.iter().position(|s| s.is_voiced())?;
        let last = self.samples.iter().rposition(|s| s.is_voiced())?;
        Some((first, last))
    }

    /// Frequencies of all samples
    pub fn frequencies(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.frequency).collect()
    }

    /// Voiced frequencies
    pub fn voiced_frequencies(&self) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|s| s.is_voiced())
            .map(|s| s.frequency)
            .collect()
    }

    /// Index of the first sample at or after `time`, clamped to the track
    pub fn index_at(&self, time: f64) -> usize {
        if self.samples.is_empty() {
            return 0;
        }
        let pos = ((time - self.start_time()) / self.hop_seconds - 1e-6).ceil();
        pos.max(0.0).min(self.samples.len() as f64) as usize
    }

    /// Same time grid with replaced frequencies
    pub fn with_frequencies(&self, frequencies: &[f64]) -> Result<Self, AnalysisError> {
        if frequencies.len() != self.samples.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "Expected {} frequencies, got {}",
                self.samples.len(),
                frequencies.len()
            )));
        }
        let samples = self
            .samples
            .iter()
            .zip(frequencies)
            .map(|(s, &f)| PitchSample {
                frequency: f,
                ..*s
            })
            .collect();
        Ok(Self {
            source: self.source.clone(),
            hop_seconds: self.hop_seconds,
            samples,
        })
    }

    /// Attach the name of the source recording
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// Parse a pitch track from text
///
/// One sample per line as `time frequency [confidence]`, separated by
/// whitespace or commas. Empty lines and lines starting with `#` are skipped.
pub fn parse_pitch_text(text: &str) -> Result<PitchTrack, AnalysisError> {
    let mut samples = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<f64> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .map(|f| f.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| {
                AnalysisError::InvalidInput(format!("Line {}: {}", line_no + 1, e))
            })?;
        let sample = match fields.as_slice() {
            [time, frequency] => PitchSample {
                time: *time,
                frequency: *frequency,
                confidence: if *frequency > 0.0 { 1.0 } else { 0.0 },
            },
            [time, frequency, confidence, ..] => PitchSample {
                time: *time,
                frequency: *frequency,
                confidence: *confidence,
            },
            _ => {
                return Err(AnalysisError::InvalidInput(format!(
                    "Line {}: expected at least time and frequency",
                    line_no + 1
                )))
            }
        };
        samples.push(sample);
    }
    PitchTrack::from_samples(samples)
}

/// Read a pitch track text file
pub fn read_pitch_track<P: AsRef<Path>>(path: P) -> Result<PitchTrack, AnalysisError> {
    let path = path.as_ref();
    log::debug!("Reading pitch track: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| {
        AnalysisError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
    })?;
    parse_pitch_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frequencies() {
        let track = PitchTrack::from_frequencies(0.0, 0.01, &[0.0, 440.0, 441.0, 0.0]).unwrap();
        assert_eq!(track.len(), 4);
        assert_eq!(track.voiced_count(), 2);
        assert_eq!(track.voiced_bounds(), Some((1, 2)));
        assert!((track.end_time() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_uneven_and_decreasing_times() {
        let mk = |t: f64| PitchSample {
            time: t,
            frequency: 100.0,
            confidence: 1.0,
        };
        assert!(PitchTrack::from_samples(vec![mk(0.0), mk(0.01), mk(0.05)]).is_err());
        assert!(PitchTrack::from_samples(vec![mk(0.0), mk(0.0), mk(0.01)]).is_err());
        assert!(PitchTrack::from_samples(vec![mk(0.0)]).is_err());
        assert!(PitchTrack::from_samples(vec![mk(0.0), mk(0.01), mk(0.02)]).is_ok());
    }

    #[test]
    fn test_rejects_negative_frequency() {
        assert!(PitchTrack::from_frequencies(0.0, 0.01, &[100.0, -1.0]).is_err());
        assert!(PitchTrack::from_frequencies(0.0, 0.01, &[100.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_index_at() {
        let track = PitchTrack::from_frequencies(0.0, 0.01, &[1.0; 100]).unwrap();
        assert_eq!(track.index_at(0.0), 0);
        assert_eq!(track.index_at(0.5), 50);
        assert_eq!(track.index_at(0.505), 51);
        assert_eq!(track.index_at(-1.0), 0);
        assert_eq!(track.index_at(10.0), 100);
    }

    #[test]
    fn test_parse_text() {
        let text = "# time freq conf\n0.00 0 0\n0.01, 220.5, 0.9\n\n0.02 221.0\n";
        let track = parse_pitch_text(text).unwrap();
        assert_eq!(track.len(), 3);
        assert!((track.samples[1].confidence - 0.9).abs() < 1e-12);
        assert!((track.hop_seconds - 0.01).abs() < 1e-12);

        assert!(parse_pitch_text("0.0 abc").is_err());
        assert!(parse_pitch_text("0.0").is_err());
    }
}
