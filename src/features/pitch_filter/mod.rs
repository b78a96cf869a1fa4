//! Aligned pitch filtering
//!
//! Cleans a pitch track with the note-level alignment.
//!
//! # Algorithm
//!
//! 1. Refine the boundaries between contiguous notes with different pitch
//!    classes (see [`refine`])
//! 2. Inside every aligned note, snap samples that lie within a tolerance of
//!    an octave multiple of the expected pitch to the notated octave
//! 3. Mark all other samples inside aligned notes unvoiced, including every
//!    sample inside an aligned rest
//! 4. Update the performed pitch of each link to the median of its
//!    filtered samples
//!
//! Samples outside all links are left untouched; the time grid never changes.

pub mod refine;

use crate::config::PitchFilterConfig;
use crate::error::AnalysisError;
use crate::features::alignment::AlignmentLink;
use crate::features::median;
use crate::io::PitchTrack;

pub use refine::refine_boundaries;

/// Pitch filter driven by a score alignment
#[derive(Debug, Clone, Default)]
pub struct AlignedPitchFilter {
    config: PitchFilterConfig,
}

impl AlignedPitchFilter {
    /// Create a filter
    pub fn new(config: PitchFilterConfig) -> Self {
        Self { config }
    }

    /// Filter the track and refine the links
    ///
    /// Returns the filtered track on the same time grid and the refined
    /// links in the same order. Empty `links` return the track unchanged.
    pub fn filter(
        &self,
        track: &PitchTrack,
        links: &[AlignmentLink],
    ) -> Result<(PitchTrack, Vec<AlignmentLink>), AnalysisError> {
        if links.is_empty() {
            log::debug!("No aligned notes; pitch track left unchanged");
            return Ok((track.clone(), Vec::new()));
        }
        track.validate()?;

        let mut refined = links.to_vec();
        refine_boundaries(track, &mut refined, &self.config);

        let mut frequencies = track.frequencies();
        let mut snapped = 0usize;
        let mut silenced = 0usize;
        for link in &refined {
            let range = track.index_at(link.start_time)..track.index_at(link.end_time);
            for f in &mut frequencies[range] {
                if *f <= 0.0 {
                    continue;
                }
                match link.expected_pitch_hz.and_then(|e| self.snap(*f, e)) {
                    Some(corrected) => {
                        if (corrected - *f).abs() > f64::EPSILON {
                            snapped += 1;
                        }
                        *f = corrected;
                    }
                    None => {
                        *f = 0.0;
                        silenced += 1;
                    }
                }
            }
        }

        for link in &mut refined {
            let range = track.index_at(link.start_time)..track.index_at(link.end_time);
            let mut voiced: Vec<f64> = frequencies[range]
                .iter()
                .copied()
                .filter(|f| *f > 0.0)
                .collect();
            link.performed_pitch_hz = median(&mut voiced);
        }

        log::debug!(
            "Pitch filter: {} samples moved by octaves, {} marked unvoiced",
            snapped,
            silenced
        );
        Ok((track.with_frequencies(&frequencies)?, refined))
    }

    /// Frequency moved to the octave of `expected`, `None` when unrelated
    fn snap(&self, frequency: f64, expected: f64) -> Option<f64> {
        if expected <= 0.0 {
            return None;
        }
        let ratio = (frequency / expected).log2();
        let octaves = ratio.round();
        let deviation = (ratio - octaves) * 1200.0;
        if deviation.abs() <= self.config.tolerance_cents
            && octaves.abs() <= self.config.max_octave_shift as f64
        {
            Some(frequency / 2f64.powf(octaves))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(index: u32, start: f64, end: f64, hz: Option<f64>) -> AlignmentLink {
        AlignmentLink {
            score_index: index,
            start_time: start,
            end_time: end,
            symbol: None,
            expected_pitch_hz: hz,
            performed_pitch_hz: None,
            cost: 0.0,
        }
    }

    #[test]
    fn test_empty_links_return_input() {
        let track = PitchTrack::from_frequencies(0.0, 0.01, &[100.0, 200.0, 0.0]).unwrap();
        let (filtered, links) = AlignedPitchFilter::default().filter(&track, &[]).unwrap();
        assert_eq!(filtered, track);
        assert!(links.is_empty());
    }

    #[test]
    fn test_octave_errors_are_folded() {
        // 220 Hz note sung with octave jumps and one outlier
        let mut freqs = vec![220.0; 50];
        freqs[10] = 440.0;
        freqs[20] = 110.0;
        freqs[30] = 300.0;
        let track = PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap();
        let links = vec![link(1, 0.0, 0.5, Some(220.0))];

        let (filtered, refined) = AlignedPitchFilter::default().filter(&track, &links).unwrap();
        assert_eq!(filtered.samples[10].frequency, 220.0);
        assert_eq!(filtered.samples[20].frequency, 220.0);
        assert_eq!(filtered.samples[30].frequency, 0.0);
        assert_eq!(refined[0].performed_pitch_hz, Some(220.0));
    }

    #[test]
    fn test_shift_limit_and_rests() {
        let mut freqs = vec![220.0; 40];
        freqs[5] = 220.0 * 8.0;
        let track = PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap();
        let links = vec![link(1, 0.0, 0.2, Some(220.0)), link(2, 0.2, 0.3, None)];

        let (filtered, refined) = AlignedPitchFilter::default().filter(&track, &links).unwrap();
        // three octaves exceed the default limit of two
        assert_eq!(filtered.samples[5].frequency, 0.0);
        // rest is silenced, samples after the last link are untouched
        assert!(filtered.samples[20..30].iter().all(|s| s.frequency == 0.0));
        assert!(filtered.samples[30..].iter().all(|s| s.frequency == 220.0));
        assert_eq!(refined[1].performed_pitch_hz, None);
        assert_eq!(filtered.len(), track.len());
    }
}
