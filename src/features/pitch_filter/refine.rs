//! Boundary refinement between adjacent aligned notes
//!
//! A boundary between two contiguous notes with different pitch classes is
//! moved to the sample that best separates their expected pitches. The
//! search stays inside a small window around the coarse boundary and always
//! leaves at least one sample in each note.

use crate::config::PitchFilterConfig;
use crate::features::alignment::AlignmentLink;
use crate::io::PitchTrack;
use crate::theory::{hz_to_cent, octave_wrapped_distance};

/// Links closer than this are treated as contiguous
const CONTIGUITY_TOLERANCE: f64 = 1e-6;

/// Minimum pitch-class difference in cents for a boundary to be refined
const MIN_PITCH_DIFFERENCE: f64 = 1.0;

/// Refine the boundaries of adjacent pitched links in place
///
/// Returns the number of boundaries that moved.
pub fn refine_boundaries(
    track: &PitchTrack,
    links: &mut [AlignmentLink],
    config: &PitchFilterConfig,
) -> usize {
    if track.is_empty() || links.len() < 2 {
        return 0;
    }
    let radius = (config.refine_window_seconds / track.hop_seconds).round() as usize;
    if radius == 0 {
        return 0;
    }
    let cents: Vec<Option<f64>> = track
        .samples
        .iter()
        .map(|s| hz_to_cent(s.frequency, 1.0, 0.0))
        .collect();

    let mut moved = 0;
    for i in 0..links.len() - 1 {
        let (left, right) = (&links[i], &links[i + 1]);
        if (left.end_time - right.start_time).abs() > CONTIGUITY_TOLERANCE {
            continue;
        }
        let (left_cents, right_cents) = match (
            left.expected_pitch_hz.and_then(|f| hz_to_cent(f, 1.0, 0.0)),
            right.expected_pitch_hz.and_then(|f| hz_to_cent(f, 1.0, 0.0)),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => continue,
        };
        if octave_wrapped_distance(left_cents, right_cents) < MIN_PITCH_DIFFERENCE {
            continue;
        }

        let first = track.index_at(left.start_time);
        let last = track.index_at(right.end_time);
        let boundary = track.index_at(left.end_time);
        if last < first + 2 || boundary <= first || boundary >= last {
            continue;
        }
        let lo = boundary.saturating_sub(radius).max(first + 1);
        let hi = (boundary + radius).min(last - 1);
        let window_start = boundary.saturating_sub(radius).max(first);
        let window_end = (boundary + radius).min(last);

        let distance = |k: usize, expected: f64| match cents[k] {
            Some(c) => octave_wrapped_distance(c, expected),
            None => config.unvoiced_distance_cents,
        };
        let cost = |b: usize| -> f64 {
            (window_start..b).map(|k| distance(k, left_cents)).sum::<f64>()
                + (b..window_end).map(|k| distance(k, right_cents)).sum::<f64>()
        };

        let mut best = boundary;
        let mut best_cost = cost(boundary);
        for b in lo..=hi {
            let c = cost(b);
            if c < best_cost {
                best = b;
                best_cost = c;
            }
        }
        if best != boundary {
            let time = track.samples[best].time;
            links[i].end_time = time;
            links[i + 1].start_time = time;
            moved += 1;
        }
    }
    log::debug!("Refined {} of {} note boundaries", moved, links.len() - 1);
    moved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(index: u32, start: f64, end: f64, hz: f64) -> AlignmentLink {
        AlignmentLink {
            score_index: index,
            start_time: start,
            end_time: end,
            symbol: None,
            expected_pitch_hz: Some(hz),
            performed_pitch_hz: None,
            cost: 0.0,
        }
    }

    #[test]
    fn test_boundary_moves_to_pitch_change() {
        // pitch changes at 0.55s, coarse boundary at 0.5s
        let freqs: Vec<f64> = (0..100).map(|i| if i < 55 { 220.0 } else { 330.0 }).collect();
        let track = PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap();
        let mut links = vec![link(1, 0.0, 0.5, 220.0), link(2, 0.5, 1.0, 330.0)];

        let moved = refine_boundaries(&track, &mut links, &PitchFilterConfig::default());
        assert_eq!(moved, 1);
        assert!((links[0].end_time - 0.55).abs() < 1e-9);
        assert_eq!(links[0].end_time, links[1].start_time);
    }

    #[test]
    fn test_exact_boundary_is_kept() {
        let freqs: Vec<f64> = (0..100).map(|i| if i < 50 { 220.0 } else { 330.0 }).collect();
        let track = PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap();
        let mut links = vec![link(1, 0.0, 0.5, 220.0), link(2, 0.5, 1.0, 330.0)];
        assert_eq!(refine_boundaries(&track, &mut links, &PitchFilterConfig::default()), 0);
        assert_eq!(links[0].end_time, 0.5);
    }

    #[test]
    fn test_each_note_keeps_a_sample() {
        // right note is never heard; boundary may not swallow it
        let freqs = vec![220.0; 20];
        let track = PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap();
        let mut links = vec![link(1, 0.0, 0.15, 220.0), link(2, 0.15, 0.2, 330.0)];
        refine_boundaries(&track, &mut links, &PitchFilterConfig::default());
        assert!(links[1].start_time < 0.2 - 1e-9);
        assert!(links[0].end_time <= links[1].start_time);
    }

    #[test]
    fn test_same_pitch_class_not_refined() {
        let freqs = vec![220.0; 100];
        let track = PitchTrack::from_frequencies(0.0, 0.01, &freqs).unwrap();
        let mut links = vec![link(1, 0.0, 0.5, 220.0), link(2, 0.5, 1.0, 440.0)];
        assert_eq!(refine_boundaries(&track, &mut links, &PitchFilterConfig::default()), 0);
    }
}
