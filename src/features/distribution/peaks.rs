//! Peak detection on distributions
//!
//! Finds local maxima of a smoothed histogram. Used for stable pitches
//! (note models, melodic progression) and tonic candidates.

const EPSILON: f64 = 1e-12;

/// Find peaks in a signal
///
/// Detects local maxima at least `min_ratio` times the global maximum and
/// separated by at least `min_distance` bins.
///
/// # Arguments
///
/// * `signal` - Signal to find peaks in
/// * `min_ratio` - Minimum peak height relative to the maximum (0.0-1.0)
/// * `min_distance` - Minimum distance between peaks (in bins)
///
/// # Returns
///
/// Vector of (index, value) pairs, sorted by value (highest first)
///
/// # Algorithm
///
/// 1. Find all local maxima (strictly above the left neighbour, not below the right one)
/// 2. Filter by the relative threshold
/// 3. Enforce minimum distance (keep highest peak when too close)
/// 4. Sort by value
///
/// # Example
///
/// ```
/// use makam_joint::features::distribution::peaks::find_peaks;
///
/// let signal = vec![0.0, 0.5, 1.0, 0.7, 0.3, 0.9, 0.2];
/// let peaks = find_peaks(&signal, 0.5, 2);
/// assert_eq!(peaks[0].0, 2);
/// assert_eq!(peaks[1].0, 5);
/// ```
pub fn find_peaks(signal: &[f64], min_ratio: f64, min_distance: usize) -> Vec<(usize, f64)> {
    if signal.len() < 3 {
        return vec![];
    }

    let max_value = signal.iter().copied().fold(0.0f64, f64::max);
    if max_value < EPSILON {
        return vec![];
    }
    let threshold = max_value * min_ratio.clamp(0.0, 1.0);

    let mut peaks = Vec::new();
    for i in 1..(signal.len() - 1) {
        let value = signal[i];
        // plateaus report their first bin
        if value > signal[i - 1] && value >= signal[i + 1] && value >= threshold {
            peaks.push((i, value));
        }
    }

    let last = signal.len() - 1;
    if signal[0] > signal[1] && signal[0] >= threshold {
        peaks.push((0, signal[0]));
    }
    if signal[last] > signal[last - 1] && signal[last] >= threshold {
        peaks.push((last, signal[last]));
    }

    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if min_distance > 1 && peaks.len() > 1 {
        let mut kept: Vec<(usize, f64)> = Vec::with_capacity(peaks.len());
        for (idx, value) in peaks {
            let too_close = kept
                .iter()
                .any(|(k, _)| (idx as i64 - *k as i64).unsigned_abs() < min_distance as u64);
            if !too_close {
                kept.push((idx, value));
            }
        }
        peaks = kept;
    }

    log::debug!("Found {} peaks in {} bins", peaks.len(), signal.len());
    peaks
}
