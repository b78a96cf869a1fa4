//! Feature extraction modules
//!
//! This module contains the analysis stages:
//! - Pitch distributions and peak picking
//! - Score-informed tonic and tempo estimation
//! - Score-to-audio alignment (dynamic programming)
//! - Aligned pitch filtering
//! - Aligned note models
//! - Melodic progression and transposition identification

pub mod alignment;
pub mod distribution;
pub mod melodic_progression;
pub mod note_model;
pub mod pitch_filter;
pub mod tonic_tempo;
pub mod transposition;

/// Median of the values, `None` when empty
///
/// Reorders `values`.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }
}
