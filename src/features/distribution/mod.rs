//! Pitch distributions
//!
//! Gaussian-smoothed histograms of pitch values. Distributions are built in
//! cents relative to a reference frequency and may be converted to Hz bins
//! or folded into a single octave (pitch-class distribution, PCD).
//!
//! # Example
//!
//! ```
//! use makam_joint::features::distribution::PitchDistribution;
//!
//! let pitches = vec![220.0; 100];
//! let pd = PitchDistribution::from_hz_samples(&pitches, 220.0, 7.5, 7.5).unwrap();
//! let peaks = pd.detect_peaks(0.1);
//! assert!(pd.bins[peaks[0].0].abs() < 7.5);
//! ```

pub mod peaks;

use crate::error::AnalysisError;
use crate::theory::{cent_to_hz, hz_to_cent, CENTS_PER_OCTAVE};
use serde::{Deserialize, Serialize};

/// Kernel support in standard deviations
const KERNEL_SUPPORT: f64 = 3.0;

/// Unit of the distribution bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinUnit {
    /// Cents relative to `ref_freq`
    Cent,
    /// Hertz
    Hz,
}

/// Smoothed pitch histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchDistribution {
    /// Bin centres
    pub bins: Vec<f64>,
    /// Normalised bin values (sum to 1)
    pub vals: Vec<f64>,
    /// Gaussian kernel width in cents
    pub kernel_width: f64,
    /// Bin width in cents
    pub step_size: f64,
    /// Reference frequency of the cent scale
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ref_freq: Option<f64>,
    /// Bin unit
    pub unit: BinUnit,
    /// Folded into one octave
    #[serde(default)]
    pub is_pcd: bool,
}

impl PitchDistribution {
    /// Build from pitch values in cents
    pub fn from_cent_samples(
        cents: &[f64],
        kernel_width: f64,
        step_size: f64,
        ref_freq: Option<f64>,
    ) -> Result<Self, AnalysisError> {
        if !(step_size > 0.0) || !(kernel_width >= 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid kernel width {} or step size {}",
                kernel_width, step_size
            )));
        }
        if cents.is_empty() {
            return Err(AnalysisError::InsufficientEvidence(
                "No pitch values for distribution".to_string(),
            ));
        }
        if cents.iter().any(|c| !c.is_finite()) {
            return Err(AnalysisError::NumericalError(
                "Non-finite pitch value in distribution".to_string(),
            ));
        }

        let radius = ((KERNEL_SUPPORT * kernel_width) / step_size).ceil() as i64;
        let min_c = cents.iter().copied().fold(f64::INFINITY, f64::min);
        let max_c = cents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let first = (min_c / step_size).round() as i64 - radius - 1;
        let last = (max_c / step_size).round() as i64 + radius + 1;
        let n = (last - first + 1) as usize;

        let mut hist = vec![0.0; n];
        for &c in cents {
            let idx = ((c / step_size).round() as i64 - first) as usize;
            hist[idx] += 1.0;
        }

        let vals = smooth(&hist, kernel_width, step_size, radius);
        let bins = (0..n).map(|i| (first + i as i64) as f64 * step_size).collect();

        Ok(Self {
            bins,
            vals: normalize(vals),
            kernel_width,
            step_size,
            ref_freq,
            unit: BinUnit::Cent,
            is_pcd: false,
        })
    }

    /// Build from frequencies in Hz, ignoring unvoiced (zero) values
    pub fn from_hz_samples(
        pitches_hz: &[f64],
        ref_freq: f64,
        kernel_width: f64,
        step_size: f64,
    ) -> Result<Self, AnalysisError> {
        if !(ref_freq > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid reference frequency {}",
                ref_freq
            )));
        }
        let cents: Vec<f64> = pitches_hz
            .iter()
            .filter_map(|&f| hz_to_cent(f, ref_freq, 0.0))
            .collect();
        Self::from_cent_samples(&cents, kernel_width, step_size, Some(ref_freq))
    }

    /// Convert cent bins to Hz
    pub fn cent_to_hz(&mut self) -> Result<(), AnalysisError> {
        if self.unit != BinUnit::Cent {
            return Err(AnalysisError::InvalidInput("Bins are already in Hz".to_string()));
        }
        if self.is_pcd {
            return Err(AnalysisError::InvalidInput(
                "Pitch-class distributions cannot be converted to Hz".to_string(),
            ));
        }
        let ref_freq = self.ref_freq.ok_or_else(|| {
            AnalysisError::InvalidInput("No reference frequency for Hz conversion".to_string())
        })?;
        for b in self.bins.iter_mut() {
            *b = cent_to_hz(*b, ref_freq);
        }
        self.unit = BinUnit::Hz;
        Ok(())
    }

    /// Convert Hz bins to cents relative to `ref_freq`
    pub fn hz_to_cent(&mut self, ref_freq: f64) -> Result<(), AnalysisError> {
        if self.unit != BinUnit::Hz {
            return Err(AnalysisError::InvalidInput("Bins are already in cents".to_string()));
        }
        if !(ref_freq > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid reference frequency {}",
                ref_freq
            )));
        }
        let mut bins = Vec::with_capacity(self.bins.len());
        for &b in &self.bins {
            bins.push(hz_to_cent(b, ref_freq, 0.0).ok_or_else(|| {
                AnalysisError::NumericalError(format!("Cannot convert bin {} Hz to cents", b))
            })?);
        }
        self.bins = bins;
        self.ref_freq = Some(ref_freq);
        self.unit = BinUnit::Cent;
        Ok(())
    }

    /// Fold a cent distribution into one octave
    pub fn to_pcd(&self) -> Result<Self, AnalysisError> {
        if self.unit != BinUnit::Cent {
            return Err(AnalysisError::InvalidInput(
                "Pitch-class distribution requires cent bins".to_string(),
            ));
        }
        if self.is_pcd {
            return Ok(self.clone());
        }
        let n = (CENTS_PER_OCTAVE / self.step_size).round().max(1.0) as usize;
        let mut vals = vec![0.0; n];
        for (&b, &v) in self.bins.iter().zip(&self.vals) {
            let idx = (b.rem_euclid(CENTS_PER_OCTAVE) / self.step_size).round() as usize % n;
            vals[idx] += v;
        }
        Ok(Self {
            bins: (0..n).map(|i| i as f64 * self.step_size).collect(),
            vals: normalize(vals),
            kernel_width: self.kernel_width,
            step_size: self.step_size,
            ref_freq: self.ref_freq,
            unit: BinUnit::Cent,
            is_pcd: true,
        })
    }

    /// Peaks as (bin index, value), highest first
    ///
    /// Pitch-class distributions wrap around the octave boundary.
    pub fn detect_peaks(&self, min_peak_ratio: f64) -> Vec<(usize, f64)> {
        if !self.is_pcd {
            return peaks::find_peaks(&self.vals, min_peak_ratio, 1);
        }
        // pad one bin on each side so the boundary bins can be peaks
        let n = self.vals.len();
        if n < 3 {
            return peaks::find_peaks(&self.vals, min_peak_ratio, 1);
        }
        let mut padded = Vec::with_capacity(n + 2);
        padded.push(self.vals[n - 1]);
        padded.extend_from_slice(&self.vals);
        padded.push(self.vals[0]);
        peaks::find_peaks(&padded, min_peak_ratio, 1)
            .into_iter()
            .filter(|(i, _)| *i >= 1 && *i <= n)
            .map(|(i, v)| (i - 1, v))
            .collect()
    }

    /// Bin positions of the peaks, highest first
    pub fn peak_positions(&self, min_peak_ratio: f64) -> Vec<f64> {
        self.detect_peaks(min_peak_ratio)
            .into_iter()
            .map(|(i, _)| self.bins[i])
            .collect()
    }

    /// Bins within `[lo, hi]`, renormalised
    ///
    /// Returns the window and the share of the total mass it holds, or
    /// `None` when the window holds no mass.
    pub fn window(&self, lo: f64, hi: f64) -> Option<(Self, f64)> {
        let (bins, vals): (Vec<f64>, Vec<f64>) = self
            .bins
            .iter()
            .zip(&self.vals)
            .filter(|(b, _)| (lo..=hi).contains(*b))
            .map(|(b, v)| (*b, *v))
            .unzip();
        let mass: f64 = vals.iter().sum();
        if !(mass > 0.0) {
            return None;
        }
        let total: f64 = self.vals.iter().sum();
        let window = Self {
            bins,
            vals: normalize(vals),
            ..self.clone()
        };
        Some((window, mass / total))
    }

    /// Value of the bin nearest to `position`, zero outside the range
    pub fn value_at(&self, position: f64) -> f64 {
        let pos = if self.is_pcd {
            position.rem_euclid(CENTS_PER_OCTAVE)
        } else {
            position
        };
        self.bins
            .iter()
            .zip(&self.vals)
            .filter(|(b, _)| (*b - pos).abs() <= self.step_size / 2.0)
            .map(|(_, v)| *v)
            .next()
            .unwrap_or(0.0)
    }
}

fn smooth(hist: &[f64], kernel_width: f64, step_size: f64, radius: i64) -> Vec<f64> {
    if kernel_width <= 0.0 || radius == 0 {
        return hist.to_vec();
    }
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|j| {
            let x = j as f64 * step_size / kernel_width;
            (-0.5 * x * x).exp()
        })
        .collect();
    let n = hist.len() as i64;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let j = i + k as i64 - radius;
                    if (0..n).contains(&j) {
                        Some(hist[j as usize] * w)
                    } else {
                        None
                    }
                })
                .sum()
        })
        .collect()
}

fn normalize(mut vals: Vec<f64>) -> Vec<f64> {
    let sum: f64 = vals.iter().sum();
    if sum > 0.0 {
        for v in vals.iter_mut() {
            *v /= sum;
        }
    }
    vals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_at_sample_values() {
        let mut cents = vec![0.0; 100];
        cents.extend(vec![700.0; 50]);
        let pd = PitchDistribution::from_cent_samples(&cents, 7.5, 7.5, Some(220.0)).unwrap();
        assert!((pd.vals.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let peaks = pd.peak_positions(0.1);
        assert_eq!(peaks.len(), 2);
        assert!(peaks[0].abs() < 1e-9);
        assert!((peaks[1] - 700.0).abs() < 7.5);
    }

    #[test]
    fn test_window_mass() {
        let mut cents = vec![0.0; 75];
        cents.extend(vec![700.0; 25]);
        let pd = PitchDistribution::from_cent_samples(&cents, 7.5, 7.5, Some(220.0)).unwrap();

        let (window, share) = pd.window(650.0, 750.0).unwrap();
        assert!((share - 0.25).abs() < 1e-6);
        assert!((window.vals.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(window.bins.iter().all(|b| (650.0..=750.0).contains(b)));
        assert_eq!(window.ref_freq, Some(220.0));
        assert!(pd.window(300.0, 400.0).is_none());
    }

    #[test]
    fn test_unit_conversion() {
        let pd = PitchDistribution::from_hz_samples(&[220.0, 0.0, 440.0], 220.0, 0.0, 10.0).unwrap();
        let mut hz = pd.clone();
        hz.cent_to_hz().unwrap();
        assert_eq!(hz.unit, BinUnit::Hz);
        assert!(hz.cent_to_hz().is_err());

        let peaks = hz.peak_positions(0.1);
        assert!(peaks.iter().any(|p| (p - 440.0).abs() < 1e-6));

        hz.hz_to_cent(220.0).unwrap();
        for (a, b) in hz.bins.iter().zip(&pd.bins) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pcd_folds_octaves() {
        let cents = vec![0.0, 1200.0, 2400.0, -1200.0, 500.0];
        let pd = PitchDistribution::from_cent_samples(&cents, 0.0, 10.0, Some(100.0)).unwrap();
        let pcd = pd.to_pcd().unwrap();
        assert!(pcd.is_pcd);
        assert_eq!(pcd.bins.len(), 120);
        assert!((pcd.vals[0] - 0.8).abs() < 1e-9);
        assert!((pcd.value_at(1700.0) - 0.2).abs() < 1e-9);
        let mut pcd = pcd;
        assert!(pcd.cent_to_hz().is_err());
    }

    #[test]
    fn test_pcd_peak_at_octave_boundary() {
        let cents = vec![0.0; 10];
        let pd = PitchDistribution::from_cent_samples(&cents, 7.5, 7.5, None).unwrap();
        let pcd = pd.to_pcd().unwrap();
        let peaks = pcd.detect_peaks(0.1);
        assert_eq!(peaks[0].0, 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            PitchDistribution::from_hz_samples(&[0.0, 0.0], 220.0, 7.5, 7.5),
            Err(AnalysisError::InsufficientEvidence(_))
        ));
    }
}
