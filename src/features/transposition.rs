//! Transposition (ahenk) identification
//!
//! The ahenk is the performed transposition of the notated tonic. It is the
//! distance from the bolahenk (concert) frequency of the tonic symbol to the
//! performed tonic, folded into one octave and rounded to the nearest
//! semitone.

use crate::config::TranspositionConfig;
use crate::error::AnalysisError;
use crate::theory::{hz_to_cent, NoteSymbol, CENTS_PER_OCTAVE};
use serde::{Deserialize, Serialize};

/// Lowest accepted tonic frequency
pub const MIN_TONIC_HZ: f64 = 20.0;

/// Highest accepted tonic frequency
pub const MAX_TONIC_HZ: f64 = 20000.0;

/// Folded distances at or above this wrap to negative values
const WRAP_CENTS: f64 = 1150.0;

/// Identified transposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transposition {
    /// Ahenk name, `None` for unnamed transpositions
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// Tonic symbol the transposition refers to
    pub tonic_symbol: NoteSymbol,
    /// Bolahenk frequency of the tonic symbol
    pub bolahenk_hz: f64,
    /// Performed distance to bolahenk in cents, within [-50, 1150)
    pub performed_cents: f64,
    /// Distance rounded to the nearest semitone
    pub theoretical_cents: i32,
    /// `theoretical_cents - performed_cents`
    pub deviation_cents: f64,
}

/// Bolahenk frequency of a symbol
pub fn bolahenk_frequency(
    symbol: &NoteSymbol,
    config: &TranspositionConfig,
) -> Result<f64, AnalysisError> {
    let reference: NoteSymbol = config.reference_symbol.parse()?;
    Ok(config.reference_hz * 2f64.powf(symbol.cents_from(&reference) / CENTS_PER_OCTAVE))
}

/// Identify the ahenk of a performed tonic
///
/// # Errors
///
/// `InvalidInput` when the tonic lies outside [20, 20000] Hz.
pub fn identify(
    tonic_hz: f64,
    tonic_symbol: &NoteSymbol,
    config: &TranspositionConfig,
) -> Result<Transposition, AnalysisError> {
    if !(MIN_TONIC_HZ..=MAX_TONIC_HZ).contains(&tonic_hz) {
        return Err(AnalysisError::InvalidInput(format!(
            "Tonic frequency {:.2} Hz outside [{}, {}] Hz",
            tonic_hz, MIN_TONIC_HZ, MAX_TONIC_HZ
        )));
    }

    let bolahenk_hz = bolahenk_frequency(tonic_symbol, config)?;
    let distance = hz_to_cent(tonic_hz, bolahenk_hz, 0.0).ok_or_else(|| {
        AnalysisError::NumericalError(format!("Cannot compare {} Hz to bolahenk", tonic_hz))
    })?;

    let mut folded = distance.rem_euclid(CENTS_PER_OCTAVE);
    if folded >= WRAP_CENTS {
        folded -= CENTS_PER_OCTAVE;
    }
    let theoretical = ((folded / 100.0 + 0.5).floor() * 100.0) as i32;
    let name = config
        .ahenk_names
        .iter()
        .find(|a| a.cents == theoretical)
        .map(|a| a.name.clone());

    log::debug!(
        "Transposition: {:.1} cents from bolahenk ({:?})",
        folded,
        name
    );

    Ok(Transposition {
        name,
        tonic_symbol: *tonic_symbol,
        bolahenk_hz,
        performed_cents: folded,
        theoretical_cents: theoretical,
        deviation_cents: theoretical as f64 - folded,
    })
}
