//! Makam theory lookup
//!
//! Maps a makam slug to its karar (tonic) symbol and the theoretical scale
//! degrees used when searching for performed note pitches.

use super::symbol::NoteSymbol;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Octaves below the karar covered by the degree table
const DEFAULT_OCTAVES_BELOW: i32 = 1;

/// Octaves above the karar covered by the degree table
const DEFAULT_OCTAVES_ABOVE: i32 = 2;

/// Theoretical description of a makam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTheory {
    /// Makam slug (e.g. "ussak")
    pub makam: String,

    /// Karar (tonic) symbol
    pub karar: NoteSymbol,

    /// Key signature; only letter and accidental are significant
    pub key_signature: Vec<NoteSymbol>,

    /// Scale degrees ordered by pitch
    pub degrees: Vec<NoteSymbol>,
}

impl ModeTheory {
    /// Build the degree table from a key signature
    ///
    /// Every natural note within the octave span around the karar is kept,
    /// replaced by its altered form when the key signature alters its letter.
    pub fn from_key_signature(
        makam: &str,
        karar: NoteSymbol,
        key_signature: Vec<NoteSymbol>,
        octaves_below: i32,
        octaves_above: i32,
    ) -> Result<Self, AnalysisError> {
        if octaves_below < 0 || octaves_above < 0 {
            return Err(AnalysisError::InvalidInput(
                "Octave span must be non-negative".to_string(),
            ));
        }

        let mut degrees = Vec::new();
        let low = karar.octave - octaves_below;
        let high = karar.octave + octaves_above;
        for octave in low..=high {
            for letter in ['C', 'D', 'E', 'F', 'G', 'A', 'B'] {
                let degree = match key_signature.iter().find(|k| k.letter == letter) {
                    Some(altered) => altered.with_octave(octave),
                    None => NoteSymbol::natural(letter, octave)?,
                };
                degrees.push(degree);
            }
        }

        // the karar itself must be a degree even when the signature disagrees
        if !degrees.contains(&karar) {
            degrees.push(karar);
        }
        degrees.sort_by_key(|d| d.commas());
        degrees.dedup();

        Ok(Self {
            makam: makam.to_string(),
            karar,
            key_signature,
            degrees,
        })
    }

    /// Theoretical intervals of all degrees relative to the karar, in cents
    pub fn intervals(&self) -> Vec<(NoteSymbol, f64)> {
        self.degrees
            .iter()
            .map(|d| (*d, d.cents_from(&self.karar)))
            .collect()
    }
}

/// Source of makam theory
pub trait ModeLookup {
    /// Look up a makam by slug
    fn mode(&self, makam: &str) -> Option<ModeTheory>;
}

/// Table of known makams
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TheoryTable {
    /// Makam slug to theory
    pub modes: BTreeMap<String, ModeTheory>,
}

impl TheoryTable {
    /// Built-in table covering common makams
    pub fn builtin() -> Self {
        let entries: [(&str, &str, &[&str]); 8] = [
            ("rast", "G4", &["B4b1", "F5#4"]),
            ("ussak", "A4", &["B4b1"]),
            ("huseyni", "A4", &["B4b1", "F5#4"]),
            ("hicaz", "A4", &["B4b4", "C5#4"]),
            ("nihavent", "G4", &["B4b4", "E5b4"]),
            ("segah", "B4b1", &["B4b1", "F5#4"]),
            ("saba", "A4", &["B4b1", "D5b4"]),
            ("kurdi", "A4", &["B4b4"]),
        ];

        let mut table = Self::default();
        for (makam, karar, signature) in entries {
            // built-in literals are well formed
            let karar: NoteSymbol = match karar.parse() {
                Ok(k) => k,
                Err(_) => continue,
            };
            let signature: Vec<NoteSymbol> =
                signature.iter().filter_map(|s| s.parse().ok()).collect();
            if let Ok(mode) = ModeTheory::from_key_signature(
                makam,
                karar,
                signature,
                DEFAULT_OCTAVES_BELOW,
                DEFAULT_OCTAVES_ABOVE,
            ) {
                table.insert(mode);
            }
        }
        table
    }

    /// Add or replace a makam
    pub fn insert(&mut self, mode: ModeTheory) {
        self.modes.insert(mode.makam.clone(), mode);
    }
}

impl ModeLookup for TheoryTable {
    fn mode(&self, makam: &str) -> Option<ModeTheory> {
        self.modes.get(makam).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_common_makams() {
        let table = TheoryTable::builtin();
        for makam in ["rast", "ussak", "huseyni", "hicaz", "nihavent", "segah", "saba", "kurdi"] {
            assert!(table.mode(makam).is_some(), "missing {}", makam);
        }
        assert!(table.mode("unknown").is_none());
    }

    #[test]
    fn test_degrees_use_key_signature() {
        let ussak = TheoryTable::builtin().mode("ussak").unwrap();
        let b4b1: NoteSymbol = "B4b1".parse().unwrap();
        let b4: NoteSymbol = "B4".parse().unwrap();
        assert!(ussak.degrees.contains(&b4b1));
        assert!(!ussak.degrees.contains(&b4));
        // 4 octaves of 7 degrees
        assert_eq!(ussak.degrees.len(), 28);
    }

    #[test]
    fn test_intervals_relative_to_karar() {
        let ussak = TheoryTable::builtin().mode("ussak").unwrap();
        let intervals = ussak.intervals();
        let karar = intervals.iter().find(|(s, _)| *s == ussak.karar).unwrap();
        assert!(karar.1.abs() < 1e-9);
        // sorted by pitch
        for w in intervals.windows(2) {
            assert!(w[0].1 < w[1].1);
        }
    }

    #[test]
    fn test_segah_karar_is_degree() {
        let segah = TheoryTable::builtin().mode("segah").unwrap();
        assert!(segah.degrees.contains(&segah.karar));
    }
}
