//! AEU note symbols
//!
//! Notes are written as a natural letter, an octave and an optional
//! accidental with its size in Holderian commas, e.g. `A4`, `B4b1`, `F5#4`.
//! An octave is divided into 53 commas; the natural notes sit at
//! C=0, D=9, E=18, F=22, G=31, A=40 and B=49 commas.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of Holderian commas in an octave
pub const COMMAS_PER_OCTAVE: i32 = 53;

/// Cents in an octave
pub const CENTS_PER_OCTAVE: f64 = 1200.0;

/// Size of a single Holderian comma in cents
pub const CENTS_PER_COMMA: f64 = CENTS_PER_OCTAVE / COMMAS_PER_OCTAVE as f64;

const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
const NATURAL_COMMAS: [i32; 7] = [0, 9, 18, 22, 31, 40, 49];

/// Accidental applied to a natural note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Accidental {
    /// Lowered by the given number of commas
    Flat(u8),
    /// Raised by the given number of commas
    Sharp(u8),
}

impl Accidental {
    fn offset(&self) -> i32 {
        match self {
            Accidental::Flat(c) => -(*c as i32),
            Accidental::Sharp(c) => *c as i32,
        }
    }
}

/// A notated pitch in the AEU system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteSymbol {
    /// Natural letter (C, D, E, F, G, A or B)
    pub letter: char,
    /// Octave number
    pub octave: i32,
    /// Optional accidental
    pub accidental: Option<Accidental>,
}

impl NoteSymbol {
    /// Create a natural note symbol
    pub fn natural(letter: char, octave: i32) -> Result<Self, AnalysisError> {
        letter_index(letter)?;
        Ok(Self {
            letter,
            octave,
            accidental: None,
        })
    }

    /// Position in commas counted from C0
    pub fn commas(&self) -> i32 {
        // letter is validated on construction
        let idx = LETTERS.iter().position(|&l| l == self.letter).unwrap_or(0);
        self.octave * COMMAS_PER_OCTAVE
            + NATURAL_COMMAS[idx]
            + self.accidental.map(|a| a.offset()).unwrap_or(0)
    }

    /// Theoretical interval from `reference` to this note in cents
    ///
    /// # Example
    ///
    /// ```
    /// use makam_joint::theory::NoteSymbol;
    ///
    /// let a4: NoteSymbol = "A4".parse().unwrap();
    /// let a5: NoteSymbol = "A5".parse().unwrap();
    /// assert!((a5.cents_from(&a4) - 1200.0).abs() < 1e-9);
    /// ```
    pub fn cents_from(&self, reference: &NoteSymbol) -> f64 {
        (self.commas() - reference.commas()) as f64 * CENTS_PER_COMMA
    }

    /// Same letter and accidental, regardless of octave
    pub fn same_pitch_class(&self, other: &NoteSymbol) -> bool {
        self.letter == other.letter && self.accidental == other.accidental
    }

    /// The same note in another octave
    pub fn with_octave(&self, octave: i32) -> Self {
        Self { octave, ..*self }
    }
}

fn letter_index(letter: char) -> Result<usize, AnalysisError> {
    LETTERS
        .iter()
        .position(|&l| l == letter)
        .ok_or_else(|| AnalysisError::InvalidInput(format!("Unknown note letter '{}'", letter)))
}

impl fmt::Display for NoteSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, self.octave)?;
        match self.accidental {
            Some(Accidental::Flat(c)) => write!(f, "b{}", c),
            Some(Accidental::Sharp(c)) => write!(f, "#{}", c),
            None => Ok(()),
        }
    }
}

impl FromStr for NoteSymbol {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| AnalysisError::InvalidInput("Empty note symbol".to_string()))?
            .to_ascii_uppercase();
        letter_index(letter)?;

        let rest: &str = chars.as_str();
        let acc_pos = rest.find(|c| c == 'b' || c == '#').unwrap_or(rest.len());
        let (octave_str, acc_str) = rest.split_at(acc_pos);
        let octave: i32 = octave_str.parse().map_err(|_| {
            AnalysisError::InvalidInput(format!("Invalid octave in note symbol '{}'", s))
        })?;

        let accidental = if acc_str.is_empty() {
            None
        } else {
            let (kind, commas) = acc_str.split_at(1);
            let commas: u8 = commas.parse().map_err(|_| {
                AnalysisError::InvalidInput(format!("Invalid accidental in note symbol '{}'", s))
            })?;
            if commas == 0 || commas as i32 >= COMMAS_PER_OCTAVE {
                return Err(AnalysisError::InvalidInput(format!(
                    "Accidental out of range in note symbol '{}'",
                    s
                )));
            }
            Some(if kind == "b" {
                Accidental::Flat(commas)
            } else {
                Accidental::Sharp(commas)
            })
        };

        Ok(Self {
            letter,
            octave,
            accidental,
        })
    }
}

impl TryFrom<String> for NoteSymbol {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteSymbol> for String {
    fn from(value: NoteSymbol) -> Self {
        value.to_string()
    }
}

/// Convert a frequency to cents relative to `ref_hz`
///
/// Returns `None` for frequencies at or below `min_hz` (silence).
pub fn hz_to_cent(hz: f64, ref_hz: f64, min_hz: f64) -> Option<f64> {
    if hz <= min_hz || ref_hz <= 0.0 || !hz.is_finite() {
        return None;
    }
    Some((hz / ref_hz).log2() * CENTS_PER_OCTAVE)
}

/// Convert cents relative to `ref_hz` back to a frequency
pub fn cent_to_hz(cents: f64, ref_hz: f64) -> f64 {
    ref_hz * 2f64.powf(cents / CENTS_PER_OCTAVE)
}

/// Distance between two pitches in cents, ignoring octave displacement
pub fn octave_wrapped_distance(a_cents: f64, b_cents: f64) -> f64 {
    let d = (a_cents - b_cents).rem_euclid(CENTS_PER_OCTAVE);
    d.min(CENTS_PER_OCTAVE - d)
}

/// Number of whole octaves between two pitches, rounded to the nearest
pub fn octave_offset(a_cents: f64, b_cents: f64) -> i32 {
    ((a_cents - b_cents) / CENTS_PER_OCTAVE).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for s in ["A4", "B4b1", "F5#4", "C5", "G3b5"] {
            let sym: NoteSymbol = s.parse().unwrap();
            assert_eq!(sym.to_string(), s);
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<NoteSymbol>().is_err());
        assert!("H4".parse::<NoteSymbol>().is_err());
        assert!("A".parse::<NoteSymbol>().is_err());
        assert!("A4b".parse::<NoteSymbol>().is_err());
        assert!("A4b0".parse::<NoteSymbol>().is_err());
    }

    #[test]
    fn test_intervals() {
        let a4: NoteSymbol = "A4".parse().unwrap();
        let b4b1: NoteSymbol = "B4b1".parse().unwrap();
        let c5: NoteSymbol = "C5".parse().unwrap();

        assert!((b4b1.cents_from(&a4) - 8.0 * CENTS_PER_COMMA).abs() < 1e-9);
        assert!((c5.cents_from(&a4) - 13.0 * CENTS_PER_COMMA).abs() < 1e-9);
        assert!((a4.cents_from(&c5) + 13.0 * CENTS_PER_COMMA).abs() < 1e-9);
    }

    #[test]
    fn test_octave_wrapped_distance() {
        assert!(octave_wrapped_distance(1200.0, 0.0) < 1e-9);
        assert!((octave_wrapped_distance(1190.0, 0.0) - 10.0).abs() < 1e-9);
        assert!((octave_wrapped_distance(-25.0, 2400.0) - 25.0).abs() < 1e-9);
        assert_eq!(octave_offset(2410.0, 0.0), 2);
    }

    #[test]
    fn test_hz_cent_conversion() {
        let c = hz_to_cent(880.0, 440.0, 20.0).unwrap();
        assert!((c - 1200.0).abs() < 1e-9);
        assert!((cent_to_hz(c, 440.0) - 880.0).abs() < 1e-9);
        assert!(hz_to_cent(0.0, 440.0, 20.0).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let sym: NoteSymbol = "B4b1".parse().unwrap();
        let json = serde_json::to_string(&sym).unwrap();
        assert_eq!(json, "\"B4b1\"");
        let back: NoteSymbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sym);
    }
}
