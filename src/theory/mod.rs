//! Makam music theory
//!
//! Note symbols in the AEU (Arel-Ezgi-Uzdilek) system and the makam table
//! that maps a makam to its karar and scale degrees.

pub mod makam;
pub mod symbol;

pub use makam::{ModeLookup, ModeTheory, TheoryTable};
pub use symbol::{
    cent_to_hz, hz_to_cent, octave_offset, octave_wrapped_distance, Accidental, NoteSymbol,
    CENTS_PER_COMMA, CENTS_PER_OCTAVE, COMMAS_PER_OCTAVE,
};
