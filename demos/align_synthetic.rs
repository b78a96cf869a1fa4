//! Example: Joint analysis of a score and a pitch track
//!
//! With arguments, reads a SymbTr score and a pitch track file:
//!
//! ```text
//! cargo run --example align_synthetic -- score.txt pitch.txt ussak
//! ```
//!
//! Without arguments, analyzes a synthetic ussak melody performed slightly
//! slower than notated and prints the summary record as JSON.

use makam_joint::io::{read_pitch_track, read_symbtr, PitchTrack};
use makam_joint::score::{Fraction, ScoreEvent};
use makam_joint::theory::{cent_to_hz, NoteSymbol};
use makam_joint::{analyze_joint, AnalysisConfig};

fn synthetic() -> Result<(Vec<ScoreEvent>, PitchTrack), Box<dyn std::error::Error>> {
    let melody = [
        ("A4", 2), ("B4b1", 1), ("C5", 1), ("D5", 2), ("C5", 1), ("B4b1", 1),
        ("A4", 2), ("G4", 2), ("A4", 2), ("D5", 2), ("E5", 1), ("D5", 1),
        ("C5", 2), ("B4b1", 2), ("C5", 1), ("B4b1", 1), ("A4", 4),
    ];
    let karar: NoteSymbol = "A4".parse()?;
    let tonic_hz = 293.66;
    let eighth_seconds = 0.27;
    let hop = 128.0 / 44100.0;

    let mut events = vec![ScoreEvent::section(1, "Zemin")];
    let mut freqs = Vec::new();
    for (i, (pitch, eighths)) in melody.iter().enumerate() {
        let symbol: NoteSymbol = pitch.parse()?;
        let duration = Fraction::new(*eighths, 8)?;
        events.push(ScoreEvent::note(i as u32 + 2, symbol, duration, 250.0 * *eighths as f64));

        let f = cent_to_hz(symbol.cents_from(&karar), tonic_hz);
        let n = (*eighths as f64 * eighth_seconds / hop).round() as usize;
        freqs.extend(std::iter::repeat(f).take(n));
    }
    let track = PitchTrack::from_frequencies(0.0, hop, &freqs)?.with_source("synthetic");
    Ok((events, track))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (events, track, makam) = match args.as_slice() {
        [score, pitch, makam] => (
            read_symbtr(score)?,
            read_pitch_track(pitch)?.with_source(pitch),
            makam.clone(),
        ),
        [] => {
            let (events, track) = synthetic()?;
            (events, track, "ussak".to_string())
        }
        _ => return Err("usage: align_synthetic [SCORE PITCH MAKAM]".into()),
    };

    let record = analyze_joint(&events, &track, &makam, AnalysisConfig::default())?;

    println!("Joint Analysis Results:");
    println!("  Stage: {:?}", record.metadata.stage);
    if let Some(reason) = &record.metadata.failure {
        println!("  Failure: {}", reason);
    }
    if let Some(tonic) = &record.audio.tonic {
        println!("  Tonic: {} at {:.2} Hz", tonic.symbol, tonic.frequency_hz);
    }
    if let Some(tempo) = &record.audio.tempo {
        println!(
            "  Tempo: {:.2} BPM ({:.2}x notated)",
            tempo.average_bpm, tempo.relative_to_notated
        );
    }
    if let Some(transposition) = &record.audio.transposition {
        println!(
            "  Ahenk: {} ({} cents)",
            transposition.name.as_deref().unwrap_or("unnamed"),
            transposition.theoretical_cents
        );
    }
    if let Some(joint) = &record.joint {
        println!("  Aligned notes: {}", joint.notes.len());
        println!("  Aligned sections: {}", joint.sections.len());
    }
    println!("  Processing time: {:.2} ms", record.metadata.processing_time_ms);
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}
