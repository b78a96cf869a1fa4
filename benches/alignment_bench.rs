//! Performance benchmarks for score-to-audio alignment

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use makam_joint::features::alignment::ScoreAudioAligner;
use makam_joint::features::tonic_tempo::{TempoEstimate, TonicEstimate};
use makam_joint::io::PitchTrack;
use makam_joint::score::{Fraction, ScoreEvent};
use makam_joint::theory::{cent_to_hz, NoteSymbol};
use makam_joint::{analyze_joint, AnalysisConfig};

/// Ascending and descending ussak scale repeated to about `seconds` at 120 BPM
fn piece(seconds: f64) -> (Vec<ScoreEvent>, PitchTrack) {
    let scale = ["A4", "B4b1", "C5", "D5", "E5", "D5", "C5", "B4b1"];
    let karar: NoteSymbol = "A4".parse().unwrap();
    let hop: f64 = 128.0 / 44100.0;
    let num_notes = (seconds / 0.5) as usize;

    let mut events = Vec::with_capacity(num_notes);
    let mut freqs = Vec::new();
    for i in 0..num_notes {
        let symbol: NoteSymbol = scale[i % scale.len()].parse().unwrap();
        events.push(ScoreEvent::note(i as u32 + 1, symbol, Fraction { num: 1, den: 4 }, 500.0));
        let f = cent_to_hz(symbol.cents_from(&karar), 440.0);
        freqs.extend(std::iter::repeat(f).take((0.5 / hop).round() as usize));
    }
    (events, PitchTrack::from_frequencies(0.0, hop, &freqs).unwrap())
}

fn bench_align(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let (events, track) = piece(60.0);
    let tonic = TonicEstimate {
        frequency_hz: 440.0,
        symbol: "A4".parse().unwrap(),
        source: "bench".to_string(),
        procedure: "given".to_string(),
    };
    let tempo = TempoEstimate {
        average_bpm: 120.0,
        relative_to_notated: 1.0,
        notated_bpm: Some(120.0),
        onset_seconds: None,
        source: "bench".to_string(),
    };
    let aligner = ScoreAudioAligner::new(config.alignment.clone(), config.tonic_tempo.beat_unit);

    c.bench_function("align_60s", |b| {
        b.iter(|| {
            let _ = aligner.align(black_box(&events), black_box(&track), &tonic, &tempo);
        });
    });
}

fn bench_joint(c: &mut Criterion) {
    let (events, track) = piece(60.0);
    let config = AnalysisConfig::default();

    c.bench_function("analyze_joint_60s", |b| {
        b.iter(|| {
            let _ = analyze_joint(
                black_box(&events),
                black_box(&track),
                "ussak",
                black_box(config.clone()),
            );
        });
    });
}

criterion_group!(benches, bench_align, bench_joint);
criterion_main!(benches);
