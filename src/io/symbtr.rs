//! SymbTr score rows
//!
//! Reads the tab-separated per-note score format into [`ScoreEvent`]s.
//! Files with a header row are read by column name (`Sira`, `Kod`, `NotaAE`,
//! `Pay`, `Payda`, `Ms`, `Soz1`); headerless input uses the column order
//! `index, code, pitch53, pitchAE, num, den, ms, internal_id, lyric`.
//!
//! Event codes: 9 note (rest when the pitch is `Es`, `__` or empty),
//! 8 grace note, 51 usul change, 53 section marker, other 50-56 markers.

use crate::error::AnalysisError;
use crate::score::{validate_events, EventKind, Fraction, ScoreEvent};
use crate::theory::NoteSymbol;
use std::path::Path;

const CODE_GRACE: i64 = 8;
const CODE_NOTE: i64 = 9;
const CODE_USUL: i64 = 51;
const CODE_SECTION: i64 = 53;

#[derive(Debug, Clone, Copy)]
struct Columns {
    index: usize,
    code: usize,
    pitch: usize,
    num: usize,
    den: usize,
    ms: usize,
    lyric: usize,
}

impl Columns {
    const POSITIONAL: Columns = Columns {
        index: 0,
        code: 1,
        pitch: 3,
        num: 4,
        den: 5,
        ms: 6,
        lyric: 8,
    };

    fn from_header(header: &[&str]) -> Option<Self> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        Some(Self {
            index: find("Sira")?,
            code: find("Kod")?,
            pitch: find("NotaAE")?,
            num: find("Pay")?,
            den: find("Payda")?,
            ms: find("Ms")?,
            lyric: find("Soz1").unwrap_or(usize::MAX),
        })
    }
}

fn field<'a>(row: &[&'a str], col: usize) -> &'a str {
    row.get(col).map(|s| s.trim()).unwrap_or("")
}

fn parse_number<T: std::str::FromStr>(
    row: &[&str],
    col: usize,
    name: &str,
    line_no: usize,
) -> Result<T, AnalysisError> {
    let raw = field(row, col);
    // numeric columns are occasionally written as floats ("4.0")
    raw.parse::<T>()
        .or_else(|_| match raw.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 => format!("{}", v as i64).parse::<T>().map_err(|_| ()),
            _ => Err(()),
        })
        .map_err(|_| {
            AnalysisError::MalformedScore(format!(
                "Line {}: invalid {} '{}'",
                line_no, name, raw
            ))
        })
}

fn is_rest_pitch(pitch: &str) -> bool {
    pitch.is_empty() || pitch.eq_ignore_ascii_case("es") || pitch == "__"
}

/// Parse SymbTr rows into validated score events
pub fn parse_symbtr(text: &str) -> Result<Vec<ScoreEvent>, AnalysisError> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()).peekable();

    let mut columns = Columns::POSITIONAL;
    if let Some((_, first)) = lines.peek() {
        let header: Vec<&str> = first.split('\t').collect();
        if let Some(named) = Columns::from_header(&header) {
            columns = named;
            lines.next();
        }
    }

    let mut events = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let row: Vec<&str> = line.split('\t').collect();

        let index: u32 = parse_number(&row, columns.index, "index", line_no)?;
        let code: i64 = parse_number(&row, columns.code, "code", line_no)?;
        let num: u32 = parse_number(&row, columns.num, "numerator", line_no)?;
        let den: u32 = parse_number(&row, columns.den, "denominator", line_no)?;
        let elapsed_ms: f64 = parse_number(&row, columns.ms, "elapsed time", line_no)?;
        let pitch_raw = field(&row, columns.pitch);
        let lyric = field(&row, columns.lyric);
        let label = if lyric.is_empty() {
            None
        } else {
            Some(lyric.to_string())
        };

        let duration = match (num, den) {
            (0, 0) => Fraction::zero(),
            (_, 0) => {
                return Err(AnalysisError::MalformedScore(format!(
                    "Line {}: zero denominator with numerator {}",
                    line_no, num
                )))
            }
            (n, d) => Fraction { num: n, den: d },
        };

        let kind = match code {
            CODE_NOTE if is_rest_pitch(pitch_raw) => EventKind::Rest,
            CODE_NOTE => EventKind::Note,
            CODE_GRACE => EventKind::Grace,
            CODE_USUL => EventKind::UsulChange,
            CODE_SECTION => EventKind::Section,
            50..=56 => EventKind::Marker,
            other => {
                log::warn!("Line {}: unknown event code {}, kept as marker", line_no, other);
                EventKind::Marker
            }
        };

        let pitch = match kind {
            EventKind::Note | EventKind::Grace if !is_rest_pitch(pitch_raw) => {
                Some(pitch_raw.parse::<NoteSymbol>().map_err(|_| {
                    AnalysisError::MalformedScore(format!(
                        "Line {}: invalid pitch '{}'",
                        line_no, pitch_raw
                    ))
                })?)
            }
            _ => None,
        };

        // a grace note without pitch carries no information
        if kind == EventKind::Grace && pitch.is_none() {
            continue;
        }

        let (duration, elapsed_ms) = match kind {
            EventKind::Note | EventKind::Rest => (duration, elapsed_ms),
            EventKind::Grace => (Fraction::zero(), 0.0),
            _ => (duration, 0.0),
        };

        events.push(ScoreEvent {
            index,
            kind,
            duration,
            elapsed_ms,
            pitch,
            label,
        });
    }

    validate_events(&events)?;
    log::debug!("Parsed {} score events", events.len());
    Ok(events)
}

/// Read a SymbTr txt file
pub fn read_symbtr<P: AsRef<Path>>(path: P) -> Result<Vec<ScoreEvent>, AnalysisError> {
    let path = path.as_ref();
    log::debug!("Reading SymbTr score: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| {
        AnalysisError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
    })?;
    parse_symbtr(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header() {
        let text = "Sira\tKod\tNota53\tNotaAE\tKoma53\tKomaAE\tPay\tPayda\tMs\tLNS\tBas\tSoz1\tOffset\n\
                    1\t51\t\t\t0\t0\t9\t8\t0\t40\t0\tAksak\t0\n\
                    2\t53\t\t\t0\t0\t0\t0\t0\t0\t0\tZemin\t0\n\
                    3\t9\tLa4\tA4\t0\t0\t1\t4\t500\t0\t0\tgel\t0.25\n\
                    4\t9\tEs\tEs\t-1\t-1\t1\t4\t500\t0\t0\t\t0.5\n\
                    5\t8\tSi4\tB4b1\t0\t0\t1\t16\t0\t0\t0\t\t0.5\n\
                    6\t9\tSi4\tB4b1\t0\t0\t1\t2\t1000\t0\t0\t\t1\n";
        let events = parse_symbtr(text).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[0].kind, EventKind::UsulChange);
        assert_eq!(events[1].kind, EventKind::Section);
        assert_eq!(events[1].label.as_deref(), Some("Zemin"));
        assert_eq!(events[2].kind, EventKind::Note);
        assert_eq!(events[2].pitch.unwrap().to_string(), "A4");
        assert_eq!(events[3].kind, EventKind::Rest);
        assert_eq!(events[4].kind, EventKind::Grace);
        assert!(events[4].duration.is_zero());
        assert_eq!(events[5].duration, Fraction { num: 1, den: 2 });
        assert!(events[0].is_structural());
    }

    #[test]
    fn test_parse_positional() {
        let text = "1\t9\tLa4\tA4\t1\t4\t500\t0\t\n2\t9\tSi4\tB4b1\t1.0\t4.0\t500\t0\tla\n";
        let events = parse_symbtr(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].label.as_deref(), Some("la"));
        assert_eq!(events[1].duration, Fraction { num: 1, den: 4 });
    }

    #[test]
    fn test_duplicate_index_is_malformed() {
        let text = "1\t9\tLa4\tA4\t1\t4\t500\t0\t\n1\t9\tLa4\tA4\t1\t4\t500\t0\t\n";
        assert!(matches!(
            parse_symbtr(text),
            Err(AnalysisError::MalformedScore(_))
        ));
    }

    #[test]
    fn test_invalid_pitch_is_malformed() {
        let text = "1\t9\tXx\tQ4\t1\t4\t500\t0\t\n";
        assert!(matches!(
            parse_symbtr(text),
            Err(AnalysisError::MalformedScore(_))
        ));
    }
}
