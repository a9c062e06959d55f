//! # Letter-pitch keys (`sky-studio-abc`)
//!
//! ```text
//! <DontCopyThisLine> 240 0 16 author transcriber
//! A1 . B1 . C1A3 . . . . B5
//! ```
//!
//! The header holds the tempo, the pitch level (key note pitch class), the beats per
//! page (always 16), the author and the transcriber. The tempo counts the smallest
//! subdivision, so `240` with one dot per quarter note plays at 120 quarter notes per
//! minute in a sheet where every note has two units.
//!
//! Keys are numbered `A1`..`A5`, `B1`..`B5`, `C1`..`C5` from low to high over the white
//! keys. Pairs written without a gap form a chord. Each key group lasts one unit and each
//! `.` adds one more; dots before any key are a rest. The final group lasts at least four
//! units.

use crate::convertor::{FormatOptions, ParseOptions, SheetFormatter, SheetParser};
use crate::error::{Location, SheetError};
use crate::formats::checks::{check_bpm, check_pitch_level, file_stem, integer_field};
use crate::notation::{Beat, MusicNotation};
use crate::pitch::{basic_note_to_12tet, tet12_to_basic_note};
use crate::rate::Rate;

pub const LABEL: &str = "sky-studio-abc";

const HEADER_MARK: &str = "<DontCopyThisLine>";

const BEATS_PER_PAGE: u32 = 16;

/// Keys per letter row.
const ROW_LEN: i32 = 5;

/// `A1`..`C5`
const KEY_COUNT: i32 = 15;

/// Longest sheet written, counted in units (one key group or dot each).
const MAX_UNITS: i64 = 1 << 20;

/// Units given to the last key group when fewer dots follow it.
const MIN_TRAILING_DOTS: u32 = 3;

#[derive(Debug, Default)]
pub struct LetterFormatter;

impl SheetFormatter for LetterFormatter {
    fn format(&self, notation: &MusicNotation, _opts: &FormatOptions) -> Result<String, SheetError> {
        // Least common multiple of every beat's denominator
        let mut lcm: i64 = 1;
        for beat in &notation.beats {
            let scaled = scale(beat.rate, lcm)?;
            lcm = lcm
                .checked_mul(scaled.denominator())
                .ok_or_else(|| SheetError::Range("Beat rates are too fine to share a tempo".to_string()))?;
        }

        let bpm = (notation.bpm as i64)
            .checked_mul(lcm)
            .filter(|&bpm| bpm <= u32::MAX as i64)
            .ok_or_else(|| SheetError::Range(format!("Unsafe bpm: {} * {}", notation.bpm, lcm)))?;

        let mut keys = String::new();
        let mut total_units: i64 = 0;
        for beat in &notation.beats {
            let units = scale(beat.rate, lcm)?;
            if units.denominator() != 1 {
                return Err(SheetError::Range(format!("Beat rate {} is not a whole number of units", beat.rate)));
            }
            let dots = units.numerator() - 1;
            if dots < 0 {
                continue;
            }
            total_units = total_units
                .checked_add(units.numerator())
                .filter(|&total| total <= MAX_UNITS)
                .ok_or_else(|| SheetError::Range(format!("Sheet is longer than {} units", MAX_UNITS)))?;
            if beat.is_rest() {
                keys.push_str(&". ".repeat(dots as usize + 1));
                continue;
            }
            for &tone in &beat.tones {
                keys.push_str(&key_name(tone)?);
            }
            keys.push(' ');
            keys.push_str(&". ".repeat(dots as usize));
        }

        Ok(format!(
            "{} {} {} {} {} {}\n{}",
            HEADER_MARK,
            bpm,
            notation.key_note.rem_euclid(12),
            BEATS_PER_PAGE,
            notation.author,
            notation.transcribed_by,
            keys
        ))
    }
}

/// `rate * factor`, reduced.
fn scale(rate: Rate, factor: i64) -> Result<Rate, SheetError> {
    let a = rate
        .numerator()
        .checked_mul(factor)
        .ok_or_else(|| SheetError::Range(format!("Beat rate {} overflows", rate)))?;
    Ok(Rate::new(a, rate.denominator())?.simplify())
}

fn key_name(tone: i32) -> Result<String, SheetError> {
    let note = tet12_to_basic_note(tone)?;
    if !(0..KEY_COUNT).contains(&note) {
        return Err(SheetError::Range(format!("Unknown note: {}", note)));
    }
    let row = (b'A' + (note / ROW_LEN) as u8) as char;
    Ok(format!("{}{}", row, note % ROW_LEN + 1))
}

#[derive(Debug, Default)]
pub struct LetterParser;

impl SheetParser for LetterParser {
    fn parse(&self, content: &str, opts: &ParseOptions) -> Result<MusicNotation, SheetError> {
        let (info, body) = split_header(content)?;
        let mut notation = parse_info(info)?;
        if let Some(filename) = &opts.filename {
            notation.name = file_stem(filename, None).to_string();
        }
        notation.beats = BodyScanner::new(&body).scan()?;
        Ok(notation)
    }
}

/// Split into the header fields after the mark and the key lines.
fn split_header(content: &str) -> Result<(String, String), SheetError> {
    let content = content.trim().replace("\r\n", "\n").replace('\r', "\n");
    if content.is_empty() {
        return Err(SheetError::Syntax {
            location: Location::Unknown,
            message: "Content is empty".to_string(),
        });
    }
    let mark = content.find(HEADER_MARK).ok_or_else(|| SheetError::Syntax {
        location: Location::LineColumn { line: 1, column: 1 },
        message: format!("Missing {}", HEADER_MARK),
    })?;
    let info_start = mark + HEADER_MARK.len();
    let line_end = content[info_start..]
        .find('\n')
        .map(|offset| info_start + offset)
        .ok_or_else(|| SheetError::Syntax {
            location: Location::Unknown,
            message: "Missing line break after the header".to_string(),
        })?;
    Ok((
        content[info_start..line_end].trim().to_string(),
        content[line_end + 1..].to_string(),
    ))
}

fn parse_info(info: String) -> Result<MusicNotation, SheetError> {
    let fields: Vec<&str> = info.split(' ').filter(|field| !field.is_empty()).collect();
    let bpm = check_bpm(integer_field(fields.first().copied(), "bpm")?)?;
    let key_note = check_pitch_level(integer_field(fields.get(1).copied(), "pitchLevel")?)?;
    Ok(MusicNotation {
        author: fields.get(3).unwrap_or(&"").to_string(),
        transcribed_by: fields.get(4).unwrap_or(&"").to_string(),
        key_note,
        bpm,
        ..Default::default()
    })
}

/// Scanner over the key lines. Lines are numbered from 2, after the header.
struct BodyScanner {
    chars: Vec<char>,
    position: usize,
    line: usize,
    line_start: usize,
    notes: Vec<i32>,
    dots: u32,
    beats: Vec<Beat>,
}

impl BodyScanner {
    fn new(body: &str) -> Self {
        Self {
            chars: body.chars().collect(),
            position: 0,
            line: 2,
            line_start: 0,
            notes: Vec::new(),
            dots: 0,
            beats: Vec::new(),
        }
    }

    fn error_at(&self, index: usize) -> SheetError {
        let found = self
            .chars
            .get(index)
            .map_or("end of line".to_string(), |c| format!("'{}'", c));
        SheetError::Syntax {
            location: Location::LineColumn {
                line: self.line,
                column: index - self.line_start + 1,
            },
            message: format!("Unexpected {}", found),
        }
    }

    fn scan(mut self) -> Result<Vec<Beat>, SheetError> {
        while let Some(&c) = self.chars.get(self.position) {
            match c {
                ' ' => self.position += 1,
                '\n' => {
                    self.position += 1;
                    self.line += 1;
                    self.line_start = self.position;
                }
                '.' => {
                    self.dots += 1;
                    self.position += 1;
                }
                'A'..='C' => {
                    self.flush(self.dots);
                    self.dots = 0;
                    self.keys()?;
                }
                _ => return Err(self.error_at(self.position)),
            }
        }
        if !self.notes.is_empty() {
            self.flush(self.dots.max(MIN_TRAILING_DOTS));
        }
        Ok(self.beats)
    }

    /// Consecutive letter-digit pairs, e.g. `A1C3`.
    fn keys(&mut self) -> Result<(), SheetError> {
        while let Some(&letter @ 'A'..='C') = self.chars.get(self.position) {
            let digit_at = self.position + 1;
            let digit = match self.chars.get(digit_at) {
                Some(&d @ '1'..='5') => d,
                _ => return Err(self.error_at(digit_at)),
            };
            let row = (letter as u8 - b'A') as i32;
            let column = (digit as u8 - b'1') as i32;
            let tone = basic_note_to_12tet(row * ROW_LEN + column);
            if !self.notes.contains(&tone) {
                self.notes.push(tone);
            }
            self.position += 2;
        }
        Ok(())
    }

    /// Close the pending key group (or rest) with `dots` extra units.
    fn flush(&mut self, dots: u32) {
        let units = if self.notes.is_empty() { dots } else { dots + 1 };
        if units == 0 {
            return;
        }
        let tones = std::mem::take(&mut self.notes);
        self.beats.push(Beat::new(Rate::whole(units as i64), tones));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<MusicNotation, SheetError> {
        LetterParser.parse(content, &ParseOptions::default())
    }

    #[test]
    fn test_parse_header() {
        let notation = parse("<DontCopyThisLine> 240 5 16 Someone Helper\nA1").unwrap();
        assert_eq!(notation.bpm, 240);
        assert_eq!(notation.key_note, 5);
        assert_eq!(notation.author, "Someone");
        assert_eq!(notation.transcribed_by, "Helper");
    }

    #[test]
    fn test_parse_keys_and_dots() {
        let notation = parse("<DontCopyThisLine> 120 0 16\n. . A1 . B1C3 A1A1\r\nC5 .").unwrap();
        assert_eq!(
            notation.beats,
            vec![
                Beat::rest(Rate::whole(2)),
                Beat::new(Rate::whole(2), vec![0]),
                Beat::new(Rate::whole(1), vec![9, 21]),
                Beat::new(Rate::whole(1), vec![0]),
                Beat::new(Rate::whole(4), vec![24]),
            ]
        );
    }

    #[test]
    fn test_name_from_filename() {
        let opts = ParseOptions {
            filename: Some("Moonlight.txt".to_string()),
        };
        let notation = LetterParser
            .parse("<DontCopyThisLine> 120 0 16\nA1", &opts)
            .unwrap();
        assert_eq!(notation.name, "Moonlight");
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(parse("   "), Err(SheetError::Syntax { .. })));
        assert!(matches!(parse("120 0 16\nA1"), Err(SheetError::Syntax { .. })));
        assert!(matches!(parse("<DontCopyThisLine> 120 0 16"), Err(SheetError::Syntax { .. })));
        assert!(matches!(parse("<DontCopyThisLine> 0 0 16\nA1"), Err(SheetError::Range(_))));
        assert!(matches!(parse("<DontCopyThisLine> 120 12 16\nA1"), Err(SheetError::Range(_))));
        assert!(matches!(parse("<DontCopyThisLine> fast 0 16\nA1"), Err(SheetError::Type(_))));
    }

    #[test]
    fn test_body_errors_carry_line_and_column() {
        let cases = [
            ("<DontCopyThisLine> 120 0 16\nA1 x", 2, 4),
            ("<DontCopyThisLine> 120 0 16\nA1\n  A6", 3, 4),
            ("<DontCopyThisLine> 120 0 16\nA1 B", 2, 5),
        ];
        for (content, line, column) in cases {
            match parse(content) {
                Err(SheetError::Syntax { location, .. }) => {
                    assert_eq!(location, Location::LineColumn { line, column }, "{:?}", content)
                }
                other => panic!("Expected syntax error for {:?}, got {:?}", content, other),
            }
        }
    }

    #[test]
    fn test_format_sheet() {
        let notation = MusicNotation {
            author: "Me".to_string(),
            transcribed_by: "You".to_string(),
            key_note: 14,
            bpm: 100,
            beats: vec![
                Beat::new(Rate::whole(1), vec![0, 4]),
                Beat::new(Rate::new(1, 2).unwrap(), vec![2]),
                Beat::rest(Rate::new(1, 2).unwrap()),
                Beat::new(Rate::new(3, 2).unwrap(), vec![24]),
            ],
            ..Default::default()
        };
        let output = LetterFormatter.format(&notation, &FormatOptions::default()).unwrap();
        assert_eq!(output, "<DontCopyThisLine> 200 2 16 Me You\nA1A3 . A2 . C5 . . ");
    }

    #[test]
    fn test_format_rejects_accidentals_and_out_of_range() {
        let mut notation = MusicNotation {
            bpm: 100,
            beats: vec![Beat::new(Rate::whole(1), vec![1])],
            ..Default::default()
        };
        assert!(matches!(
            LetterFormatter.format(&notation, &FormatOptions::default()),
            Err(SheetError::Range(_))
        ));
        notation.beats = vec![Beat::new(Rate::whole(1), vec![-1])];
        assert!(matches!(
            LetterFormatter.format(&notation, &FormatOptions::default()),
            Err(SheetError::Range(_))
        ));
    }

    #[test]
    fn test_format_rejects_overlong_sheets() {
        let notation = MusicNotation {
            bpm: 120,
            beats: vec![Beat::new(Rate::whole(1_000_000_000_000), vec![0])],
            ..Default::default()
        };
        assert!(matches!(
            LetterFormatter.format(&notation, &FormatOptions::default()),
            Err(SheetError::Range(_))
        ));

        // Many beats that are each short still add up
        let notation = MusicNotation {
            bpm: 120,
            beats: vec![Beat::rest(Rate::whole(1 << 10)); (1 << 10) + 1],
            ..Default::default()
        };
        assert!(matches!(
            LetterFormatter.format(&notation, &FormatOptions::default()),
            Err(SheetError::Range(_))
        ));
    }

    #[test]
    fn test_round_trip_keeps_tones_and_rates() {
        let source = "<DontCopyThisLine> 240 0 16 a b\n. A1 . B2C1 . . . C5 . . . ";
        let notation = parse(source).unwrap();
        let output = LetterFormatter.format(&notation, &FormatOptions::default()).unwrap();
        assert_eq!(parse(&output).unwrap().beats, notation.beats);
    }
}
