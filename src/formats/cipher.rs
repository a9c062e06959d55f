//! # Numbered notation (`piano-wizard-yp`)
//!
//! ```text
//! /**
//!  * name: Twinkle
//!  * author: Traditional
//!  * arrangedBy:
//!  * transcribedBy: someone
//!  */
//! [1=D,4/4,100]
//! 1,1,5,5,6,6,5*2,
//! 4,4,3,3,2,2,1*2,
//! ```
//!
//! The declaration `[1=<tonic>,<n>/<n>,<bpm>]` fixes the key and tempo. Beats are
//! separated by `,`. A beat is one or more notes joined by `&`, followed by an optional
//! rate chain (`*2` doubles, `/2` halves, and they compose: `*3/2`).
//!
//! A note is a digit `1`–`7` (scale degree) or `0` (rest) followed by modifiers, each
//! with an optional count that defaults to 1:
//! - `+` / `-` shift by octaves (`5+2` is two octaves up)
//! - `#` / `b` shift by semitones
//!
//! Comments (`/* */`, `//`) and all whitespace are ignored. The header fields of the
//! leading block comment are read back into the notation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::convertor::{FormatOptions, ParseOptions, SheetFormatter, SheetParser};
use crate::error::{Location, SheetError};
use crate::formats::checks::{check_bpm, file_stem};
use crate::notation::{Beat, MusicNotation};
use crate::pitch::{basic_note_to_12tet, is_semitone, split_octave, NATURALS};
use crate::rate::Rate;

pub const LABEL: &str = "piano-wizard-yp";

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//[^\n]*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SHEET: Lazy<Regex> = Lazy::new(|| {
    let note = r"\d(?:[-+#b]\d*)*";
    let beat = format!(r"{note}(?:&{note})*(?:[*/]\d+)*");
    Regex::new(&format!(r"^\[1=([A-G][#b]?),\d+/\d+,(\d+)\]({beat}(?:,{beat})*),?$")).unwrap()
});
static BEAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^*/]+)((?:[*/]\d+)*)$").unwrap());
static RATE_STEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([*/])(\d+)").unwrap());
static MODIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([-+#b])(\d*)").unwrap());
static HEADER_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\*?[ \t]*(name|author|transcribedBy):[ \t]*(.*?)[ \t]*$").unwrap()
});

#[derive(Debug, Default)]
pub struct CipherFormatter;

impl SheetFormatter for CipherFormatter {
    fn format(&self, notation: &MusicNotation, _opts: &FormatOptions) -> Result<String, SheetError> {
        let mut content = format!(
            "/**\n * name: {}\n * author: {}\n * arrangedBy: \n * transcribedBy: {}\n */\n[1={},4/4,{}]\n",
            comment_safe(&notation.name),
            comment_safe(&notation.author),
            comment_safe(&notation.transcribed_by),
            tonic_name(notation.key_note),
            notation.bpm
        );
        for beat in &notation.beats {
            content.push_str(&format_beat(beat));
        }
        Ok(content)
    }
}

fn comment_safe(s: &str) -> String {
    s.replace("*/", "* /").replace('\n', " ")
}

/// Letter name of the key note's pitch class, sharpened when it is a black key.
fn tonic_name(key_note: i32) -> String {
    let pitch_level = key_note.rem_euclid(12);
    let sharp = is_semitone(pitch_level);
    let natural = if sharp { pitch_level - 1 } else { pitch_level };
    let degree = NATURALS.iter().position(|&n| n == natural).unwrap_or(0) as u8;
    // Degrees count from C; letters from A
    let letter = if degree < 5 { b'C' + degree } else { b'A' + degree - 5 };
    let mut name = (letter as char).to_string();
    if sharp {
        name.push('#');
    }
    name
}

fn format_note(tet12: i32) -> String {
    let (octave, mut class) = split_octave(tet12);
    let sharp = is_semitone(class);
    if sharp {
        class -= 1;
    }
    let degree = NATURALS.iter().position(|&n| n == class).map_or(0, |i| i + 1);
    if degree == 0 {
        return "0".to_string();
    }

    let mut note = degree.to_string();
    match octave {
        0 => {}
        1 => note.push('+'),
        -1 => note.push('-'),
        n if n > 0 => note.push_str(&format!("+{}", n)),
        n => note.push_str(&n.to_string()),
    }
    if sharp {
        note.push('#');
    }
    note
}

fn format_beat(beat: &Beat) -> String {
    let rate = beat.rate.simplified();
    if rate.numerator() <= 0 {
        return String::new();
    }
    let mut notes = if beat.is_rest() {
        "0".to_string()
    } else {
        beat.tones.iter().map(|&tone| format_note(tone)).collect::<Vec<_>>().join("&")
    };
    if rate.numerator() != 1 {
        notes.push_str(&format!("*{}", rate.numerator()));
    }
    if rate.denominator() != 1 {
        notes.push_str(&format!("/{}", rate.denominator()));
    }
    notes.push(',');
    notes
}

#[derive(Debug, Default)]
pub struct CipherParser;

impl SheetParser for CipherParser {
    fn parse(&self, content: &str, opts: &ParseOptions) -> Result<MusicNotation, SheetError> {
        let stripped = strip_comments(content);
        let caps = SHEET.captures(&stripped).ok_or_else(|| SheetError::Syntax {
            location: Location::Unknown,
            message: "Expected [1=<key>,<n>/<n>,<bpm>] followed by beats".to_string(),
        })?;

        let key_note = parse_tonic(&caps[1]);
        let bpm = caps[2]
            .parse::<i64>()
            .map_err(|_| SheetError::Range(format!("Unsupported bpm: {}", &caps[2])))
            .and_then(check_bpm)?;
        let beats = caps[3]
            .split(',')
            .filter(|beat| !beat.is_empty())
            .map(parse_beat)
            .collect::<Result<Vec<_>, _>>()?;

        let mut notation = MusicNotation {
            key_note,
            bpm,
            beats,
            ..Default::default()
        };
        read_header(content, &mut notation);
        if notation.name.is_empty() {
            if let Some(filename) = &opts.filename {
                notation.name = file_stem(filename, Some(".yp.")).to_string();
            }
        }
        Ok(notation)
    }
}

fn strip_comments(content: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(content, "");
    let without_lines = LINE_COMMENT.replace_all(&without_blocks, "");
    WHITESPACE.replace_all(&without_lines, "").into_owned()
}

/// Copy `name`, `author` and `transcribedBy` from the leading block comment.
fn read_header(content: &str, notation: &mut MusicNotation) {
    let Some(header) = BLOCK_COMMENT
        .find(content.trim_start())
        .filter(|comment| comment.start() == 0)
    else {
        return;
    };
    for caps in HEADER_FIELD.captures_iter(header.as_str()) {
        let value = caps[2].trim_end_matches("*/").trim().to_string();
        match &caps[1] {
            "name" => notation.name = value,
            "author" => notation.author = value,
            _ => notation.transcribed_by = value,
        }
    }
}

/// `C`, `D#`, `Bb`, ... as a 12-TET key note.
fn parse_tonic(tonic: &str) -> i32 {
    let mut chars = tonic.bytes();
    let letter = chars.next().unwrap_or(b'C');
    // A and B come after G
    let degree = (letter - b'A' + 5) as i32 % 7;
    let accidental = match chars.next() {
        Some(b'#') => 1,
        Some(b'b') => -1,
        _ => 0,
    };
    basic_note_to_12tet(degree) + accidental
}

fn parse_beat(beat: &str) -> Result<Beat, SheetError> {
    let caps = BEAT.captures(beat).ok_or_else(|| SheetError::Syntax {
        location: Location::Unknown,
        message: format!("Beat syntax error: {}", beat),
    })?;

    let mut tones = Vec::new();
    for note in caps[1].split('&') {
        if let Some(tone) = parse_note(note)? {
            if !tones.contains(&tone) {
                tones.push(tone);
            }
        }
    }
    Ok(Beat::new(parse_rate(&caps[2])?, tones))
}

fn parse_rate(chain: &str) -> Result<Rate, SheetError> {
    let unsupported = || SheetError::Range(format!("Unsupported rate: {}", chain));
    let mut rate = Rate::default();
    for step in RATE_STEP.captures_iter(chain) {
        let n: i64 = step[2].parse().map_err(|_| unsupported())?;
        if n <= 0 {
            return Err(unsupported());
        }
        if &step[1] == "/" {
            let b = rate.denominator().checked_mul(n).ok_or_else(unsupported)?;
            rate.set_denominator(b)?;
        } else {
            let a = rate.numerator().checked_mul(n).ok_or_else(unsupported)?;
            rate.set_numerator(a);
        }
    }
    Ok(rate)
}

/// A single note; `None` for a rest.
fn parse_note(note: &str) -> Result<Option<i32>, SheetError> {
    let degree = note
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .filter(|&d| d <= 7)
        .ok_or_else(|| SheetError::Range(format!("Unsupported note: {}", note)))?;
    if degree == 0 {
        return Ok(None);
    }

    let mut tone = basic_note_to_12tet(degree as i32 - 1);
    for modifier in MODIFIER.captures_iter(&note[1..]) {
        let count: i32 = match &modifier[2] {
            "" => 1,
            digits => digits
                .parse()
                .map_err(|_| SheetError::Range(format!("Unsupported accidental: {}", note)))?,
        };
        let shift = match &modifier[1] {
            "+" => count.checked_mul(12),
            "-" => count.checked_mul(-12),
            "b" => Some(-count),
            _ => Some(count),
        };
        tone = shift
            .and_then(|shift| tone.checked_add(shift))
            .ok_or_else(|| SheetError::Range(format!("Unsupported accidental: {}", note)))?;
    }
    Ok(Some(tone))
}
