//! # Timeline mini-language (`fengxu-genshin-2`)
//!
//! A sheet is a single script call:
//!
//! ```text
//! parseGenshinImpactMusic("<name>", "<timeline>", 2)
//! ```
//!
//! ## Timeline grammar
//! - `{C3}` presses a key; adjacent groups `{C3}{E3}` are pressed together
//! - `<N>` holds the keys for `N` ms and moves the timeline forward by `N` ms
//! - `(N)` holds the keys for `N` ms without moving the timeline
//! - a bare number moves the timeline forward by that many ms
//!
//! `{C3}(200) 300 {D3}` therefore presses C3, releases it after 200 ms and presses D3
//! 300 ms after C3. `<>` and `()` are only valid right after a key group.
//!
//! ## Key names
//! Two characters, a letter `A`–`G` and an octave digit. Letters `C`–`G` count one
//! octave higher than `A`/`B` with the same digit, so `A3 B3 C3` is an ascending run.
//! A four character name such as `C3D3` spells the semitone between the two keys.
//!
//! ## Example
//! ```rust
//! use sheets::formats::timeline::parse_timeline;
//!
//! let notation = parse_timeline("song", "250 {C2}<250>{D2}<500>{E2}<750>")?;
//! assert_eq!(notation.bpm, 240);
//! assert_eq!(notation.beats.len(), 4);
//! assert!(notation.beats[0].is_rest());
//! # Ok::<(), sheets::SheetError>(())
//! ```

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::convertor::{FormatOptions, ParseOptions, SheetFormatter, SheetParser};
use crate::error::{Location, SheetError};
use crate::notation::{Beat, KeyLabel, KeyLayout, MusicNotation};
use crate::pitch::basic_note_to_12tet;
use crate::rate::Rate;
use crate::transpose::create_hit_actions;

pub const LABEL: &str = "fengxu-genshin-2";

/// Name of the script function wrapping the timeline.
pub const FUNC_NAME: &str = "parseGenshinImpactMusic";

pub const VERSION: i64 = 2;

const MS_PER_MINUTE: u64 = 60_000;

/// Keys of the default instrument, lowest first.
const DEFAULT_KEYS: &str = "C2,D2,E2,F2,G2,A3,B3,C3,D3,E3,F3,G3,A4,B4,C4,D4,E4,F4,G4,A5,B5";

/// Basic note of the first default key (`C2`).
const DEFAULT_KEY_OFFSET: i32 = -7;

fn default_layout() -> KeyLayout {
    let keys = DEFAULT_KEYS
        .split(',')
        .map(|name| KeyLabel::Name(format!("{{{}}}", name)))
        .collect();
    KeyLayout::new(keys, DEFAULT_KEY_OFFSET, false)
}

#[derive(Debug, Default)]
pub struct TimelineFormatter;

impl SheetFormatter for TimelineFormatter {
    fn format(&self, notation: &MusicNotation, opts: &FormatOptions) -> Result<String, SheetError> {
        let default = default_layout();
        let layout = opts.key_layout.as_ref().unwrap_or(&default);
        let actions = create_hit_actions(notation, layout)?;

        let mut timeline = String::new();
        for action in &actions {
            for &location in &action.locations {
                timeline.push_str(&layout.keys()[location].to_string());
            }
            // A zero delay leaves the next group adjacent, which reads back as one chord
            if action.post_delay == 0 {
                continue;
            }
            if action.locations.is_empty() {
                timeline.push_str(&format!("{} ", action.post_delay));
            } else {
                timeline.push_str(&format!("<{}>", action.post_delay));
            }
        }

        Ok(format!(
            "{}(\"{}\", \"{}\", {})\n",
            FUNC_NAME,
            escape(&notation.name),
            escape(&timeline),
            VERSION
        ))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Default)]
pub struct TimelineParser;

impl SheetParser for TimelineParser {
    fn parse(&self, content: &str, _opts: &ParseOptions) -> Result<MusicNotation, SheetError> {
        let call = CallReader::new(content).read_call()?;
        if call.version != VERSION {
            return Err(SheetError::Range(format!("Unexpected version: {}", call.version)));
        }
        parse_timeline(&call.name, &call.timeline)
    }
}

/// Arguments of the wrapping script call.
#[derive(Debug, PartialEq)]
struct Call {
    name: String,
    timeline: String,
    version: i64,
}

/// Reads `parseGenshinImpactMusic("name", "timeline", 2);` tracking line and column.
struct CallReader<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> CallReader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn error(&self, message: impl Into<String>) -> SheetError {
        SheetError::Syntax {
            location: Location::LineColumn {
                line: self.line,
                column: self.column,
            },
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SheetError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(self.error(format!("Expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("Expected '{}', found end of input", expected))),
        }
    }

    fn identifier(&mut self) -> String {
        self.skip_whitespace();
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn string_literal(&mut self) -> Result<String, SheetError> {
        self.skip_whitespace();
        let quote = match self.peek() {
            Some(c @ ('"' | '\'')) => c,
            _ => return Err(self.error("Expected a string literal")),
        };
        self.advance();

        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(c) => value.push(c),
                    None => return Err(self.error("Unterminated string literal")),
                },
                Some('\n') | None => return Err(self.error("Unterminated string literal")),
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, SheetError> {
        self.skip_whitespace();
        let mut digits = String::new();
        if self.peek() == Some('-') {
            digits.push('-');
            self.advance();
        }
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.advance();
        }
        digits
            .parse()
            .map_err(|_| self.error("Expected an integer version"))
    }

    fn read_call(mut self) -> Result<Call, SheetError> {
        let ident = self.identifier();
        if ident != FUNC_NAME {
            return Err(self.error(format!("Expected {}", FUNC_NAME)));
        }
        self.expect('(')?;
        let name = self.string_literal()?;
        self.expect(',')?;
        let timeline = self.string_literal()?;
        self.expect(',')?;
        let version = self.integer()?;
        self.expect(')')?;

        self.skip_whitespace();
        if self.peek() == Some(';') {
            self.advance();
            self.skip_whitespace();
        }
        if let Some(c) = self.peek() {
            return Err(self.error(format!("Unexpected character '{}'", c)));
        }
        Ok(Call { name, timeline, version })
    }
}

/// Map a key name such as `C3` or `C3D3` to 12-TET.
fn key_by_name(name: &str) -> Option<i32> {
    if !name.is_ascii() {
        return None;
    }
    let bytes = name.as_bytes();
    match bytes.len() {
        2 => {
            let letter = bytes[0];
            let digit = bytes[1];
            if !(b'A'..=b'G').contains(&letter) || !digit.is_ascii_digit() {
                return None;
            }
            // C D E F G A B
            let degree = (letter - b'A' + 5) as i32 % 7;
            let mut octave = (digit - b'0') as i32 - 4;
            // The instrument's names for C..G run one octave behind the pitch
            if degree < 5 {
                octave += 1;
            }
            Some(basic_note_to_12tet(degree) + octave * 12)
        }
        4 => {
            let above_low = key_by_name(&name[..2])? + 1;
            let below_high = key_by_name(&name[2..])? - 1;
            (above_low == below_high).then_some(above_low)
        }
        _ => None,
    }
}

/// A key group with its place on the timeline.
#[derive(Debug, Clone, Default)]
struct KeyPress {
    keys: Vec<i32>,
    start: u64,
    wait: u64,
    hold: u64,
}

/// A beat on the absolute timeline before it is expressed as a rate.
#[derive(Debug)]
struct TimedBeat {
    keys: Vec<i32>,
    start: u64,
    time: u64,
}

/// Left-to-right scanner over a timeline string.
struct TimelineScanner {
    chars: Vec<char>,
    position: usize,
    /// Timeline position of the next key group.
    start: u64,
    current: KeyPress,
    presses: Vec<KeyPress>,
    /// `<N>` and `(N)` may only follow a key group.
    after_keys: bool,
}

impl TimelineScanner {
    fn new(timeline: &str) -> Self {
        Self {
            chars: timeline.chars().collect(),
            position: 0,
            start: 0,
            current: KeyPress::default(),
            presses: Vec::new(),
            after_keys: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn error_at(&self, index: usize) -> SheetError {
        let found = self
            .chars
            .get(index)
            .map_or("end of input".to_string(), |c| format!("'{}'", c));
        SheetError::syntax_at(index, format!("Unexpected {}", found))
    }

    fn last_index(&self) -> usize {
        self.chars.len().saturating_sub(1)
    }

    fn scan(mut self) -> Result<Vec<KeyPress>, SheetError> {
        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => self.position += 1,
                '{' => {
                    let keys = self.key_groups()?;
                    self.begin_press(keys);
                    self.after_keys = true;
                }
                '<' | '(' => {
                    if !self.after_keys {
                        return Err(self.error_at(self.position));
                    }
                    let at = self.position;
                    let close = if c == '<' { '>' } else { ')' };
                    let time = self.span(close)?;
                    self.current.hold = add_time(self.current.hold, time, at)?;
                    if c == '<' {
                        self.advance_timeline(time, at)?;
                    }
                    self.after_keys = false;
                }
                '0'..='9' => {
                    let at = self.position;
                    let time = self.number()?;
                    self.advance_timeline(time, at)?;
                    self.after_keys = false;
                }
                _ => return Err(self.error_at(self.position)),
            }
        }
        self.presses.push(self.current);
        Ok(self.presses)
    }

    /// Move the timeline forward; `at` is where the time was written.
    fn advance_timeline(&mut self, time: u64, at: usize) -> Result<(), SheetError> {
        self.current.wait = add_time(self.current.wait, time, at)?;
        self.start = add_time(self.start, time, at)?;
        Ok(())
    }

    fn begin_press(&mut self, keys: Vec<i32>) {
        let next = KeyPress {
            keys,
            start: self.start,
            ..Default::default()
        };
        let previous = std::mem::replace(&mut self.current, next);
        if !previous.keys.is_empty() || previous.wait > 0 {
            self.presses.push(previous);
        }
    }

    /// One or more adjacent `{NAME}` groups.
    fn key_groups(&mut self) -> Result<Vec<i32>, SheetError> {
        let mut keys = Vec::new();
        while self.peek() == Some('{') {
            self.position += 1;
            let mut name = String::new();
            loop {
                match self.peek() {
                    Some('}') => {
                        let key = key_by_name(&name).ok_or_else(|| self.error_at(self.position))?;
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                        self.position += 1;
                        break;
                    }
                    Some(c) if ('A'..='G').contains(&c) || c.is_ascii_digit() => {
                        name.push(c);
                        self.position += 1;
                    }
                    Some(_) => return Err(self.error_at(self.position)),
                    None => return Err(self.error_at(self.last_index())),
                }
            }
        }
        Ok(keys)
    }

    /// `<N>` or `(N)` with a positive `N`, starting at the opening bracket.
    fn span(&mut self, close: char) -> Result<u64, SheetError> {
        self.position += 1;
        let mut time: u64 = 0;
        loop {
            match self.peek() {
                Some(c) if c == close => {
                    if time == 0 {
                        return Err(self.error_at(self.position));
                    }
                    self.position += 1;
                    return Ok(time);
                }
                Some(c @ '0'..='9') => {
                    time = push_digit(time, c).ok_or_else(|| self.error_at(self.position))?;
                    self.position += 1;
                }
                Some(_) => return Err(self.error_at(self.position)),
                None => return Err(self.error_at(self.last_index())),
            }
        }
    }

    fn number(&mut self) -> Result<u64, SheetError> {
        let mut num: u64 = 0;
        while let Some(c @ '0'..='9') = self.peek() {
            num = push_digit(num, c).ok_or_else(|| self.error_at(self.position))?;
            self.position += 1;
        }
        Ok(num)
    }
}

/// Sum of two durations, kept within what a `Rate` can hold.
fn add_time(total: u64, time: u64, at: usize) -> Result<u64, SheetError> {
    total
        .checked_add(time)
        .filter(|&sum| i64::try_from(sum).is_ok())
        .ok_or_else(|| SheetError::syntax_at(at, "Timeline is too long"))
}

fn push_digit(value: u64, digit: char) -> Option<u64> {
    let digit = digit.to_digit(10)? as u64;
    value.checked_mul(10)?.checked_add(digit)
}

/// Merge presses sharing a start time and split holds shorter than their wait.
fn timed_beats(presses: Vec<KeyPress>) -> Vec<TimedBeat> {
    let mut groups: BTreeMap<u64, Vec<KeyPress>> = BTreeMap::new();
    for press in presses {
        groups.entry(press.start).or_default().push(press);
    }

    let mut beats = Vec::new();
    for (start, group) in groups {
        let mut keys = Vec::new();
        for key in group.iter().flat_map(|press| press.keys.iter().copied()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let wait = group.iter().map(|press| press.wait).max().unwrap_or(0);
        let hold = group.iter().map(|press| press.hold).max().unwrap_or(0);

        if !keys.is_empty() && hold > 0 && wait > hold {
            beats.push(TimedBeat { keys, start, time: hold });
            beats.push(TimedBeat {
                keys: Vec::new(),
                start: start + hold,
                time: wait - hold,
            });
        } else {
            beats.push(TimedBeat { keys, start, time: wait });
        }
    }
    beats.sort_by_key(|beat| beat.start);
    beats
}

/// Parse a bare timeline string into a notation named `name`.
///
/// The shortest duration on the timeline becomes the reference beat. Key groups
/// with no duration last four reference beats.
pub fn parse_timeline(name: &str, timeline: &str) -> Result<MusicNotation, SheetError> {
    let presses = TimelineScanner::new(timeline).scan()?;
    let beats = timed_beats(presses);

    let unit = beats
        .iter()
        .map(|beat| beat.time)
        .filter(|&time| time > 0)
        .min()
        .ok_or_else(|| SheetError::Range("The timeline has no duration".to_string()))?;

    let bpm = u32::try_from(MS_PER_MINUTE / unit)
        .ok()
        .filter(|&bpm| bpm > 0)
        .ok_or_else(|| SheetError::Range(format!("Beat of {} ms is too long", unit)))?;

    let beats = beats
        .into_iter()
        .map(|beat| {
            let time = if beat.time > 0 { beat.time } else { unit * 4 };
            let time = i64::try_from(time)
                .map_err(|_| SheetError::Range(format!("Beat of {} ms is too long", time)))?;
            let rate = Rate::new(time, unit as i64)?.simplify();
            Ok(Beat::new(rate, beat.keys))
        })
        .collect::<Result<Vec<_>, SheetError>>()?;

    Ok(MusicNotation {
        name: name.to_string(),
        bpm,
        beats,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(a: i64, b: i64) -> Rate {
        Rate::new(a, b).unwrap()
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_by_name("C2"), Some(-12));
        assert_eq!(key_by_name("D2"), Some(-10));
        assert_eq!(key_by_name("G2"), Some(-5));
        assert_eq!(key_by_name("A3"), Some(-3));
        assert_eq!(key_by_name("B3"), Some(-1));
        assert_eq!(key_by_name("C3"), Some(0));
        assert_eq!(key_by_name("B5"), Some(23));
    }

    #[test]
    fn test_semitone_key_names() {
        assert_eq!(key_by_name("C3D3"), Some(1));
        assert_eq!(key_by_name("F3G3"), Some(6));
        // E and F are already a semitone apart
        assert_eq!(key_by_name("E3F3"), None);
        assert_eq!(key_by_name("H3"), None);
        assert_eq!(key_by_name("C"), None);
    }

    #[test]
    fn test_parse_example_timeline() {
        let notation = parse_timeline("demo", "250 {C2}<250>{D2}<500>{E2}<750>").unwrap();
        assert_eq!(notation.name, "demo");
        assert_eq!(notation.bpm, 240);
        assert_eq!(notation.key_note, 0);
        assert_eq!(
            notation.beats,
            vec![
                Beat::rest(rate(1, 1)),
                Beat::new(rate(1, 1), vec![-12]),
                Beat::new(rate(2, 1), vec![-10]),
                Beat::new(rate(3, 1), vec![-8]),
            ]
        );
    }

    #[test]
    fn test_hold_shorter_than_wait_splits_beat() {
        // C3 held 200 ms, D3 pressed 300 ms after C3
        let notation = parse_timeline("", "{C3}(200) 300 {D3}<100>").unwrap();
        assert_eq!(notation.bpm, 600);
        assert_eq!(
            notation.beats,
            vec![
                Beat::new(rate(2, 1), vec![0]),
                Beat::rest(rate(1, 1)),
                Beat::new(rate(1, 1), vec![2]),
            ]
        );
    }

    #[test]
    fn test_adjacent_groups_form_chord() {
        let notation = parse_timeline("", "{C3}{E3}{C3}<500>").unwrap();
        assert_eq!(notation.beats, vec![Beat::new(rate(1, 1), vec![0, 4])]);
        assert_eq!(notation.bpm, 120);
    }

    #[test]
    fn test_zero_length_group_lasts_four_units() {
        let notation = parse_timeline("", "{C3}<250>{D3}").unwrap();
        assert_eq!(notation.beats[1], Beat::new(rate(4, 1), vec![2]));
    }

    #[test]
    fn test_syntax_errors_carry_index() {
        let cases = [
            ("{C3}<0>", 6),    // zero hold
            ("250 <100>", 4),  // hold without keys
            ("{C3}x", 4),      // unknown character
            ("{C3", 2),        // unclosed group
            ("{C3}<12", 6),    // unclosed span
            ("{H3}", 1),       // bad key character
            ("{C33}", 4),      // bad key name
        ];
        for (timeline, index) in cases {
            match parse_timeline("", timeline) {
                Err(SheetError::Syntax { location, .. }) => {
                    assert_eq!(location, Location::Index(index), "{}", timeline)
                }
                other => panic!("Expected syntax error for {}, got {:?}", timeline, other),
            }
        }
    }

    #[test]
    fn test_empty_timeline_has_no_duration() {
        assert!(matches!(parse_timeline("", "  "), Err(SheetError::Range(_))));
    }

    #[test]
    fn test_parse_call() {
        let notation = TimelineParser
            .parse(
                "parseGenshinImpactMusic(\"My \\\"Song\\\"\", '{C3}<500>', 2);\n",
                &ParseOptions::default(),
            )
            .unwrap();
        assert_eq!(notation.name, "My \"Song\"");
        assert_eq!(notation.beats.len(), 1);
    }

    #[test]
    fn test_parse_call_rejects_other_versions() {
        let err = TimelineParser
            .parse("parseGenshinImpactMusic(\"a\", \"{C3}<500>\", 1)", &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, SheetError::Range(_)));
    }

    #[test]
    fn test_parse_call_syntax_error_has_line_and_column() {
        let err = TimelineParser
            .parse("parseGenshinImpactMusic(\"a\",\n  x)", &ParseOptions::default())
            .unwrap_err();
        match err {
            SheetError::Syntax { location, .. } => {
                assert_eq!(location, Location::LineColumn { line: 2, column: 3 })
            }
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_format_round_trip() {
        let source = "parseGenshinImpactMusic(\"demo\", \"250 {C2}<250>{D2}<500>{E2}<750>\", 2)\n";
        let notation = TimelineParser.parse(source, &ParseOptions::default()).unwrap();
        let output = TimelineFormatter.format(&notation, &FormatOptions::default()).unwrap();
        assert_eq!(output, source);
    }

    #[test]
    fn test_format_with_custom_layout() {
        let notation = MusicNotation {
            name: "scale".to_string(),
            bpm: 120,
            beats: vec![Beat::new(rate(1, 1), vec![0, 4]), Beat::rest(rate(1, 2))],
            ..Default::default()
        };
        let layout = KeyLayout::new(
            vec![
                KeyLabel::Name("{X}".to_string()),
                KeyLabel::Name("{Y}".to_string()),
                KeyLabel::Name("{Z}".to_string()),
            ],
            0,
            false,
        );
        let opts = FormatOptions { key_layout: Some(layout) };
        let output = TimelineFormatter.format(&notation, &opts).unwrap();
        assert_eq!(output, "parseGenshinImpactMusic(\"scale\", \"{X}{Z}<500>250 \", 2)\n");
    }

    #[test]
    fn test_overlong_timeline_is_rejected_at_its_bracket() {
        let cases = [
            ("{C3}<100>{D3}<18446744073709551615>{E3}<100>", 13),
            ("{C3}<100>{D3}<10000000000000000000>", 13),
            ("{C3}<5000000000000000000>{D3}<5000000000000000000>", 29),
            ("{C3}<5000000000000000000>5000000000000000000", 25),
        ];
        for (timeline, index) in cases {
            match parse_timeline("", timeline) {
                Err(SheetError::Syntax { location, .. }) => {
                    assert_eq!(location, Location::Index(index), "{}", timeline)
                }
                other => panic!("Expected syntax error for {}, got {:?}", timeline, other),
            }
        }
    }

    #[test]
    fn test_long_beats_keep_positive_rates() {
        let notation = parse_timeline("", "{C3}<100>{D3}<9000000000000000000>").unwrap();
        assert!(notation.beats.iter().all(|beat| beat.rate.numerator() > 0));
        assert_eq!(notation.beats[1].rate, rate(90_000_000_000_000_000, 1));
    }
}
