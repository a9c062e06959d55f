//! # Structured events (`sky-studio-json`)
//!
//! ```json
//! [{
//!   "name": "Song", "author": "", "transcribedBy": "",
//!   "bitsPerPage": 16, "pitchLevel": 0, "bpm": 120,
//!   "songNotes": [{"time": 0, "key": "1Key0"}, {"time": 0, "key": "2Key4"}, {"time": 480, "key": "1Key0"}]
//! }]
//! ```
//!
//! Only the first sheet of the array is read. Notes sharing a `time` form a chord; the
//! number after `Key` indexes the 15 white keys of the instrument, lowest first.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::convertor::{FormatOptions, ParseOptions, SheetFormatter, SheetParser};
use crate::error::{Location, SheetError};
use crate::formats::checks::{check_bpm, check_pitch_level};
use crate::notation::{Beat, KeyLayout, MusicNotation};
use crate::pitch::basic_note_to_12tet;
use crate::rate::Rate;
use crate::transpose::create_hit_actions;

pub const LABEL: &str = "sky-studio-json";

const KEY_COUNT: usize = 15;

const BITS_PER_PAGE: u32 = 16;

const MS_PER_MINUTE: i64 = 60_000;

/// Duration of the last beat, which has no following note to measure against.
const FINAL_BEAT: i64 = 4;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventSheet<'a> {
    name: &'a str,
    author: &'a str,
    transcribed_by: &'a str,
    bits_per_page: u32,
    pitch_level: i32,
    bpm: u32,
    song_notes: Vec<SongNote>,
}

#[derive(Debug, Serialize)]
struct SongNote {
    time: u64,
    key: String,
}

#[derive(Debug, Default)]
pub struct EventFormatter;

impl SheetFormatter for EventFormatter {
    fn format(&self, notation: &MusicNotation, _opts: &FormatOptions) -> Result<String, SheetError> {
        // Keys are relative to "pitchLevel", so only the octave of the key note is placed
        let relative = MusicNotation {
            key_note: notation.key_note - notation.key_note.rem_euclid(12),
            ..notation.clone()
        };
        let layout = KeyLayout::indexed(KEY_COUNT, 0, false);
        let actions = create_hit_actions(&relative, &layout)?;

        let mut time = 0u64;
        let mut song_notes = Vec::new();
        for mut action in actions {
            action.locations.sort_unstable_by(|a, b| b.cmp(a));
            for (i, location) in action.locations.iter().enumerate() {
                let hand = if i == 0 { 1 } else { 2 };
                song_notes.push(SongNote {
                    time,
                    key: format!("{}Key{}", hand, location),
                });
            }
            time = time
                .checked_add(action.post_delay)
                .ok_or_else(|| SheetError::Range("The sheet is too long".to_string()))?;
        }

        let sheet = EventSheet {
            name: &notation.name,
            author: &notation.author,
            transcribed_by: &notation.transcribed_by,
            bits_per_page: BITS_PER_PAGE,
            pitch_level: notation.key_note.rem_euclid(12),
            bpm: notation.bpm,
            song_notes,
        };
        serde_json::to_string(&[sheet]).map_err(|e| SheetError::Type(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct EventParser;

impl SheetParser for EventParser {
    fn parse(&self, content: &str, _opts: &ParseOptions) -> Result<MusicNotation, SheetError> {
        let value: Value = serde_json::from_str(content).map_err(|e| SheetError::Syntax {
            location: Location::LineColumn {
                line: e.line(),
                column: e.column(),
            },
            message: e.to_string(),
        })?;
        let sheet = first_sheet(&value)?;

        let mut notation = MusicNotation {
            name: text_field(sheet, "name").unwrap_or("Unknown").to_string(),
            author: text_field(sheet, "author").unwrap_or_default().to_string(),
            transcribed_by: text_field(sheet, "transcribedBy").unwrap_or_default().to_string(),
            key_note: check_pitch_level(integer(sheet, "pitchLevel")?)?,
            bpm: check_bpm(integer(sheet, "bpm")?)?,
            beats: Vec::new(),
        };

        let notes = sheet
            .get("songNotes")
            .and_then(Value::as_array)
            .ok_or_else(|| SheetError::Type("\"songNotes\" must be an array".to_string()))?;

        let mut chords: BTreeMap<i64, Vec<i32>> = BTreeMap::new();
        for note in notes {
            let time = note_time(note)?;
            let key = note_key(note)?;
            chords.entry(time).or_default().push(basic_note_to_12tet(key));
        }

        let bpm = notation.bpm as i64;
        let mut last_time = 0;
        let mut pending = Vec::new();
        for (time, tones) in chords {
            let gap = (time - last_time)
                .checked_mul(bpm)
                .ok_or_else(|| SheetError::Range(format!("\"time\" is too large: {}", time)))?;
            // A gap before the first chord is a rest; chords always have a gap
            if gap != 0 {
                notation.beats.push(Beat::new(Rate::new(gap, MS_PER_MINUTE)?, pending));
            }
            pending = tones;
            last_time = time;
        }
        notation.beats.push(Beat::new(Rate::whole(FINAL_BEAT), pending));

        Ok(notation)
    }
}

fn first_sheet(value: &Value) -> Result<&Map<String, Value>, SheetError> {
    let sheets = value
        .as_array()
        .ok_or_else(|| SheetError::Type("Data type error".to_string()))?;
    let sheet = sheets
        .first()
        .filter(|sheet| !sheet.is_null())
        .ok_or_else(|| SheetError::Range("Sheets is empty".to_string()))?
        .as_object()
        .ok_or_else(|| SheetError::Type("Data type error".to_string()))?;
    if sheet.get("isEncrypted").is_some_and(truthy) {
        return Err(SheetError::Range("Encrypted sheets are not supported".to_string()));
    }
    Ok(sheet)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A non-empty string field.
fn text_field<'a>(sheet: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    sheet.get(field).and_then(Value::as_str).filter(|text| !text.is_empty())
}

fn integer(sheet: &Map<String, Value>, field: &str) -> Result<i64, SheetError> {
    sheet
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| SheetError::Type(format!("\"{}\" must be an integer", field)))
}

fn note_time(note: &Value) -> Result<i64, SheetError> {
    let time = note
        .get("time")
        .and_then(Value::as_i64)
        .ok_or_else(|| SheetError::Type("\"time\" must be an integer".to_string()))?;
    if time < 0 {
        return Err(SheetError::Range("\"time\" must not be negative".to_string()));
    }
    Ok(time)
}

/// Key index from `"1Key3"`, `"2Key3"`, ...
fn note_key(note: &Value) -> Result<i32, SheetError> {
    let key = note.get("key").and_then(Value::as_str).unwrap_or_default();
    key.split_once("Key")
        .and_then(|(_, index)| index.trim().parse::<i32>().ok())
        .filter(|index| (0..KEY_COUNT as i32).contains(index))
        .ok_or_else(|| SheetError::Range(format!("Unknown key: {}", key)))
}
