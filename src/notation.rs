//! # Notation Data Model
//!
//! The intermediate representation every format converts through.
//!
//! ## Type Hierarchy
//! ```text
//! MusicNotation
//!   ├── name / author / transcribed_by (free text)
//!   ├── key_note: 12-TET offset of the tonic (octave included)
//!   ├── bpm: beats per minute of the reference beat
//!   └── Vec<Beat>
//!         ├── rate: Rate (duration in reference beats)
//!         └── tones: Vec<i32> (12-TET, relative to key_note; empty = rest)
//!
//! KeyLayout (target instrument)
//!   ├── keys: Vec<KeyLabel> (lowest to highest)
//!   ├── key_offset: pitch of the first key
//!   └── semitone: key pitches count semitones (true) or basic notes (false)
//!
//! HitAction (resolved beat)
//!   ├── locations: key indices to press
//!   └── post_delay: milliseconds until the next action
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::SheetError;
use crate::pitch::basic_note_to_12tet;
use crate::rate::Rate;

/// One timed event: a chord, a single note or a rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Beat {
    pub rate: Rate,
    pub tones: Vec<i32>,
}

impl Beat {
    pub fn new(rate: Rate, tones: Vec<i32>) -> Self {
        Self { rate, tones }
    }

    pub fn rest(rate: Rate) -> Self {
        Self { rate, tones: Vec::new() }
    }

    pub fn is_rest(&self) -> bool {
        self.tones.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MusicNotation {
    pub name: String,
    pub author: String,
    pub transcribed_by: String,
    pub key_note: i32,
    pub bpm: u32,
    pub beats: Vec<Beat>,
}

impl MusicNotation {
    /// Every tone of every beat as an absolute pitch (`tone + key_note`).
    pub fn absolute_tones(&self) -> impl Iterator<Item = i32> + '_ {
        self.beats
            .iter()
            .flat_map(move |beat| beat.tones.iter().map(move |tone| tone + self.key_note))
    }
}

/// Identity of a key on an instrument. Formats either name keys (`{C2}`) or number them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLabel {
    Index(i64),
    Name(String),
}

impl fmt::Display for KeyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyLabel::Index(index) => write!(f, "{}", index),
            KeyLabel::Name(name) => f.write_str(name),
        }
    }
}

/// The keys available on a target instrument, ordered from low to high.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLayout {
    keys: Vec<KeyLabel>,
    key_offset: i32,
    semitone: bool,
}

/// Raw key layout as read from JSON or YAML, validated field by field afterwards.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeyLayout {
    keys: Option<Value>,
    key_offset: Option<Value>,
    semitone: Option<Value>,
}

impl KeyLayout {
    pub fn new(keys: Vec<KeyLabel>, key_offset: i32, semitone: bool) -> Self {
        Self { keys, key_offset, semitone }
    }

    /// `count` keys labelled `0..count`.
    pub fn indexed(count: usize, key_offset: i32, semitone: bool) -> Self {
        let keys = (0..count as i64).map(KeyLabel::Index).collect();
        Self::new(keys, key_offset, semitone)
    }

    pub fn keys(&self) -> &[KeyLabel] {
        &self.keys
    }

    pub fn key_offset(&self) -> i32 {
        self.key_offset
    }

    pub fn semitone(&self) -> bool {
        self.semitone
    }

    /// 12-TET pitch produced by the key at `index`.
    pub fn key_pitch(&self, index: usize) -> i32 {
        let note = self.key_offset + index as i32;
        if self.semitone {
            note
        } else {
            basic_note_to_12tet(note)
        }
    }

    /// Pitches of all keys, in key order.
    pub fn pitches(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.keys.len()).map(move |index| self.key_pitch(index))
    }

    /// Build a layout from an already parsed YAML/JSON value.
    pub fn from_value(value: Value) -> Result<Self, SheetError> {
        let raw: RawKeyLayout =
            serde_yaml::from_value(value).map_err(|e| SheetError::Type(e.to_string()))?;

        let keys = match raw.keys {
            Some(Value::Sequence(items)) => items
                .into_iter()
                .map(key_label)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(SheetError::Type("\"keys\" must be an array".to_string())),
        };

        let key_offset = raw
            .key_offset
            .as_ref()
            .and_then(Value::as_i64)
            .and_then(|offset| i32::try_from(offset).ok())
            .ok_or_else(|| SheetError::Type("\"keyOffset\" must be an integer".to_string()))?;

        let semitone = raw
            .semitone
            .as_ref()
            .and_then(Value::as_bool)
            .ok_or_else(|| SheetError::Type("\"semitone\" must be a boolean".to_string()))?;

        Ok(Self::new(keys, key_offset, semitone))
    }
}

fn key_label(value: Value) -> Result<KeyLabel, SheetError> {
    match value {
        Value::String(name) => Ok(KeyLabel::Name(name)),
        Value::Number(number) => number
            .as_i64()
            .map(KeyLabel::Index)
            .ok_or_else(|| SheetError::Type(format!("Invalid key: {}", number))),
        other => Err(SheetError::Type(format!("Invalid key: {:?}", other))),
    }
}

impl FromStr for KeyLayout {
    type Err = SheetError;

    /// Read a layout written as JSON or YAML.
    ///
    /// ```
    /// # use sheets::KeyLayout;
    /// let layout: KeyLayout = r#"{"keys": ["{C3}", "{D3}"], "keyOffset": 0, "semitone": false}"#
    ///     .parse()
    ///     .unwrap();
    /// assert_eq!(layout.keys().len(), 2);
    /// assert_eq!(layout.key_pitch(1), 2);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_yaml::from_str(s).map_err(|e| SheetError::Type(e.to_string()))?;
        Self::from_value(value)
    }
}

/// A beat resolved onto a key layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HitAction {
    pub locations: Vec<usize>,
    pub post_delay: u64,
}
