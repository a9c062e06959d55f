//! # Sheet Formats
//!
//! One sub-module per concrete syntax, each exposing a parser and a formatter.
//!
//! | Label | Module | Syntax |
//! |---|---|---|
//! | `sky-studio-json` | [`event`] | JSON array of timed key events |
//! | `sky-studio-abc` | [`letter`] | `A1`..`C5` key tokens and rhythmic dots |
//! | `fengxu-genshin-2` | [`timeline`] | script call wrapping a `{key}<ms>` timeline |
//! | `piano-wizard-yp` | [`cipher`] | numbered notation `[1=C,4/4,120]1,2,3` |
//!
//! [`Format`] names each of them; [`Format::handler`] builds its registry entry.

pub mod checks;
pub mod cipher;
pub mod event;
pub mod letter;
pub mod timeline;

use std::fmt;
use std::str::FromStr;

use crate::convertor::Handler;
use crate::error::SheetError;

/// The built-in formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    SkyStudioJson,
    SkyStudioAbc,
    FengxuGenshin2,
    PianoWizardYp,
}

impl Format {
    /// Every built-in format, in the order their parsers are tried.
    pub const ALL: [Format; 4] = [
        Format::SkyStudioJson,
        Format::SkyStudioAbc,
        Format::FengxuGenshin2,
        Format::PianoWizardYp,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Format::SkyStudioJson => event::LABEL,
            Format::SkyStudioAbc => letter::LABEL,
            Format::FengxuGenshin2 => timeline::LABEL,
            Format::PianoWizardYp => cipher::LABEL,
        }
    }

    /// File extension for converted output.
    pub fn extension(self) -> &'static str {
        match self {
            Format::SkyStudioJson => "json",
            Format::SkyStudioAbc | Format::FengxuGenshin2 => "txt",
            Format::PianoWizardYp => "yp.txt",
        }
    }

    pub fn handler(self) -> Handler {
        let handler = Handler::new(self.label());
        match self {
            Format::SkyStudioJson => handler
                .with_parser(event::EventParser)
                .with_formatter(event::EventFormatter),
            Format::SkyStudioAbc => handler
                .with_parser(letter::LetterParser)
                .with_formatter(letter::LetterFormatter),
            Format::FengxuGenshin2 => handler
                .with_parser(timeline::TimelineParser)
                .with_formatter(timeline::TimelineFormatter),
            Format::PianoWizardYp => handler
                .with_parser(cipher::CipherParser)
                .with_formatter(cipher::CipherFormatter),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Format {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.label() == s.trim())
            .ok_or_else(|| SheetError::UnknownFormat(s.to_string()))
    }
}
