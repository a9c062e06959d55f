//! # Error Types
//!
//! This module defines all error types for the sheet converter.
//!
//! Parse errors carry a [`Location`] when the grammar can point at the offending
//! character, either as a character index (timeline strings) or as a line/column pair
//! (line oriented formats).
//!
//! ## Error Types
//! - `Syntax` - malformed grammar, with a locator
//! - `Range` - a numeric value outside its legal domain (zero bpm, unknown key, ...)
//! - `Type` - wrong JSON/YAML shape
//! - `MissingKey` - a notation cannot be placed on a key layout at any transposition
//! - `UnknownFormat` - no formatter registered under the requested label
//! - `NoParserAccepted` - every registered parser rejected the input
//!
//! ## Usage
//! ```rust
//! use sheets::{default_convertor, ParseOptions, SheetError};
//!
//! let convertor = default_convertor();
//! match convertor.parse("not a sheet", &ParseOptions::default()) {
//!     Ok(notation) => println!("{} beats", notation.beats.len()),
//!     Err(SheetError::NoParserAccepted(failures)) => {
//!         for failure in &failures {
//!             eprintln!("{}", failure);
//!         }
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// Where in the input a syntax error was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Zero-based character index into a flat string.
    Index(usize),
    /// One-based line and column.
    LineColumn { line: usize, column: usize },
    /// The grammar cannot point at a single character.
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Index(index) => write!(f, "index {}", index),
            Location::LineColumn { line, column } => write!(f, "line {}, column {}", line, column),
            Location::Unknown => write!(f, "unknown position"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SheetError {
    /// Malformed grammar.
    ///
    /// # Example
    /// ```
    /// # use sheets::{Location, SheetError};
    /// let err = SheetError::Syntax {
    ///     location: Location::LineColumn { line: 2, column: 7 },
    ///     message: "unexpected character 'x'".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Syntax error at line 2, column 7: unexpected character 'x'");
    /// ```
    #[error("Syntax error at {location}: {message}")]
    Syntax { location: Location, message: String },

    /// A numeric value outside its legal domain.
    #[error("Range error: {0}")]
    Range(String),

    /// Input of the wrong shape, usually JSON or YAML.
    #[error("Type error: {0}")]
    Type(String),

    /// The notation needs a pitch the key layout cannot produce at any transposition.
    #[error("Missing key: the notation cannot be played on this key layout")]
    MissingKey,

    /// No formatter is registered under the requested label.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// Every registered parser rejected the input.
    ///
    /// # Example
    /// ```
    /// # use sheets::{ParseFailure, SheetError};
    /// let err = SheetError::NoParserAccepted(vec![ParseFailure {
    ///     label: "sky-studio-json".to_string(),
    ///     error: SheetError::Type("Data type error".to_string()),
    /// }]);
    /// assert_eq!(
    ///     err.to_string(),
    ///     "No parser accepted the input: sky-studio-json -> Type error: Data type error"
    /// );
    /// ```
    #[error("No parser accepted the input: {}", join_failures(.0))]
    NoParserAccepted(Vec<ParseFailure>),
}

impl SheetError {
    pub(crate) fn syntax_at(index: usize, message: impl Into<String>) -> Self {
        SheetError::Syntax {
            location: Location::Index(index),
            message: message.into(),
        }
    }
}

/// One parser's rejection, kept so the caller can tell which syntax was intended.
#[derive(Debug)]
pub struct ParseFailure {
    pub label: String,
    pub error: SheetError,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.label, self.error)
    }
}

fn join_failures(failures: &[ParseFailure]) -> String {
    if failures.is_empty() {
        return "no parsers registered".to_string();
    }
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
