//! # Format Registry and Convertor
//!
//! A [`MusicConvertor`] holds the parsers and formatters of every registered format.
//! Input is unlabeled, so [`MusicConvertor::parse`] offers it to every parser and keeps
//! the first notation produced; output goes through the one formatter named by the caller.
//!
//! ## Pipeline
//! 1. Try each parser in registration order, collecting failures
//! 2. First success wins; if none, fail with every parser's error
//! 3. Look up the formatter by label and render the notation
//!
//! ## Example
//! ```rust
//! use sheets::{default_convertor, FormatOptions, ParseOptions};
//!
//! let convertor = default_convertor();
//! let sheet = "[1=C,4/4,120]1,2,3,";
//! let output = convertor.convert(
//!     "sky-studio-abc",
//!     sheet,
//!     &ParseOptions::default(),
//!     &FormatOptions::default(),
//! )?;
//! assert!(output.starts_with("<DontCopyThisLine> 120 0 16"));
//! # Ok::<(), sheets::SheetError>(())
//! ```

use std::collections::HashMap;

use log::{debug, info};

use crate::error::{ParseFailure, SheetError};
use crate::notation::{KeyLayout, MusicNotation};

/// Hints for parsers. Input is still identified by content, not by these.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Name of the file the content came from; some formats take the sheet name from it.
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    /// Target instrument for formats that address keys by position.
    pub key_layout: Option<KeyLayout>,
}

/// Reads one concrete syntax into a [`MusicNotation`].
///
/// Implementations treat the input as read-only and keep no state between calls;
/// every registered parser sees the same input.
pub trait SheetParser: Send + Sync {
    fn parse(&self, content: &str, opts: &ParseOptions) -> Result<MusicNotation, SheetError>;
}

/// Writes a [`MusicNotation`] in one concrete syntax.
pub trait SheetFormatter: Send + Sync {
    fn format(&self, notation: &MusicNotation, opts: &FormatOptions) -> Result<String, SheetError>;
}

/// A format label with its optional parser and formatter.
pub struct Handler {
    pub label: String,
    pub parser: Option<Box<dyn SheetParser>>,
    pub formatter: Option<Box<dyn SheetFormatter>>,
}

impl Handler {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parser: None,
            formatter: None,
        }
    }

    pub fn with_parser(mut self, parser: impl SheetParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn with_formatter(mut self, formatter: impl SheetFormatter + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }
}

/// Registry of format handlers. Immutable once built.
pub struct MusicConvertor {
    parsers: Vec<(String, Box<dyn SheetParser>)>,
    formatters: HashMap<String, Box<dyn SheetFormatter>>,
}

impl MusicConvertor {
    /// Register `handlers` in order. A later handler replaces an earlier one with the same label.
    pub fn new(handlers: impl IntoIterator<Item = Handler>) -> Self {
        let mut parsers: Vec<(String, Box<dyn SheetParser>)> = Vec::new();
        let mut formatters = HashMap::new();

        for handler in handlers {
            if let Some(formatter) = handler.formatter {
                formatters.insert(handler.label.clone(), formatter);
            }
            if let Some(parser) = handler.parser {
                match parsers.iter_mut().find(|(label, _)| *label == handler.label) {
                    Some(entry) => entry.1 = parser,
                    None => parsers.push((handler.label, parser)),
                }
            }
        }

        Self { parsers, formatters }
    }

    /// Labels with a parser, in the order they are tried.
    pub fn parser_labels(&self) -> Vec<&str> {
        self.parsers.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Labels with a formatter, sorted.
    pub fn formatter_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Parse unlabeled `content` with whichever registered parser accepts it.
    ///
    /// # Errors
    /// [`SheetError::NoParserAccepted`] with one entry per parser when all of them fail.
    pub fn parse(&self, content: &str, opts: &ParseOptions) -> Result<MusicNotation, SheetError> {
        let mut failures = Vec::new();

        for (label, parser) in &self.parsers {
            match parser.parse(content, opts) {
                Ok(notation) => {
                    info!("parsed input as {}", label);
                    return Ok(notation);
                }
                Err(error) => {
                    debug!("{} rejected the input: {}", label, error);
                    failures.push(ParseFailure {
                        label: label.clone(),
                        error,
                    });
                }
            }
        }

        Err(SheetError::NoParserAccepted(failures))
    }

    /// Render `notation` with the formatter registered under `label`.
    pub fn format(&self, label: &str, notation: &MusicNotation, opts: &FormatOptions) -> Result<String, SheetError> {
        let formatter = self
            .formatters
            .get(label)
            .ok_or_else(|| SheetError::UnknownFormat(label.to_string()))?;
        formatter.format(notation, opts)
    }

    /// Parse `content` in whatever format it is and render it as `label`.
    pub fn convert(
        &self,
        label: &str,
        content: &str,
        parse_opts: &ParseOptions,
        format_opts: &FormatOptions,
    ) -> Result<String, SheetError> {
        let notation = self.parse(content, parse_opts)?;
        self.format(label, &notation, format_opts)
    }
}
