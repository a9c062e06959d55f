pub mod config;
pub mod convertor;
pub mod error;
pub mod formats;
pub mod notation;
pub mod pitch;
pub mod rate;
pub mod transpose;

pub use config::Config;
pub use convertor::{FormatOptions, Handler, MusicConvertor, ParseOptions, SheetFormatter, SheetParser};
pub use error::{Location, ParseFailure, SheetError};
pub use formats::Format;
pub use notation::{Beat, HitAction, KeyLabel, KeyLayout, MusicNotation};
pub use rate::Rate;
pub use transpose::{create_hit_actions, find_suitable_offset};

/// A convertor with every built-in format registered.
/// This is the main entry point for the library.
pub fn default_convertor() -> MusicConvertor {
    MusicConvertor::new(Format::ALL.into_iter().map(Format::handler))
}

/// Convert a sheet of any built-in format to `target`.
pub fn convert(content: &str, target: Format, opts: &ParseOptions) -> Result<String, SheetError> {
    default_convertor().convert(target.label(), content, opts, &FormatOptions::default())
}
