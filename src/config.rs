//! # CLI Configuration
//!
//! Defaults for the `sheets` binary, read from YAML:
//!
//! ```yaml
//! format: fengxu-genshin-2
//! key-layout:
//!   keys: ["{C2}", "{D2}", "{E2}"]
//!   keyOffset: 0
//!   semitone: false
//! ```
//!
//! Both keys are optional. Command-line flags override them.

use std::str::FromStr;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::SheetError;
use crate::formats::Format;
use crate::notation::KeyLayout;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Output format.
    pub format: Option<Format>,
    /// Instrument for formats that address keys by position.
    pub key_layout: Option<KeyLayout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    format: Option<String>,
    key_layout: Option<Value>,
}

impl FromStr for Config {
    type Err = SheetError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| SheetError::Type(e.to_string()))?;

        let format = raw.format.as_deref().map(str::parse::<Format>).transpose()?;
        let key_layout = raw.key_layout.map(KeyLayout::from_value).transpose()?;

        Ok(Config { format, key_layout })
    }
}
