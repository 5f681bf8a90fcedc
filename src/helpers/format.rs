//! On-disk formats for the config file and the timesheet export.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Serialisation format, picked from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Json,
    #[default]
    Yaml,
}

impl Format {
    /// `.json` selects JSON. Everything else, including no extension, is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }

    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        Ok(match self {
            Format::Json => serde_json::from_str(content)?,
            Format::Yaml => serde_yaml::from_str(content)?,
        })
    }

    /// Pretty JSON or block-style YAML, newline terminated.
    pub fn write<T: Serialize, W: Write>(self, mut output: W, value: &T) -> Result<()> {
        match self {
            Format::Json => {
                serde_json::to_writer_pretty(&mut output, value)?;
                writeln!(output)?;
            }
            Format::Yaml => serde_yaml::to_writer(&mut output, value)?,
        }
        output.flush()?;
        Ok(())
    }
}
