//! Command implementations.

pub mod cleanup;
pub mod config;
pub mod exif;
pub mod process;

use clap::ValueEnum;
use photoprep_core::Trigger;

/// What produced the input file.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Source {
    /// A fresh camera capture; its files may be deleted or relocated
    Capture,
    /// An existing gallery item; never deleted
    #[default]
    Pick,
}

impl From<Source> for Trigger {
    fn from(source: Source) -> Self {
        match source {
            Source::Capture => Trigger::Capture,
            Source::Pick => Trigger::Pick,
        }
    }
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for photoprep_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Jsonl => Self::JsonLines,
        }
    }
}
