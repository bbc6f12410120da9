//! The `photoprep exif` command: print the metadata the pipeline would report.

use clap::Args;
use photoprep_core::{ExifReader, FsMediaIndex};
use std::path::PathBuf;

/// Arguments for the `exif` command.
#[derive(Args, Debug)]
pub struct ExifArgs {
    /// Image file to inspect
    pub input: PathBuf,

    /// "Date added" value to fall back on (seconds or milliseconds)
    #[arg(long)]
    pub date_added: Option<i64>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the exif command.
pub async fn execute(args: ExifArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("File not found: {}", args.input.display());
    }

    let outcome = ExifReader::read_with_fallback(&args.input, &FsMediaIndex, args.date_added);
    if let Some(e) = &outcome.error {
        tracing::warn!("{}", e);
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&outcome.record)?
    } else {
        serde_json::to_string(&outcome.record)?
    };
    println!("{json}");
    Ok(())
}
