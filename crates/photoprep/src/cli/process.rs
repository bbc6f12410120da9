//! The `photoprep process` command.

use anyhow::Context;
use clap::Args;
use photoprep_core::{
    Config, OutputFormat as CoreOutputFormat, OutputWriter, PhotoPrep, PickRequest,
    StorageOptions,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use super::{OutputFormat, Source};

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Image files to process
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// What produced the inputs
    #[arg(long, value_enum, default_value = "pick")]
    pub source: Source,

    /// Maximum output width in pixels (0 = unconstrained)
    #[arg(long, default_value = "0")]
    pub max_width: u32,

    /// Maximum output height in pixels (0 = unconstrained)
    #[arg(long, default_value = "0")]
    pub max_height: u32,

    /// JPEG quality, 0-100
    #[arg(short, long, default_value = "100", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: u8,

    /// Extra clockwise rotation: 0, 90, 180 or 270
    #[arg(short, long, default_value = "0")]
    pub rotation: u32,

    /// Subdirectory under the pictures root for the output
    #[arg(long)]
    pub path: Option<String>,

    /// Move captured photos into the gallery when done
    #[arg(long)]
    pub keep: bool,

    /// "Date added" value to fall back on when EXIF has no timestamp
    /// (seconds or milliseconds since the epoch)
    #[arg(long)]
    pub date_added: Option<i64>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl ProcessArgs {
    fn request(&self, input: PathBuf) -> PickRequest {
        let mut request = PickRequest::new(input, self.source.into());
        request.max_width = self.max_width;
        request.max_height = self.max_height;
        request.quality = self.quality;
        request.rotation = self.rotation;
        request.date_added = self.date_added;
        request.storage = StorageOptions {
            path: self.path.clone(),
            keep: self.keep,
        };
        request
    }
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs) -> anyhow::Result<()> {
    let config = Config::load()?;

    let format = match args.format {
        Some(format) => format.into(),
        None => CoreOutputFormat::parse(&config.output.format).unwrap_or(CoreOutputFormat::Json),
    };
    let pretty = args.pretty || config.output.pretty;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, format, pretty);

    let prep = Arc::new(PhotoPrep::new(&config));
    let mut failed = 0usize;

    for input in &args.inputs {
        let request = args.request(input.clone());
        match prep.process_async(request).await {
            Ok(prepared) => {
                if prepared.is_degraded() {
                    failed += 1;
                }
                writer.write(&prepared.to_response())?;
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed to process {}: {}", input.display(), e);
            }
        }
    }

    let total = args.inputs.len();
    writer.finish()?;

    let removed = prep.settle_abandoned().await;
    if removed > 0 {
        tracing::debug!("Removed {} file(s) left by abandoned runs", removed);
    }

    if failed > 0 {
        tracing::warn!("{} of {} image(s) had errors", failed, total);
    } else {
        tracing::info!("Processed {} image(s)", total);
    }

    if let Some(path) = &args.output {
        eprintln!("Results written to {}", path.display());
    }

    Ok(())
}
