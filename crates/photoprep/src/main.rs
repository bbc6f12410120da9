//! PhotoPrep CLI - downsample, orient and relocate photos.
//!
//! Takes a captured or picked photo, produces a bounded, upright JPEG and
//! reports the metadata recovered from the original.
//!
//! # Usage
//!
//! ```bash
//! # Bound a picked photo to 1280px wide
//! photoprep process IMG_0001.jpg --max-width 1280 --quality 85
//!
//! # Treat the input as a capture and keep it in the gallery
//! photoprep process capture.jpg --source capture --keep
//!
//! # Inspect metadata only
//! photoprep exif IMG_0001.jpg
//!
//! # View configuration
//! photoprep config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// PhotoPrep - normalize captured and picked photos.
#[derive(Parser, Debug)]
#[command(name = "photoprep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Resize, orient and re-encode photos, then report their metadata
    Process(cli::process::ProcessArgs),

    /// Print the EXIF-derived metadata of a photo
    Exif(cli::exif::ExifArgs),

    /// Delete the files of a discarded capture
    Cleanup(cli::cleanup::CleanupArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match photoprep_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `photoprep config validate`."
            );
            photoprep_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("PhotoPrep v{}", photoprep_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args).await,
        Commands::Exif(args) => cli::exif::execute(args).await,
        Commands::Cleanup(args) => cli::cleanup::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
