//! The `photoprep cleanup` command: discard a capture's files.

use clap::Args;
use photoprep_core::{Config, FileStore, FsMediaIndex, ImageDescriptor, LifecycleManager};
use std::path::PathBuf;
use std::sync::Arc;

use super::Source;

/// Arguments for the `cleanup` command.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// The original file
    pub original: PathBuf,

    /// The derived file, if one was produced
    #[arg(long)]
    pub resized: Option<PathBuf>,

    /// What produced the original. Picked files are never deleted.
    #[arg(long, value_enum, default_value = "capture")]
    pub source: Source,
}

/// Execute the cleanup command.
pub async fn execute(args: CleanupArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let manager = LifecycleManager::new(FileStore::from_config(&config), Arc::new(FsMediaIndex));

    let mut descriptor = ImageDescriptor::new(&args.original);
    if let Some(resized) = &args.resized {
        descriptor = descriptor.with_resized_file(resized);
    }

    let removed = manager.cleanup(args.source.into(), &descriptor);
    println!("Removed {removed} file(s)");
    Ok(())
}
