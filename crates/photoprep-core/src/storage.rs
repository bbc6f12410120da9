//! Destination allocation and cross-volume file moves.
//!
//! Where the storage roots live is the host's business; [`StorageRoots`] is
//! the only contract this module relies on.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

/// Resolves writable directories for picture files.
pub trait StorageRoots: Send + Sync {
    /// Public pictures root, visible to the media index.
    fn public_pictures(&self) -> PathBuf;

    /// Permanent gallery root that kept photos are moved into.
    fn gallery(&self) -> PathBuf;

    /// App-scoped pictures directory.
    fn private_pictures(&self) -> PathBuf;
}

/// Storage roots backed by fixed directories.
#[derive(Debug, Clone)]
pub struct DirStorageRoots {
    pictures: PathBuf,
    gallery: PathBuf,
    private: PathBuf,
}

impl DirStorageRoots {
    pub fn new(
        pictures: impl Into<PathBuf>,
        gallery: impl Into<PathBuf>,
        private: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pictures: pictures.into(),
            gallery: gallery.into(),
            private: private.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pictures_dir(),
            config.gallery_dir(),
            config.private_dir(),
        )
    }
}

impl StorageRoots for DirStorageRoots {
    fn public_pictures(&self) -> PathBuf {
        self.pictures.clone()
    }

    fn gallery(&self) -> PathBuf {
        self.gallery.clone()
    }

    fn private_pictures(&self) -> PathBuf {
        self.private.clone()
    }
}

/// Allocates destination files and moves files between storage roots.
#[derive(Clone)]
pub struct FileStore {
    roots: Arc<dyn StorageRoots>,
    copy_buffer: usize,
}

impl FileStore {
    /// Create a store over the given roots, copying in chunks of `copy_buffer` bytes.
    pub fn new(roots: Arc<dyn StorageRoots>, copy_buffer: usize) -> Self {
        Self {
            roots,
            copy_buffer: copy_buffer.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(DirStorageRoots::from_config(config)),
            config.storage.copy_buffer_kb.saturating_mul(1024),
        )
    }

    pub fn roots(&self) -> &dyn StorageRoots {
        self.roots.as_ref()
    }

    /// Pick the directory a new file goes into.
    ///
    /// A caller subdirectory always lands under the public root; otherwise
    /// `force_local` selects the private directory over the public root.
    pub fn destination_dir(&self, sub_path: Option<&str>, force_local: bool) -> PathBuf {
        match sub_path {
            Some(sub) => self.roots.public_pictures().join(sub),
            None if force_local => self.roots.private_pictures(),
            None => self.roots.public_pictures(),
        }
    }

    /// Create an empty, uniquely named `image-<uuid>.jpg` file.
    pub fn allocate(&self, sub_path: Option<&str>, force_local: bool) -> PipelineResult<PathBuf> {
        if let Some(sub) = sub_path {
            let escapes = Path::new(sub)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                return Err(PipelineError::InvalidRequest(format!(
                    "storage path must be a relative subdirectory, got {sub:?}"
                )));
            }
        }

        let dir = self.destination_dir(sub_path, force_local);
        fs::create_dir_all(&dir).map_err(|e| PipelineError::StorageUnavailable {
            path: dir.clone(),
            message: format!("Cannot create directory: {e}"),
        })?;

        let path = dir.join(format!("image-{}.jpg", Uuid::new_v4()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| PipelineError::StorageUnavailable {
                path: path.clone(),
                message: format!("Cannot create file: {e}"),
            })?;

        tracing::debug!("Allocated {:?}", path);
        Ok(path)
    }

    /// Move `source` to `destination` by streaming copy, then delete the source.
    ///
    /// An existing destination is never overwritten: the move fails with
    /// `AlreadyExists`. On failure the source is untouched and no partial
    /// destination remains.
    pub fn move_file(&self, source: &Path, destination: &Path) -> io::Result<()> {
        if is_same_file(source, destination) {
            return Ok(());
        }

        let mut reader = File::open(source)?;
        let writer = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)?;

        if let Err(e) = self.copy_streaming(&mut reader, writer) {
            drop(reader);
            if let Err(cleanup) = fs::remove_file(destination) {
                tracing::warn!(
                    "Failed to remove partial copy {:?}: {}",
                    destination,
                    cleanup
                );
            }
            return Err(e);
        }
        drop(reader);

        if let Err(e) = fs::remove_file(source) {
            tracing::warn!("Copied to {:?} but could not remove {:?}: {}", destination, source, e);
        }
        Ok(())
    }

    fn copy_streaming(&self, reader: &mut File, writer: File) -> io::Result<u64> {
        let mut writer = BufWriter::with_capacity(self.copy_buffer, writer);
        let mut buffer = vec![0u8; self.copy_buffer];
        let mut total = 0u64;
        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&buffer[..bytes_read])?;
            total += bytes_read as u64;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(total)
    }

    /// Delete `path` if it exists. Returns whether a file was removed.
    pub fn delete_if_exists(path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Failed to delete {:?}: {}", path, e);
                false
            }
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
