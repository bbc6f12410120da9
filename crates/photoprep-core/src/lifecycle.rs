//! What happens to a photo's files once the pipeline is through with them.

use std::path::Path;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::media_index::MediaIndex;
use crate::storage::FileStore;
use crate::types::{ImageDescriptor, StorageOptions, TransformResult, Trigger};

/// Relocates kept photos and removes transient files.
#[derive(Clone)]
pub struct LifecycleManager {
    store: FileStore,
    index: Arc<dyn MediaIndex>,
}

impl LifecycleManager {
    pub fn new(store: FileStore, index: Arc<dyn MediaIndex>) -> Self {
        Self { store, index }
    }

    /// Apply the destination mode once processing is complete.
    ///
    /// Only a capture the caller wants kept is moved into the gallery; every
    /// other combination leaves the files where they are.
    pub fn finish(
        &self,
        trigger: Trigger,
        storage: &StorageOptions,
        descriptor: ImageDescriptor,
    ) -> TransformResult {
        if trigger.is_capture() && storage.keep {
            self.relocate(&descriptor)
        } else {
            TransformResult::ok(descriptor)
        }
    }

    /// Delete a capture's files. Picked files belong to the user and are
    /// never touched.
    ///
    /// Returns the number of files removed.
    pub fn cleanup(&self, trigger: Trigger, descriptor: &ImageDescriptor) -> usize {
        if !trigger.is_capture() {
            return 0;
        }

        let mut removed = 0;
        if FileStore::delete_if_exists(&descriptor.original) {
            removed += 1;
        }
        if let Some(resized) = &descriptor.resized {
            if FileStore::delete_if_exists(resized) {
                removed += 1;
            }
        }
        tracing::debug!("Cleanup removed {} file(s) for {:?}", removed, descriptor.original);
        removed
    }

    /// Throw away the results of an abandoned operation.
    ///
    /// The derived file is always ours to delete; the original only for
    /// captures.
    pub fn abandon(&self, trigger: Trigger, descriptor: &ImageDescriptor) -> usize {
        if trigger.is_capture() {
            return self.cleanup(trigger, descriptor);
        }
        match &descriptor.resized {
            Some(resized) if resized != &descriptor.original => {
                usize::from(FileStore::delete_if_exists(resized))
            }
            _ => 0,
        }
    }

    /// Move the current file into the gallery root, keeping its name.
    ///
    /// On failure the descriptor comes back unmodified with the error.
    pub fn relocate(&self, descriptor: &ImageDescriptor) -> TransformResult {
        let current = descriptor.current();
        let gallery = self.store.roots().gallery();

        let Some(file_name) = current.file_name() else {
            return self.relocation_failed(descriptor, current, &gallery, "no file name".into());
        };
        let destination = gallery.join(file_name);

        if let Err(e) = std::fs::create_dir_all(&gallery) {
            return self.relocation_failed(descriptor, current, &destination, e.to_string());
        }
        if let Err(e) = self.store.move_file(current, &destination) {
            return self.relocation_failed(descriptor, current, &destination, e.to_string());
        }

        tracing::info!("Relocated {} to {}", current.display(), destination.display());
        self.index.scan(&destination);

        let relocated = if descriptor.resized.is_some() {
            descriptor.clone().with_resized_file(destination)
        } else {
            descriptor.clone().with_original_file(destination)
        };
        TransformResult::ok(relocated)
    }

    fn relocation_failed(
        &self,
        descriptor: &ImageDescriptor,
        from: &Path,
        to: &Path,
        message: String,
    ) -> TransformResult {
        let error = PipelineError::Relocation {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            message,
        };
        tracing::warn!("{}", error);
        TransformResult::degraded(descriptor.clone(), error)
    }
}
