//! The caller-facing entry point: one request in, one response out.
//!
//! A request runs the image pipeline when there is anything to normalize,
//! reads metadata from the untouched original, then applies the destination
//! mode. Failures along the way are collected next to the best descriptor
//! available; only cancellation is a hard failure.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::config::{Config, LimitsConfig};
use crate::error::{PipelineError, Result};
use crate::lifecycle::LifecycleManager;
use crate::media_index::{FsMediaIndex, MediaIndex};
use crate::pipeline::{ExifReader, ImagePipeline};
use crate::storage::FileStore;
use crate::types::{
    ExifRecord, ImageDescriptor, PickResponse, ResponseError, StorageOptions, Trigger,
};

/// Parameters for processing one photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRequest {
    /// The captured or picked file
    pub source: PathBuf,

    /// What produced the file
    pub trigger: Trigger,

    /// Maximum output width, 0 for unconstrained
    #[serde(default)]
    pub max_width: u32,

    /// Maximum output height, 0 for unconstrained
    #[serde(default)]
    pub max_height: u32,

    /// Re-encode quality (0-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Extra clockwise rotation in degrees
    #[serde(default)]
    pub rotation: u32,

    #[serde(default)]
    pub storage: StorageOptions,

    /// Host-provided "date added" value overriding the media index
    #[serde(default)]
    pub date_added: Option<i64>,
}

fn default_quality() -> u8 {
    100
}

impl PickRequest {
    pub fn new(source: impl Into<PathBuf>, trigger: Trigger) -> Self {
        Self {
            source: source.into(),
            trigger,
            max_width: 0,
            max_height: 0,
            quality: default_quality(),
            rotation: 0,
            storage: StorageOptions::default(),
            date_added: None,
        }
    }

    pub fn descriptor(&self) -> ImageDescriptor {
        ImageDescriptor::new(&self.source)
            .with_max_width(self.max_width)
            .with_max_height(self.max_height)
            .with_quality(self.quality)
            .with_rotation(self.rotation)
    }
}

/// Result of processing one photo.
#[derive(Debug)]
pub struct Prepared {
    pub descriptor: ImageDescriptor,
    pub metadata: ExifRecord,
    /// Pixel dimensions of the current file, when known
    pub dimensions: Option<(u32, u32)>,
    /// Non-fatal failures, processing before metadata
    pub errors: Vec<PipelineError>,
}

impl Prepared {
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Flatten into the response handed back to the caller.
    pub fn to_response(&self) -> PickResponse {
        let current = self.descriptor.current();
        let file_size = std::fs::metadata(current).map(|m| m.len()).unwrap_or(0);
        let file_name = current
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        PickResponse {
            original: self.descriptor.original.clone(),
            resized: self.descriptor.resized.clone(),
            file_name,
            file_size,
            width: self.dimensions.map(|(w, _)| w),
            height: self.dimensions.map(|(_, h)| h),
            latitude: self.metadata.latitude,
            longitude: self.metadata.longitude,
            timestamp: self.metadata.timestamp.clone(),
            original_rotation: self.metadata.original_rotation(),
            is_vertical: self.metadata.is_vertical(),
            error: self.errors.first().map(ResponseError::from),
        }
    }
}

/// Photo preparation service.
pub struct PhotoPrep {
    pipeline: ImagePipeline,
    lifecycle: LifecycleManager,
    index: Arc<dyn MediaIndex>,
    limits: LimitsConfig,
    /// Cleanups waiting on timed-out runs
    abandoned: Mutex<Vec<JoinHandle<usize>>>,
}

impl PhotoPrep {
    /// Build a service over the configured storage roots and the
    /// filesystem-backed media index.
    pub fn new(config: &Config) -> Self {
        Self::with_components(
            FileStore::from_config(config),
            Arc::new(FsMediaIndex),
            config.limits.clone(),
        )
    }

    pub fn with_components(
        store: FileStore,
        index: Arc<dyn MediaIndex>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            pipeline: ImagePipeline::new(store.clone(), Arc::clone(&index), limits.clone()),
            lifecycle: LifecycleManager::new(store, Arc::clone(&index)),
            index,
            limits,
            abandoned: Mutex::new(Vec::new()),
        }
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Process one photo synchronously.
    pub fn process(&self, request: &PickRequest) -> Prepared {
        let start = Instant::now();
        let mut descriptor = request.descriptor();
        let mut errors = Vec::new();
        let mut dimensions = None;

        // Metadata always comes from the original, before anything moves
        let exif = ExifReader::read_with_fallback(
            &descriptor.original,
            self.index.as_ref(),
            request.date_added,
        );

        let needs_pipeline = descriptor.is_constrained()
            || descriptor.quality < 100
            || descriptor.rotation != 0
            || exif.record.original_rotation() != 0;

        if needs_pipeline {
            let outcome = self
                .pipeline
                .run(&descriptor, request.trigger, &request.storage);
            dimensions = outcome.dimensions();
            descriptor = outcome.result.descriptor;
            errors.extend(outcome.result.error);
        } else {
            tracing::debug!("Nothing to normalize for {:?}", descriptor.original);
        }

        let finished = self
            .lifecycle
            .finish(request.trigger, &request.storage, descriptor);
        descriptor = finished.descriptor;
        errors.extend(finished.error);
        errors.extend(exif.error);

        if dimensions.is_none() {
            dimensions = image::image_dimensions(descriptor.current()).ok();
        }

        tracing::info!(
            "Prepared {} in {:?}{}",
            descriptor.current().display(),
            start.elapsed(),
            if errors.is_empty() { "" } else { " (degraded)" }
        );

        Prepared {
            descriptor,
            metadata: exif.record,
            dimensions,
            errors,
        }
    }

    /// Process one photo on the blocking pool, bounded by the decode timeout.
    ///
    /// On timeout the caller gets an error straight away; the work still in
    /// flight is abandoned once it finishes, deleting whatever it created.
    /// [`settle_abandoned`](Self::settle_abandoned) waits for that cleanup.
    pub async fn process_async(self: &Arc<Self>, request: PickRequest) -> Result<Prepared> {
        let timeout_ms = self.limits.decode_timeout_ms;
        let source = request.source.clone();
        let trigger = request.trigger;

        let this = Arc::clone(self);
        let mut task = tokio::task::spawn_blocking(move || this.process(&request));

        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut task).await {
            Ok(Ok(prepared)) => Ok(prepared),
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: source,
                message: format!("Task panicked: {e}"),
            }
            .into()),
            Err(_) => {
                tracing::warn!("Abandoning {:?} after {}ms", source, timeout_ms);
                let lifecycle = self.lifecycle.clone();
                let path = source.clone();
                let cleanup = tokio::spawn(async move {
                    match task.await {
                        Ok(prepared) => lifecycle.abandon(trigger, &prepared.descriptor),
                        Err(e) => {
                            tracing::warn!(
                                "Abandoned run for {:?} failed, its output may remain: {}",
                                path,
                                e
                            );
                            0
                        }
                    }
                });
                self.abandoned
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(cleanup);
                Err(PipelineError::Timeout {
                    path: source,
                    stage: "process".to_string(),
                    timeout_ms,
                }
                .into())
            }
        }
    }

    /// Wait for every abandoned run to finish and be cleaned up.
    ///
    /// Returns the number of files removed.
    pub async fn settle_abandoned(&self) -> usize {
        let pending = std::mem::take(
            &mut *self.abandoned.lock().unwrap_or_else(|e| e.into_inner()),
        );
        let mut removed = 0;
        for cleanup in pending {
            match cleanup.await {
                Ok(count) => removed += count,
                Err(e) => tracing::warn!("Cleanup task failed: {}", e),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhotoPrepError;
    use crate::storage::DirStorageRoots;
    use crate::test_support::{write_jpeg, ExifFixture};
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingIndex {
        date_added: Option<i64>,
        scanned: Mutex<Vec<PathBuf>>,
    }

    impl MediaIndex for RecordingIndex {
        fn date_added(&self, _path: &Path) -> Option<i64> {
            self.date_added
        }

        fn scan(&self, path: &Path) {
            self.scanned.lock().unwrap().push(path.to_path_buf());
        }
    }

    fn service(dir: &TempDir, index: RecordingIndex, limits: LimitsConfig) -> PhotoPrep {
        let roots = DirStorageRoots::new(
            dir.path().join("Pictures"),
            dir.path().join("DCIM"),
            dir.path().join("private"),
        );
        let store = FileStore::new(Arc::new(roots), 4096);
        PhotoPrep::with_components(store, Arc::new(index), limits)
    }

    #[test]
    fn test_capture_with_rotation_exif() {
        let dir = tempfile::tempdir().unwrap();
        let exif = ExifFixture::default()
            .orientation(6)
            .datetime("2019:06:01 08:30:00")
            .gps(48.8584, 2.2945);
        let source = write_jpeg(dir.path(), "capture.jpg", 1600, 1200, Some(&exif));
        let prep = service(&dir, RecordingIndex::default(), LimitsConfig::default());

        let mut request = PickRequest::new(&source, Trigger::Capture);
        request.max_width = 800;
        request.max_height = 600;
        request.quality = 80;

        let prepared = prep.process(&request);
        let response = prepared.to_response();

        assert!(prepared.errors.is_empty(), "{:?}", prepared.errors);
        assert_eq!((response.width, response.height), (Some(600), Some(800)));
        assert_eq!(response.original_rotation, 90);
        assert!(!response.is_vertical);
        assert_eq!(response.timestamp.as_deref(), Some("2019-06-01T08:30:00Z"));
        assert!((response.latitude.unwrap() - 48.8584).abs() < 1e-3);
        assert!(response.file_name.starts_with("image-"));
        assert!(response.file_size > 0);
        assert_eq!(response.original, source);
    }

    #[test]
    fn test_pick_without_constraints_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "pick.jpg", 320, 200, None);
        let prep = service(&dir, RecordingIndex::default(), LimitsConfig::default());

        let prepared = prep.process(&PickRequest::new(&source, Trigger::Pick));

        assert_eq!(prepared.descriptor.resized, None);
        assert_eq!(prepared.dimensions, Some((320, 200)));
        assert_eq!(prepared.to_response().file_name, "pick.jpg");
    }

    #[test]
    fn test_date_added_fallback_in_milliseconds() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "pick.jpg", 64, 64, None);
        let index = RecordingIndex {
            date_added: Some(1_600_000_000_000),
            ..Default::default()
        };
        let prep = service(&dir, index, LimitsConfig::default());

        let response = prep
            .process(&PickRequest::new(&source, Trigger::Pick))
            .to_response();

        assert_eq!(response.timestamp.as_deref(), Some("2020-09-13T12:26:40Z"));
        assert_eq!(response.latitude, None);
        assert_eq!(response.original_rotation, 0);
        assert!(response.is_vertical);
    }

    #[test]
    fn test_request_override_beats_index() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "pick.jpg", 64, 64, None);
        let index = RecordingIndex {
            date_added: Some(1_600_000_000),
            ..Default::default()
        };
        let prep = service(&dir, index, LimitsConfig::default());

        let mut request = PickRequest::new(&source, Trigger::Pick);
        request.date_added = Some(40_000_000);
        let response = prep.process(&request).to_response();

        assert_eq!(response.timestamp.as_deref(), Some("1971-04-08T23:06:40Z"));
    }

    #[test]
    fn test_corrupt_source_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0]).unwrap();
        let prep = service(&dir, RecordingIndex::default(), LimitsConfig::default());

        let mut request = PickRequest::new(&source, Trigger::Pick);
        request.max_width = 100;
        let prepared = prep.process(&request);
        let response = prepared.to_response();

        assert!(prepared.is_degraded());
        assert_eq!(prepared.descriptor.current(), source.as_path());
        assert_eq!(response.resized, None);
        assert_eq!(response.error.unwrap().code, "decode_failure");
    }

    #[test]
    fn test_kept_capture_lands_in_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let private = dir.path().join("private");
        std::fs::create_dir_all(&private).unwrap();
        let source = write_jpeg(&private, "capture.jpg", 400, 300, None);
        let prep = service(&dir, RecordingIndex::default(), LimitsConfig::default());

        let mut request = PickRequest::new(&source, Trigger::Capture);
        request.max_width = 200;
        request.storage.keep = true;
        let prepared = prep.process(&request);

        assert!(prepared.errors.is_empty(), "{:?}", prepared.errors);
        let resized = prepared.descriptor.resized.clone().unwrap();
        assert_eq!(resized.parent(), Some(dir.path().join("DCIM").as_path()));
        assert!(resized.exists());
        assert_eq!(prepared.dimensions, Some((200, 150)));
    }

    #[tokio::test]
    async fn test_process_async() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "pick.jpg", 200, 100, None);
        let prep = Arc::new(service(
            &dir,
            RecordingIndex::default(),
            LimitsConfig::default(),
        ));

        let mut request = PickRequest::new(&source, Trigger::Pick);
        request.max_width = 100;
        let prepared = prep.process_async(request).await.unwrap();

        assert_eq!(prepared.dimensions, Some((100, 50)));
        assert!(prepared.descriptor.resized.unwrap().exists());
    }

    #[tokio::test]
    async fn test_process_async_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "capture.jpg", 2000, 1500, None);
        let limits = LimitsConfig {
            decode_timeout_ms: 0,
            ..LimitsConfig::default()
        };
        let prep = Arc::new(service(&dir, RecordingIndex::default(), limits));

        let mut request = PickRequest::new(&source, Trigger::Capture);
        request.max_width = 100;
        let result = prep.process_async(request).await;

        assert!(matches!(
            result,
            Err(PhotoPrepError::Pipeline(PipelineError::Timeout { .. }))
        ));
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timed_out_pick_leaves_no_derived_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "pick.jpg", 3000, 2000, None);
        let limits = LimitsConfig {
            decode_timeout_ms: 1,
            ..LimitsConfig::default()
        };
        let prep = Arc::new(service(&dir, RecordingIndex::default(), limits));

        let mut request = PickRequest::new(&source, Trigger::Pick);
        request.max_width = 100;
        assert!(prep.process_async(request).await.is_err());

        assert_eq!(prep.settle_abandoned().await, 1);
        assert!(files_in(&dir.path().join("private")).is_empty());
        assert!(files_in(&dir.path().join("Pictures")).is_empty());
        assert!(source.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timed_out_capture_removes_original_and_derived_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jpeg(dir.path(), "capture.jpg", 3000, 2000, None);
        let limits = LimitsConfig {
            decode_timeout_ms: 1,
            ..LimitsConfig::default()
        };
        let prep = Arc::new(service(&dir, RecordingIndex::default(), limits));

        let mut request = PickRequest::new(&source, Trigger::Capture);
        request.max_width = 100;
        assert!(prep.process_async(request).await.is_err());

        assert_eq!(prep.settle_abandoned().await, 2);
        assert!(files_in(&dir.path().join("Pictures")).is_empty());
        assert!(files_in(&dir.path().join("private")).is_empty());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_settle_without_abandoned_runs() {
        let dir = tempfile::tempdir().unwrap();
        let prep = service(&dir, RecordingIndex::default(), LimitsConfig::default());
        assert_eq!(prep.settle_abandoned().await, 0);
    }
}
