//! The host's media index: a source of "date added" values and the
//! collaborator told to re-scan files that became publicly visible.

use std::path::Path;
use std::time::UNIX_EPOCH;

/// Host media index.
pub trait MediaIndex: Send + Sync {
    /// Raw "date added" value recorded for a file.
    ///
    /// The unit is device dependent (seconds or milliseconds since epoch).
    fn date_added(&self, path: &Path) -> Option<i64>;

    /// Ask the index to re-scan `path`. Fire-and-forget.
    fn scan(&self, path: &Path);
}

/// Media index backed by filesystem metadata.
///
/// `date_added` reports the creation time in whole seconds, falling back to
/// the modification time on filesystems that do not record creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMediaIndex;

impl MediaIndex for FsMediaIndex {
    fn date_added(&self, path: &Path) -> Option<i64> {
        let metadata = std::fs::metadata(path).ok()?;
        let time = metadata.created().or_else(|_| metadata.modified()).ok()?;
        let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
        i64::try_from(secs).ok()
    }

    fn scan(&self, path: &Path) {
        tracing::info!("Finished scanning {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_date_added_is_recent_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();

        let value = FsMediaIndex.date_added(&path).unwrap();
        // Somewhere after 2020 and well below a millisecond-scale value
        assert!(value > 1_577_836_800);
        assert!(value < 100_000_000_000);
    }

    #[test]
    fn test_fs_date_added_missing_file() {
        assert!(FsMediaIndex
            .date_added(Path::new("/nonexistent/a.jpg"))
            .is_none());
    }
}
