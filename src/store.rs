//! Snapshot storage
//!
//! Writes encoded snapshots into one directory, named by capture time.

use crate::encode::EncodedImage;
use chrono::{DateTime, Local};
use log::{debug, info};
use std::io;
use std::path::{Path, PathBuf};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("cannot create snapshot directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Snapshot directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open `dir`, creating it if absent. Existing contents are left alone.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        info!("Saving snapshots to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `screenshot_YYYYMMDD_HHMMSS.png` for `at`
    pub fn file_name(at: &DateTime<Local>) -> String {
        format!("screenshot_{}.png", at.format("%Y%m%d_%H%M%S"))
    }

    /// Write `image` and return its path. A save in the same second
    /// replaces the earlier file.
    pub fn save(&self, image: &EncodedImage, at: &DateTime<Local>) -> Result<PathBuf, StorageError> {
        let path = self.dir.join(Self::file_name(at));
        std::fs::write(&path, &image.bytes).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(
            "Wrote {} ({}x{}, {} bytes)",
            path.display(),
            image.width,
            image.height,
            image.bytes.len()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::EncodePath;
    use chrono::TimeZone;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("snapwatch-store-{}", uuid::Uuid::new_v4()))
    }

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            width: 1,
            height: 1,
            path: EncodePath::Primary,
        }
    }

    #[test]
    fn file_name_uses_second_precision() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(SnapshotStore::file_name(&at), "screenshot_20240309_070502.png");
    }

    #[test]
    fn open_twice_keeps_existing_files() {
        let dir = scratch_dir();
        let store = SnapshotStore::open(&dir).expect("first open");
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let saved = store.save(&image(), &at).expect("save");

        SnapshotStore::open(&dir).expect("second open");
        assert!(saved.exists());
        assert_eq!(std::fs::read(&saved).unwrap(), image().bytes);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn same_second_overwrites() {
        let dir = scratch_dir();
        let store = SnapshotStore::open(&dir).expect("open");
        let at = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        store.save(&image(), &at).expect("first save");
        let mut second = image();
        second.bytes.push(1);
        let path = store.save(&second, &at).expect("second save");

        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
        assert_eq!(std::fs::read(path).unwrap(), second.bytes);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = scratch_dir();
        let store = SnapshotStore::open(&dir).expect("open");
        std::fs::remove_dir_all(&dir).unwrap();

        let at = Local::now();
        assert!(matches!(
            store.save(&image(), &at),
            Err(StorageError::Write { .. })
        ));
    }
}
