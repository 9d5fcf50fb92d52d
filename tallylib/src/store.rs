//! Filesystem conventions for snapshots and their publish markers.
//!
//! The csv directory is the only coordination medium between the snapshot
//! producer and the sheet updater, so the protocol is strict: a snapshot is
//! written at most once and never modified, and a marker appears only after
//! the snapshot's content reached the remote sheet.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

pub const SNAPSHOT_PREFIX: &str = "tally-";
pub const SNAPSHOT_EXTENSION: &str = ".csv";
pub const MARKER_SUFFIX: &str = ".sheet-updated";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The snapshot path already has content; two producers raced. Never
    /// overwritten silently.
    #[error("snapshot already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct SnapshotStore {
    csv_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(csv_dir: PathBuf) -> io::Result<SnapshotStore> {
        fs::create_dir_all(&csv_dir)?;
        Ok(SnapshotStore { csv_dir })
    }

    pub fn snapshot_path(&self, height: u64) -> PathBuf {
        self.csv_dir
            .join(format!("{SNAPSHOT_PREFIX}{height}{SNAPSHOT_EXTENSION}"))
    }

    pub fn marker_path(&self, height: u64) -> PathBuf {
        let mut path = self.snapshot_path(height).into_os_string();
        path.push(MARKER_SUFFIX);
        PathBuf::from(path)
    }

    pub fn exists(&self, height: u64) -> bool {
        self.snapshot_path(height).exists()
    }

    /// Whether the snapshot's content has been confirmed pushed to the
    /// remote sheet. Marker presence is the only signal consulted.
    pub fn is_published(&self, height: u64) -> bool {
        self.marker_path(height).exists()
    }

    /// Write a new snapshot. Fails with [`StoreError::AlreadyExists`] if the
    /// snapshot path is already occupied.
    pub fn write(&self, height: u64, content: &str) -> Result<(), StoreError> {
        let path = self.snapshot_path(height);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(path.clone())
                } else {
                    StoreError::Io(e)
                }
            })?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    pub fn read(&self, height: u64) -> io::Result<String> {
        fs::read_to_string(self.snapshot_path(height))
    }

    /// Record that the snapshot at `height` was pushed. Zero-byte marker;
    /// idempotent.
    pub fn mark_published(&self, height: u64) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .open(self.marker_path(height))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("csvs")).unwrap();
        (dir, store)
    }

    #[test]
    fn paths_follow_height_convention() {
        let (_dir, store) = store();
        assert!(store
            .snapshot_path(1_400_000)
            .ends_with("tally-1400000.csv"));
        assert!(store
            .marker_path(1_400_000)
            .ends_with("tally-1400000.csv.sheet-updated"));
    }

    #[test]
    fn write_then_read_roundtrips() {
        let (_dir, store) = store();
        store.write(7, "header\r\nrow\r\n").unwrap();
        assert!(store.exists(7));
        assert!(!store.exists(8));
        assert_eq!(store.read(7).unwrap(), "header\r\nrow\r\n");
    }

    #[test]
    fn write_refuses_to_overwrite() {
        let (_dir, store) = store();
        store.write(7, "first").unwrap();
        assert!(matches!(
            store.write(7, "second"),
            Err(StoreError::AlreadyExists(_))
        ));
        // First write preserved.
        assert_eq!(store.read(7).unwrap(), "first");
    }

    #[test]
    fn marking_published_is_idempotent() {
        let (_dir, store) = store();
        store.write(7, "content").unwrap();
        assert!(!store.is_published(7));

        store.mark_published(7).unwrap();
        assert!(store.is_published(7));
        store.mark_published(7).unwrap();
        assert!(store.is_published(7));
    }
}
