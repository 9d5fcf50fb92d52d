//! The idempotent publisher loop.
//!
//! Each pass scans heights downward from the cutoff looking for a snapshot
//! that exists on disk but has no publish marker, publishes it, and marks it.
//! The marker is created strictly after the publish call returns success, so
//! a crash at any earlier point republishes idempotently on restart (the
//! remote update overwrites the same fixed region). Snapshot files are
//! produced by a companion process; this loop only promotes them.

use std::io;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::sheets::{Publish, PublishError};
use crate::store::SnapshotStore;

#[derive(Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// Published and marked one snapshot below the cutoff.
    Published(u64),
    /// Published and marked the cutoff snapshot; the poll is over.
    Finished,
    /// No unpublished snapshot found anywhere in the range.
    Idle,
}

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One downward scan from the cutoff. Publishes at most one snapshot; the
/// caller always restarts the next scan from the cutoff, so a missed marker
/// anywhere gets priority re-check.
pub fn run_one_pass(
    store: &SnapshotStore,
    publisher: &impl Publish,
    cutoff_height: u64,
) -> Result<PassOutcome, PassError> {
    for height in (1..=cutoff_height).rev() {
        if store.exists(height) && !store.is_published(height) {
            info!(
                "Updating sheet with: {}",
                store.snapshot_path(height).display()
            );
            let content = store.read(height)?;
            publisher.publish(&content)?;
            store.mark_published(height)?;

            if height == cutoff_height {
                info!("Updated final cutoff height {}.", height);
                return Ok(PassOutcome::Finished);
            }
            return Ok(PassOutcome::Published(height));
        }
    }
    Ok(PassOutcome::Idle)
}

/// Run passes until the cutoff snapshot has been published, sleeping between
/// passes. Pass failures are logged and retried on the next pass; there is
/// no inner retry of remote calls.
pub fn run_sheet_updater(
    store: &SnapshotStore,
    publisher: &impl Publish,
    cutoff_height: u64,
    sleep_interval: Duration,
) {
    loop {
        match run_one_pass(store, publisher, cutoff_height) {
            Ok(PassOutcome::Finished) => return,
            Ok(PassOutcome::Published(height)) => {
                debug!("Published height {}; rescanning from cutoff", height)
            }
            Ok(PassOutcome::Idle) => {}
            Err(e) => error!("Sheet update pass failed: {}", e),
        }
        debug!("Sleeping for {} seconds...", sleep_interval.as_secs());
        thread::sleep(sleep_interval);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// In-memory publisher recording what it was asked to push.
    #[derive(Default)]
    struct RecordingPublisher {
        published: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Publish for RecordingPublisher {
        fn publish(&self, content: &str) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::SheetNotFound("gone".to_string()));
            }
            self.published.borrow_mut().push(content.to_string());
            Ok(())
        }
    }

    fn store_with_snapshots(heights: &[u64]) -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("csvs")).unwrap();
        for height in heights {
            store.write(*height, &format!("snapshot-{height}")).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn pass_publishes_highest_unpublished_snapshot_first() {
        let (_dir, store) = store_with_snapshots(&[3, 5]);
        let publisher = RecordingPublisher::default();

        let outcome = run_one_pass(&store, &publisher, 10).unwrap();
        assert_eq!(outcome, PassOutcome::Published(5));
        assert_eq!(publisher.published.borrow().as_slice(), ["snapshot-5"]);
        assert!(store.is_published(5));
        assert!(!store.is_published(3));

        let outcome = run_one_pass(&store, &publisher, 10).unwrap();
        assert_eq!(outcome, PassOutcome::Published(3));
        assert!(store.is_published(3));
    }

    #[test]
    fn pass_is_idle_when_everything_is_published() {
        let (_dir, store) = store_with_snapshots(&[4]);
        let publisher = RecordingPublisher::default();

        run_one_pass(&store, &publisher, 10).unwrap();
        assert_eq!(run_one_pass(&store, &publisher, 10).unwrap(), PassOutcome::Idle);
        assert_eq!(publisher.published.borrow().len(), 1);
    }

    #[test]
    fn pass_terminates_at_cutoff() {
        let (_dir, store) = store_with_snapshots(&[10]);
        let publisher = RecordingPublisher::default();

        assert_eq!(
            run_one_pass(&store, &publisher, 10).unwrap(),
            PassOutcome::Finished
        );
        assert!(store.is_published(10));
    }

    #[test]
    fn publish_failure_leaves_no_marker() {
        let (_dir, store) = store_with_snapshots(&[6]);
        let publisher = RecordingPublisher {
            fail: true,
            ..RecordingPublisher::default()
        };

        assert!(run_one_pass(&store, &publisher, 10).is_err());
        assert!(!store.is_published(6));
    }

    #[test]
    fn republishing_after_crash_before_marker_is_safe() {
        let (_dir, store) = store_with_snapshots(&[6]);
        let publisher = RecordingPublisher::default();

        // Simulate publish-success-then-crash by removing the marker.
        run_one_pass(&store, &publisher, 10).unwrap();
        std::fs::remove_file(store.marker_path(6)).unwrap();

        let outcome = run_one_pass(&store, &publisher, 10).unwrap();
        assert_eq!(outcome, PassOutcome::Published(6));
        assert_eq!(
            publisher.published.borrow().as_slice(),
            ["snapshot-6", "snapshot-6"]
        );
    }
}
