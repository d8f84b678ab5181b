//! Shared helpers for filetracker-core integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use filetime::FileTime;
use tempfile::TempDir;

use filetracker_core::{DatabaseContext, FileTracker, StoreOptions, TrackerOptions};
use filetracker_model::{Collection, NewCollection};

/// Fixed, second-aligned base time for deterministic modification times.
pub const BASE_MTIME: i64 = 1_700_000_000;

/// A tracker over a throw-away SQLite file.
pub struct TestTracker {
    pub tracker: FileTracker,
    pub db_dir: TempDir,
}

impl TestTracker {
    pub fn db_path(&self) -> PathBuf {
        self.db_dir.path().join("filetracker.db")
    }
}

pub async fn open_tracker_at(db_path: &Path, options: TrackerOptions) -> Result<FileTracker> {
    let context = DatabaseContext::open(db_path, &StoreOptions::default())
        .await
        .context("open sqlite store")?;
    context
        .sqlite()
        .initialize_schema()
        .await
        .context("apply migrations")?;
    Ok(FileTracker::from_context(context, options))
}

pub async fn test_tracker() -> Result<TestTracker> {
    test_tracker_with(TrackerOptions::default()).await
}

pub async fn test_tracker_with(options: TrackerOptions) -> Result<TestTracker> {
    let db_dir = tempfile::tempdir()?;
    let tracker = open_tracker_at(&db_dir.path().join("filetracker.db"), options).await?;
    Ok(TestTracker { tracker, db_dir })
}

/// Create a collection named `name` over a fresh temporary folder.
pub async fn collection_over_tempdir(
    tracker: &FileTracker,
    name: &str,
) -> Result<(Collection, TempDir)> {
    let folder = tempfile::tempdir()?;
    let collection = tracker
        .create_collection(NewCollection::new(name, folder.path()))
        .await?;
    Ok((collection, folder))
}

/// Write `contents` to `root/rel`, creating parent folders.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    Ok(path)
}

pub fn set_mtime(path: &Path, unix_secs: i64) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0))?;
    Ok(())
}

/// Poll `check` until it yields `Some` or `timeout` elapses.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
