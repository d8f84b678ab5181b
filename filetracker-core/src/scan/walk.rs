use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::database::infrastructure::sqlite::repositories::truncate_to_millis;
use crate::error::{Result, TrackerError};
use crate::scan::filters::PathFilter;

/// A regular file found on disk during a reconciliation walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    pub path: String,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<ObservedFile>,
    /// Entries that could not be read and were left out of the snapshot.
    pub skipped: usize,
}

/// Enumerate every accepted regular file under the filter's root on the
/// blocking pool. Symlinks are not followed; excluded folders are pruned
/// without being descended into.
pub async fn walk_collection(filter: PathFilter) -> Result<WalkOutcome> {
    tokio::task::spawn_blocking(move || walk_blocking(&filter))
        .await
        .map_err(|e| TrackerError::Internal(format!("directory walk panicked: {e}")))
}

fn walk_blocking(filter: &PathFilter) -> WalkOutcome {
    let root = filter.root().to_path_buf();
    let mut outcome = WalkOutcome::default();

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match filter.relative(entry.path()) {
                Some(rel) => !filter.is_excluded_dir(rel),
                None => false,
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), "Skipping unreadable entry: {e}");
                outcome.skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(rel) = filter.relative(path) else {
            continue;
        };
        if !filter.accepts_file(rel) {
            continue;
        }

        match observe(path) {
            Ok(Some(observed)) => outcome.files.push(observed),
            Ok(None) => {
                warn!(path = %path.display(), "Skipping path that is not valid UTF-8");
                outcome.skipped += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), "Skipping file with unreadable metadata: {e}");
                outcome.skipped += 1;
            }
        }
    }

    debug!(
        root = %root.display(),
        files = outcome.files.len(),
        skipped = outcome.skipped,
        "Directory walk finished"
    );
    outcome
}

fn observe(path: &Path) -> std::io::Result<Option<ObservedFile>> {
    let modified = std::fs::symlink_metadata(path)?.modified()?;
    Ok(path.to_str().map(|key| ObservedFile {
        path: key.to_string(),
        modified: truncate_to_millis(DateTime::<Utc>::from(modified)),
    }))
}
