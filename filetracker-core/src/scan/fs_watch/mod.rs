//! Live change watcher.
//!
//! A thin wrapper around `notify` that classifies raw notifications into
//! [`FileChange`]s, drops duplicates through a [`Debouncer`] and applies
//! each surviving change to the metadata store as a single-row upsert.
//! Per-event failures are logged and counted; they never end the loop.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use filetracker_model::{ChangeType, Collection, CollectionId, WatchSettings, WatcherStatus};

use crate::database::path_key;
use crate::database::ports::files::FileRepository;
use crate::error::{Result, TrackerError};
use crate::scan::filters::PathFilter;

pub mod debounce;
pub mod events;

pub use debounce::Debouncer;
pub use events::{FileChange, classify, is_overflow};

const CHANNEL_CAPACITY: usize = 1024;

enum WatchMessage {
    Event(Event),
    Error(String),
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Event(event) => f
                .debug_struct("WatchMessage::Event")
                .field("kind", &event.kind)
                .field("path_count", &event.paths.len())
                .finish(),
            WatchMessage::Error(message) => f
                .debug_struct("WatchMessage::Error")
                .field("message", message)
                .finish(),
        }
    }
}

/// Counters shared between a running watcher and status readers.
#[derive(Debug)]
pub struct WatcherStats {
    started_at: DateTime<Utc>,
    applied: AtomicU64,
    debounced: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl WatcherStats {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            applied: AtomicU64::new(0),
            debounced: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn debounced(&self) -> u64 {
        self.debounced.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        match self.last_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_failure(&self, message: String) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        let mut guard = match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(message);
    }
}

/// Applies typed changes for one collection. Owns the debounce map, so a
/// fresh handler starts with no history.
pub struct ChangeHandler {
    collection_id: CollectionId,
    filter: PathFilter,
    settings: WatchSettings,
    files: Arc<dyn FileRepository>,
    debouncer: Debouncer,
    stats: Arc<WatcherStats>,
}

impl fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandler")
            .field("collection_id", &self.collection_id)
            .field("root", &self.filter.root())
            .field("debounce_window", &self.debouncer.window())
            .field("tracked_keys", &self.debouncer.len())
            .finish()
    }
}

impl ChangeHandler {
    pub fn new(
        collection: &Collection,
        settings: WatchSettings,
        files: Arc<dyn FileRepository>,
    ) -> Self {
        Self::with_stats(collection, settings, files, Arc::new(WatcherStats::new()))
    }

    fn with_stats(
        collection: &Collection,
        settings: WatchSettings,
        files: Arc<dyn FileRepository>,
        stats: Arc<WatcherStats>,
    ) -> Self {
        let filter = PathFilter::for_collection(collection, &settings.omit_folders);
        let debouncer = Debouncer::new(settings.debounce_window());
        Self {
            collection_id: collection.id,
            filter,
            settings,
            files,
            debouncer,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Classify and apply a raw notify event. Returns the number of store
    /// writes performed.
    pub async fn handle_event(&mut self, event: &Event) -> usize {
        if is_overflow(event) {
            let message = "filesystem backend dropped events; reconcile to recover".to_string();
            warn!(collection_id = %self.collection_id, kind = ?event.kind, "{message}");
            self.stats.record_failure(message);
            return 0;
        }

        let mut writes = 0;
        for change in classify(event) {
            writes += self.apply(change).await;
        }
        writes
    }

    /// Apply one typed change. Returns the number of store writes performed.
    pub async fn apply(&mut self, change: FileChange) -> usize {
        let kind = change.change_type();
        if !self.settings.watches(kind) {
            trace!(collection_id = %self.collection_id, %kind, "Change kind disabled");
            return 0;
        }

        match change {
            FileChange::Created(path) | FileChange::Modified(path) => {
                self.upsert_live(kind, &path).await
            }
            FileChange::Deleted { path, is_dir } => {
                self.tombstone(kind, &path, is_dir, false).await
            }
            // A rename is a removal of the old path plus a creation of the new
            // one; each side debounces under its own change type.
            FileChange::Renamed { from, to } => {
                let mut writes = 0;
                if let Some(from) = from {
                    writes += self.tombstone(ChangeType::Deleted, &from, false, true).await;
                }
                if let Some(to) = to {
                    writes += self.upsert_live(ChangeType::Created, &to).await;
                }
                writes
            }
        }
    }

    async fn upsert_live(&mut self, kind: ChangeType, path: &Path) -> usize {
        if !self.filter.accepts(path) {
            trace!(collection_id = %self.collection_id, path = %path.display(), "Filtered out");
            return 0;
        }
        if !is_regular_file(path) {
            trace!(
                collection_id = %self.collection_id,
                path = %path.display(),
                "Not a regular file, ignoring"
            );
            return 0;
        }
        let Some(key) = path_key(path) else {
            return 0;
        };

        let now = Instant::now();
        if self.debouncer.is_duplicate(kind, path, now) {
            self.stats.debounced.fetch_add(1, Ordering::Relaxed);
            trace!(collection_id = %self.collection_id, path = key, %kind, "Debounced");
            return 0;
        }

        match self
            .files
            .record_change(self.collection_id, key, Utc::now(), false)
            .await
        {
            Ok(_) => {
                self.debouncer.mark_applied(kind, path, now);
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                debug!(collection_id = %self.collection_id, path = key, %kind, "Applied change");
                1
            }
            Err(err) => {
                self.fail(kind, path, err);
                0
            }
        }
    }

    /// Tombstone a path. The path is first treated as a folder so removals
    /// of unknown kind still tombstone everything beneath a directory; a
    /// plain file then gets its own tombstone, inserted if it was unknown.
    async fn tombstone(
        &mut self,
        kind: ChangeType,
        path: &Path,
        is_dir: bool,
        only_if_absent: bool,
    ) -> usize {
        if only_if_absent && path.exists() {
            return 0;
        }
        let Some(rel) = self.filter.relative(path) else {
            return 0;
        };
        if rel.as_os_str().is_empty() {
            warn!(collection_id = %self.collection_id, "Source folder itself was removed");
            return 0;
        }
        let excluded = if is_dir {
            self.filter.is_excluded_dir(rel)
        } else {
            rel.parent()
                .is_some_and(|parent| self.filter.is_excluded_dir(parent))
        };
        if excluded {
            return 0;
        }
        let Some(key) = path_key(path) else {
            return 0;
        };

        let now = Instant::now();
        if self.debouncer.is_duplicate(kind, path, now) {
            self.stats.debounced.fetch_add(1, Ordering::Relaxed);
            trace!(collection_id = %self.collection_id, path = key, %kind, "Debounced");
            return 0;
        }

        let beneath = match self.files.tombstone_under(self.collection_id, key).await {
            Ok(count) => count,
            Err(err) => {
                self.fail(kind, path, err);
                return 0;
            }
        };
        if beneath > 0 {
            self.debouncer.mark_applied(kind, path, now);
            self.stats.applied.fetch_add(1, Ordering::Relaxed);
            debug!(
                collection_id = %self.collection_id,
                path = key,
                tombstoned = beneath,
                "Folder removed"
            );
            return 1;
        }
        if is_dir || !self.filter.accepts_file(rel) {
            return 0;
        }

        match self
            .files
            .record_change(self.collection_id, key, Utc::now(), true)
            .await
        {
            Ok(_) => {
                self.debouncer.mark_applied(kind, path, now);
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                debug!(collection_id = %self.collection_id, path = key, %kind, "Applied removal");
                1
            }
            Err(err) => {
                self.fail(kind, path, err);
                0
            }
        }
    }

    fn fail(&self, kind: ChangeType, path: &Path, err: TrackerError) {
        warn!(
            collection_id = %self.collection_id,
            path = %path.display(),
            %kind,
            "Dropping change after store failure: {err}"
        );
        self.stats.record_failure(err.to_string());
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_file())
        .unwrap_or(false)
}

/// A running watcher task plus its OS subscription.
pub struct WatchHandle {
    collection_id: CollectionId,
    root: PathBuf,
    settings: WatchSettings,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    stats: Arc<WatcherStats>,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("collection_id", &self.collection_id)
            .field("root", &self.root)
            .field("task_finished", &self.task.is_finished())
            .field("applied", &self.stats.applied())
            .finish()
    }
}

impl WatchHandle {
    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn status(&self) -> WatcherStatus {
        WatcherStatus {
            collection_id: self.collection_id,
            started_at: self.stats.started_at,
            events_applied: self.stats.applied(),
            events_debounced: self.stats.debounced(),
            events_failed: self.stats.failed(),
            last_error: self.stats.last_error(),
            settings: self.settings.clone(),
        }
    }

    /// Signal the loop to exit and wait up to `timeout` for it; the task is
    /// aborted if it does not finish in time. Either way the OS subscription
    /// is released.
    pub async fn stop(self, timeout: Duration) {
        self.cancel.cancel();
        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(_) => {}
            Err(_) => {
                warn!(collection_id = %self.collection_id, "Watcher did not stop in time, aborting");
                task.abort();
            }
        }
        info!(collection_id = %self.collection_id, "Watcher stopped");
    }
}

/// Subscribe to OS notifications for `collection` and spawn the loop that
/// applies them. Subscription failures are returned to the caller.
pub async fn spawn_watcher(
    collection: &Collection,
    settings: WatchSettings,
    files: Arc<dyn FileRepository>,
) -> Result<WatchHandle> {
    let collection_id = collection.id;
    let root = collection.source_folder.clone();
    let mode = if settings.include_subdirectories {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    let (tx, rx) = mpsc::channel::<WatchMessage>(CHANNEL_CAPACITY);
    let watch_root = root.clone();
    let watcher = spawn_blocking(move || init_watcher(&watch_root, mode, tx))
        .await
        .map_err(|e| TrackerError::Watch {
            collection_id,
            message: format!("watcher initialization panicked: {e}"),
        })?
        .map_err(|message| TrackerError::Watch {
            collection_id,
            message,
        })?;

    let stats = Arc::new(WatcherStats::new());
    let handler = ChangeHandler::with_stats(collection, settings.clone(), files, Arc::clone(&stats));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_watch_loop(handler, watcher, rx, cancel.clone()));

    info!(
        collection_id = %collection_id,
        root = %root.display(),
        recursive = settings.include_subdirectories,
        debounce_secs = settings.process_interval,
        "Watcher started"
    );

    Ok(WatchHandle {
        collection_id,
        root,
        settings,
        cancel,
        task,
        stats,
    })
}

async fn run_watch_loop(
    mut handler: ChangeHandler,
    watcher: RecommendedWatcher,
    mut rx: mpsc::Receiver<WatchMessage>,
    cancel: CancellationToken,
) {
    // Dropping the watcher when the loop ends releases the OS subscription.
    let _watcher = watcher;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(WatchMessage::Event(event)) => {
                    handler.handle_event(&event).await;
                }
                Some(WatchMessage::Error(message)) => {
                    warn!(
                        collection_id = %handler.collection_id,
                        "Filesystem watcher error: {message}"
                    );
                    handler.stats.record_failure(message);
                }
                None => break,
            }
        }
    }
    debug!(collection_id = %handler.collection_id, "Watch loop exited");
}

fn init_watcher(
    root: &Path,
    mode: RecursiveMode,
    tx: mpsc::Sender<WatchMessage>,
) -> std::result::Result<RecommendedWatcher, String> {
    let path_label = root.display().to_string();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            let msg = match res {
                Ok(event) => WatchMessage::Event(event),
                Err(err) => WatchMessage::Error(err.to_string()),
            };
            if let Err(err) = tx.blocking_send(msg) {
                trace!("watch channel closed for {path_label}: {err}");
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| format!("failed to create watcher for {}: {err}", root.display()))?;

    watcher
        .watch(root, mode)
        .map_err(|err| format!("failed to watch {}: {err}", root.display()))?;

    Ok(watcher)
}
