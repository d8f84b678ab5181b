//! Watch supervisor: one live watcher per collection, with the desired
//! configuration persisted so watches survive a process restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{info, warn};

use filetracker_model::{
    CollectionId, ResumeReport, WatchSettings, WatchSettingsPatch, WatcherStatus,
};

use crate::application::unit_of_work::AppUnitOfWork;
use crate::catalog::validate_source_folder;
use crate::error::{Result, TrackerError};
use crate::scan::fs_watch::{WatchHandle, spawn_watcher};

/// Settings key prefix for persisted watch configuration.
pub const WATCH_SETTINGS_PREFIX: &str = "watch:";

pub fn watch_settings_key(collection_id: CollectionId) -> String {
    format!("{WATCH_SETTINGS_PREFIX}{collection_id}")
}

fn parse_watch_settings_key(key: &str) -> Option<CollectionId> {
    key.strip_prefix(WATCH_SETTINGS_PREFIX)?
        .parse::<i64>()
        .ok()
        .map(CollectionId)
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Base for start requests that leave fields unset.
    pub defaults: WatchSettings,
    pub stop_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            defaults: WatchSettings::default(),
            stop_timeout: Duration::from_millis(2_000),
        }
    }
}

pub struct WatchSupervisor {
    uow: Arc<AppUnitOfWork>,
    config: SupervisorConfig,
    watches: RwLock<HashMap<CollectionId, WatchHandle>>,
}

impl fmt::Debug for WatchSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("WatchSupervisor");
        debug.field("config", &self.config);
        match self.watches.try_read() {
            Ok(guard) => {
                debug.field("active_watchers", &guard.len());
            }
            Err(_) => {
                debug.field("watches", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl WatchSupervisor {
    pub fn new(uow: Arc<AppUnitOfWork>, config: SupervisorConfig) -> Self {
        Self {
            uow,
            config,
            watches: RwLock::new(HashMap::new()),
        }
    }

    pub fn defaults(&self) -> &WatchSettings {
        &self.config.defaults
    }

    /// Start watching a collection. Fields missing from `patch` come from the
    /// supervisor defaults. Starting an already running watcher is an error.
    pub async fn start(
        &self,
        collection_id: CollectionId,
        patch: Option<WatchSettingsPatch>,
    ) -> Result<WatchSettings> {
        let settings = patch.unwrap_or_default().apply(&self.config.defaults);
        self.start_with_settings(collection_id, settings).await
    }

    async fn start_with_settings(
        &self,
        collection_id: CollectionId,
        settings: WatchSettings,
    ) -> Result<WatchSettings> {
        let mut settings = settings.validated()?;
        settings.enabled = true;

        let mut watches = self.watches.write().await;
        if let Some(existing) = watches.get(&collection_id) {
            if !existing.is_finished() {
                return Err(TrackerError::AlreadyWatching(collection_id));
            }
            warn!(collection_id = %collection_id, "Replacing watcher whose task already exited");
            if let Some(stale) = watches.remove(&collection_id) {
                stale.stop(self.config.stop_timeout).await;
            }
        }

        let mut collection = self
            .uow
            .collections
            .get(collection_id)
            .await?
            .ok_or(TrackerError::CollectionNotFound(collection_id))?;
        collection.source_folder = validate_source_folder(&collection.source_folder)?;

        let handle =
            spawn_watcher(&collection, settings.clone(), Arc::clone(&self.uow.files)).await?;

        if let Err(err) = self.save_settings(collection_id, &settings).await {
            handle.stop(self.config.stop_timeout).await;
            return Err(err);
        }

        watches.insert(collection_id, handle);
        Ok(settings)
    }

    /// Stop a collection's watcher and persist `enabled = false`. Returns
    /// whether a watcher was running.
    pub async fn stop(&self, collection_id: CollectionId) -> Result<bool> {
        let handle = self.watches.write().await.remove(&collection_id);
        let was_running = handle.is_some();
        if let Some(handle) = handle {
            handle.stop(self.config.stop_timeout).await;
        } else if self.uow.collections.get(collection_id).await?.is_none() {
            return Err(TrackerError::CollectionNotFound(collection_id));
        }

        let mut settings = self
            .load_settings(collection_id)
            .await?
            .unwrap_or_else(|| self.config.defaults.clone());
        settings.enabled = false;
        self.save_settings(collection_id, &settings).await?;

        if !was_running {
            info!(collection_id = %collection_id, "Stop requested but no watcher was running");
        }
        Ok(was_running)
    }

    /// Stop then start. Without a patch the persisted settings are reused.
    pub async fn restart(
        &self,
        collection_id: CollectionId,
        patch: Option<WatchSettingsPatch>,
    ) -> Result<WatchSettings> {
        let base = self
            .load_settings(collection_id)
            .await?
            .unwrap_or_else(|| self.config.defaults.clone());
        let settings = patch.unwrap_or_default().apply(&base);

        self.stop(collection_id).await?;
        self.start_with_settings(collection_id, settings).await
    }

    /// Start every persisted watch marked enabled. Collections that are gone
    /// or whose folder is missing are skipped and reported, not retried.
    pub async fn resume_all(&self) -> Result<ResumeReport> {
        let mut report = ResumeReport::default();

        for (key, value) in self.uow.settings.list_prefix(WATCH_SETTINGS_PREFIX).await? {
            let Some(collection_id) = parse_watch_settings_key(&key) else {
                warn!(key = %key, "Ignoring malformed watch settings key");
                continue;
            };
            let settings: WatchSettings = match serde_json::from_str(&value) {
                Ok(settings) => settings,
                Err(err) => {
                    report.skip(collection_id, format!("unreadable settings: {err}"));
                    continue;
                }
            };
            if !settings.enabled {
                continue;
            }
            if self.is_watching(collection_id).await {
                report.resumed.push(collection_id);
                continue;
            }

            match self.start_with_settings(collection_id, settings).await {
                Ok(_) => report.resumed.push(collection_id),
                Err(err) => {
                    warn!(collection_id = %collection_id, "Not resuming watcher: {err}");
                    report.skip(collection_id, err.to_string());
                }
            }
        }

        info!(
            resumed = report.resumed.len(),
            skipped = report.skipped.len(),
            "Watchers resumed"
        );
        Ok(report)
    }

    pub async fn is_watching(&self, collection_id: CollectionId) -> bool {
        self.watches
            .read()
            .await
            .get(&collection_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn active_watchers(&self) -> Vec<CollectionId> {
        let mut ids: Vec<CollectionId> = self
            .watches
            .read()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub async fn status(&self, collection_id: CollectionId) -> Option<WatcherStatus> {
        self.watches
            .read()
            .await
            .get(&collection_id)
            .map(WatchHandle::status)
    }

    pub async fn statuses(&self) -> Vec<WatcherStatus> {
        let mut statuses: Vec<WatcherStatus> = self
            .watches
            .read()
            .await
            .values()
            .map(WatchHandle::status)
            .collect();
        statuses.sort_by_key(|status| status.collection_id);
        statuses
    }

    pub async fn load_settings(&self, collection_id: CollectionId) -> Result<Option<WatchSettings>> {
        let Some(raw) = self.uow.settings.get(&watch_settings_key(collection_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save_settings(&self, collection_id: CollectionId, settings: &WatchSettings) -> Result<()> {
        let raw = serde_json::to_string(settings)?;
        self.uow
            .settings
            .set(&watch_settings_key(collection_id), &raw)
            .await
    }

    /// Stop a watcher and drop its persisted settings. Used when the
    /// collection itself goes away.
    pub async fn forget(&self, collection_id: CollectionId) -> Result<()> {
        if let Some(handle) = self.watches.write().await.remove(&collection_id) {
            handle.stop(self.config.stop_timeout).await;
        }
        self.uow
            .settings
            .delete(&watch_settings_key(collection_id))
            .await?;
        Ok(())
    }

    /// Stop every watcher without touching persisted `enabled` flags, so the
    /// next [`resume_all`](Self::resume_all) brings them back.
    pub async fn shutdown(&self) {
        let handles: Vec<WatchHandle> = {
            let mut watches = self.watches.write().await;
            watches.drain().map(|(_, handle)| handle).collect()
        };
        let count = handles.len();
        let timeout = self.config.stop_timeout;
        join_all(handles.into_iter().map(|handle| handle.stop(timeout))).await;
        info!(stopped = count, "Watch supervisor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_keys_round_trip_collection_ids() {
        let key = watch_settings_key(CollectionId(42));
        assert_eq!(key, "watch:42");
        assert_eq!(parse_watch_settings_key(&key), Some(CollectionId(42)));
        assert_eq!(parse_watch_settings_key("watch:abc"), None);
        assert_eq!(parse_watch_settings_key("other:1"), None);
    }
}
