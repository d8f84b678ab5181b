mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use filetracker_core::TrackerError;
use filetracker_core::scan::supervisor::watch_settings_key;
use filetracker_core::scan::{ChangeHandler, FileChange};
use filetracker_model::{
    CollectionId, CollectionUpdate, FileQuery, WatchSettings, WatchSettingsPatch,
};

use support::{
    collection_over_tempdir, open_tracker_at, test_tracker, wait_for, write_file,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

fn handler_settings(process_interval: u64) -> WatchSettings {
    WatchSettings {
        process_interval,
        ..WatchSettings::default()
    }
}

#[tokio::test]
async fn duplicate_notifications_within_window_write_once() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    let files = Arc::clone(&env.tracker.unit_of_work().files);
    let mut handler = ChangeHandler::new(&docs, handler_settings(15), files);

    let b = write_file(&docs.source_folder, "b.txt", "x")?;
    assert_eq!(handler.apply(FileChange::Created(b.clone())).await, 1);
    assert_eq!(handler.apply(FileChange::Created(b.clone())).await, 0);
    // A different kind on the same path is its own key.
    assert_eq!(handler.apply(FileChange::Modified(b.clone())).await, 1);

    let stats = handler.stats();
    assert_eq!(stats.applied(), 2);
    assert_eq!(stats.debounced(), 1);

    let rows = env.tracker.list_files(FileQuery::for_collection(docs.id)).await?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].dirty);
    Ok(())
}

#[tokio::test]
async fn zero_window_applies_every_notification() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    let files = Arc::clone(&env.tracker.unit_of_work().files);
    let mut handler = ChangeHandler::new(&docs, handler_settings(0), files);

    let b = write_file(&docs.source_folder, "b.txt", "x")?;
    assert_eq!(handler.apply(FileChange::Modified(b.clone())).await, 1);
    assert_eq!(handler.apply(FileChange::Modified(b)).await, 1);
    Ok(())
}

#[tokio::test]
async fn watcher_respects_exclusions_and_disabled_kinds() -> Result<()> {
    let env = test_tracker().await?;
    let folder = tempfile::tempdir()?;
    let docs = env
        .tracker
        .create_collection(
            filetracker_model::NewCollection::new("Docs", folder.path())
                .with_extensions(["txt"])
                .with_excluded_folders(["node_modules"]),
        )
        .await?;
    let files = Arc::clone(&env.tracker.unit_of_work().files);
    let settings = WatchSettings {
        watch_modified: false,
        omit_folders: vec!["cache".into()],
        ..WatchSettings::default()
    };
    let mut handler = ChangeHandler::new(&docs, settings, files);
    let root = &docs.source_folder;

    let excluded = write_file(root, "node_modules/pkg/readme.txt", "x")?;
    let omitted = write_file(root, "cache/entry.txt", "x")?;
    let wrong_ext = write_file(root, "image.png", "x")?;
    let kept = write_file(root, "notes.txt", "x")?;

    assert_eq!(handler.apply(FileChange::Created(excluded)).await, 0);
    assert_eq!(handler.apply(FileChange::Created(omitted)).await, 0);
    assert_eq!(handler.apply(FileChange::Created(wrong_ext)).await, 0);
    assert_eq!(handler.apply(FileChange::Modified(kept.clone())).await, 0);
    assert_eq!(handler.apply(FileChange::Created(kept)).await, 1);

    // Directories are not files.
    std::fs::create_dir_all(root.join("docs.txt"))?;
    assert_eq!(handler.apply(FileChange::Created(root.join("docs.txt"))).await, 0);

    let rows = env.tracker.list_files(FileQuery::for_collection(docs.id)).await?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[tokio::test]
async fn deletes_and_renames_tombstone_old_paths() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    let root = docs.source_folder.clone();
    write_file(&root, "a.txt", "x")?;
    write_file(&root, "old.txt", "x")?;
    write_file(&root, "sub/one.txt", "x")?;
    write_file(&root, "sub/two.txt", "x")?;
    env.tracker.reconcile(docs.id).await?;
    env.tracker.set_collection_dirty(docs.id, false).await?;

    let files = Arc::clone(&env.tracker.unit_of_work().files);
    let mut handler = ChangeHandler::new(&docs, handler_settings(15), files);

    std::fs::remove_file(root.join("a.txt"))?;
    let writes = handler
        .apply(FileChange::Deleted {
            path: root.join("a.txt"),
            is_dir: false,
        })
        .await;
    assert_eq!(writes, 1);

    std::fs::rename(root.join("old.txt"), root.join("new.txt"))?;
    let writes = handler
        .apply(FileChange::Renamed {
            from: Some(root.join("old.txt")),
            to: Some(root.join("new.txt")),
        })
        .await;
    assert_eq!(writes, 2);

    std::fs::remove_dir_all(root.join("sub"))?;
    let writes = handler
        .apply(FileChange::Deleted {
            path: root.join("sub"),
            is_dir: true,
        })
        .await;
    assert_eq!(writes, 1);

    let tombstones = env
        .tracker
        .list_files(FileQuery::for_collection(docs.id).deleted(true))
        .await?;
    assert_eq!(tombstones.len(), 4);
    assert!(tombstones.iter().all(|f| f.dirty));

    let live = env
        .tracker
        .list_files(FileQuery::for_collection(docs.id).deleted(false))
        .await?;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].file_path, root.join("new.txt"));
    assert!(live[0].dirty);

    // Removing an untracked file still leaves a tombstone.
    let writes = handler
        .apply(FileChange::Deleted {
            path: root.join("never-seen.txt"),
            is_dir: false,
        })
        .await;
    assert_eq!(writes, 1);
    Ok(())
}

#[tokio::test]
async fn live_watcher_tracks_new_file_once() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    env.tracker
        .start_watch(
            docs.id,
            Some(WatchSettingsPatch {
                process_interval: Some(15),
                ..WatchSettingsPatch::default()
            }),
        )
        .await?;
    assert!(env.tracker.is_watching(docs.id).await);

    let b = write_file(&docs.source_folder, "b.txt", "first")?;
    std::fs::write(&b, "second")?;

    let tracker = &env.tracker;
    let id = docs.id;
    let found = wait_for(EVENT_TIMEOUT, move || async move {
        tracker
            .list_files(FileQuery::for_collection(id))
            .await
            .ok()
            .filter(|rows| !rows.is_empty())
    })
    .await
    .expect("watcher should record b.txt");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_path, b);
    assert!(found[0].dirty);
    assert!(!found[0].deleted);

    let status = env.tracker.collection_stats(docs.id).await?;
    let watcher = status.watcher.expect("watcher status");
    assert!(watcher.events_applied >= 1);

    env.tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn live_watcher_tombstones_removed_file() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    let a = write_file(&docs.source_folder, "a.txt", "x")?;
    env.tracker.reconcile(docs.id).await?;
    env.tracker.set_collection_dirty(docs.id, false).await?;
    env.tracker.start_watch(docs.id, None).await?;

    std::fs::remove_file(&a)?;

    let tracker = &env.tracker;
    let id = docs.id;
    let tombstone = wait_for(EVENT_TIMEOUT, move || async move {
        tracker
            .list_files(FileQuery::for_collection(id).deleted(true))
            .await
            .ok()
            .and_then(|mut rows| rows.pop())
    })
    .await
    .expect("watcher should tombstone a.txt");
    assert!(tombstone.dirty);

    env.tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn starting_twice_is_an_error() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;

    env.tracker.start_watch(docs.id, None).await?;
    let err = env.tracker.start_watch(docs.id, None).await.unwrap_err();
    assert!(matches!(err, TrackerError::AlreadyWatching(id) if id == docs.id));

    env.tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn start_requires_existing_folder() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    drop(dir);

    let err = env.tracker.start_watch(docs.id, None).await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidSourceFolder { .. }));
    assert!(!env.tracker.is_watching(docs.id).await);
    assert_eq!(env.tracker.watch_settings(docs.id).await?, None);
    Ok(())
}

#[tokio::test]
async fn stop_persists_disabled_and_restart_reuses_settings() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;

    let started = env
        .tracker
        .start_watch(
            docs.id,
            Some(WatchSettingsPatch {
                process_interval: Some(3),
                watch_renamed: Some(false),
                ..WatchSettingsPatch::default()
            }),
        )
        .await?;
    assert!(started.enabled);
    assert_eq!(env.tracker.watch_settings(docs.id).await?, Some(started.clone()));

    assert!(env.tracker.stop_watch(docs.id).await?);
    assert!(!env.tracker.is_watching(docs.id).await);
    let persisted = env.tracker.watch_settings(docs.id).await?.expect("persisted");
    assert!(!persisted.enabled);
    assert_eq!(persisted.process_interval, 3);

    // Nothing running: still Ok, reports false.
    assert!(!env.tracker.stop_watch(docs.id).await?);

    let restarted = env.tracker.restart_watch(docs.id, None).await?;
    assert!(restarted.enabled);
    assert_eq!(restarted.process_interval, 3);
    assert!(!restarted.watch_renamed);
    assert!(env.tracker.is_watching(docs.id).await);

    let patched = env
        .tracker
        .restart_watch(
            docs.id,
            Some(WatchSettingsPatch {
                process_interval: Some(7),
                ..WatchSettingsPatch::default()
            }),
        )
        .await?;
    assert_eq!(patched.process_interval, 7);
    assert!(!patched.watch_renamed);

    env.tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn resume_restores_enabled_watches_and_skips_missing_folders() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _docs_dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    let (notes, notes_dir) = collection_over_tempdir(&env.tracker, "Notes").await?;
    let (paused, _paused_dir) = collection_over_tempdir(&env.tracker, "Paused").await?;

    env.tracker.start_watch(docs.id, None).await?;
    env.tracker.start_watch(notes.id, None).await?;
    env.tracker.start_watch(paused.id, None).await?;
    env.tracker.stop_watch(paused.id).await?;

    // Shutdown keeps persisted flags.
    env.tracker.shutdown().await;
    drop(notes_dir);

    let tracker = open_tracker_at(&env.db_path(), Default::default()).await?;
    assert!(!tracker.is_watching(docs.id).await);

    let report = tracker.resume_watchers().await?;
    assert_eq!(report.resumed, vec![docs.id]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].collection_id, notes.id);

    assert!(tracker.is_watching(docs.id).await);
    assert!(!tracker.is_watching(notes.id).await);
    assert!(!tracker.is_watching(paused.id).await);

    let stats = tracker.statistics().await?;
    assert_eq!(stats.collections, 3);
    assert_eq!(stats.active_watchers, 1);

    tracker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn deleting_a_watched_collection_stops_and_forgets_it() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    env.tracker.start_watch(docs.id, None).await?;

    env.tracker.delete_collection(docs.id).await?;

    assert!(!env.tracker.is_watching(docs.id).await);
    assert_eq!(env.tracker.watch_settings(docs.id).await?, None);
    let err = env.tracker.stop_watch(docs.id).await.unwrap_err();
    assert!(matches!(err, TrackerError::CollectionNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn rename_away_then_back_keeps_path_live() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    let root = docs.source_folder.clone();
    let a = write_file(&root, "a.txt", "v1")?;
    env.tracker.reconcile(docs.id).await?;
    env.tracker.set_collection_dirty(docs.id, false).await?;

    let files = Arc::clone(&env.tracker.unit_of_work().files);
    let mut handler = ChangeHandler::new(&docs, handler_settings(15), files);

    // Atomic save: move the original aside, then move the new content in.
    let backup = root.join("a.txt.bak");
    std::fs::rename(&a, &backup)?;
    let writes = handler
        .apply(FileChange::Renamed {
            from: Some(a.clone()),
            to: Some(backup.clone()),
        })
        .await;
    assert_eq!(writes, 2);

    let temp = write_file(&root, "a.txt.swp", "v2")?;
    std::fs::rename(&temp, &a)?;
    let writes = handler
        .apply(FileChange::Renamed {
            from: Some(temp.clone()),
            to: Some(a.clone()),
        })
        .await;
    assert_eq!(writes, 2);

    let live = env
        .tracker
        .list_files(FileQuery::for_collection(docs.id).deleted(false))
        .await?;
    let live_paths: Vec<_> = live.iter().map(|f| f.file_path.clone()).collect();
    assert!(live_paths.contains(&a));
    assert!(live_paths.contains(&backup));
    assert!(live.iter().all(|f| f.dirty));

    // A repeated notification for the same side is still a duplicate.
    let writes = handler
        .apply(FileChange::Renamed {
            from: None,
            to: Some(a.clone()),
        })
        .await;
    assert_eq!(writes, 0);
    Ok(())
}

#[tokio::test]
async fn deleting_a_missing_collection_keeps_stored_watch_settings() -> Result<()> {
    let env = test_tracker().await?;
    let ghost = CollectionId(4242);
    let key = watch_settings_key(ghost);
    let settings = env.tracker.unit_of_work().settings.clone();
    settings.set(&key, "{\"enabled\":false}").await?;

    let err = env.tracker.delete_collection(ghost).await.unwrap_err();
    assert!(matches!(err, TrackerError::CollectionNotFound(id) if id == ghost));
    assert!(settings.get(&key).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn update_survives_a_failed_watcher_restart() -> Result<()> {
    let env = test_tracker().await?;
    let (docs, _dir) = collection_over_tempdir(&env.tracker, "Docs").await?;
    env.tracker.start_watch(docs.id, None).await?;

    // Unreadable stored settings make the restart fail before it stops
    // the running watcher.
    let settings = env.tracker.unit_of_work().settings.clone();
    settings.set(&watch_settings_key(docs.id), "not json").await?;

    let updated = env
        .tracker
        .update_collection(
            docs.id,
            CollectionUpdate {
                description: Some("renamed team docs".into()),
                ..CollectionUpdate::default()
            },
        )
        .await?;

    assert_eq!(updated.description.as_deref(), Some("renamed team docs"));
    let stored = env.tracker.get_collection(docs.id).await?;
    assert_eq!(stored.description.as_deref(), Some("renamed team docs"));
    assert!(env.tracker.is_watching(docs.id).await);

    env.tracker.shutdown().await;
    Ok(())
}
