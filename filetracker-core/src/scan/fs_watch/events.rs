use std::path::PathBuf;

use filetracker_model::ChangeType;
use notify::Event;
use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};

/// A single typed filesystem change handed to the watcher's handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted { path: PathBuf, is_dir: bool },
    /// Either side may be unknown; backends that cannot tell which side a
    /// path belongs to report it on both.
    Renamed {
        from: Option<PathBuf>,
        to: Option<PathBuf>,
    },
}

impl FileChange {
    pub fn change_type(&self) -> ChangeType {
        match self {
            FileChange::Created(_) => ChangeType::Created,
            FileChange::Modified(_) => ChangeType::Modified,
            FileChange::Deleted { .. } => ChangeType::Deleted,
            FileChange::Renamed { .. } => ChangeType::Renamed,
        }
    }
}

/// Translate a raw notify event into typed changes. Access notifications
/// and folder creations produce nothing.
pub fn classify(event: &Event) -> Vec<FileChange> {
    let paths = event.paths.iter().cloned();
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => paths.map(FileChange::Created).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut iter = event.paths.iter().cloned();
            let from = iter.next();
            let to = iter.next();
            if from.is_none() && to.is_none() {
                Vec::new()
            } else {
                vec![FileChange::Renamed { from, to }]
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .map(|path| FileChange::Renamed {
                from: Some(path),
                to: None,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
            .map(|path| FileChange::Renamed {
                from: None,
                to: Some(path),
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|path| FileChange::Renamed {
                from: Some(path.clone()),
                to: Some(path),
            })
            .collect(),
        EventKind::Modify(_) => paths.map(FileChange::Modified).collect(),
        EventKind::Remove(RemoveKind::Folder) => paths
            .map(|path| FileChange::Deleted { path, is_dir: true })
            .collect(),
        EventKind::Remove(_) => paths
            .map(|path| FileChange::Deleted {
                path,
                is_dir: false,
            })
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Whether the backend dropped events and the tree should be rescanned.
pub fn is_overflow(event: &Event) -> bool {
    event.need_rescan() || matches!(event.kind, EventKind::Other)
}
