//! Change detection: reconciliation scans, live filesystem watches and the
//! supervisor that owns the watchers.

pub mod filters;
pub mod fs_watch;
pub mod locks;
pub mod reconcile;
pub mod supervisor;
pub mod walk;

pub use filters::PathFilter;
pub use fs_watch::{ChangeHandler, FileChange, WatchHandle, spawn_watcher};
pub use locks::CollectionLocks;
pub use reconcile::{ReconcilePlan, Reconciler};
pub use supervisor::{SupervisorConfig, WatchSupervisor};
pub use walk::{ObservedFile, walk_collection};
