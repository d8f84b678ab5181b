//! # filetracker-core
//!
//! Change-tracking engine for monitored folders ("collections").
//!
//! Every tracked file carries a durable `dirty` flag meaning "changed since a
//! downstream processor last looked" and a `deleted` tombstone. Two
//! mechanisms keep those flags current:
//!
//! - [`scan::reconcile`]: an authoritative full rescan applied in one
//!   transaction, safe to re-run at any time;
//! - [`scan::fs_watch`]: a best-effort live watcher over OS notifications
//!   with per `(change type, path)` debouncing.
//!
//! [`scan::supervisor::WatchSupervisor`] owns one watcher per collection and
//! persists its configuration. [`FileTracker`] composes everything behind a
//! single facade.
//!
//! ```no_run
//! use filetracker_core::{FileTracker, StoreOptions, TrackerOptions};
//! use filetracker_model::NewCollection;
//!
//! async fn track() -> filetracker_core::Result<()> {
//!     let tracker = FileTracker::open(
//!         "sqlite://filetracker.db",
//!         &StoreOptions::default(),
//!         TrackerOptions::default(),
//!     )
//!     .await?;
//!     let docs = tracker
//!         .create_collection(NewCollection::new("Docs", "/srv/docs"))
//!         .await?;
//!     let report = tracker.reconcile(docs.id).await?;
//!     println!("{report}");
//!     tracker.start_watch(docs.id, None).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod application;
pub mod catalog;
pub mod database;
pub mod error;
pub mod scan;
pub mod status;
pub mod tracker;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use database::{DatabaseContext, SqliteDatabase, StoreOptions};
pub use error::{Result, TrackerError};
pub use tracker::{FileTracker, TrackerOptions};

pub use filetracker_model as model;
