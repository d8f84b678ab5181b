use std::fmt;

use crate::ids::CollectionId;

/// Counts produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconcileReport {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl ReconcileReport {
    /// Paths whose stored state changed during the pass.
    pub fn changed(&self) -> usize {
        self.new + self.modified + self.removed
    }

    pub fn is_noop(&self) -> bool {
        self.changed() == 0
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={} modified={} unchanged={} removed={}",
            self.new, self.modified, self.unchanged, self.removed
        )
    }
}

/// A persisted watch that was not restored.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkippedWatch {
    pub collection_id: CollectionId,
    pub reason: String,
}

/// Outcome of restoring persisted watches on startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResumeReport {
    pub resumed: Vec<CollectionId>,
    pub skipped: Vec<SkippedWatch>,
}

impl ResumeReport {
    pub fn skip(&mut self, collection_id: CollectionId, reason: impl Into<String>) {
        self.skipped.push(SkippedWatch {
            collection_id,
            reason: reason.into(),
        });
    }
}
