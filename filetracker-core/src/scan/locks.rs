use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use filetracker_model::CollectionId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Advisory per-collection locks. Full reconciliation passes and bulk dirty
/// flips take the lock; single-row watcher upserts do not.
#[derive(Debug, Default, Clone)]
pub struct CollectionLocks {
    inner: Arc<Mutex<HashMap<CollectionId, Arc<AsyncMutex<()>>>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, collection_id: CollectionId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = match self.inner.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(map.entry(collection_id).or_default())
        };
        slot.lock_owned().await
    }

    /// Drop the slot for a deleted collection.
    pub fn forget(&self, collection_id: CollectionId) {
        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.remove(&collection_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_collection_serializes() {
        let locks = CollectionLocks::new();
        let guard = locks.lock(CollectionId(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(CollectionId(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_collections_do_not_block() {
        let locks = CollectionLocks::new();
        let _first = locks.lock(CollectionId(1)).await;
        tokio::time::timeout(Duration::from_millis(200), locks.lock(CollectionId(2)))
            .await
            .unwrap();
    }
}
