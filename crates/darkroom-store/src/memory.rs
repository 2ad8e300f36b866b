//! In-memory watch store.
//!
//! DashMap twin of the PostgreSQL backend, used by tests and by
//! single-node development setups without a database. Semantics mirror
//! `PgWatchStore`: the folder id is the upsert key and the map insert is
//! the atomic replace.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use darkroom_core::WatchSubscription;

use crate::error::StoreResult;
use crate::traits::WatchStore;

/// In-memory watch store keyed by folder id.
#[derive(Debug, Default)]
pub struct MemoryWatchStore {
    rows: DashMap<String, WatchSubscription>,
}

impl MemoryWatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl WatchStore for MemoryWatchStore {
    async fn upsert(&self, subscription: &WatchSubscription) -> StoreResult<()> {
        self.rows
            .insert(subscription.folder_id.clone(), subscription.clone());
        Ok(())
    }

    async fn find_by_folder(
        &self,
        user_id: Uuid,
        folder_id: &str,
    ) -> StoreResult<Option<WatchSubscription>> {
        Ok(self
            .rows
            .get(folder_id)
            .filter(|sub| sub.user_id == user_id)
            .map(|sub| sub.clone()))
    }

    async fn find_by_channel(&self, channel_id: &str) -> StoreResult<Option<WatchSubscription>> {
        Ok(self
            .rows
            .iter()
            .find(|entry| entry.channel_id == channel_id)
            .map(|entry| entry.clone()))
    }

    async fn find_expiring_before(
        &self,
        threshold: OffsetDateTime,
    ) -> StoreResult<Vec<WatchSubscription>> {
        let mut expiring: Vec<WatchSubscription> = self
            .rows
            .iter()
            .filter(|entry| entry.expires_at < threshold)
            .map(|entry| entry.clone())
            .collect();
        expiring.sort_by_key(|sub| sub.expires_at);
        Ok(expiring)
    }
}
