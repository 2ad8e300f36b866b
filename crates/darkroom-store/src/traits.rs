//! Storage trait for the watch registry.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use darkroom_core::WatchSubscription;

use crate::error::StoreResult;

/// Backing-store contract for watch subscriptions.
///
/// These four operations are the registry's entire storage dependency,
/// keeping the registry storage-engine-agnostic.
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// Insert or replace the subscription row keyed by `folder_id`.
    ///
    /// Must be atomic from the store's perspective (last write wins);
    /// implementations must not fall back to read-then-write.
    async fn upsert(&self, subscription: &WatchSubscription) -> StoreResult<()>;

    /// Point lookup by `(user_id, folder_id)`.
    async fn find_by_folder(
        &self,
        user_id: Uuid,
        folder_id: &str,
    ) -> StoreResult<Option<WatchSubscription>>;

    /// Point lookup by channel identifier. This is the webhook latency path
    /// and must be indexed.
    async fn find_by_channel(&self, channel_id: &str) -> StoreResult<Option<WatchSubscription>>;

    /// All subscriptions with `expires_at` before the given threshold.
    async fn find_expiring_before(
        &self,
        threshold: OffsetDateTime,
    ) -> StoreResult<Vec<WatchSubscription>>;
}
