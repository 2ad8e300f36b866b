//! Durable registry of folder watch subscriptions.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use darkroom_core::WatchSubscription;
use darkroom_drive::{DriveClient, DriveError};
use darkroom_store::{StoreError, WatchStore};

/// Errors surfaced by the synchronous watch registration path.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The remote store rejected the subscription request (invalid token,
    /// folder not found, channel quota exceeded). Propagated to the caller:
    /// the gallery write path may want to surface it.
    #[error("remote watch registration failed: {0}")]
    Registration(#[source] DriveError),

    #[error("watch storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Records which folders are watched, by whom, under what external channel,
/// and until when.
pub struct WatchRegistry {
    store: Arc<dyn WatchStore>,
    drive: Arc<DriveClient>,
    callback_url: String,
    ttl: time::Duration,
}

impl WatchRegistry {
    pub fn new(
        store: Arc<dyn WatchStore>,
        drive: Arc<DriveClient>,
        callback_url: impl Into<String>,
        ttl: time::Duration,
    ) -> Self {
        Self {
            store,
            drive,
            callback_url: callback_url.into(),
            ttl,
        }
    }

    /// Create a remote change-notification channel for a folder and record
    /// it, replacing any prior subscription for `(user_id, folder_id)`.
    ///
    /// Any existing subscription is deregistered best-effort first; the
    /// replacement row lands via an atomic upsert either way, so a failed
    /// stop call leaves at worst a dangling remote channel that expires
    /// naturally.
    pub async fn register_watch(
        &self,
        user_id: Uuid,
        folder_id: &str,
        gallery_id: Uuid,
        access_token: &str,
    ) -> Result<WatchSubscription, WatchError> {
        if let Some(existing) = self.store.find_by_folder(user_id, folder_id).await? {
            self.deregister_watch(access_token, &existing.channel_id, &existing.resource_id)
                .await;
        }

        let channel_id = Uuid::new_v4().to_string();
        let requested_expiry = OffsetDateTime::now_utc() + self.ttl;

        let channel = self
            .drive
            .watch_folder(
                access_token,
                folder_id,
                &channel_id,
                &self.callback_url,
                requested_expiry,
            )
            .await
            .map_err(WatchError::Registration)?;

        // The drive may grant less than requested; the granted expiry is
        // what renewal scheduling has to work from.
        let expires_at = channel.expiration_time().unwrap_or(requested_expiry);

        // The drive echoes our channel id back; the generated one is
        // authoritative either way.
        let subscription = WatchSubscription {
            user_id,
            folder_id: folder_id.to_string(),
            gallery_id,
            channel_id,
            resource_id: channel.resource_id,
            expires_at,
        };
        self.store.upsert(&subscription).await?;

        tracing::info!(
            folder_id = %folder_id,
            gallery_id = %gallery_id,
            channel_id = %subscription.channel_id,
            expires_at = %expires_at,
            "watch registered"
        );
        Ok(subscription)
    }

    /// Stop a remote channel. Best-effort: never fails to the caller, the
    /// remote subscription expires naturally at worst.
    pub async fn deregister_watch(&self, access_token: &str, channel_id: &str, resource_id: &str) {
        if let Err(e) = self
            .drive
            .stop_channel(access_token, channel_id, resource_id)
            .await
        {
            tracing::warn!(
                channel_id = %channel_id,
                error = %e,
                "best-effort watch deregistration failed"
            );
        }
    }

    /// Map an inbound notification to its subscription. Webhook latency
    /// path; backed by an indexed point lookup.
    pub async fn find_by_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<WatchSubscription>, WatchError> {
        Ok(self.store.find_by_channel(channel_id).await?)
    }

    /// All subscriptions expiring before the threshold, for the renewer.
    pub async fn find_expiring_before(
        &self,
        threshold: OffsetDateTime,
    ) -> Result<Vec<WatchSubscription>, WatchError> {
        Ok(self.store.find_expiring_before(threshold).await?)
    }
}
