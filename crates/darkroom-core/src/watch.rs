//! Watch subscription domain model.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// A registered change-notification subscription against the remote drive.
///
/// At most one active subscription exists per `(user_id, folder_id)` pair.
/// Re-registration replaces the prior row wholesale (upsert keyed on the
/// folder), it never mutates one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSubscription {
    /// Owning user.
    pub user_id: Uuid,

    /// Remote drive folder being watched. Upsert key.
    pub folder_id: String,

    /// The gallery this folder backs. Every watch resolves to a gallery.
    pub gallery_id: Uuid,

    /// Channel identifier generated by this system at registration time.
    /// The remote store echoes it back on every notification.
    pub channel_id: String,

    /// Opaque identifier assigned by the remote store; required to stop
    /// the channel.
    pub resource_id: String,

    /// Instant after which the remote store stops delivering notifications
    /// for this channel.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl WatchSubscription {
    /// A subscription past its expiry is logically dead even if the row
    /// still exists in storage.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }

    /// Whether the subscription expires within the given window from now.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_at <= OffsetDateTime::now_utc() + window
    }
}
