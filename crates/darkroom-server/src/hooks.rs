//! Gallery write hook: the seam between gallery CRUD paths and the
//! invalidation/watch machinery.
//!
//! Write handlers call [`GalleryWriteHook::on_commit`] after their database
//! transaction commits, never before; invalidating for a write that might
//! still roll back would evict valid cache entries for nothing.

use std::sync::Arc;

use uuid::Uuid;

use darkroom_core::WatchSubscription;

use crate::cache::{CacheInvalidator, GalleryWrite};
use crate::watch::{WatchError, WatchRegistry};

/// What kind of gallery write committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryEventKind {
    Created,
    Updated,
    Deleted,
}

/// A committed gallery write, as seen by the hook.
#[derive(Debug, Clone)]
pub struct GalleryEvent {
    pub kind: GalleryEventKind,
    pub gallery_id: Uuid,
    pub user_id: Uuid,
    pub slug: Option<String>,
    pub drive_folder_id: Option<String>,
    pub username: Option<String>,
}

/// Dispatches committed gallery writes to the invalidation engine and, when
/// a folder is attached, to the watch registry.
pub struct GalleryWriteHook {
    invalidator: CacheInvalidator,
    registry: Arc<WatchRegistry>,
}

impl GalleryWriteHook {
    pub fn new(invalidator: CacheInvalidator, registry: Arc<WatchRegistry>) -> Self {
        Self {
            invalidator,
            registry,
        }
    }

    /// Invalidate everything a committed gallery write can have touched.
    ///
    /// Infallible by contract: the write already succeeded, so the worst a
    /// cache-tier problem can cause here is briefly stale derived content,
    /// never a failed user request.
    pub async fn on_commit(&self, event: &GalleryEvent) {
        tracing::debug!(
            gallery_id = %event.gallery_id,
            kind = ?event.kind,
            "gallery write committed"
        );
        self.invalidator
            .invalidate_gallery_write(&GalleryWrite {
                gallery_id: event.gallery_id,
                user_id: event.user_id,
                slug: event.slug.clone(),
                drive_folder_id: event.drive_folder_id.clone(),
                username: event.username.clone(),
            })
            .await;
    }

    /// Link a drive folder to a gallery: register the watch, then evict the
    /// gallery's derived content so the next read pulls the folder's photos.
    ///
    /// Registration errors propagate; this runs on the synchronous gallery
    /// setup path and the user needs to see a failed link.
    pub async fn attach_drive_folder(
        &self,
        user_id: Uuid,
        gallery_id: Uuid,
        folder_id: &str,
        access_token: &str,
    ) -> Result<WatchSubscription, WatchError> {
        let subscription = self
            .registry
            .register_watch(user_id, folder_id, gallery_id, access_token)
            .await?;

        self.invalidator
            .invalidate_folder(folder_id, gallery_id)
            .await;

        Ok(subscription)
    }
}
