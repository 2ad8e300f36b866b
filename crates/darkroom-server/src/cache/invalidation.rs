//! Tag invalidation engine: the single chokepoint for evicting stale
//! derived content.
//!
//! Both the webhook receiver (after debouncing) and the ordinary gallery
//! write paths call into this module. All operations are idempotent;
//! invalidating an already-empty tag is a no-op. There is deliberately no
//! full-flush operation here: the blast radius of every call is exactly the
//! set of tags whose underlying data changed. Over-invalidation degrades
//! performance; under-invalidation serves stale data, so write paths tag
//! broadly and read paths stay narrow.

use std::sync::Arc;

use uuid::Uuid;

use darkroom_core::CacheTag;

use super::backend::TagCache;

/// Fields of a gallery write that determine its invalidation blast radius.
///
/// Optional fields reflect what the write actually touched: a delete has no
/// slug left to evict, a gallery without a linked folder has no folder tag.
#[derive(Debug, Clone)]
pub struct GalleryWrite {
    pub gallery_id: Uuid,
    pub user_id: Uuid,
    pub slug: Option<String>,
    pub drive_folder_id: Option<String>,
    pub username: Option<String>,
}

/// Evicts tagged derived content across cache tiers.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<TagCache>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<TagCache>) -> Self {
        Self { cache }
    }

    /// Evict the raw photo listing for a folder and the photo listing of
    /// the gallery it backs. Called by the debounced webhook path.
    pub async fn invalidate_folder(&self, folder_id: &str, gallery_id: Uuid) {
        self.invalidate_tags(&[
            CacheTag::drive_photos(folder_id),
            CacheTag::gallery_tags(gallery_id),
        ])
        .await;
    }

    /// Evict a single cached cover-image derivative.
    pub async fn invalidate_cover(&self, photo_id: &str) {
        self.invalidate_tags(&[CacheTag::cover(photo_id)]).await;
    }

    /// Broad invalidation for direct gallery create/update/delete paths.
    ///
    /// Strictly more aggressive than [`invalidate_folder`]: a structural
    /// change can affect navigation and listing pages (owner's gallery
    /// list, public profile, dashboard) that a content change never
    /// touches.
    ///
    /// [`invalidate_folder`]: Self::invalidate_folder
    pub async fn invalidate_gallery_write(&self, write: &GalleryWrite) {
        let mut tags = vec![
            CacheTag::gallery_tags(write.gallery_id),
            CacheTag::user_galleries(write.user_id),
            CacheTag::dashboard(write.user_id),
        ];
        if let Some(ref slug) = write.slug {
            tags.push(CacheTag::gallery(slug.clone()));
        }
        if let Some(ref folder_id) = write.drive_folder_id {
            tags.push(CacheTag::drive_photos(folder_id.clone()));
        }
        if let Some(ref username) = write.username {
            tags.push(CacheTag::profile(username.clone()));
        }
        self.invalidate_tags(&tags).await;
    }

    async fn invalidate_tags(&self, tags: &[CacheTag]) {
        for tag in tags {
            let key = tag.to_string();
            let evicted = self.cache.invalidate_tag(&key).await;
            crate::metrics::record_tag_invalidation(evicted);
            tracing::debug!(tag = %key, evicted = evicted, "tag invalidated");
        }
    }
}
