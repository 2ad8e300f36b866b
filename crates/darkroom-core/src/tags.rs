//! Cache tags for scoped invalidation.
//!
//! Derived artifacts (proxied photos, photo listings, rendered pages) are
//! cached under one or more tags so a change can evict exactly the entries
//! whose underlying data moved, never the whole cache.
//!
//! ## Tag Key Format
//!
//! `drive-photos:{folderId}`, `cover:{photoId}`, `gallery:{slug}`,
//! `gallery-tags:{galleryId}`, `user-galleries:{userId}`,
//! `profile:{username}`, `dashboard:{userId}`

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A label under which cached artifacts are grouped for bulk eviction.
///
/// Anything cached under a tag must be safe to evict whenever the tag is
/// invalidated: choose tags so invalidation scope matches the blast radius
/// of the underlying change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheTag {
    /// Raw photo listing of a remote drive folder.
    DrivePhotos { folder_id: String },

    /// A single cached cover-image derivative.
    Cover { photo_id: String },

    /// The public gallery page addressed by slug.
    Gallery { slug: String },

    /// A gallery's own photo listing and metadata.
    GalleryTags { gallery_id: Uuid },

    /// The owner's list of galleries.
    UserGalleries { user_id: Uuid },

    /// A public profile page.
    Profile { username: String },

    /// The owner's statically-rendered dashboard.
    Dashboard { user_id: Uuid },
}

impl CacheTag {
    pub fn drive_photos(folder_id: impl Into<String>) -> Self {
        Self::DrivePhotos {
            folder_id: folder_id.into(),
        }
    }

    pub fn cover(photo_id: impl Into<String>) -> Self {
        Self::Cover {
            photo_id: photo_id.into(),
        }
    }

    pub fn gallery(slug: impl Into<String>) -> Self {
        Self::Gallery { slug: slug.into() }
    }

    pub fn gallery_tags(gallery_id: Uuid) -> Self {
        Self::GalleryTags { gallery_id }
    }

    pub fn user_galleries(user_id: Uuid) -> Self {
        Self::UserGalleries { user_id }
    }

    pub fn profile(username: impl Into<String>) -> Self {
        Self::Profile {
            username: username.into(),
        }
    }

    pub fn dashboard(user_id: Uuid) -> Self {
        Self::Dashboard { user_id }
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DrivePhotos { folder_id } => write!(f, "drive-photos:{folder_id}"),
            Self::Cover { photo_id } => write!(f, "cover:{photo_id}"),
            Self::Gallery { slug } => write!(f, "gallery:{slug}"),
            Self::GalleryTags { gallery_id } => write!(f, "gallery-tags:{gallery_id}"),
            Self::UserGalleries { user_id } => write!(f, "user-galleries:{user_id}"),
            Self::Profile { username } => write!(f, "profile:{username}"),
            Self::Dashboard { user_id } => write!(f, "dashboard:{user_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_key_format() {
        let gallery_id = Uuid::parse_str("0d4e3f8a-7c1b-4b5e-9a2d-1f6c8e0b3a71").unwrap();

        assert_eq!(
            CacheTag::drive_photos("folder-abc").to_string(),
            "drive-photos:folder-abc"
        );
        assert_eq!(CacheTag::cover("photo-1").to_string(), "cover:photo-1");
        assert_eq!(
            CacheTag::gallery("summer-2026").to_string(),
            "gallery:summer-2026"
        );
        assert_eq!(
            CacheTag::gallery_tags(gallery_id).to_string(),
            format!("gallery-tags:{gallery_id}")
        );
        assert_eq!(
            CacheTag::profile("ansel").to_string(),
            "profile:ansel"
        );
    }

    #[test]
    fn test_tags_are_distinct_per_identifier() {
        assert_ne!(
            CacheTag::drive_photos("a").to_string(),
            CacheTag::drive_photos("b").to_string()
        );
        // Same identifier, different namespace
        assert_ne!(
            CacheTag::cover("x").to_string(),
            CacheTag::gallery("x").to_string()
        );
    }
}
