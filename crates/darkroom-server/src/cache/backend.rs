//! Cache backend implementation with L1 (DashMap) and L2 (Redis) tiers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use darkroom_core::CacheTag;

/// Redis key prefix for tag membership sets.
const TAG_SET_PREFIX: &str = "cachetag:";

/// Pub/sub channel carrying tag invalidation events between instances.
pub const INVALIDATION_CHANNEL: &str = "cache:invalidate-tag";

/// A cached entry with TTL support and the tags it was stored under.
///
/// The data is wrapped in `Arc` to allow cheap cloning on cache hits,
/// avoiding expensive copies of potentially large image payloads.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
    pub tags: Vec<String>,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Duration, tags: Vec<String>) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
            tags,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Tag-aware two-tier cache: L1 (DashMap) + L2 (Redis).
///
/// ## Cache Modes
///
/// - **Local**: Single-instance mode using only DashMap
/// - **Redis**: Multi-instance mode with DashMap (L1) + Redis (L2)
///
/// Alongside the entry map, each instance keeps a tag index mapping tag key
/// to the set of cache keys stored under it, so invalidating a tag never has
/// to enumerate the whole cache.
#[derive(Clone)]
pub enum TagCache {
    /// Single-instance: local DashMap only
    Local {
        entries: Arc<DashMap<String, CachedEntry>>,
        tags: Arc<DashMap<String, HashSet<String>>>,
    },

    /// Multi-instance: Redis + local L1
    Redis {
        redis: Pool,
        entries: Arc<DashMap<String, CachedEntry>>,
        tags: Arc<DashMap<String, HashSet<String>>>,
    },
}

impl TagCache {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        TagCache::Local {
            entries: Arc::new(DashMap::new()),
            tags: Arc::new(DashMap::new()),
        }
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        TagCache::Redis {
            redis: redis_pool,
            entries: Arc::new(DashMap::new()),
            tags: Arc::new(DashMap::new()),
        }
    }

    fn entries(&self) -> &Arc<DashMap<String, CachedEntry>> {
        match self {
            TagCache::Local { entries, .. } => entries,
            TagCache::Redis { entries, .. } => entries,
        }
    }

    fn tag_index(&self) -> &Arc<DashMap<String, HashSet<String>>> {
        match self {
            TagCache::Local { tags, .. } => tags,
            TagCache::Redis { tags, .. } => tags,
        }
    }

    /// Get a value from the cache.
    ///
    /// ## Lookup Order
    ///
    /// 1. Check L1 (DashMap) - microsecond latency
    /// 2. Check L2 (Redis) - millisecond latency
    /// 3. Return None if not found
    ///
    /// An L2 hit is served but NOT promoted to L1: the Redis value does not
    /// carry its tag list, and an untagged L1 entry would be unreachable by
    /// tag invalidation and could outlive the data it was derived from.
    ///
    /// Returns `Arc<Vec<u8>>` for zero-copy access to cached data.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        // 1. Check L1 (local DashMap)
        if let Some(entry) = self.entries().get(key) {
            if !entry.is_expired() {
                tracing::debug!(key = %key, "cache hit (L1)");
                crate::metrics::record_cache_hit("L1");
                return Some(Arc::clone(&entry.data));
            }
            // Remove expired entry
            drop(entry);
            self.entries().remove(key);
        }

        let TagCache::Redis { redis, .. } = self else {
            crate::metrics::record_cache_miss();
            return None;
        };

        // 2. Check L2 (Redis)
        match redis.get().await {
            Ok(mut conn) => match conn.get::<_, Option<Vec<u8>>>(key).await {
                Ok(Some(data)) => {
                    tracing::debug!(key = %key, "cache hit (L2)");
                    crate::metrics::record_cache_hit("L2");
                    Some(Arc::new(data))
                }
                Ok(None) => {
                    tracing::debug!(key = %key, "cache miss");
                    crate::metrics::record_cache_miss();
                    None
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Redis GET error");
                    crate::metrics::record_cache_miss();
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get Redis connection");
                crate::metrics::record_cache_miss();
                None
            }
        }
    }

    /// Set a value in the cache with TTL, grouped under the given tags.
    ///
    /// ## Write Strategy
    ///
    /// - **Local mode**: Write to DashMap and the local tag index
    /// - **Redis mode**: Additionally SETEX the value and SADD the key into
    ///   each tag's membership set
    ///
    /// Redis writes are fire-and-forget (we don't wait for confirmation).
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, tags: &[CacheTag]) {
        let tag_keys: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let entry = CachedEntry::new(value, ttl, tag_keys.clone());
        let data_for_redis = Arc::clone(&entry.data);

        // Replacing an entry retags it: drop the key from the old tags first
        // so a stale tag can no longer evict the fresh value's key.
        if let Some(old) = self.entries().insert(key.to_string(), entry) {
            for old_tag in &old.tags {
                if !tag_keys.contains(old_tag)
                    && let Some(mut members) = self.tag_index().get_mut(old_tag)
                {
                    members.remove(key);
                }
            }
        }
        for tag in &tag_keys {
            self.tag_index()
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }

        if let TagCache::Redis { redis, .. } = self {
            let redis = redis.clone();
            let key = key.to_string();
            let ttl_secs = ttl.as_secs();
            tokio::spawn(async move {
                let Ok(mut conn) = redis.get().await else {
                    return;
                };
                if let Err(e) = conn
                    .set_ex::<_, _, ()>(&key, &*data_for_redis, ttl_secs)
                    .await
                {
                    tracing::warn!(key = %key, error = %e, "Redis SET error");
                    return;
                }
                for tag in &tag_keys {
                    let set_key = format!("{TAG_SET_PREFIX}{tag}");
                    if let Err(e) = conn.sadd::<_, _, ()>(&set_key, &key).await {
                        tracing::warn!(tag = %tag, error = %e, "Redis SADD error");
                    }
                    // Membership sets may briefly outlive their entries;
                    // deleting a missing key on invalidation is a no-op.
                    let _ = conn.expire::<_, ()>(&set_key, ttl_secs as i64).await;
                }
                tracing::debug!(key = %key, ttl_secs = %ttl_secs, "cache set (L1+L2)");
            });
        }
    }

    /// Evict every entry stored under a tag. Idempotent: invalidating a tag
    /// with no members is a no-op, not an error.
    ///
    /// ## Invalidation Strategy
    ///
    /// - **Local mode**: Drain the tag's member set and remove each entry
    /// - **Redis mode**: Additionally delete the tagged keys and the tag set
    ///   in Redis, then publish the tag so other instances drop their L1
    ///   copies
    ///
    /// Redis failures degrade to local-only eviction with a warning; the L2
    /// entries still expire by TTL.
    ///
    /// Returns the number of L1 entries evicted on this instance.
    pub async fn invalidate_tag(&self, tag: &str) -> u64 {
        let evicted = self.evict_tag_local(tag);

        if let TagCache::Redis { redis, .. } = self {
            match redis.get().await {
                Ok(mut conn) => {
                    let set_key = format!("{TAG_SET_PREFIX}{tag}");
                    match conn.smembers::<_, Vec<String>>(&set_key).await {
                        Ok(members) if !members.is_empty() => {
                            if let Err(e) = conn.del::<_, ()>(&members).await {
                                tracing::warn!(tag = %tag, error = %e, "Redis DEL error");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(tag = %tag, error = %e, "Redis SMEMBERS error");
                        }
                    }
                    if let Err(e) = conn.del::<_, ()>(&set_key).await {
                        tracing::warn!(tag = %tag, error = %e, "Redis DEL error");
                    }
                    if let Err(e) = conn
                        .publish::<_, _, ()>(INVALIDATION_CHANNEL, tag)
                        .await
                    {
                        tracing::warn!(tag = %tag, error = %e, "Redis PUBLISH error");
                    } else {
                        tracing::debug!(tag = %tag, "tag invalidated (L1+L2+pub/sub)");
                    }
                }
                Err(e) => {
                    tracing::warn!(tag = %tag, error = %e, "Failed to get Redis connection");
                }
            }
        } else {
            tracing::debug!(tag = %tag, evicted = evicted, "tag invalidated (local)");
        }

        evicted
    }

    /// Drop a tag's members from L1 only. Used by the pub/sub listener when
    /// another instance already handled L2.
    pub fn evict_tag_local(&self, tag: &str) -> u64 {
        let Some((_, members)) = self.tag_index().remove(tag) else {
            return 0;
        };
        let mut evicted = 0u64;
        for key in members {
            if self.entries().remove(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Get cache statistics (L1 only).
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_entries: self.entries().len(),
            tags: self.tag_index().len(),
            mode: match self {
                TagCache::Local { .. } => "local".to_string(),
                TagCache::Redis { .. } => "redis".to_string(),
            },
        }
    }

    /// Check if Redis is available (for health checks).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            TagCache::Local { .. } => false,
            TagCache::Redis { redis, .. } => redis.get().await.is_ok(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub l1_entries: usize,
    pub tags: usize,
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_tag(id: &str) -> CacheTag {
        CacheTag::drive_photos(id)
    }

    #[tokio::test]
    async fn test_set_get_and_invalidate_by_tag() {
        let cache = TagCache::new_local();
        cache
            .set(
                "photos:f1",
                b"listing".to_vec(),
                Duration::from_secs(60),
                &[folder_tag("f1")],
            )
            .await;

        assert_eq!(
            cache.get("photos:f1").await.as_deref().map(|v| v.as_slice()),
            Some(b"listing".as_slice())
        );

        let evicted = cache.invalidate_tag("drive-photos:f1").await;
        assert_eq!(evicted, 1);
        assert!(cache.get("photos:f1").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_unknown_tag_is_noop() {
        let cache = TagCache::new_local();
        assert_eq!(cache.invalidate_tag("drive-photos:nothing").await, 0);
        // Repeat invalidation is equally a no-op.
        assert_eq!(cache.invalidate_tag("drive-photos:nothing").await, 0);
    }

    #[tokio::test]
    async fn test_tag_scopes_eviction() {
        let cache = TagCache::new_local();
        cache
            .set(
                "photos:f1",
                b"a".to_vec(),
                Duration::from_secs(60),
                &[folder_tag("f1")],
            )
            .await;
        cache
            .set(
                "photos:f2",
                b"b".to_vec(),
                Duration::from_secs(60),
                &[folder_tag("f2")],
            )
            .await;

        cache.invalidate_tag("drive-photos:f1").await;

        assert!(cache.get("photos:f1").await.is_none());
        assert!(cache.get("photos:f2").await.is_some());
    }

    #[tokio::test]
    async fn test_entry_carrying_two_tags_is_evicted_by_either() {
        let cache = TagCache::new_local();
        let tags = [folder_tag("f1"), CacheTag::gallery("spring")];
        cache
            .set("page:spring", b"html".to_vec(), Duration::from_secs(60), &tags)
            .await;

        cache.invalidate_tag("gallery:spring").await;
        assert!(cache.get("page:spring").await.is_none());

        // The other tag's member set is now stale; invalidating it evicts
        // nothing and does not error.
        assert_eq!(cache.invalidate_tag("drive-photos:f1").await, 0);
    }

    #[tokio::test]
    async fn test_overwrite_retags_entry() {
        let cache = TagCache::new_local();
        cache
            .set(
                "photos:x",
                b"old".to_vec(),
                Duration::from_secs(60),
                &[folder_tag("f1")],
            )
            .await;
        cache
            .set(
                "photos:x",
                b"new".to_vec(),
                Duration::from_secs(60),
                &[folder_tag("f2")],
            )
            .await;

        // The old tag no longer reaches the rewritten key.
        assert_eq!(cache.invalidate_tag("drive-photos:f1").await, 0);
        assert!(cache.get("photos:x").await.is_some());

        assert_eq!(cache.invalidate_tag("drive-photos:f2").await, 1);
        assert!(cache.get("photos:x").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = TagCache::new_local();
        cache
            .set(
                "photos:f1",
                b"stale".to_vec(),
                Duration::from_millis(0),
                &[folder_tag("f1")],
            )
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get("photos:f1").await.is_none());
    }
}
