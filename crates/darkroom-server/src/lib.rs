//! Darkroom server: cache invalidation and change propagation for photo
//! galleries backed by a remote cloud drive.
//!
//! The server watches drive folders through the drive's change notification
//! API, receives webhook events when folder contents change, debounces the
//! event bursts, and evicts exactly the cached derived content (photo
//! listings, cover derivatives, rendered pages) the change affects.

pub mod cache;
pub mod config;
pub mod debounce;
pub mod handlers;
pub mod hooks;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod watch;

pub use cache::{CacheInvalidator, CachedEntry, GalleryWrite, TagCache, TagInvalidationListener};
pub use config::{
    AppConfig, DriveConfig, PostgresStorageConfig, RedisConfig, ServerConfig, StorageBackend,
    WatchConfig, load_config,
};
pub use debounce::Debouncer;
pub use hooks::{GalleryEvent, GalleryEventKind, GalleryWriteHook};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, DarkroomServer, ServerBuilder, build_app};
pub use watch::{WatchError, WatchRegistry, WatchRenewer};

/// Create the tag cache based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns local-only cache (DashMap)
/// - **Redis enabled**: Attempts to connect to Redis, falls back to local on failure
///
/// ## Graceful Degradation
///
/// If Redis connection fails, the system automatically falls back to local-only mode.
pub async fn create_tag_cache(config: &RedisConfig) -> std::sync::Arc<TagCache> {
    use std::sync::Arc;
    use std::time::Duration;

    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return Arc::new(TagCache::new_local());
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    // Create Redis pool configuration
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    if let Some(ref mut pool_config) = redis_config.pool {
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    }

    // Create pool
    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return Arc::new(TagCache::new_local());
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis successfully");

            let cache = Arc::new(TagCache::new_redis(pool));

            // Keep L1 tiers coherent across instances
            TagInvalidationListener {
                redis_url: config.url.clone(),
                cache: Arc::clone(&cache),
            }
            .start()
            .await;

            cache
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            Arc::new(TagCache::new_local())
        }
    }
}
