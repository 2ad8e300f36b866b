//! Redis Pub/Sub for cross-instance tag invalidation.

use std::sync::Arc;
use std::time::Duration;

use super::backend::{INVALIDATION_CHANNEL, TagCache};

/// Tag invalidation listener that subscribes to Redis Pub/Sub.
///
/// ## How It Works
///
/// 1. Subscribe to the invalidation channel
/// 2. When a tag arrives, drop that tag's members from the local L1 cache
/// 3. This keeps L1 caches synchronized across multiple server instances
///
/// The publishing instance already cleared L2, so the listener only touches
/// its own L1 tier.
pub struct TagInvalidationListener {
    pub redis_url: String,
    pub cache: Arc<TagCache>,
}

impl TagInvalidationListener {
    /// Start listening for tag invalidation events.
    ///
    /// This spawns a background task that:
    /// 1. Subscribes to the invalidation channel
    /// 2. Evicts tagged entries from L1 when events are received
    /// 3. Automatically reconnects with exponential backoff if the connection is lost
    pub async fn start(self) {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            const MAX_BACKOFF: Duration = Duration::from_secs(300); // 5 minutes max

            loop {
                match self.run().await {
                    Ok(()) => {
                        // Connection closed gracefully, reset backoff
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Tag invalidation listener error, reconnecting..."
                        );
                        tokio::time::sleep(backoff).await;
                        // Exponential backoff with max limit
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        });
    }

    async fn run(&self) -> Result<(), String> {
        use futures_util::StreamExt;

        // Create a dedicated Redis client for pub/sub
        let client = redis::Client::open(self.redis_url.clone())
            .map_err(|e| format!("failed to create Redis client: {e}"))?;

        // Get async connection and create pub/sub
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| format!("failed to get pub/sub connection: {e}"))?;

        pubsub
            .subscribe(INVALIDATION_CHANNEL)
            .await
            .map_err(|e| format!("failed to subscribe: {e}"))?;

        tracing::info!(channel = INVALIDATION_CHANNEL, "Subscribed to tag invalidation channel");

        // Process messages
        let mut stream = pubsub.on_message();
        loop {
            match stream.next().await {
                Some(msg) => {
                    if let Ok(tag) = msg.get_payload::<String>() {
                        let evicted = self.cache.evict_tag_local(&tag);
                        tracing::debug!(tag = %tag, evicted = evicted, "received tag invalidation");
                    } else {
                        tracing::warn!("failed to parse invalidation message payload");
                    }
                }
                None => {
                    return Err("pub/sub connection closed".to_string());
                }
            }
        }
    }
}
