//! Tag-aware two-tier caching for derived gallery content.
//!
//! ## Architecture
//!
//! - **L1 Cache (DashMap)**: In-memory, microsecond latency, per-instance
//! - **L2 Cache (Redis)**: Network, millisecond latency, shared across instances
//! - **Pub/Sub**: Cross-instance tag invalidation
//!
//! Every cached artifact (proxied image bytes, rendered photo lists) carries
//! one or more tags; eviction happens by tag, never by full flush. The blast
//! radius of an invalidation is exactly the set of entries whose underlying
//! data changed.
//!
//! ## Graceful Degradation
//!
//! If Redis is unavailable or disabled, the system automatically falls back
//! to L1-only mode (local cache per instance).

pub mod backend;
pub mod invalidation;
pub mod pubsub;

pub use backend::{CachedEntry, TagCache};
pub use invalidation::{CacheInvalidator, GalleryWrite};
pub use pubsub::TagInvalidationListener;
