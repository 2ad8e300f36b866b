//! Core domain types shared across the Darkroom workspace.

pub mod tags;
pub mod watch;

pub use tags::CacheTag;
pub use watch::WatchSubscription;
