//! Storage backends for the watch registry.
//!
//! The registry needs exactly four operations from its backing store
//! (upsert by folder key, point lookup by folder, point lookup by channel,
//! range query by expiry), captured by the [`WatchStore`] trait. Two
//! implementations are provided: PostgreSQL for production and an in-memory
//! DashMap store for tests and single-node development.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryWatchStore;
pub use postgres::PgWatchStore;
pub use traits::WatchStore;
