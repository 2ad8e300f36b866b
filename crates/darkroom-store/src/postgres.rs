//! PostgreSQL watch store.
//!
//! Subscriptions live in a single `watch_subscription` table. The folder id
//! carries a unique constraint so registration and renewal both go through
//! one atomic `INSERT ... ON CONFLICT DO UPDATE`; concurrent registrations
//! for the same folder resolve to whichever upsert commits last.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow};
use time::OffsetDateTime;
use uuid::Uuid;

use darkroom_core::WatchSubscription;

use crate::error::{StoreError, StoreResult};
use crate::traits::WatchStore;

fn corrupt(e: sqlx_core::Error) -> StoreError {
    StoreError::CorruptRow(e.to_string())
}

/// PostgreSQL-backed watch store.
#[derive(Clone)]
pub struct PgWatchStore {
    pool: PgPool,
}

impl PgWatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        query(
            r#"
            CREATE TABLE IF NOT EXISTS watch_subscription (
                folder_id   TEXT PRIMARY KEY,
                user_id     UUID NOT NULL,
                gallery_id  UUID NOT NULL,
                channel_id  TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                expires_at  TIMESTAMPTZ NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Channel lookups happen on the webhook latency path.
        query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_watch_subscription_channel
             ON watch_subscription (channel_id)",
        )
        .execute(&self.pool)
        .await?;

        query(
            "CREATE INDEX IF NOT EXISTS idx_watch_subscription_expires
             ON watch_subscription (expires_at)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("watch_subscription schema ensured");
        Ok(())
    }

    fn row_to_subscription(row: &PgRow) -> StoreResult<WatchSubscription> {
        Ok(WatchSubscription {
            user_id: row.try_get("user_id").map_err(corrupt)?,
            folder_id: row.try_get("folder_id").map_err(corrupt)?,
            gallery_id: row.try_get("gallery_id").map_err(corrupt)?,
            channel_id: row.try_get("channel_id").map_err(corrupt)?,
            resource_id: row.try_get("resource_id").map_err(corrupt)?,
            expires_at: row.try_get("expires_at").map_err(corrupt)?,
        })
    }
}

#[async_trait]
impl WatchStore for PgWatchStore {
    async fn upsert(&self, subscription: &WatchSubscription) -> StoreResult<()> {
        query(
            r#"
            INSERT INTO watch_subscription (
                folder_id, user_id, gallery_id, channel_id, resource_id,
                expires_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (folder_id) DO UPDATE SET
                user_id     = EXCLUDED.user_id,
                gallery_id  = EXCLUDED.gallery_id,
                channel_id  = EXCLUDED.channel_id,
                resource_id = EXCLUDED.resource_id,
                expires_at  = EXCLUDED.expires_at,
                updated_at  = NOW()
            "#,
        )
        .bind(&subscription.folder_id)
        .bind(subscription.user_id)
        .bind(subscription.gallery_id)
        .bind(&subscription.channel_id)
        .bind(&subscription.resource_id)
        .bind(subscription.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_folder(
        &self,
        user_id: Uuid,
        folder_id: &str,
    ) -> StoreResult<Option<WatchSubscription>> {
        let row: Option<PgRow> = query(
            "SELECT * FROM watch_subscription WHERE user_id = $1 AND folder_id = $2",
        )
        .bind(user_id)
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_subscription).transpose()
    }

    async fn find_by_channel(&self, channel_id: &str) -> StoreResult<Option<WatchSubscription>> {
        let row: Option<PgRow> = query("SELECT * FROM watch_subscription WHERE channel_id = $1")
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_subscription).transpose()
    }

    async fn find_expiring_before(
        &self,
        threshold: OffsetDateTime,
    ) -> StoreResult<Vec<WatchSubscription>> {
        let rows: Vec<PgRow> = query(
            "SELECT * FROM watch_subscription WHERE expires_at < $1 ORDER BY expires_at ASC",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_subscription).collect()
    }
}
