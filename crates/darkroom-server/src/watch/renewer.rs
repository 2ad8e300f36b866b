//! Renewal sweep for expiring watch subscriptions.

use std::sync::Arc;

use time::OffsetDateTime;

use darkroom_drive::AccessTokenProvider;

use super::registry::{WatchError, WatchRegistry};

/// A single subscription the sweep could not renew.
#[derive(Debug)]
pub struct RenewalFailure {
    pub folder_id: String,
    pub reason: String,
}

/// Outcome of one renewal sweep.
#[derive(Debug, Default)]
pub struct RenewalSummary {
    pub renewed: u32,
    pub failures: Vec<RenewalFailure>,
}

impl RenewalSummary {
    pub fn attempted(&self) -> usize {
        self.renewed as usize + self.failures.len()
    }
}

/// Re-registers subscriptions before the remote store silently stops
/// delivering notifications for them.
///
/// Runs on an external trigger (an authenticated HTTP endpoint hit by a
/// scheduler), not an in-process timer.
pub struct WatchRenewer {
    registry: Arc<WatchRegistry>,
    tokens: Arc<dyn AccessTokenProvider>,
    window: time::Duration,
}

impl WatchRenewer {
    pub fn new(
        registry: Arc<WatchRegistry>,
        tokens: Arc<dyn AccessTokenProvider>,
        window: time::Duration,
    ) -> Self {
        Self {
            registry,
            tokens,
            window,
        }
    }

    /// Renew every subscription expiring within the window.
    ///
    /// Renewal is re-registration: a fresh channel replaces the old row via
    /// the registry's upsert, so a half-renewed subscription cannot exist.
    /// Per-item failures (revoked token, folder deleted remotely, drive
    /// quota) are collected in the summary and never abort the sweep; one
    /// user's revoked token must not stop other users' renewals.
    pub async fn renew_expiring(&self) -> Result<RenewalSummary, WatchError> {
        let threshold = OffsetDateTime::now_utc() + self.window;
        let expiring = self.registry.find_expiring_before(threshold).await?;

        tracing::info!(count = expiring.len(), "watch renewal sweep started");

        let mut summary = RenewalSummary::default();
        for subscription in expiring {
            match self.renew_one(&subscription).await {
                Ok(()) => {
                    summary.renewed += 1;
                    crate::metrics::record_watch_renewal("renewed");
                }
                Err(reason) => {
                    tracing::warn!(
                        folder_id = %subscription.folder_id,
                        user_id = %subscription.user_id,
                        reason = %reason,
                        "watch renewal failed"
                    );
                    crate::metrics::record_watch_renewal("failed");
                    summary.failures.push(RenewalFailure {
                        folder_id: subscription.folder_id,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            renewed = summary.renewed,
            failed = summary.failures.len(),
            "watch renewal sweep finished"
        );
        Ok(summary)
    }

    async fn renew_one(
        &self,
        subscription: &darkroom_core::WatchSubscription,
    ) -> Result<(), String> {
        let token = self
            .tokens
            .access_token_for_user(subscription.user_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no valid access token for user".to_string())?;

        self.registry
            .register_watch(
                subscription.user_id,
                &subscription.folder_id,
                subscription.gallery_id,
                &token,
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
