//! Access token resolution for drive calls.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors from a token provider backend.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token provider error: {0}")]
    Provider(String),
}

/// Collaborator seam for resolving a user's current drive access token.
///
/// Returns `Ok(None)` when the user has no valid token (revoked grant,
/// expired refresh token); callers treat that as a per-user failure, not
/// a systemic one.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token_for_user(&self, user_id: Uuid) -> Result<Option<String>, TokenError>;
}

/// Fixed token map, for tests and single-user development setups.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<Uuid, String>,
}

impl StaticTokenProvider {
    pub fn new(tokens: HashMap<Uuid, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, user_id: Uuid, token: impl Into<String>) -> Self {
        self.tokens.insert(user_id, token.into());
        self
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token_for_user(&self, user_id: Uuid) -> Result<Option<String>, TokenError> {
        Ok(self.tokens.get(&user_id).cloned())
    }
}
