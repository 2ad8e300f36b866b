//! HTTP client for the remote drive's watch API.

use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::error::DriveError;

/// Client for the remote file store's subscription endpoints.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    base_url: String,
}

/// Channel resource returned by the drive when a watch is created.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchChannel {
    /// Echo of the channel id we generated.
    pub id: String,

    /// Identifier the drive assigned to the watched resource; required to
    /// stop the channel later.
    pub resource_id: String,

    /// Granted expiry as epoch milliseconds. The drive may grant less than
    /// requested; it sends the value as a decimal string.
    #[serde(default)]
    pub expiration: Option<String>,
}

impl WatchChannel {
    /// Granted expiry, if the drive reported one it could parse.
    pub fn expiration_time(&self) -> Option<OffsetDateTime> {
        let millis: i128 = self.expiration.as_deref()?.parse().ok()?;
        OffsetDateTime::from_unix_timestamp_nanos(millis * 1_000_000).ok()
    }
}

impl DriveClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a change-notification channel on a folder.
    ///
    /// `address` is this system's webhook URL; `expiration` the requested
    /// expiry. The drive confirms the channel by posting a `sync` event to
    /// the address shortly after.
    pub async fn watch_folder(
        &self,
        access_token: &str,
        folder_id: &str,
        channel_id: &str,
        address: &str,
        expiration: OffsetDateTime,
    ) -> Result<WatchChannel, DriveError> {
        let url = format!("{}/files/{}/watch", self.base_url, folder_id);
        let expiration_ms = expiration.unix_timestamp_nanos() / 1_000_000;

        let body = json!({
            "id": channel_id,
            "type": "web_hook",
            "address": address,
            "expiration": expiration_ms,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let channel: WatchChannel = response
            .json()
            .await
            .map_err(|e| DriveError::UnexpectedResponse(e.to_string()))?;

        tracing::debug!(
            folder_id = %folder_id,
            channel_id = %channel.id,
            resource_id = %channel.resource_id,
            "drive watch created"
        );

        Ok(channel)
    }

    /// Stop a channel. Callers on the replacement path treat failures as
    /// best-effort; a dangling channel expires naturally.
    pub async fn stop_channel(
        &self,
        access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), DriveError> {
        let url = format!("{}/channels/stop", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({
                "id": channel_id,
                "resourceId": resource_id,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(channel_id = %channel_id, "drive channel stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_watch_folder_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/files/folder-1/watch"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_partial_json(serde_json::json!({
                "id": "chan-1",
                "type": "web_hook",
                "address": "https://darkroom.example/hooks/drive",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "api#channel",
                "id": "chan-1",
                "resourceId": "res-xyz",
                "expiration": "1767225600000",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DriveClient::new(server.uri());
        let channel = client
            .watch_folder(
                "tok-1",
                "folder-1",
                "chan-1",
                "https://darkroom.example/hooks/drive",
                OffsetDateTime::now_utc() + time::Duration::days(7),
            )
            .await
            .unwrap();

        assert_eq!(channel.id, "chan-1");
        assert_eq!(channel.resource_id, "res-xyz");
        let granted = channel.expiration_time().unwrap();
        assert_eq!(granted.unix_timestamp(), 1_767_225_600);
    }

    #[tokio::test]
    async fn test_watch_folder_rejection_surfaces_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/files/missing/watch"))
            .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
            .mount(&server)
            .await;

        let client = DriveClient::new(server.uri());
        let err = client
            .watch_folder(
                "tok-1",
                "missing",
                "chan-1",
                "https://darkroom.example/hooks/drive",
                OffsetDateTime::now_utc(),
            )
            .await
            .unwrap_err();

        match err {
            DriveError::Rejected { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("File not found"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_channel() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/channels/stop"))
            .and(body_partial_json(serde_json::json!({
                "id": "chan-1",
                "resourceId": "res-xyz",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = DriveClient::new(server.uri());
        client
            .stop_channel("tok-1", "chan-1", "res-xyz")
            .await
            .unwrap();
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = DriveClient::new("https://drive.example/api/");
        assert_eq!(client.base_url, "https://drive.example/api");
    }
}
