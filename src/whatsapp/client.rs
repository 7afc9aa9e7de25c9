// src/whatsapp/client.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::WhatsAppConfig;
use crate::error::{IntakeError, IntakeResult};
use crate::telemetry::anon_id;

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// One-shot text message to `to`.
    async fn send_text(&self, to: &str, body: &str) -> IntakeResult<()>;
    /// Resolve a media id into a short-lived download URL.
    async fn media_url(&self, media_id: &str) -> IntakeResult<String>;
    async fn download_media(&self, url: &str) -> IntakeResult<Vec<u8>>;
    fn name(&self) -> &'static str;
}

/// WhatsApp Cloud API client (Graph API).
#[derive(Clone)]
pub struct GraphApiClient {
    client: Client,
    base: String,
    phone_number_id: String,
    access_token: String,
}

impl GraphApiClient {
    pub fn new(cfg: &WhatsAppConfig, timeout: Duration) -> IntakeResult<Self> {
        let client = Client::builder()
            .user_agent("nirvana-intake/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base: format!("{}/{}", cfg.graph_url, cfg.api_version),
            phone_number_id: cfg.phone_number_id.clone(),
            access_token: cfg.access_token.clone(),
        })
    }
}

#[derive(Serialize)]
struct TextPayload<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextContent<'a>,
}

#[derive(Serialize)]
struct TextContent<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct MediaInfo {
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl Messenger for GraphApiClient {
    async fn send_text(&self, to: &str, body: &str) -> IntakeResult<()> {
        let url = format!("{}/{}/messages", self.base, self.phone_number_id);
        let payload = TextPayload {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextContent { body },
        };
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| IntakeError::Reply(e.to_string()))?;

        let status = resp.status();
        tracing::debug!(target: "whatsapp", user = %anon_id(to), %status, "reply sent");
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IntakeError::Reply(format!("HTTP {status}: {text}")));
        }
        Ok(())
    }

    async fn media_url(&self, media_id: &str) -> IntakeResult<String> {
        let url = format!("{}/{}", self.base, media_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IntakeError::MediaLookup(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IntakeError::MediaLookup(format!("HTTP {status}: {text}")));
        }
        let info: MediaInfo = resp
            .json()
            .await
            .map_err(|e| IntakeError::MediaLookup(e.to_string()))?;
        info.url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| IntakeError::MediaLookup(format!("no url for media {media_id}")))
    }

    async fn download_media(&self, url: &str) -> IntakeResult<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| IntakeError::MediaDownload(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IntakeError::MediaDownload(format!("HTTP {status}")));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| IntakeError::MediaDownload(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "graph-api"
    }
}

/// Used when no WhatsApp credentials are configured: replies go to the log,
/// media can never be fetched.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send_text(&self, to: &str, body: &str) -> IntakeResult<()> {
        tracing::info!(target: "whatsapp", user = %anon_id(to), body, "reply (log only)");
        Ok(())
    }

    async fn media_url(&self, media_id: &str) -> IntakeResult<String> {
        Err(IntakeError::MediaLookup(format!(
            "messaging disabled, cannot resolve {media_id}"
        )))
    }

    async fn download_media(&self, _url: &str) -> IntakeResult<Vec<u8>> {
        Err(IntakeError::MediaDownload("messaging disabled".into()))
    }

    fn name(&self) -> &'static str {
        "log-only"
    }
}
