//! Outbound automation webhooks. The shared secret rides in `X-API-Key`
//! and never leaves the proxy.

use axum::http::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::debug;

use crate::config::WebhookConfig;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Raw webhook answer; callers decide how to interpret the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status to hand back to our own caller for a failed webhook call.
    /// A webhook 404 means a missing workflow, not a missing resource of
    /// the caller's, so it becomes a 502.
    pub fn relay_status(&self) -> StatusCode {
        match StatusCode::from_u16(self.status) {
            Ok(StatusCode::NOT_FOUND) | Err(_) => StatusCode::BAD_GATEWAY,
            Ok(status) => status,
        }
    }
}

pub struct WebhookClient {
    name: &'static str,
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookClient {
    pub fn new(name: &'static str, client: reqwest::Client, config: WebhookConfig) -> Self {
        Self {
            name,
            client,
            config,
        }
    }

    pub async fn forward<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<WebhookResponse, reqwest::Error> {
        let resp = self
            .client
            .post(&self.config.url)
            .header(API_KEY_HEADER, self.config.secret.expose_secret())
            .json(payload)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(webhook = self.name, status, bytes = body.len(), "Webhook answered");
        Ok(WebhookResponse { status, body })
    }
}
