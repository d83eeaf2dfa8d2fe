use crate::config::ClientConfig;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use keyring::Entry;
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Keyring service name used for stored provider keys.
pub const KEYRING_SERVICE: &str = "lexi-ai";

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Resolve the API key for `provider_id`.
    ///
    /// Order: explicit value, OS keyring, `{PROVIDER}_API_KEY` environment variable.
    /// Blank values are treated as absent.
    pub fn resolve_api_key(explicit: Option<&str>, provider_id: &str) -> Option<String> {
        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }

        // 1. Try Keyring
        if let Ok(entry) = Entry::new(KEYRING_SERVICE, provider_id) {
            if let Ok(key) = entry.get_password() {
                if !key.trim().is_empty() {
                    return Some(key);
                }
            }
        }

        // 2. Try Environment Variable (PROVIDER_API_KEY)
        let env_var = format!("{}_API_KEY", provider_id.to_uppercase());
        env::var(env_var).ok().filter(|k| !k.trim().is_empty())
    }

    fn endpoint(&self, model: &str, action: &str, sse: bool) -> Result<Url> {
        let raw = format!("{}/v1beta/models/{}:{}", self.base_url, model, action);
        let mut url = Url::parse(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint url: {}", e),
                ErrorContext::new()
                    .with_field_path("config.base_url")
                    .with_details(raw.clone())
                    .with_source("http_transport"),
            )
        })?;
        if sse {
            url.query_pairs_mut().append_pair("alt", "sse");
        }
        Ok(url)
    }

    async fn send(&self, url: Url, body: &serde_json::Value) -> Result<reqwest::Response> {
        debug!(url = %url, "sending provider request");
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let message = status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Remote {
            status: status.as_u16(),
            message,
            body,
        })
    }

    /// POST `model:action` and decode the JSON response.
    pub async fn post_json(
        &self,
        model: &str,
        action: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self.endpoint(model, action, false)?;
        let resp = self.send(url, body).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POST `model:action?alt=sse` and return the raw byte stream.
    pub async fn post_stream(
        &self,
        model: &str,
        action: &str,
        body: &serde_json::Value,
    ) -> Result<BoxStream<'static, Bytes>> {
        let url = self.endpoint(model, action, true)?;
        let resp = self.send(url, body).await?;

        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(Box::pin(byte_stream))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
