use std::sync::Arc;

use tracing::{debug, warn};

use super::core::LexiClient;
use super::execution::RetryingExecutor;
use crate::config::{ClientConfig, DEFAULT_COOLDOWN_SECS};
use crate::drivers::{GeminiBackend, GenerativeBackend};
use crate::notify::Notifier;
use crate::resilience::{QuotaCooldown, Sleeper, TokioSleeper};
use crate::telemetry::TracingNotifier;
use crate::transport::HttpTransport;
use crate::Result;

/// Builder for [`LexiClient`].
///
/// Keep this surface area small and predictable.
pub struct LexiClientBuilder {
    config: Option<ClientConfig>,
    api_key: Option<String>,
    ambient_credentials: bool,
    notifier: Option<Arc<dyn Notifier>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    cooldown: Option<QuotaCooldown>,
    backend: Option<Arc<dyn GenerativeBackend>>,
    /// Override base URL (primarily for testing with mock servers)
    base_url_override: Option<String>,
}

impl LexiClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            ambient_credentials: true,
            notifier: None,
            sleeper: None,
            cooldown: None,
            backend: None,
            base_url_override: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Explicit API key; takes precedence over keyring and environment.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Whether to look for a key in the OS keyring and environment when none was given.
    /// Enabled by default.
    pub fn ambient_credentials(mut self, enable: bool) -> Self {
        self.ambient_credentials = enable;
        self
    }

    /// Notification sink. Default routes notifications to `tracing`.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Backoff delay implementation. Default is a real tokio timer.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Cooldown shared with other clients. Default is the process-wide instance when
    /// `cooldown_secs` is the default, otherwise a private one.
    pub fn cooldown(mut self, cooldown: QuotaCooldown) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Use this backend instead of Gemini over HTTP. Credential lookup is skipped.
    pub fn backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the provider base URL.
    pub fn base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Build the client.
    ///
    /// A missing credential is not an error here: the client is built without a backend
    /// and every call reports `NoCredential` without contacting the provider.
    pub fn build(self) -> Result<LexiClient> {
        let mut config = self.config.unwrap_or_default();
        if let Some(url) = self.base_url_override {
            config.base_url = url;
        }
        config.validate()?;

        let backend = match self.backend {
            Some(b) => Some(b),
            None => {
                let key = if self.ambient_credentials {
                    HttpTransport::resolve_api_key(self.api_key.as_deref(), &config.provider_id)
                } else {
                    self.api_key.filter(|k| !k.trim().is_empty())
                };
                match key {
                    Some(key) => {
                        let backend: Arc<dyn GenerativeBackend> =
                            Arc::new(GeminiBackend::new(&config, key)?);
                        Some(backend)
                    }
                    None => {
                        warn!(provider = config.provider_id.as_str(), "no API key resolved");
                        None
                    }
                }
            }
        };

        let cooldown = self.cooldown.unwrap_or_else(|| {
            if config.cooldown_secs == DEFAULT_COOLDOWN_SECS {
                QuotaCooldown::global()
            } else {
                QuotaCooldown::new(config.cooldown())
            }
        });
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(TracingNotifier) as Arc<dyn Notifier>);
        let sleeper = self
            .sleeper
            .unwrap_or_else(|| Arc::new(TokioSleeper) as Arc<dyn Sleeper>);

        debug!(
            text_model = config.text_model.as_str(),
            image_model = config.image_model.as_str(),
            cooldown_secs = cooldown.duration().as_secs(),
            has_backend = backend.is_some(),
            "client built"
        );

        Ok(LexiClient {
            executor: RetryingExecutor::new(cooldown, notifier, sleeper),
            backend,
            config,
        })
    }
}

impl Default for LexiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_credential() {
        let client = LexiClientBuilder::new()
            .ambient_credentials(false)
            .build()
            .unwrap();
        assert!(!client.has_credential());
    }

    #[test]
    fn test_explicit_key_and_override() {
        let client = LexiClientBuilder::new()
            .api_key("k")
            .ambient_credentials(false)
            .base_url_override("http://127.0.0.1:9")
            .build()
            .unwrap();
        assert!(client.has_credential());
        assert_eq!(client.config().base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn test_non_default_cooldown_is_private() {
        let config = ClientConfig {
            cooldown_secs: 5,
            ..Default::default()
        };
        let client = LexiClientBuilder::new()
            .config(config)
            .ambient_credentials(false)
            .build()
            .unwrap();
        assert_eq!(client.cooldown().duration().as_secs(), 5);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig {
            cooldown_secs: 0,
            ..Default::default()
        };
        assert!(LexiClientBuilder::new().config(config).build().is_err());
    }
}
