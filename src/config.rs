//! Client configuration
//!
//! Loaded from YAML (every field optional) and then overridden from `LEXI_AI_*`
//! environment variables.

use crate::batch::BulkConfig;
use crate::client::policy::RetryPolicy;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_COOLDOWN_SECS: u64 = 15 * 60;
pub const DEFAULT_PROVIDER_ID: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub provider_id: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub cooldown_secs: u64,
    pub request_timeout_secs: u64,
    pub text_retry: RetryPolicy,
    pub image_retry: RetryPolicy,
    pub bulk: BulkConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.0-flash-preview-image-generation".to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            request_timeout_secs: 30,
            text_retry: RetryPolicy::text_generation(),
            image_retry: RetryPolicy::image_generation(),
            bulk: BulkConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to parse config: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_details(path.display().to_string()),
            },
            other => other,
        })
    }

    /// Apply `LEXI_AI_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|k| std::env::var(k).ok())
    }

    /// Apply overrides using an arbitrary lookup (tests pass a map).
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("LEXI_AI_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("LEXI_AI_TEXT_MODEL") {
            self.text_model = v;
        }
        if let Some(v) = lookup("LEXI_AI_IMAGE_MODEL") {
            self.image_model = v;
        }
        if let Some(v) = lookup("LEXI_AI_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = lookup("LEXI_AI_COOLDOWN_SECS") {
            self.cooldown_secs = parse_env_u64("LEXI_AI_COOLDOWN_SECS", &v)?;
        }
        if let Some(v) = lookup("LEXI_AI_HTTP_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env_u64("LEXI_AI_HTTP_TIMEOUT_SECS", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cooldown_secs == 0 {
            return Err(invalid("cooldown_secs", "cooldown must be at least one second"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "timeout must be at least one second"));
        }
        if self.bulk.chunk_size == 0 {
            return Err(invalid("bulk.chunk_size", "chunk size must be positive"));
        }
        self.text_retry.validate("text_retry")?;
        self.image_retry.validate("image_retry")?;
        Ok(())
    }
}

fn invalid(field: &str, msg: &str) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(format!("config.{}", field))
            .with_source("config_loader"),
    )
}

fn parse_env_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration_with_context(
            format!("{} must be an unsigned integer", key),
            ErrorContext::new()
                .with_details(raw.to_string())
                .with_source("config_env"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_call_sites() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.cooldown(), Duration::from_secs(900));
        assert_eq!(cfg.text_retry, RetryPolicy::text_generation());
        assert_eq!(cfg.image_retry, RetryPolicy::image_generation());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = ClientConfig::from_yaml_str(
            "text_model: gemini-test\ntext_retry:\n  max_retries: 5\n  initial_delay_ms: 100\n",
        )
        .unwrap();
        assert_eq!(cfg.text_model, "gemini-test");
        assert_eq!(cfg.text_retry.max_retries, 5);
        assert_eq!(cfg.text_retry.backoff_multiplier, 2.0);
        assert_eq!(cfg.image_model, ClientConfig::default().image_model);
    }

    #[test]
    fn test_zero_cooldown_rejected() {
        let err = ClientConfig::from_yaml_str("cooldown_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("config.cooldown_secs"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEXI_AI_CHAT_MODEL", "chat-x"),
            ("LEXI_AI_COOLDOWN_SECS", "60"),
        ]
        .into_iter()
        .collect();
        let cfg = ClientConfig::default()
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.chat_model, "chat-x");
        assert_eq!(cfg.cooldown_secs, 60);
    }

    #[test]
    fn test_env_override_must_be_numeric() {
        let err = ClientConfig::default()
            .apply_env_from(|k| (k == "LEXI_AI_HTTP_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
