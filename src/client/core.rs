use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::chat::StreamingChatSession;
use super::execution::{RequestOutcome, RetryingExecutor, StructuredPayload};
use crate::config::ClientConfig;
use crate::drivers::GenerativeBackend;
use crate::error_code::FailureKind;
use crate::resilience::QuotaCooldown;
use crate::types::{GenerateRequest, ImagePayload, Modality};

/// Fields a word lookup must contain to be considered complete.
pub const WORD_DETAIL_FIELDS: [&str; 3] = ["partOfSpeech", "meaning", "exampleSentence"];

pub(crate) const WORD_FEATURE: &str = "word details";
pub(crate) const IMAGE_FEATURE: &str = "image generation";

const WORD_SYSTEM_PROMPT: &str = "You are a concise dictionary assistant for language learners. \
Answer with a single JSON object and nothing else.";

const NO_CREDENTIAL_MESSAGE: &str = "No API key is configured for the AI service. \
Set GEMINI_API_KEY or store a key in the system keyring under 'lexi-ai'.";

/// How complete a [`WordDetails`] is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupQuality {
    #[default]
    Complete,
    /// The model did not answer with JSON; see `raw_text`.
    Unparsed,
    /// Required fields never arrived; only the term is reliable.
    Degraded,
}

/// Dictionary entry produced by [`LexiClient::word_details`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDetails {
    pub term: String,
    pub part_of_speech: Option<String>,
    pub meaning: Option<String>,
    pub example_sentence: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    pub pronunciation: Option<String>,
    #[serde(skip)]
    pub quality: LookupQuality,
    #[serde(skip)]
    pub raw_text: Option<String>,
}

impl WordDetails {
    /// Entry carrying only the looked-up term.
    pub fn fallback(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            quality: LookupQuality::Degraded,
            ..Default::default()
        }
    }

    /// Read fields leniently from model JSON; wrong types count as absent.
    pub fn from_value(term: &str, value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let synonyms = match value.get("synonyms") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        Self {
            term: term.to_string(),
            part_of_speech: text("partOfSpeech"),
            meaning: text("meaning"),
            example_sentence: text("exampleSentence"),
            synonyms,
            pronunciation: text("pronunciation"),
            quality: LookupQuality::Complete,
            raw_text: None,
        }
    }

    fn from_payload(term: &str, payload: StructuredPayload) -> Self {
        match payload {
            StructuredPayload::Complete(v) => Self::from_value(term, &v),
            StructuredPayload::Unparsed(raw) => Self {
                term: term.to_string(),
                quality: LookupQuality::Unparsed,
                raw_text: Some(raw),
                ..Default::default()
            },
            StructuredPayload::Degraded { .. } => Self::fallback(term),
        }
    }
}

/// Entry point for every AI call the application makes.
///
/// Word lookups and image generation go through one [`RetryingExecutor`]; chat sessions
/// share its notifier and cooldown.
pub struct LexiClient {
    pub(crate) config: ClientConfig,
    pub(crate) backend: Option<Arc<dyn GenerativeBackend>>,
    pub(crate) executor: RetryingExecutor,
}

impl LexiClient {
    pub fn builder() -> super::builder::LexiClientBuilder {
        super::builder::LexiClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cooldown(&self) -> &QuotaCooldown {
        self.executor.cooldown()
    }

    pub fn executor(&self) -> &RetryingExecutor {
        &self.executor
    }

    pub fn has_credential(&self) -> bool {
        self.backend.is_some()
    }

    fn word_request(&self, term: &str) -> GenerateRequest {
        let prompt = format!(
            "Describe the English word or phrase \"{}\". Return a JSON object with the keys \
\"partOfSpeech\", \"meaning\", \"exampleSentence\", \"synonyms\" (array of strings) and \
\"pronunciation\".",
            term
        );
        GenerateRequest::prompt(self.config.text_model.clone(), prompt)
            .system_instruction(WORD_SYSTEM_PROMPT)
            .json_output()
            .temperature(self.config.temperature)
    }

    /// Look up one term. Incomplete answers are retried, then degrade to
    /// [`WordDetails::fallback`].
    pub async fn word_details(&self, term: &str) -> RequestOutcome<WordDetails> {
        let term = term.trim();
        if term.is_empty() {
            return RequestOutcome::Failure(self.executor.reject(
                FailureKind::InvalidInput,
                "Enter a word before asking the AI for details.",
            ));
        }
        let Some(backend) = &self.backend else {
            return RequestOutcome::Failure(
                self.executor
                    .reject(FailureKind::NoCredential, NO_CREDENTIAL_MESSAGE),
            );
        };

        let request = self.word_request(term);
        info!(feature = WORD_FEATURE, term, "looking up word");
        self.executor
            .execute_json(
                || backend.generate(&request),
                &self.config.text_retry,
                WORD_FEATURE,
                &WORD_DETAIL_FIELDS,
                serde_json::json!({ "term": term }),
            )
            .await
            .map(|payload| WordDetails::from_payload(term, payload))
    }

    /// Generate one illustration. Success requires image bytes.
    pub async fn generate_image(&self, prompt: &str) -> RequestOutcome<ImagePayload> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return RequestOutcome::Failure(self.executor.reject(
                FailureKind::InvalidInput,
                "Describe the image before asking the AI to draw it.",
            ));
        }
        let Some(backend) = &self.backend else {
            return RequestOutcome::Failure(
                self.executor
                    .reject(FailureKind::NoCredential, NO_CREDENTIAL_MESSAGE),
            );
        };

        let request = GenerateRequest::prompt(self.config.image_model.clone(), prompt)
            .modalities(vec![Modality::Text, Modality::Image]);
        info!(feature = IMAGE_FEATURE, "generating image");
        self.executor
            .execute_image(
                || backend.generate(&request),
                &self.config.image_retry,
                IMAGE_FEATURE,
            )
            .await
    }

    /// New chat session sharing this client's notifier and cooldown.
    pub fn chat(&self) -> StreamingChatSession {
        StreamingChatSession::new(
            self.backend.clone(),
            self.config.chat_model.clone(),
            self.executor.cooldown().clone(),
            Arc::clone(self.executor.notifier()),
        )
        .with_temperature(self.config.temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_is_lenient() {
        let v = json!({
            "partOfSpeech": "noun",
            "meaning": "  a small domesticated carnivore ",
            "exampleSentence": 42,
            "synonyms": "kitty, puss",
        });
        let d = WordDetails::from_value("cat", &v);
        assert_eq!(d.part_of_speech.as_deref(), Some("noun"));
        assert_eq!(d.meaning.as_deref(), Some("a small domesticated carnivore"));
        assert_eq!(d.example_sentence, None);
        assert_eq!(d.synonyms, vec!["kitty", "puss"]);
    }

    #[test]
    fn test_serializes_camel_case_without_internal_fields() {
        let mut d = WordDetails::fallback("cat");
        d.part_of_speech = Some("noun".into());
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["term"], "cat");
        assert_eq!(v["partOfSpeech"], "noun");
        assert!(v.get("quality").is_none());
        assert!(v.get("synonyms").is_none());
    }

    #[test]
    fn test_unparsed_payload_keeps_raw_text() {
        let d = WordDetails::from_payload("cat", StructuredPayload::Unparsed("A cat is...".into()));
        assert_eq!(d.quality, LookupQuality::Unparsed);
        assert_eq!(d.raw_text.as_deref(), Some("A cat is..."));
    }
}
