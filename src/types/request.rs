//! Provider-neutral request and response shapes.

use super::message::Message;
use serde::{Deserialize, Serialize};

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

/// One provider call: model, prompt payload and response-shaping options.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system_instruction: Option<String>,
    /// e.g. `application/json` for structured output
    pub response_mime_type: Option<String>,
    pub temperature: Option<f32>,
    pub response_modalities: Vec<Modality>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system_instruction: None,
            response_mime_type: None,
            temperature: None,
            response_modalities: Vec::new(),
        }
    }

    /// Single user prompt.
    pub fn prompt(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(model, vec![Message::user(text)])
    }

    pub fn system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(text.into());
        self
    }

    pub fn json_output(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn modalities(mut self, m: Vec<Modality>) -> Self {
        self.response_modalities = m;
        self
    }
}

/// Binary image result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Resolved value of one provider call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    /// Concatenated text parts, if any.
    pub text: Option<String>,
    /// First inline image, if any.
    pub image: Option<ImagePayload>,
    pub finish_reason: Option<String>,
}

impl GenerateResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_image(image: ImagePayload) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let req = GenerateRequest::prompt("m", "define 'cat'")
            .json_output()
            .temperature(0.2)
            .modalities(vec![Modality::Text]);
        assert_eq!(req.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(serde_json::to_value(Modality::Image).unwrap(), "IMAGE");
    }

    #[test]
    fn test_text_or_empty() {
        assert_eq!(GenerateResponse::default().text_or_empty(), "");
        assert_eq!(GenerateResponse::from_text("x").text_or_empty(), "x");
    }
}
