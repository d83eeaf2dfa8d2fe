//! Google Gemini generateContent API driver. Key differences from chat-completions APIs:
//! - Uses `contents` instead of `messages`, with `parts` instead of `content`.
//! - Roles: `user` and `model`. System prompt goes to `system_instruction`.
//! - `generationConfig` wraps temperature, `responseMimeType` and `responseModalities`.
//! - Response: `candidates[0].content.parts[*]` holding `text` or `inlineData`.
//! - Streaming (`alt=sse`) sends one full response object per SSE frame.
//! - Errors: `{"error": {"code", "message", "status"}}`, possibly mid-stream.

use async_trait::async_trait;
use base64::Engine as _;
use futures::StreamExt;
use serde_json::Value;

use super::GenerativeBackend;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::pipeline::decode_sse;
use crate::transport::HttpTransport;
use crate::types::{GenerateRequest, GenerateResponse, ImagePayload};
use crate::{BoxStream, ErrorContext, Result};

/// Pure request/response translation for the Gemini wire format.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiDriver;

/// What one stream frame carried.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Delta(String),
    Finished(String),
    Error(Value),
    Empty,
}

impl GeminiDriver {
    pub fn build_body(&self, request: &GenerateRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "parts": [{ "text": m.text }],
                })
            })
            .collect();

        let mut body = serde_json::json!({ "contents": contents });

        if let Some(sys) = &request.system_instruction {
            body["system_instruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }

        let mut gen_config = serde_json::Map::new();
        if let Some(t) = request.temperature {
            gen_config.insert("temperature".into(), serde_json::json!(t));
        }
        if let Some(mime) = &request.response_mime_type {
            gen_config.insert("responseMimeType".into(), serde_json::json!(mime));
        }
        if !request.response_modalities.is_empty() {
            gen_config.insert(
                "responseModalities".into(),
                serde_json::json!(request.response_modalities),
            );
        }
        if !gen_config.is_empty() {
            body["generationConfig"] = Value::Object(gen_config);
        }
        body
    }

    pub fn parse_response(&self, body: &Value) -> Result<GenerateResponse> {
        // A 200 can still carry an error object.
        if let Some(err) = body.get("error") {
            return Err(remote_from_error_value(err, body));
        }

        let parts = body
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array);

        let mut text: Option<String> = None;
        let mut image: Option<ImagePayload> = None;
        for part in parts.into_iter().flatten() {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.get_or_insert_with(String::new).push_str(t);
            } else if image.is_none() {
                if let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) {
                    image = Some(decode_inline(inline)?);
                }
            }
        }

        let finish_reason = body
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            .map(normalize_finish_reason);

        Ok(GenerateResponse {
            text,
            image,
            finish_reason,
        })
    }

    pub fn parse_stream_frame(&self, frame: &Value) -> StreamFrame {
        if let Some(err) = frame.get("error") {
            return StreamFrame::Error(err.clone());
        }

        let delta: String = frame
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        if !delta.is_empty() {
            return StreamFrame::Delta(delta);
        }

        match frame
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
        {
            Some(reason) => StreamFrame::Finished(normalize_finish_reason(reason)),
            None => StreamFrame::Empty,
        }
    }
}

fn normalize_finish_reason(r: &str) -> String {
    match r {
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" => "content_filter".to_string(),
        other => other.to_lowercase(),
    }
}

fn decode_inline(inline: &Value) -> Result<ImagePayload> {
    let mime_type = inline
        .get("mimeType")
        .or_else(|| inline.get("mime_type"))
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = inline.get("data").and_then(Value::as_str).unwrap_or("");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| {
            Error::validation_with_context(
                format!("inline image is not valid base64: {}", e),
                ErrorContext::new()
                    .with_field_path("candidates[0].content.parts[].inlineData.data")
                    .with_source("gemini_driver"),
            )
        })?;
    Ok(ImagePayload { mime_type, bytes })
}

/// Wrap an in-band `error` object so the classifier sees the provider's own shape.
fn remote_from_error_value(err: &Value, whole: &Value) -> Error {
    let status = err
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(500);
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("provider error")
        .to_string();
    Error::Remote {
        status,
        message,
        body: whole.to_string(),
    }
}

/// Gemini over HTTP.
pub struct GeminiBackend {
    provider_id: String,
    transport: HttpTransport,
    driver: GeminiDriver,
}

impl GeminiBackend {
    pub fn new(config: &ClientConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            provider_id: config.provider_id.clone(),
            transport: HttpTransport::new(config, api_key)?,
            driver: GeminiDriver,
        })
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let body = self.driver.build_body(request);
        let json = self
            .transport
            .post_json(&request.model, "generateContent", &body)
            .await?;
        self.driver.parse_response(&json)
    }

    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        let body = self.driver.build_body(request);
        let bytes = self
            .transport
            .post_stream(&request.model, "streamGenerateContent", &body)
            .await?;
        let driver = self.driver;

        // Text deltas only; the first error frame is surfaced and ends the stream.
        let deltas = decode_sse(bytes)
            .filter_map(move |item| {
                let mapped = match item {
                    Err(e) => Some(Err(e)),
                    Ok(frame) => match driver.parse_stream_frame(&frame) {
                        StreamFrame::Delta(text) => Some(Ok(text)),
                        StreamFrame::Error(err) => Some(Err(remote_from_error_value(&err, &frame))),
                        StreamFrame::Finished(_) | StreamFrame::Empty => None,
                    },
                };
                futures::future::ready(mapped)
            })
            .scan(false, |failed, item: Result<String>| {
                if *failed {
                    return futures::future::ready(None);
                }
                *failed = item.is_err();
                futures::future::ready(Some(item))
            });
        Ok(Box::pin(deltas))
    }
}
