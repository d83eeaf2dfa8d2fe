//! Provider backend abstraction.
//!
//! The executor and chat session only see [`GenerativeBackend`]; the Gemini
//! implementation lives in [`gemini`]. Tests substitute scripted backends.

pub mod gemini;

use async_trait::async_trait;

use crate::types::{GenerateRequest, GenerateResponse};
use crate::{BoxStream, Result};

pub use gemini::{GeminiBackend, GeminiDriver};

/// One remote generative-AI service.
///
/// Implementations surface provider failures as [`crate::Error::Remote`] (or transport
/// errors) without interpreting them; classification happens in the client layer.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Provider identifier, used for credential lookup and logs.
    fn provider_id(&self) -> &str;

    /// Non-streaming generation (text, JSON or image).
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Streaming text generation. Each item is one text delta; an `Err` item ends the stream.
    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>>;
}
