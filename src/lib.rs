//! # lexi-ai
//!
//! Resilient generative-AI client layer for a vocabulary application: structured word
//! lookups, image generation and streaming chat against Google Gemini.
//!
//! ## Overview
//!
//! Every non-streaming call runs through one retry/backoff executor that classifies
//! failures, stops on quota exhaustion and enters a shared cooldown, and validates the
//! shape of successful responses. Callers never see raw provider errors: they get a
//! [`client::RequestOutcome`] and user-facing notifications through a [`notify::Notifier`].
//!
//! ## Key Features
//!
//! - **Error classification**: quota exhaustion vs. rate limiting vs. transient failures
//! - **Quota cooldown**: process-wide pause with a timed auto-reset
//! - **Structured output**: fenced-block stripping and required-field checks
//! - **Streaming chat**: forward-only text deltas per message
//! - **Bulk lookup**: chunked, rate-shaped word lookups
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lexi_ai::client::{LexiClient, RequestOutcome};
//!
//! #[tokio::main]
//! async fn main() -> lexi_ai::Result<()> {
//!     let client = LexiClient::builder().build()?;
//!     match client.word_details("serendipity").await {
//!         RequestOutcome::Success(details) => println!("{:?}", details.meaning),
//!         RequestOutcome::Failure(f) => eprintln!("{}", f),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Facade, retrying executor, classifier and chat session |
//! | [`resilience`] | Quota cooldown and injectable backoff delay |
//! | [`structured`] | JSON extraction from model text |
//! | [`drivers`] | Provider backends (Gemini) |
//! | [`transport`] | HTTP transport and credential lookup |
//! | [`pipeline`] | SSE decoding |
//! | [`types`] | Requests, responses and messages |
//! | [`batch`] | Bulk word lookup |
//! | [`config`] | YAML and environment configuration |
//! | [`telemetry`] | Notification sinks |

pub mod batch;
pub mod client;
pub mod config;
pub mod drivers;
pub mod error_code;
pub mod notify;
pub mod pipeline;
pub mod resilience;
pub mod structured;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{
    LexiClient, LexiClientBuilder, RequestFailure, RequestOutcome, RetryPolicy,
    StreamingChatSession, WordDetails,
};
pub use config::ClientConfig;
pub use error_code::FailureKind;
pub use notify::{Notifier, Severity};
pub use types::{
    message::{Message, MessageRole},
    request::{GenerateRequest, GenerateResponse, ImagePayload},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
