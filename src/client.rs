//! Resilient client layer.
//!
//! Keep the public surface small and predictable. Implementation details are split into
//! submodules under `src/client/`.

pub mod builder;
pub mod chat;
pub mod core;
pub mod error_classification;
pub mod execution;
pub mod policy;

pub use builder::LexiClientBuilder;
pub use chat::{ConversationHandle, StreamingChatSession};
pub use core::{LexiClient, LookupQuality, WordDetails, WORD_DETAIL_FIELDS};
pub use error_classification::{classify, ErrorClassification};
pub use execution::{
    Expectation, ImageExpectation, Inspection, JsonExpectation, RequestFailure, RequestOutcome,
    RetryingExecutor, StructuredPayload,
};
pub use policy::RetryPolicy;
