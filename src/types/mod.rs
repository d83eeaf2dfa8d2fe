//! Core data types exchanged with the provider.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Conversation turn with role and text |
//! | [`GenerateRequest`] | Model id, prompt payload and response-shaping options |
//! | [`GenerateResponse`] | Text and/or binary image returned by one call |
//! | [`ImagePayload`] | Decoded image bytes with MIME type |
//!
//! ## Example
//!
//! ```rust
//! use lexi_ai::types::{GenerateRequest, Modality};
//!
//! let req = GenerateRequest::prompt("gemini-2.5-flash", "Describe the word 'serendipity'")
//!     .json_output()
//!     .temperature(0.3);
//! assert!(req.response_modalities.is_empty());
//! let image = GenerateRequest::prompt("image-model", "a cat").modalities(vec![Modality::Image]);
//! assert_eq!(image.response_modalities, vec![Modality::Image]);
//! ```

pub mod message;
pub mod request;

pub use message::{Message, MessageRole};
pub use request::{GenerateRequest, GenerateResponse, ImagePayload, Modality};
