//! Streaming response pipeline.
//!
//! Only SSE framing lives here; provider semantics of each frame are interpreted by
//! the driver.

pub mod decode;

pub use decode::{collect_values, decode_sse, SseDecoder};
