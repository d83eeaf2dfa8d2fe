//! HTTP transport to the generative-AI provider.

pub mod http;

pub use http::{HttpTransport, TransportError};
