//! Bulk lookup: many word-detail calls shaped into rate-friendly chunks.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BulkConfig`] | Chunk size and inter-chunk delay |
//! | [`BulkLookup`] | Runs `word_details` over a list of terms |
//! | [`BulkResult`] | Complete, degraded and failed lookups by input index |
//!
//! All lookups share the client's cooldown, so a quota error in one chunk stops every
//! later term before it reaches the provider.
//!
//! ## Example
//!
//! ```rust
//! use lexi_ai::batch::BulkConfig;
//! use std::time::Duration;
//!
//! let config = BulkConfig::new()
//!     .with_chunk_size(3)
//!     .with_inter_batch_delay(Duration::from_secs(1));
//! assert_eq!(config.inter_batch_delay_ms, 1000);
//! ```

mod executor;

pub use executor::{BulkConfig, BulkLookup, BulkResult};
