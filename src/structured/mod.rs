//! Structured output handling.
//!
//! Decodes model text into loosely-typed JSON and reports which required fields
//! are missing.
//!
//! # Examples
//!
//! ```
//! use lexi_ai::structured::{extract, missing_fields};
//!
//! let raw = "```json\n{\"meaning\": \"hello\", \"partOfSpeech\": \"interjection\"}\n```";
//! let parsed = extract(raw).unwrap();
//! assert_eq!(parsed["meaning"], "hello");
//! assert_eq!(
//!     missing_fields(&parsed, &["meaning", "exampleSentence"]),
//!     vec!["exampleSentence".to_string()]
//! );
//! ```

pub mod extract;

pub use extract::{extract, missing_fields, strip_fence};
