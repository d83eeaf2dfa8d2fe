//! Resilience primitives shared by every provider call.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`cooldown`] | Process-wide quota-exhaustion cooldown with timed auto-reset |
//! | [`sleep`] | Injectable backoff delay (real or recorded) |
//!
//! ## Quota Cooldown
//!
//! - **Inactive**: calls go to the provider
//! - **Active**: every executor call short-circuits without contacting the provider
//!
//! The only way back to inactive is the timer scheduled by the activating call.
//!
//! ```rust
//! use lexi_ai::resilience::cooldown::QuotaCooldown;
//! use lexi_ai::notify::noop_notifier;
//! use std::time::Duration;
//!
//! let cooldown = QuotaCooldown::new(Duration::from_secs(900));
//! assert!(!cooldown.is_active());
//! cooldown.activate(noop_notifier(), Some("word lookup"));
//! assert!(cooldown.is_active());
//! ```

pub mod cooldown;
pub mod sleep;

pub use cooldown::{CooldownSnapshot, QuotaCooldown};
pub use sleep::{RecordingSleeper, Sleeper, TokioSleeper};
