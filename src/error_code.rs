//! Failure taxonomy reported by the executor.
//!
//! Every unsuccessful [`RequestOutcome`](crate::client::RequestOutcome) carries one
//! [`FailureKind`]. Callers branch on the kind, never on provider error shapes.
//!
//! | Code  | Kind                   | Retried by executor |
//! |-------|------------------------|---------------------|
//! | E1001 | `NoCredential`         | no                  |
//! | E2001 | `RateLimited`          | yes                 |
//! | E2002 | `QuotaExhausted`       | no, enters cooldown |
//! | E2003 | `CooldownActive`       | no                  |
//! | E3001 | `TransientOrUnknown`   | yes                 |
//! | E4001 | `ValidationIncomplete` | yes, then degrades  |
//! | E4002 | `MissingPayload`       | yes                 |
//! | E4003 | `InvalidInput`         | no                  |
//!
//! ```rust
//! use lexi_ai::error_code::FailureKind;
//!
//! let kind = FailureKind::RateLimited;
//! assert_eq!(kind.code(), "E2001");
//! assert!(kind.retryable());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::error_classification::ErrorClassification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No API key could be resolved; checked before any attempt.
    NoCredential,
    /// Transient "too many requests".
    RateLimited,
    /// Account-level quota reached; the cooldown was activated.
    QuotaExhausted,
    /// The cooldown was already active, so no provider call was made.
    CooldownActive,
    /// Network hiccups, 5xx, malformed responses and anything unclassified.
    TransientOrUnknown,
    /// The call succeeded but required fields were missing.
    ValidationIncomplete,
    /// The call succeeded but carried no binary payload.
    MissingPayload,
    /// The caller's input was unusable (e.g. an empty term); no call was made.
    InvalidInput,
}

impl FailureKind {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCredential => "E1001",
            Self::RateLimited => "E2001",
            Self::QuotaExhausted => "E2002",
            Self::CooldownActive => "E2003",
            Self::TransientOrUnknown => "E3001",
            Self::ValidationIncomplete => "E4001",
            Self::MissingPayload => "E4002",
            Self::InvalidInput => "E4003",
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::CooldownActive => "cooldown_active",
            Self::TransientOrUnknown => "transient_or_unknown",
            Self::ValidationIncomplete => "validation_incomplete",
            Self::MissingPayload => "missing_payload",
            Self::InvalidInput => "invalid_input",
        }
    }

    /// Whether the executor spends further attempts on this kind.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::TransientOrUnknown
                | Self::ValidationIncomplete
                | Self::MissingPayload
        )
    }

    /// Maps a classified provider failure to its kind.
    pub fn from_classification(c: &ErrorClassification) -> Self {
        if c.is_quota_exhausted {
            Self::QuotaExhausted
        } else if c.is_rate_limit_retryable {
            Self::RateLimited
        } else {
            Self::TransientOrUnknown
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}
