//! Classification of provider failures.
//!
//! The gateway only switches to the fallback provider when the primary
//! failed for a credential-shaped reason. Matching is a case-insensitive
//! substring test against the rendered error, which includes the HTTP
//! status of the failed call.

use crate::errors::ProviderError;

/// Broad reason a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Permission,
    Quota,
    Billing,
    Other,
}

impl ErrorCategory {
    /// Whether a failure of this kind should be retried on the fallback provider
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, ErrorCategory::Other)
    }
}

const AUTHENTICATION_TOKENS: &[&str] = &["api_key", "api-key", "invalid api", "invalid key", "401"];
const PERMISSION_TOKENS: &[&str] = &["403", "permission"];
const QUOTA_TOKENS: &[&str] = &["quota", "429"];
const BILLING_TOKENS: &[&str] = &["billing"];

/// Classifies a provider error message
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    let table = [
        (AUTHENTICATION_TOKENS, ErrorCategory::Authentication),
        (PERMISSION_TOKENS, ErrorCategory::Permission),
        (QUOTA_TOKENS, ErrorCategory::Quota),
        (BILLING_TOKENS, ErrorCategory::Billing),
    ];

    for (tokens, category) in table {
        if tokens.iter().any(|token| lower.contains(token)) {
            return category;
        }
    }
    ErrorCategory::Other
}

/// Classifies a provider error
pub fn classify(error: &ProviderError) -> ErrorCategory {
    classify_message(&error.to_string())
}
