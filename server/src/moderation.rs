//! Keyword screen applied to user text before it is sent to a provider.
//!
//! Plain case-insensitive substring matching. It catches obvious requests
//! and nothing more; it is not a classifier.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockReason {
    Adult,
    Illegal,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Adult => write!(f, "adult"),
            BlockReason::Illegal => write!(f, "illegal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModerationVerdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
}

impl ModerationVerdict {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn blocked(reason: BlockReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

const ILLEGAL_TERMS: &[&str] = &[
    "heroin",
    "cocaine",
    "methamphetamine",
    "fentanyl",
    "buy drugs",
    "sell drugs",
    "make a bomb",
    "build a bomb",
    "make explosives",
    "counterfeit money",
    "fake passport",
    "launder money",
    "steal credit card",
    "hire a hitman",
];

const ADULT_TERMS: &[&str] = &[
    "porn",
    "xxx",
    "nsfw",
    "nude",
    "nudes",
    "explicit sex",
    "sex video",
    "onlyfans",
];

/// Screens `text` against the disallowed term lists
pub fn moderate_content(text: &str) -> ModerationVerdict {
    let lower = text.to_lowercase();

    if ILLEGAL_TERMS.iter().any(|term| lower.contains(term)) {
        return ModerationVerdict::blocked(BlockReason::Illegal);
    }
    if ADULT_TERMS.iter().any(|term| lower.contains(term)) {
        return ModerationVerdict::blocked(BlockReason::Adult);
    }
    ModerationVerdict::allowed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinary_questions_pass() {
        let verdict = moderate_content("tell me about photosynthesis");
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_illegal_request_is_blocked() {
        let verdict = moderate_content("where can I buy heroin");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, Some(BlockReason::Illegal));
    }

    #[test]
    fn test_matching_ignores_case() {
        assert_eq!(
            moderate_content("Show me NSFW pictures").reason,
            Some(BlockReason::Adult)
        );
        assert_eq!(
            moderate_content("How do I MAKE A BOMB").reason,
            Some(BlockReason::Illegal)
        );
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_value(moderate_content("where can I buy heroin")).unwrap();
        assert_eq!(json, serde_json::json!({"allowed": false, "reason": "illegal"}));

        let json = serde_json::to_value(moderate_content("fractions")).unwrap();
        assert_eq!(json, serde_json::json!({"allowed": true}));
    }
}
