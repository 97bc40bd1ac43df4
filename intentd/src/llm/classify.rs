//! Provider error classification
//!
//! The Gemini API surfaces failures as message text; recovery behavior is
//! chosen by matching substrings against that text. The pattern table is
//! data-driven so new provider error formats can be added without touching
//! the retry control flow.

use tracing::debug;

/// Classified failure kind for one provider attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Quota or request-volume limit hit for this key/model
    QuotaExceeded,
    /// Transient provider unavailability
    Overloaded,
    /// Generic retryable rate-limit signal
    RateLimited,
    /// Unclassified provider failure, not retried
    Other,
}

impl ErrorKind {
    /// Whether this failure lets the client fall through to the next model
    /// candidate instead of aborting the whole generation
    pub fn falls_through(self) -> bool {
        matches!(self, ErrorKind::QuotaExceeded | ErrorKind::Overloaded)
    }
}

/// Substring patterns checked in order; the first row with any match wins.
const PATTERNS: &[(&[&str], ErrorKind)] = &[
    (&["429", "quota"], ErrorKind::QuotaExceeded),
    (&["503", "overloaded"], ErrorKind::Overloaded),
    (&["retry"], ErrorKind::RateLimited),
];

/// Classify a provider error message into an [`ErrorKind`]
pub fn classify(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    for (needles, kind) in PATTERNS {
        if needles.iter().any(|needle| lowered.contains(needle)) {
            debug!(?kind, "classify: matched pattern");
            return *kind;
        }
    }
    debug!("classify: no pattern matched, treating as fatal");
    ErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_quota() {
        assert_eq!(classify("429 Too Many Requests"), ErrorKind::QuotaExceeded);
        assert_eq!(classify("Quota exceeded for metric"), ErrorKind::QuotaExceeded);
        assert_eq!(
            classify("You exceeded your current quota, please check your plan"),
            ErrorKind::QuotaExceeded
        );
    }

    #[test]
    fn test_classify_overloaded() {
        assert_eq!(classify("503 Service Unavailable"), ErrorKind::Overloaded);
        assert_eq!(classify("The model is overloaded. Please try again"), ErrorKind::Overloaded);
    }

    #[test]
    fn test_classify_rate_limited() {
        assert_eq!(classify("Resource exhausted, please retry in 20s"), ErrorKind::RateLimited);
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify("400 Invalid argument"), ErrorKind::Other);
        assert_eq!(classify("API key not valid"), ErrorKind::Other);
        assert_eq!(classify(""), ErrorKind::Other);
    }

    #[test]
    fn test_quota_wins_over_retry() {
        // A quota message that also suggests retrying classifies as quota
        assert_eq!(
            classify("Quota exceeded, retry after 60 seconds"),
            ErrorKind::QuotaExceeded
        );
    }

    #[test]
    fn test_falls_through() {
        assert!(ErrorKind::QuotaExceeded.falls_through());
        assert!(ErrorKind::Overloaded.falls_through());
        assert!(!ErrorKind::RateLimited.falls_through());
        assert!(!ErrorKind::Other.falls_through());
    }
}
