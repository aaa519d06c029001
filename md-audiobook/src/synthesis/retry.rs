//! Bounded retry with linear backoff.

use std::time::Duration;
use tts_client::TtsError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Decides whether an error is worth another attempt.
pub type ErrorClassifier = fn(&TtsError) -> bool;

/// How many times a chunk is tried and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait after attempt `n` is `backoff_base * n`
    pub backoff_base: Duration,
    classify: ErrorClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF)
    }
}

impl RetryPolicy {
    /// A zero attempt count is treated as one.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            classify: TtsError::is_transient,
        }
    }

    /// Replace the transient/permanent classification.
    pub fn with_classifier(mut self, classify: ErrorClassifier) -> Self {
        self.classify = classify;
        self
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    pub fn is_transient(&self, error: &TtsError) -> bool {
        (self.classify)(error)
    }

    /// Whether a failure on `attempt` should be followed by another try.
    pub fn should_retry(&self, attempt: u32, error: &TtsError) -> bool {
        attempt < self.max_attempts && self.is_transient(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.backoff_base, Duration::from_secs(2));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
    }

    #[test]
    fn test_should_retry_stops_at_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let err = TtsError::Network("reset".into());
        assert!(policy.should_retry(1, &err));
        assert!(policy.should_retry(2, &err));
        assert!(!policy.should_retry(3, &err));
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, &TtsError::EmptyAudio));
        assert!(!policy.should_retry(1, &TtsError::InvalidInput("bad".into())));
    }

    #[test]
    fn test_custom_classifier() {
        let policy = RetryPolicy::default().with_classifier(|_| true);
        assert!(policy.should_retry(1, &TtsError::EmptyAudio));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
