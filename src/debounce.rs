//! Near-duplicate command suppression.
//!
//! Speech recognition engines often fire twice for one utterance, or emit a
//! near-miss transcription of a phrase they just delivered. A command that is
//! identical, contained in, or highly similar to the previous one inside a
//! short window is dropped without a response.

use crate::config::DebounceConfig;
use similar::TextDiff;
use std::time::Duration;

/// Duplicate-detection policy built from [`DebounceConfig`].
#[derive(Debug, Clone)]
pub struct DebouncePolicy {
    window: Duration,
    similarity_threshold: f32,
    length_slack: usize,
}

impl DebouncePolicy {
    #[must_use]
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            similarity_threshold: config.similarity_threshold,
            length_slack: config.length_slack,
        }
    }

    /// Window after a command within which near-duplicates are dropped.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `command` is a duplicate of `previous` received `elapsed` ago.
    #[must_use]
    pub fn is_duplicate(&self, command: &str, previous: &str, elapsed: Duration) -> bool {
        if previous.is_empty() || elapsed >= self.window {
            return false;
        }
        self.is_similar(command, previous)
    }

    /// Whether two commands read as the same utterance: exact match,
    /// substring containment, or a similarity ratio above the threshold for
    /// commands of comparable length.
    #[must_use]
    pub fn is_similar(&self, a: &str, b: &str) -> bool {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();

        if a == b {
            return true;
        }
        if a.contains(&b) || b.contains(&a) {
            return true;
        }
        if a.len().abs_diff(b.len()) < self.length_slack {
            let ratio = TextDiff::from_chars(a.as_str(), b.as_str()).ratio();
            return ratio > self.similarity_threshold;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn policy() -> DebouncePolicy {
        DebouncePolicy::new(&DebounceConfig::default())
    }

    #[test]
    fn identical_within_window_is_duplicate() {
        let p = policy();
        assert!(p.is_duplicate("show me projects", "show me projects", Duration::from_millis(200)));
    }

    #[test]
    fn identical_outside_window_is_not() {
        let p = policy();
        assert!(!p.is_duplicate(
            "show me projects",
            "show me projects",
            Duration::from_millis(1500)
        ));
    }

    #[test]
    fn no_previous_command_is_never_duplicate() {
        let p = policy();
        assert!(!p.is_duplicate("anything", "", Duration::ZERO));
    }

    #[test]
    fn containment_is_duplicate() {
        let p = policy();
        assert!(p.is_similar("projects", "show me projects"));
        assert!(p.is_similar("show me projects", "projects"));
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        let p = policy();
        assert!(p.is_similar("  Show Me Projects ", "show me projects"));
    }

    #[test]
    fn near_miss_transcription_is_duplicate() {
        let p = policy();
        // One character off, same length: ratio well above 0.7.
        assert!(p.is_similar("tell me about skills", "tell me about skillz"));
    }

    #[test]
    fn different_commands_are_not_similar() {
        let p = policy();
        assert!(!p.is_similar("who are you", "show projects"));
    }

    #[test]
    fn ratio_check_requires_comparable_length() {
        let p = policy();
        // Lengths differ by more than the slack and neither contains the
        // other, so the ratio check never runs.
        assert!(!p.is_similar("hi", "tell me everything about the portfolio"));
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = DebouncePolicy::new(&DebounceConfig {
            similarity_threshold: 0.99,
            ..DebounceConfig::default()
        });
        assert!(!strict.is_similar("tell me about skills", "tell me about skilz"));
    }
}
