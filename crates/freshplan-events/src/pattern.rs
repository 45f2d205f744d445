//! Topic pattern matching
//!
//! Subscription keys that contain `*` or `?` are wildcard patterns:
//! - `*` matches any sequence of characters, including none
//! - `?` matches exactly one character
//!
//! Every other character is literal, so `calc.v(2)*` only treats the `*`
//! specially. Matching is case-sensitive and covers the whole topic.
//!
//! Examples:
//! - `customer:*` matches `customer:saved`, `customer:cleared`
//! - `*` matches every topic
//! - `tab:?` matches `tab:1` but not `tab:10`

use crate::error::{EventBusError, EventBusResult};
use regex::Regex;

/// Check whether a subscription key is a wildcard pattern.
pub fn is_wildcard(key: &str) -> bool {
    key.contains(['*', '?'])
}

/// A compiled subscription key.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    source: String,
    regex: Option<Regex>,
}

impl TopicPattern {
    /// Compile a subscription key.
    ///
    /// Keys without wildcards compile to plain string equality.
    pub fn compile(pattern: &str) -> EventBusResult<Self> {
        if pattern.is_empty() {
            return Err(EventBusError::InvalidPattern {
                pattern: String::new(),
                reason: "topic must not be empty".to_string(),
            });
        }

        let regex = if is_wildcard(pattern) {
            let regex = Regex::new(&Self::regex_source(pattern)).map_err(|e| {
                EventBusError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                }
            })?;
            Some(regex)
        } else {
            None
        };

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check if a concrete topic matches this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(topic),
            None => self.source == topic,
        }
    }

    /// The key this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether this pattern contains wildcards.
    pub fn is_wildcard(&self) -> bool {
        self.regex.is_some()
    }

    fn regex_source(pattern: &str) -> String {
        // (?s) lets `?` and `*` cross newlines too
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push_str("(?s)^");
        let mut buf = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                c => source.push_str(&regex::escape(c.encode_utf8(&mut buf))),
            }
        }
        source.push('$');
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, topic: &str) -> bool {
        TopicPattern::compile(pattern).unwrap().matches(topic)
    }

    #[test]
    fn test_exact_match() {
        assert!(matches("calculator:updated", "calculator:updated"));
        assert!(!matches("calculator:updated", "calculator:update"));
        assert!(!matches("calculator:updated", "Calculator:updated"));
        assert!(!TopicPattern::compile("a:b").unwrap().is_wildcard());
    }

    #[test]
    fn test_star_wildcard() {
        assert!(matches("*", "anything:at:all"));
        assert!(matches("*", ""));
        assert!(matches("test:*", "test:one"));
        assert!(matches("test:*", "test:"));
        assert!(matches("*:saved", "customer:saved"));
        assert!(!matches("test:*", "other:x"));
        assert!(!matches("test:*", "pretest:one"));
    }

    #[test]
    fn test_question_wildcard() {
        assert!(matches("tab:?", "tab:1"));
        assert!(!matches("tab:?", "tab:10"));
        assert!(!matches("tab:?", "tab:"));
        assert!(matches("a?c", "a\nc"));
    }

    #[test]
    fn test_special_characters_are_literal() {
        assert!(matches("a.*", "a.b"));
        assert!(!matches("a.*", "aXb"));
        assert!(matches("(x)*", "(x)y"));
        assert!(!matches("(x)*", "xy"));
        assert!(matches("price+[eur]?", "price+[eur]!"));
        assert!(!matches("^start*", "start:x"));
    }

    #[test]
    fn test_anchored_both_ends() {
        assert!(!matches("customer:*", "app:customer:saved"));
        assert!(!matches("*:saved", "customer:saved:later"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            TopicPattern::compile(""),
            Err(EventBusError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("a:*"));
        assert!(is_wildcard("a:?"));
        assert!(!is_wildcard("a:b"));
    }
}
