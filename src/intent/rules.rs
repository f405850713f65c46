//! Deterministic voice command rules.
//!
//! Evaluated in a fixed order against the lower-cased, trimmed utterance. Never
//! fails and performs no I/O, which makes it the terminal tier of intent parsing.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Intent, ParsedIntent, DEFAULT_TIMER_SECONDS};

/// Prefix rules, checked in order. The first match wins.
const PREFIX_RULES: &[(Intent, &[&str])] = &[
    (Intent::Next, &["next", "go next", "next step"]),
    (Intent::Prev, &["back", "previous", "prev", "go back"]),
    (Intent::Repeat, &["repeat", "again", "say that again"]),
    (Intent::Pause, &["pause", "stop", "wait"]),
    (Intent::Resume, &["resume", "continue", "go"]),
    (Intent::Help, &["help", "commands", "what can"]),
];

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(min|sec|minute|second)").expect("duration pattern is valid")
});

/// Classify an utterance without any model.
pub fn classify(text: &str) -> ParsedIntent {
    let lower = text.trim().to_lowercase();

    for (intent, prefixes) in PREFIX_RULES {
        if prefixes.iter().any(|p| lower.starts_with(p)) {
            return ParsedIntent::new(*intent);
        }
    }

    if let Some(secs) = scan_duration(&lower) {
        return ParsedIntent::timer(secs);
    }

    if lower.contains("timer") {
        return ParsedIntent::timer(DEFAULT_TIMER_SECONDS);
    }

    ParsedIntent::new(Intent::Unknown)
}

/// First `<digits> <unit>` occurrence, in seconds. Minutes are multiplied by 60.
///
/// The parsed value is used as is, zero included. A value that does not fit in
/// `u32` seconds is treated as no match.
fn scan_duration(lower: &str) -> Option<u32> {
    let caps = DURATION.captures(lower)?;
    let value: u32 = caps[1].parse().ok()?;
    if caps[2].starts_with("min") {
        value.checked_mul(60)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timer_with_minutes() {
        assert_eq!(classify("set a timer for 5 minutes"), ParsedIntent::timer(300));
        assert_eq!(classify("10 min please"), ParsedIntent::timer(600));
    }

    #[test]
    fn test_timer_with_seconds() {
        assert_eq!(classify("timer 45 seconds"), ParsedIntent::timer(45));
        assert_eq!(classify("count 30sec"), ParsedIntent::timer(30));
    }

    #[test]
    fn test_bare_timer_defaults() {
        assert_eq!(classify("start a timer"), ParsedIntent::timer(300));
    }

    #[test]
    fn test_prefix_rules() {
        assert_eq!(classify("next please").intent, Intent::Next);
        assert_eq!(classify("  Go Back ").intent, Intent::Prev);
        assert_eq!(classify("previous step").intent, Intent::Prev);
        assert_eq!(classify("say that again").intent, Intent::Repeat);
        assert_eq!(classify("wait a second").intent, Intent::Pause);
        assert_eq!(classify("continue").intent, Intent::Resume);
        assert_eq!(classify("what can I say").intent, Intent::Help);
    }

    #[test]
    fn test_priority_order() {
        // "go next" is NEXT even though "go" is a RESUME prefix.
        assert_eq!(classify("go next").intent, Intent::Next);
        // Prefix rules are checked before the duration scan.
        assert_eq!(classify("wait 5 minutes").intent, Intent::Pause);
        assert_eq!(classify("stop the timer").intent, Intent::Pause);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify("asdfqwer"), ParsedIntent::new(Intent::Unknown));
        assert_eq!(classify(""), ParsedIntent::new(Intent::Unknown));
    }

    #[test]
    fn test_overflowing_duration_is_ignored() {
        assert_eq!(
            classify("timer for 99999999999 minutes"),
            ParsedIntent::timer(DEFAULT_TIMER_SECONDS)
        );
    }

    #[test]
    fn test_zero_duration_is_kept() {
        assert_eq!(classify("0 minutes"), ParsedIntent::timer(0));
        assert_eq!(classify("set a timer for 0 seconds"), ParsedIntent::timer(0));
    }
}
