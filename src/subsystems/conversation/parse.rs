//! Free-text parsing for chat replies: figures, tenures and yes/no intents.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,\.]*").expect("static regex"));
static NON_ALPHA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z\s]").expect("static regex"));

const POSITIVE_WORDS: &[&str] =
    &["yes", "y", "sure", "okay", "ok", "yeah", "yup", "proceed", "go", "affirmative"];
const NEGATIVE_WORDS: &[&str] = &["no", "n", "not", "later", "skip", "nah"];
const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "heya", "hiya", "greetings"];

/// The first figure in `text`, thousands separators stripped.
/// `"₹5,00,000 please"` → `500000.0`; a malformed figure like `"1.2.3"`, or
/// one too long to fit an `f64`, → `None`.
pub fn extract_number(text: &str) -> Option<f64> {
    let raw = NUMBER_RE.find(text)?.as_str().replace(',', "");
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Tenure in months.  Figures are read as years when the text says "year".
/// Zero or negative results are `None`.
pub fn parse_tenure(text: &str) -> Option<u32> {
    let number = extract_number(text)?;
    let months = if text.to_lowercase().contains("year") {
        (number * 12.0).round()
    } else {
        number.round()
    };
    (months >= 1.0 && months <= u32::MAX as f64).then_some(months as u32)
}

/// Just the digits of `text`, in order.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

fn words(text: &str) -> HashSet<String> {
    NON_ALPHA_RE
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn has_any_word(text: &str, vocabulary: &[&str]) -> bool {
    let words = words(text);
    vocabulary.iter().any(|w| words.contains(*w))
}

pub fn is_positive_response(text: &str) -> bool {
    has_any_word(text, POSITIVE_WORDS)
}

pub fn is_negative_response(text: &str) -> bool {
    has_any_word(text, NEGATIVE_WORDS)
}

pub fn is_greeting(text: &str) -> bool {
    has_any_word(text, GREETING_WORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_figure() {
        assert_eq!(extract_number("I need 5,00,000 for 3 years"), Some(500_000.0));
        assert_eq!(extract_number("about 250000."), Some(250_000.0));
        assert_eq!(extract_number("12.5 percent"), Some(12.5));
        assert_eq!(extract_number("no figures here"), None);
        assert_eq!(extract_number("version 1.2.3"), None);
        assert_eq!(extract_number(&"9".repeat(400)), None);
    }

    #[test]
    fn tenure_in_months_or_years() {
        assert_eq!(parse_tenure("36"), Some(36));
        assert_eq!(parse_tenure("36 months"), Some(36));
        assert_eq!(parse_tenure("3 years"), Some(36));
        assert_eq!(parse_tenure("1.5 Years"), Some(18));
        assert_eq!(parse_tenure("0"), None);
        assert_eq!(parse_tenure("a while"), None);
    }

    #[test]
    fn digits_are_collected_across_separators() {
        assert_eq!(digits_only("+91 98765-43210"), "919876543210");
        assert_eq!(digits_only("hello"), "");
    }

    #[test]
    fn intents_match_whole_words() {
        assert!(is_positive_response("Sure, go ahead!"));
        assert!(is_positive_response("OK"));
        assert!(!is_positive_response("yesterday"));
        assert!(is_negative_response("nah, skip it"));
        assert!(!is_negative_response("nothing"));
        assert!(is_greeting("Hello there"));
        assert!(!is_greeting("this is not a greeting"));
    }
}
