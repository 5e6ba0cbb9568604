//! "Did you mean" hints for unknown keys and variants.

use std::sync::OnceLock;

use regex::Regex;

fn unknown_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"unknown (?:field|variant) `([^`]+)`, expected (.+?)(?: at line \d+ column \d+)?$")
            .expect("unknown key regex is valid")
    })
}

fn backticked_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("backtick regex is valid"))
}

/// Extracts the rejected name and the accepted names from a decoder message.
fn parse_unknown_key(message: &str) -> Option<(&str, Vec<&str>)> {
    let caps = unknown_key_regex().captures(message)?;
    let unknown = caps.get(1)?.as_str();
    let expected = backticked_regex()
        .captures_iter(caps.get(2)?.as_str())
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    Some((unknown, expected))
}

/// Finds the closest known name within a small edit distance.
fn find_similar<'a>(input: &str, known: &[&'a str]) -> Option<&'a str> {
    let max_distance = (input.len() / 3).max(2);
    known
        .iter()
        .map(|k| (*k, strsim::damerau_levenshtein(input, k)))
        .filter(|(_, d)| *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| k)
}

/// Returns a hint for an unknown field/variant message, if a close match exists.
pub fn suggestion_for(message: &str) -> Option<String> {
    let (unknown, expected) = parse_unknown_key(message)?;
    find_similar(unknown, &expected).map(|s| format!("did you mean `{}`?", s))
}
