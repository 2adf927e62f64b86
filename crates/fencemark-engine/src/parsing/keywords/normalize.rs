use std::sync::LazyLock;

use regex::Regex;

/// Attribute keys the normalizer knows how to separate from a glued keyword.
pub const ATTRIBUTE_KEYS: &[&str] = &["color", "alt", "id", "summary", "class"];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

static COMPOUND_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\+\s*").expect("valid separator pattern"));

static GLUED_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    let keys = ATTRIBUTE_KEYS.join("|");
    Regex::new(&format!(r"([^\s=])({keys})=")).expect("valid attribute pattern")
});

/// Normalizes a keyword phrase.
///
/// - full-width spaces become ASCII spaces
/// - whitespace runs collapse to one space
/// - spaces around the `+` compound separator are removed
/// - a known `key=` glued to the preceding text gets a space in front
/// - the result is trimmed
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let text = text.replace('\u{3000}', " ");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = COMPOUND_SEPARATOR.replace_all(&text, "+");
    let text = GLUED_ATTRIBUTE.replace_all(&text, "$1 $2=");
    text.trim().to_string()
}
