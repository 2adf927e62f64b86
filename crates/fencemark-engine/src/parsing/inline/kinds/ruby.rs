use std::sync::LazyLock;

use regex::Regex;

static RUBY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)[(（](.+?)[)）]$").expect("valid ruby pattern"));

/// Splits `base(reading)` into its parts. ASCII and full-width parentheses
/// are both accepted; anything else is `None`.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let caps = RUBY.captures(text.trim())?;
    let base = caps.get(1)?.as_str().trim();
    let reading = caps.get(2)?.as_str().trim();
    if base.is_empty() || reading.is_empty() {
        return None;
    }
    Some((base, reading))
}
