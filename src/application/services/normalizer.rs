use once_cell::sync::Lazy;
use regex::Regex;

/// Cleans review text before it reaches the model.
///
/// Lowercases, strips URL-like tokens, keeps only letters, whitespace and `.,!?`, then
/// collapses whitespace. Total: the worst case is an empty string.
pub fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let lowered = raw.to_lowercase();
    let without_urls = strip_urls(&lowered);
    let filtered: String = without_urls
        .chars()
        .filter(|c| is_kept_char(*c))
        .collect();
    // Dropping characters can splice a new `www.` prefix together ("w1ww.x").
    let filtered = strip_urls(&filtered);

    collapse_whitespace(&filtered)
}

fn strip_urls(input: &str) -> String {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:[a-z][a-z0-9+.\-]*://|www\.)\S*").unwrap());
    RE.replace_all(input, " ").into_owned()
}

fn is_kept_char(c: char) -> bool {
    c.is_alphabetic() || c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?')
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
