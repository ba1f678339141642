use regex::Regex;
use std::sync::OnceLock;

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Normalise free text into a URL slug.
/// Lowercases, collapses every run of non `[a-z0-9]` characters into a
/// single `-`, and trims dashes from both ends.
pub fn slugify(input: &str) -> String {
    let lower = input.to_lowercase();
    non_alnum()
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}
