use regex::Regex;
use std::sync::OnceLock;

fn trailing_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\d{4}\)$").expect("static regex"))
}

fn year_in_parens_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d{4})\)").expect("static regex"))
}

const LEADING_ARTICLES: [&str; 3] = ["the ", "a ", "an "];

/// Canonical comparison form of a title.
///
/// Steps, in order:
/// - drop a trailing `(YYYY)` suffix
/// - lowercase
/// - keep only ASCII letters, digits and whitespace
/// - collapse whitespace runs to a single space
/// - drop one leading article (`the`, `a`, `an`)
///
/// A missing title stays `None`; a title made only of punctuation becomes `""`.
pub fn normalize_title(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let without_year = trailing_year_re().replace(raw.trim(), "");
    let lowered = without_year.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");

    for article in LEADING_ARTICLES {
        if let Some(rest) = collapsed.strip_prefix(article) {
            return Some(rest.to_string());
        }
    }
    Some(collapsed)
}

/// Year from a MovieLens-style title such as `"Toy Story (1995)"`.
/// When several `(YYYY)` groups appear the last one wins.
pub fn extract_year_from_title(raw: &str) -> Option<i32> {
    year_in_parens_re()
        .captures_iter(raw)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Year from `YYYY-MM-DD` or a bare `YYYY`.
pub fn extract_year_from_date(raw: &str) -> Option<i32> {
    let prefix = raw.trim().get(..4)?;
    if prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}
