//! Pure helpers shared by the mediator and the integrator.

pub mod genre;
pub mod rating;
pub mod title;

pub use genre::{normalize_genre_list, normalize_genres, union_genres};
pub use rating::{scale_rating_to_10, RatingStrategy};
pub use title::{extract_year_from_date, extract_year_from_title, normalize_title};

/// Null markers emitted by the raw dumps (`\N` is IMDb's).
const NULL_MARKERS: [&str; 4] = ["", "\\N", "nan", "NaN"];

/// Trimmed field value, or `None` for blanks and null markers.
pub fn clean_field(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if NULL_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}

/// Lenient float parse: anything unparseable or non-finite is unknown.
pub fn parse_number(raw: &str) -> Option<f64> {
    clean_field(raw)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Vote/rating counts. Accepts float spellings like `"1200.0"`; negatives are unknown.
pub fn parse_count(raw: &str) -> Option<u64> {
    parse_number(raw)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
}

/// Integer year, accepting float spellings (`"1995.0"`) found in re-exported dumps.
pub fn parse_year(raw: &str) -> Option<i32> {
    let cleaned = clean_field(raw)?;
    if let Ok(year) = cleaned.parse::<i32>() {
        return Some(year);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 10_000.0)
        .map(|v| v as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_markers_are_unknown() {
        assert_eq!(clean_field("  \\N "), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("7.5"), Some(7.5));
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn counts_and_years_tolerate_float_spellings() {
        assert_eq!(parse_count("1200.0"), Some(1200));
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_year("1995"), Some(1995));
        assert_eq!(parse_year("1995.0"), Some(1995));
        assert_eq!(parse_year("1995.5"), None);
        assert_eq!(parse_year("unknown"), None);
    }
}
