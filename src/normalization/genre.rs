use itertools::Itertools;
use serde_json::Value;

use crate::model::Source;

/// Spellings that collapse onto a canonical genre token.
const SYNONYMS: [(&str, &str); 2] = [("sci-fi", "science fiction"), ("scifi", "science fiction")];

fn canonical(token: &str) -> String {
    let lowered = token.trim().to_lowercase();
    SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canon)| canon.to_string())
        .unwrap_or(lowered)
}

fn join_tokens<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| canonical(t.as_ref()))
        .filter(|t| !t.is_empty())
        .sorted()
        .dedup()
        .join("|")
}

/// Normalize a raw genre field into a sorted, de-duplicated, `|`-joined token set.
///
/// IMDb separates with commas, MovieLens with pipes. TMDb values may be a
/// JSON list of names, a JSON list of `{"id", "name"}` objects, a Python-style
/// `['Action', 'Drama']` string or a plain comma list.
pub fn normalize_genres(raw: Option<&str>, source: Source) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    match source {
        Source::Imdb => join_tokens(raw.split(',')),
        Source::Movielens => join_tokens(raw.split('|')),
        Source::Tmdb => match parse_json_genres(raw) {
            Some(items) => normalize_genre_list(&items),
            None => join_tokens(
                raw.trim()
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(|g| g.trim_matches(|c: char| c == ' ' || c == '\'' || c == '"')),
            ),
        },
    }
}

/// Same normalization for values that already arrive as a list.
pub fn normalize_genre_list(items: &[String]) -> String {
    join_tokens(items)
}

fn parse_json_genres(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    let Value::Array(items) = serde_json::from_str::<Value>(trimmed).ok()? else {
        return None;
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name),
                Value::Object(mut obj) => match obj.remove("name") {
                    Some(Value::String(name)) => Some(name),
                    _ => None,
                },
                _ => None,
            })
            .collect(),
    )
}

/// Union of several normalized genre strings, re-sorted and de-duplicated.
pub fn union_genres<'a, I>(sets: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    join_tokens(sets.into_iter().flat_map(|s| s.split('|')))
}
