use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::ensure_exists;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::model::Source;
use crate::normalization::clean_field;
use crate::table::{field, load_or_build, RawTable, TableRow};

const BASICS: &str = "imdb basics";
const RATINGS: &str = "imdb ratings";

/// IMDb title joined with its rating row. Fields stay as raw text; the
/// mediator decides what parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImdbMovie {
    pub tconst: String,
    #[serde(rename = "primaryTitle")]
    pub primary_title: Option<String>,
    #[serde(rename = "startYear")]
    pub start_year: Option<String>,
    pub genres: Option<String>,
    #[serde(rename = "averageRating")]
    pub average_rating: Option<String>,
    #[serde(rename = "numVotes")]
    pub num_votes: Option<String>,
}

impl TableRow for ImdbMovie {
    const ARTIFACT: &'static str = "imdb movies";
    const COLUMNS: &'static [&'static str] = &[
        "tconst",
        "primaryTitle",
        "startYear",
        "genres",
        "averageRating",
        "numVotes",
    ];
    const REQUIRED: &'static [&'static str] = &["tconst"];
}

fn owned(raw: Option<&str>) -> Option<String> {
    raw.and_then(clean_field).map(str::to_string)
}

/// Left join of basics with ratings on `tconst`; titles without ratings keep unknowns.
pub fn join_basics_with_ratings(
    basics: &RawTable,
    ratings: &RawTable,
) -> PipelineResult<Vec<ImdbMovie>> {
    let b_id = basics.require_column(BASICS, "tconst")?;
    let b_title = basics.column("primaryTitle");
    let b_year = basics.column("startYear");
    let b_genres = basics.column("genres");

    let r_id = ratings.require_column(RATINGS, "tconst")?;
    let r_avg = ratings.column("averageRating");
    let r_votes = ratings.column("numVotes");

    let mut by_tconst: HashMap<&str, (Option<String>, Option<String>)> =
        HashMap::with_capacity(ratings.len());
    for row in ratings.rows() {
        if let Some(id) = field(row, Some(r_id)).and_then(clean_field) {
            by_tconst
                .entry(id)
                .or_insert_with(|| (owned(field(row, r_avg)), owned(field(row, r_votes))));
        }
    }

    let movies = basics
        .rows()
        .iter()
        .map(|row| {
            let tconst = field(row, Some(b_id)).map(str::trim).unwrap_or_default();
            let (average_rating, num_votes) = by_tconst.get(tconst).cloned().unwrap_or_default();
            ImdbMovie {
                tconst: tconst.to_string(),
                primary_title: owned(field(row, b_title)),
                start_year: owned(field(row, b_year)),
                genres: owned(field(row, b_genres)),
                average_rating,
                num_votes,
            }
        })
        .collect();
    Ok(movies)
}

/// Joined IMDb table, memoized in the processed directory.
pub fn load(cfg: &PipelineConfig) -> PipelineResult<Vec<ImdbMovie>> {
    load_or_build(&cfg.imdb_cache(), || {
        let basics_path = cfg.imdb_basics();
        let ratings_path = cfg.imdb_ratings();
        ensure_exists(Source::Imdb, &basics_path)?;
        ensure_exists(Source::Imdb, &ratings_path)?;

        let basics = RawTable::read_csv(&basics_path)?;
        let ratings = RawTable::read_csv(&ratings_path)?;
        let movies = join_basics_with_ratings(&basics, &ratings)?;
        info!(movies = movies.len(), rated = ratings.len(), "joined IMDb basics with ratings");
        Ok(movies)
    })
}
