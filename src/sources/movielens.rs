use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::ensure_exists;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::model::Source;
use crate::normalization::{clean_field, parse_number};
use crate::table::{field, load_or_build, load_or_build_raw, RawTable, TableRow};

const MOVIES: &str = "movielens movies";
pub const RATINGS: &str = "movielens ratings";

/// Column holding the MovieLens movie id in both movies and ratings tables.
pub const MOVIE_ID_COLUMN: &str = "movieId";

/// MovieLens movie with its ratings pre-aggregated (mean on the 0.5-5 scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovielensMovie {
    #[serde(rename = "movieId")]
    pub movie_id: String,
    pub title: Option<String>,
    pub genres: Option<String>,
    pub rating_mean: Option<f64>,
    pub rating_count: Option<u64>,
}

impl TableRow for MovielensMovie {
    const ARTIFACT: &'static str = "movielens movies";
    const COLUMNS: &'static [&'static str] =
        &["movieId", "title", "genres", "rating_mean", "rating_count"];
    const REQUIRED: &'static [&'static str] = &["movieId"];
}

#[derive(Debug, Default, Clone, Copy)]
struct RatingAgg {
    sum: f64,
    count: u64,
}

/// Per-movie mean and count over the ratings table. Unparseable ratings are ignored.
pub fn aggregate_ratings(ratings: &RawTable) -> PipelineResult<HashMap<String, (f64, u64)>> {
    let id_col = ratings.require_column(RATINGS, MOVIE_ID_COLUMN)?;
    let rating_col = ratings.require_column(RATINGS, "rating")?;

    let mut aggs: HashMap<String, RatingAgg> = HashMap::new();
    for row in ratings.rows() {
        let Some(id) = field(row, Some(id_col)).and_then(clean_field) else {
            continue;
        };
        let Some(rating) = field(row, Some(rating_col)).and_then(parse_number) else {
            continue;
        };
        let agg = aggs.entry(id.to_string()).or_default();
        agg.sum += rating;
        agg.count += 1;
    }
    Ok(aggs
        .into_iter()
        .map(|(id, agg)| (id, (agg.sum / agg.count as f64, agg.count)))
        .collect())
}

/// Left join of movies with aggregated rating stats.
pub fn join_movies_with_stats(
    movies: &RawTable,
    ratings: &RawTable,
) -> PipelineResult<Vec<MovielensMovie>> {
    let id_col = movies.require_column(MOVIES, MOVIE_ID_COLUMN)?;
    let title_col = movies.column("title");
    let genres_col = movies.column("genres");
    let stats = aggregate_ratings(ratings)?;

    Ok(movies
        .rows()
        .iter()
        .map(|row| {
            let movie_id = field(row, Some(id_col)).map(str::trim).unwrap_or_default();
            let (rating_mean, rating_count) = match stats.get(movie_id) {
                Some((mean, count)) => (Some(*mean), Some(*count)),
                None => (None, None),
            };
            MovielensMovie {
                movie_id: movie_id.to_string(),
                title: field(row, title_col).and_then(clean_field).map(str::to_string),
                genres: field(row, genres_col).and_then(clean_field).map(str::to_string),
                rating_mean,
                rating_count,
            }
        })
        .collect())
}

/// Raw user ratings, cached verbatim in the processed directory.
pub fn load_ratings(cfg: &PipelineConfig) -> PipelineResult<RawTable> {
    load_or_build_raw(&cfg.movielens_ratings_cache(), || {
        let path = cfg.movielens_ratings();
        ensure_exists(Source::Movielens, &path)?;
        RawTable::read_csv(&path)
    })
}

/// Movies with aggregated rating stats, memoized in the processed directory.
pub fn load_movies(cfg: &PipelineConfig) -> PipelineResult<Vec<MovielensMovie>> {
    load_or_build(&cfg.movielens_movies_cache(), || {
        let path = cfg.movielens_movies();
        ensure_exists(Source::Movielens, &path)?;
        let movies = RawTable::read_csv(&path)?;
        let ratings = load_ratings(cfg)?;
        let joined = join_movies_with_stats(&movies, &ratings)?;
        info!(
            movies = joined.len(),
            ratings = ratings.len(),
            "aggregated MovieLens ratings per movie"
        );
        Ok(joined)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn aggregates_mean_and_count_per_movie() {
        let movies = table(
            "movieId,title,genres\n1,Toy Story (1995),Adventure|Animation\n2,Jumanji (1995),Adventure\n",
        );
        let ratings = table(
            "userId,movieId,rating,timestamp\n1,1,4.0,964982703\n2,1,5.0,964982931\n3,1,oops,0\n",
        );
        let joined = join_movies_with_stats(&movies, &ratings).unwrap();

        assert_eq!(joined[0].movie_id, "1");
        assert_eq!(joined[0].rating_mean, Some(4.5));
        assert_eq!(joined[0].rating_count, Some(2));
        assert_eq!(joined[1].rating_mean, None);
        assert_eq!(joined[1].rating_count, None);
        assert_eq!(joined[1].genres.as_deref(), Some("Adventure"));
    }

    #[test]
    fn ratings_without_rating_column_are_rejected() {
        let ratings = table("userId,movieId\n1,1\n");
        assert!(aggregate_ratings(&ratings).is_err());
    }
}
