//! Read side of the integrated catalog: what downstream feature builders and
//! recommenders load, plus the lookups and coverage numbers they rely on.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::PipelineResult;
use crate::integration::remap::{MOVIE_ID_COLUMN, USER_ID_COLUMN};
use crate::model::{IntegratedMovie, IntegratedRating, Source};
use crate::normalization::normalize_title;
use crate::table::{read_records, RawTable, TableRow};

/// Integrated movies indexed by id and by normalized title.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    movies: Vec<IntegratedMovie>,
    by_id: HashMap<u32, usize>,
    by_title: HashMap<String, u32>,
}

impl Catalog {
    /// Load the integrated movies artifact. A file without `movie_id` is rejected.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let movies: Vec<IntegratedMovie> = read_records(path)?;
        info!(
            artifact = IntegratedMovie::ARTIFACT,
            movies = movies.len(),
            path = %path.display(),
            "loaded catalog"
        );
        Ok(Self::from_movies(movies))
    }

    pub fn from_movies(movies: Vec<IntegratedMovie>) -> Self {
        let mut by_id = HashMap::with_capacity(movies.len());
        let mut by_title: HashMap<String, u32> = HashMap::new();
        for (idx, movie) in movies.iter().enumerate() {
            by_id.insert(movie.movie_id, idx);
            if let Some(title) = movie.title_norm.as_deref().filter(|t| !t.is_empty()) {
                by_title
                    .entry(title.to_string())
                    .and_modify(|id| *id = (*id).min(movie.movie_id))
                    .or_insert(movie.movie_id);
            }
        }
        Self {
            movies,
            by_id,
            by_title,
        }
    }

    pub fn movies(&self) -> &[IntegratedMovie] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn get(&self, movie_id: u32) -> Option<&IntegratedMovie> {
        self.by_id.get(&movie_id).map(|&idx| &self.movies[idx])
    }

    /// Normalize `raw` the same way the mediator does and return the movie with
    /// the lowest `movie_id` carrying that title. Years are not consulted, so
    /// remakes resolve to whichever generation came first.
    pub fn lookup_title(&self, raw: &str) -> Option<&IntegratedMovie> {
        let key = normalize_title(Some(raw))?;
        let id = self.by_title.get(&key)?;
        self.get(*id)
    }

    /// Resolve many titles at once. Returns matched ids in input order and the
    /// raw titles that matched nothing.
    pub fn resolve_titles<S: AsRef<str>>(&self, titles: &[S]) -> (Vec<u32>, Vec<String>) {
        let mut ids = Vec::with_capacity(titles.len());
        let mut unmatched = Vec::new();
        for title in titles {
            match self.lookup_title(title.as_ref()) {
                Some(movie) => ids.push(movie.movie_id),
                None => unmatched.push(title.as_ref().to_string()),
            }
        }
        (ids, unmatched)
    }

    pub fn summary(&self) -> CatalogSummary {
        let mut ids_per_source: IndexMap<Source, usize> =
            Source::ALL.iter().map(|s| (*s, 0)).collect();
        let mut multi_source_movies = 0;
        let mut movies_with_rating_value = 0;
        for movie in &self.movies {
            for source in Source::ALL {
                *ids_per_source.entry(source).or_default() += movie.provenance(source).len();
            }
            if movie.source_count() > 1 {
                multi_source_movies += 1;
            }
            if movie.rating_value.is_some() {
                movies_with_rating_value += 1;
            }
        }
        CatalogSummary {
            movies: self.movies.len(),
            ids_per_source,
            multi_source_movies,
            movies_with_rating_value,
            ratings: None,
        }
    }
}

/// Load the integrated ratings artifact. Both `userId` and `movie_id` must be present.
pub fn load_integrated_ratings(path: &Path) -> PipelineResult<Vec<IntegratedRating>> {
    let ratings: Vec<IntegratedRating> = read_records(path)?;
    info!(
        artifact = IntegratedRating::ARTIFACT,
        ratings = ratings.len(),
        path = %path.display(),
        "loaded integrated ratings"
    );
    Ok(ratings)
}

/// Render a normalized title for display: `"toy story"` becomes `"Toy Story"`.
pub fn display_title(title_norm: &str) -> String {
    title_norm
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogSummary {
    pub movies: usize,
    /// Native ids contributed by each source.
    pub ids_per_source: IndexMap<Source, usize>,
    /// Movies merged from more than one source.
    pub multi_source_movies: usize,
    /// Movies whose merged `rating_value` is known.
    pub movies_with_rating_value: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<RatingCoverage>,
}

impl CatalogSummary {
    pub fn with_ratings(mut self, coverage: RatingCoverage) -> Self {
        self.ratings = Some(coverage);
        self
    }
}

/// How much of a source rating table survived remapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingCoverage {
    pub kept: usize,
    pub dropped: usize,
    pub users: usize,
    /// Distinct movies with at least one user rating.
    pub rated_movies: usize,
}

impl RatingCoverage {
    /// `source_rows` is the length of the rating table before remapping.
    pub fn measure(source_rows: usize, ratings: &[IntegratedRating]) -> Self {
        let users: HashSet<i64> = ratings.iter().map(|r| r.user_id).collect();
        let movies: HashSet<u32> = ratings.iter().map(|r| r.movie_id).collect();
        Self {
            kept: ratings.len(),
            dropped: source_rows.saturating_sub(ratings.len()),
            users: users.len(),
            rated_movies: movies.len(),
        }
    }

    /// Same numbers from a remapped rating table that was never deserialized.
    /// `dropped` comes from the remap itself.
    pub fn from_table(table: &RawTable, dropped: usize) -> PipelineResult<Self> {
        let user_col = table.require_column(IntegratedRating::ARTIFACT, USER_ID_COLUMN)?;
        let movie_col = table.require_column(IntegratedRating::ARTIFACT, MOVIE_ID_COLUMN)?;
        let mut users = HashSet::new();
        let mut movies = HashSet::new();
        for row in table.rows() {
            if let Some(user) = row.get(user_col) {
                users.insert(user.trim());
            }
            if let Some(movie) = row.get(movie_col) {
                movies.insert(movie.trim());
            }
        }
        Ok(Self {
            kept: table.len(),
            dropped,
            users: users.len(),
            rated_movies: movies.len(),
        })
    }

    /// Share of source rows that kept a movie id, in [0, 1].
    pub fn kept_ratio(&self) -> f64 {
        let total = self.kept + self.dropped;
        if total == 0 {
            0.0
        } else {
            self.kept as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::model::PipeList;
    use std::fs;

    fn movie(movie_id: u32, title: &str, year: i32, imdb: &[&str], ml: &[&str]) -> IntegratedMovie {
        IntegratedMovie {
            movie_id,
            title_norm: Some(title.to_string()),
            year: Some(year),
            genres_norm: String::new(),
            rating_value: if imdb.is_empty() { None } else { Some(7.5) },
            rating_count: 0,
            popularity: None,
            imdb_ids: PipeList(imdb.iter().map(|s| s.to_string()).collect()),
            movielens_ids: PipeList(ml.iter().map(|s| s.to_string()).collect()),
            tmdb_ids: PipeList::default(),
        }
    }

    fn sample() -> Catalog {
        Catalog::from_movies(vec![
            movie(1, "toy story", 1995, &["tt0114709"], &["1"]),
            movie(2, "heat", 1995, &["tt0113277"], &[]),
            movie(3, "heat", 1986, &[], &["2001"]),
        ])
    }

    #[test]
    fn lookup_normalizes_free_text() {
        let catalog = sample();
        let hit = catalog.lookup_title("The Toy Story (1995)").unwrap();
        assert_eq!(hit.movie_id, 1);
        assert!(catalog.lookup_title("Jumanji").is_none());
        assert!(catalog.lookup_title("   ").is_none());
    }

    #[test]
    fn lookup_prefers_lowest_movie_id() {
        let catalog = Catalog::from_movies(vec![
            movie(5, "heat", 1986, &[], &["2001"]),
            movie(2, "heat", 1995, &["tt0113277"], &[]),
        ]);
        assert_eq!(catalog.lookup_title("Heat").unwrap().movie_id, 2);
    }

    #[test]
    fn resolve_titles_reports_misses() {
        let catalog = sample();
        let (ids, unmatched) = catalog.resolve_titles(&["Heat", "Nope", "toy story"]);
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(unmatched, vec!["Nope".to_string()]);
    }

    #[test]
    fn display_title_capitalizes_words() {
        assert_eq!(display_title("toy story"), "Toy Story");
        assert_eq!(display_title("  se7en "), "Se7en");
        assert_eq!(display_title(""), "");
    }

    #[test]
    fn summary_counts_sources_and_merges() {
        let summary = sample().summary();
        assert_eq!(summary.movies, 3);
        assert_eq!(summary.ids_per_source[&Source::Imdb], 2);
        assert_eq!(summary.ids_per_source[&Source::Movielens], 2);
        assert_eq!(summary.ids_per_source[&Source::Tmdb], 0);
        assert_eq!(summary.multi_source_movies, 1);
        assert_eq!(summary.movies_with_rating_value, 2);
        assert!(summary.ratings.is_none());
    }

    #[test]
    fn coverage_counts_dropped_rows() {
        let ratings = vec![
            IntegratedRating { user_id: 1, movie_id: 1, rating: 4.0, timestamp: None },
            IntegratedRating { user_id: 1, movie_id: 3, rating: 3.5, timestamp: None },
            IntegratedRating { user_id: 2, movie_id: 1, rating: 5.0, timestamp: Some(964982703) },
        ];
        let coverage = RatingCoverage::measure(4, &ratings);
        assert_eq!(coverage.kept, 3);
        assert_eq!(coverage.dropped, 1);
        assert_eq!(coverage.users, 2);
        assert_eq!(coverage.rated_movies, 2);
        assert!((coverage.kept_ratio() - 0.75).abs() < 1e-12);

        let summary = sample().summary().with_ratings(coverage);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["ids_per_source"]["movielens"], 2);
        assert_eq!(json["movies_with_rating_value"], 2);
        assert_eq!(json["ratings"]["rated_movies"], 2);
        assert_eq!(json["ratings"]["dropped"], 1);
    }

    #[test]
    fn coverage_from_remapped_table_matches_deserialized_ratings() {
        let table = RawTable::from_reader(
            "userId,movie_id,rating,timestamp\n1,1,4.0,\n1,3,3.5,\n2,1,5.0,964982703\n".as_bytes(),
        )
        .unwrap();
        let coverage = RatingCoverage::from_table(&table, 1).unwrap();
        assert_eq!(coverage.kept, 3);
        assert_eq!(coverage.dropped, 1);
        assert_eq!(coverage.users, 2);
        assert_eq!(coverage.rated_movies, 2);

        let bare = RawTable::from_reader("movie_id,rating\n1,4.0\n".as_bytes()).unwrap();
        let err = RatingCoverage::from_table(&bare, 0).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "userId"));
    }

    #[test]
    fn load_rejects_artifacts_without_movie_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("integrated_movies.csv");
        fs::write(&path, "title_norm,year\nheat,1995\n").unwrap();
        let err = Catalog::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "movie_id"));
    }

    #[test]
    fn ratings_loader_requires_user_and_movie_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.csv");

        fs::write(&path, "movie_id,rating\n1,4.0\n").unwrap();
        let err = load_integrated_ratings(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "userId"));

        fs::write(&path, "userId,movie_id,timestamp\n7,1,964982703\n").unwrap();
        let err = load_integrated_ratings(&path).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "rating"));

        fs::write(&path, "userId,movie_id,rating,timestamp\n7,1,4.5,\n").unwrap();
        let ratings = load_integrated_ratings(&path).unwrap();
        assert_eq!(
            ratings,
            vec![IntegratedRating { user_id: 7, movie_id: 1, rating: 4.5, timestamp: None }]
        );
    }
}
