use std::path::PathBuf;

use crate::util::env::{env_dir, env_flag, env_parse};

const DEFAULT_RAW_DIR: &str = "Raw Data";
const DEFAULT_PROCESSED_DIR: &str = "data_processed";

/// Where the pipeline reads raw dumps and publishes its artifacts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the raw source CSVs.
    pub raw_dir: PathBuf,
    /// Directory for loader caches and pipeline artifacts.
    pub processed_dir: PathBuf,
    /// Remove existing artifacts before running so every stage recomputes.
    pub fresh: bool,
    /// Map the three sources on the rayon pool instead of one after another.
    pub parallel_mediation: bool,
    /// Worker threads for parallel mediation; 0 keeps rayon's global pool.
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_dirs(DEFAULT_RAW_DIR, DEFAULT_PROCESSED_DIR)
    }
}

impl PipelineConfig {
    pub fn with_dirs(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            fresh: false,
            parallel_mediation: true,
            threads: 0,
        }
    }

    /// CATALOG_RAW_DIR, CATALOG_PROCESSED_DIR, CATALOG_FRESH, CATALOG_PARALLEL_MEDIATION, CATALOG_THREADS.
    pub fn from_env() -> Self {
        Self {
            raw_dir: env_dir("CATALOG_RAW_DIR", DEFAULT_RAW_DIR),
            processed_dir: env_dir("CATALOG_PROCESSED_DIR", DEFAULT_PROCESSED_DIR),
            fresh: env_flag("CATALOG_FRESH", false),
            parallel_mediation: env_flag("CATALOG_PARALLEL_MEDIATION", true),
            threads: env_parse("CATALOG_THREADS", 0usize),
        }
    }

    fn raw(&self, name: &str) -> PathBuf {
        self.raw_dir.join(name)
    }

    fn processed(&self, name: &str) -> PathBuf {
        self.processed_dir.join(name)
    }

    pub fn imdb_basics(&self) -> PathBuf {
        self.raw("basics_imdb.csv")
    }

    pub fn imdb_ratings(&self) -> PathBuf {
        self.raw("ratings_imdb.csv")
    }

    pub fn movielens_movies(&self) -> PathBuf {
        self.raw("movies_ml.csv")
    }

    pub fn movielens_ratings(&self) -> PathBuf {
        self.raw("ratings_ml.csv")
    }

    pub fn tmdb_movies(&self) -> PathBuf {
        self.raw("movies_tmdb.csv")
    }

    pub fn imdb_cache(&self) -> PathBuf {
        self.processed("imdb_movies_raw.csv")
    }

    pub fn movielens_movies_cache(&self) -> PathBuf {
        self.processed("movielens_movies_raw.csv")
    }

    pub fn movielens_ratings_cache(&self) -> PathBuf {
        self.processed("movielens_ratings_raw.csv")
    }

    pub fn mediated_path(&self) -> PathBuf {
        self.processed("mediated_movies_all_sources.csv")
    }

    pub fn integrated_movies_path(&self) -> PathBuf {
        self.processed("integrated_movies.csv")
    }

    pub fn integrated_ratings_path(&self) -> PathBuf {
        self.processed("movielens_ratings_integrated.csv")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.processed("pipeline_summary.json")
    }

    /// Pipeline outputs in stage order (loader caches excluded).
    pub fn artifacts(&self) -> [PathBuf; 3] {
        [
            self.mediated_path(),
            self.integrated_movies_path(),
            self.integrated_ratings_path(),
        ]
    }

    /// Loader caches derived from the raw dumps.
    pub fn loader_caches(&self) -> [PathBuf; 3] {
        [
            self.imdb_cache(),
            self.movielens_movies_cache(),
            self.movielens_ratings_cache(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_in_configured_dirs() {
        let cfg = PipelineConfig::with_dirs("/raw", "/out");
        assert_eq!(cfg.imdb_basics(), PathBuf::from("/raw/basics_imdb.csv"));
        assert_eq!(cfg.tmdb_movies(), PathBuf::from("/raw/movies_tmdb.csv"));
        assert_eq!(
            cfg.integrated_movies_path(),
            PathBuf::from("/out/integrated_movies.csv")
        );
        assert!(cfg.artifacts().iter().all(|p| p.starts_with("/out")));
        assert!(cfg.loader_caches().iter().all(|p| p.starts_with("/out")));
    }
}
