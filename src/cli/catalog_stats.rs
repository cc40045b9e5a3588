use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::PathBuf;

use crate::catalog::{load_integrated_ratings, Catalog, CatalogSummary, RatingCoverage};
use crate::table::RawTable;
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct CatalogStatsConfig {
    /// Optional override for the processed directory (defaults to env CATALOG_PROCESSED_DIR).
    pub processed_dir: Option<PathBuf>,
    /// Print the summary as JSON instead of text.
    pub json: bool,
}

pub fn run(cfg: CatalogStatsConfig) -> Result<()> {
    env_util::init_env();
    let pipeline = super::resolve_config(None, cfg.processed_dir);

    let movies_path = pipeline.integrated_movies_path();
    let catalog = Catalog::load(&movies_path)
        .with_context(|| format!("loading {}; run `catalog prep` first", movies_path.display()))?;
    let mut summary = catalog.summary();

    let ratings_path = pipeline.integrated_ratings_path();
    if ratings_path.exists() {
        let ratings = load_integrated_ratings(&ratings_path)
            .with_context(|| format!("loading {}", ratings_path.display()))?;
        // Without the raw cache there is nothing to compare against.
        let cache = pipeline.movielens_ratings_cache();
        let source_rows = if cache.exists() {
            RawTable::read_csv(&cache)?.len()
        } else {
            ratings.len()
        };
        summary = summary.with_ratings(RatingCoverage::measure(source_rows, &ratings));
    }

    let out = if cfg.json {
        serde_json::to_string_pretty(&summary)?
    } else {
        render(&summary)
    };
    println!("{}", out);
    Ok(())
}

pub fn render(summary: &CatalogSummary) -> String {
    let mut out = String::new();
    writeln!(out, "CATALOG SUMMARY:").ok();
    writeln!(
        out,
        "movies: {} (with rating_value: {})",
        summary.movies, summary.movies_with_rating_value
    )
    .ok();
    writeln!(out, "multi-source movies: {}", summary.multi_source_movies).ok();
    for (source, ids) in &summary.ids_per_source {
        writeln!(out, "{source} ids: {ids}").ok();
    }
    if let Some(r) = &summary.ratings {
        writeln!(
            out,
            "ratings: {} kept, {} dropped ({:.1}% kept), {} users, {} movies",
            r.kept,
            r.dropped,
            r.kept_ratio() * 100.0,
            r.users,
            r.rated_movies
        )
        .ok();
    }
    out
}
