use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::catalog::{display_title, Catalog};
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct LookupConfig {
    pub processed_dir: Option<PathBuf>,
    /// Free-text titles, normalized before matching.
    pub titles: Vec<String>,
}

pub fn run(cfg: LookupConfig) -> Result<()> {
    env_util::init_env();
    if cfg.titles.is_empty() {
        bail!("lookup needs at least one title");
    }
    let pipeline = super::resolve_config(None, cfg.processed_dir);
    let path = pipeline.integrated_movies_path();
    let catalog = Catalog::load(&path).with_context(|| format!("loading {}", path.display()))?;

    for title in &cfg.titles {
        println!("{}", describe(&catalog, title));
    }
    let (_, unmatched) = catalog.resolve_titles(cfg.titles.as_slice());
    if !unmatched.is_empty() {
        tracing::warn!(unmatched = unmatched.len(), "some titles did not match the catalog");
    }
    Ok(())
}

/// One line per title: the matched movie with its provenance, or a miss.
pub fn describe(catalog: &Catalog, raw: &str) -> String {
    let Some(movie) = catalog.lookup_title(raw) else {
        return format!("{raw:?}: no match");
    };
    let title = movie.title_norm.as_deref().map(display_title).unwrap_or_default();
    let year = movie
        .year
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    let rating = movie
        .rating_value
        .map(|r| format!("{r:.2}/10 from {} votes", movie.rating_count))
        .unwrap_or_else(|| "unrated".to_string());
    format!(
        "{raw:?}: #{} {title}{year} [{}] {rating} imdb={} movielens={} tmdb={}",
        movie.movie_id, movie.genres_norm, movie.imdb_ids, movie.movielens_ids, movie.tmdb_ids
    )
}
