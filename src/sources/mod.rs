//! Loaders turning the raw dumps into source-native tables.
//!
//! IMDb and MovieLens are mandatory; TMDb is optional and its absence is
//! reported as [`PipelineError::MissingSource`](crate::error::PipelineError)
//! for the mediator to downgrade.

pub mod imdb;
pub mod movielens;
pub mod tmdb;

use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::model::Source;

pub(crate) fn ensure_exists(source: Source, path: &Path) -> PipelineResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::MissingSource {
            dataset: source,
            path: path.to_path_buf(),
        })
    }
}
