//! Rewrites a rating table from one source's native movie ids into canonical
//! `movie_id` space. Rows whose native id never made it into the catalog are
//! dropped, not reported as errors; [`RemapOutcome`] carries the counts so
//! coverage numbers can account for them.

use csv::StringRecord;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::PipelineResult;
use crate::model::{IntegratedMovie, Source};
use crate::table::RawTable;

/// Column every integrated rating table must keep.
pub const USER_ID_COLUMN: &str = "userId";
/// Column that replaces the native movie id column.
pub const MOVIE_ID_COLUMN: &str = "movie_id";

/// Native id → `movie_id` lookup for one source, built from provenance lists.
#[derive(Debug, Clone)]
pub struct ProvenanceIndex {
    source: Source,
    by_native_id: HashMap<String, u32>,
}

impl ProvenanceIndex {
    /// Provenance lists partition each source's ids, so every id maps to one
    /// movie. Should a native id show up twice anyway (duplicate rows in a
    /// raw dump) the first movie keeps it.
    pub fn build(movies: &[IntegratedMovie], source: Source) -> Self {
        let mut by_native_id = HashMap::with_capacity(movies.len());
        let mut conflicts = 0usize;
        for movie in movies {
            for native in movie.provenance(source).iter() {
                if by_native_id.contains_key(native) {
                    conflicts += 1;
                    continue;
                }
                by_native_id.insert(native.to_string(), movie.movie_id);
            }
        }
        if conflicts > 0 {
            warn!(%source, conflicts, "native ids listed under more than one movie; kept first");
        }
        Self {
            source,
            by_native_id,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn resolve(&self, native_id: &str) -> Option<u32> {
        self.by_native_id.get(native_id.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_native_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_native_id.is_empty()
    }
}

/// Remapped table plus how many rows survived.
#[derive(Debug, Clone)]
pub struct RemapOutcome {
    pub table: RawTable,
    pub kept: usize,
    pub dropped: usize,
}

/// Keep rows whose `native_column` value resolves through `index` and replace
/// that column with `movie_id`. Every other column passes through untouched.
pub fn remap_ratings(
    ratings: &RawTable,
    index: &ProvenanceIndex,
    native_column: &str,
) -> PipelineResult<RemapOutcome> {
    let artifact = format!("{} ratings", index.source());
    let native_idx = ratings.require_column(&artifact, native_column)?;
    ratings.require_column(&artifact, USER_ID_COLUMN)?;

    let headers: Vec<&str> = ratings
        .headers()
        .iter()
        .enumerate()
        .map(|(i, h)| if i == native_idx { MOVIE_ID_COLUMN } else { h })
        .collect();
    let mut table = RawTable::new(headers);

    let mut dropped = 0usize;
    for row in ratings.rows() {
        let Some(movie_id) = row.get(native_idx).and_then(|id| index.resolve(id)) else {
            dropped += 1;
            continue;
        };
        let movie_id = movie_id.to_string();
        let remapped: StringRecord = row
            .iter()
            .enumerate()
            .map(|(i, f)| if i == native_idx { movie_id.as_str() } else { f })
            .collect();
        table.push(remapped);
    }

    let kept = table.len();
    info!(
        source = %index.source(),
        kept,
        dropped,
        "mapped ratings to integrated movie ids"
    );
    Ok(RemapOutcome {
        table,
        kept,
        dropped,
    })
}
