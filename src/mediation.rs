//! Source-native rows → [`MediatedRecord`].
//!
//! A field that fails to parse becomes unknown for that field only; the row
//! is kept. The one exception is a blank source id, which cannot form a
//! `temp_id` and is skipped with a warning.

use indexmap::IndexMap;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{MediatedRecord, Source};
use crate::normalization::{
    clean_field, extract_year_from_date, extract_year_from_title, normalize_genres,
    normalize_title, parse_count, parse_number, parse_year, scale_rating_to_10,
};
use crate::sources::imdb::{self, ImdbMovie};
use crate::sources::movielens::{self, MovielensMovie};
use crate::sources::tmdb::{self, TmdbSchema, YearColumn};
use crate::table::{field, RawTable};

/// Records mapped from one source plus the rows dropped for a blank id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMapping {
    pub records: Vec<MediatedRecord>,
    pub skipped: usize,
}

impl SourceMapping {
    fn new(source: Source, records: Vec<MediatedRecord>, skipped: usize) -> Self {
        if skipped > 0 {
            warn!(%source, skipped, "skipped rows with a blank source id");
        }
        Self { records, skipped }
    }
}

/// The stacked mediated table and, per source, how many rows had no id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediationOutcome {
    pub records: Vec<MediatedRecord>,
    pub skipped_blank_ids: IndexMap<Source, usize>,
}

pub fn map_imdb(rows: &[ImdbMovie]) -> SourceMapping {
    let mut skipped = 0usize;
    let records: Vec<MediatedRecord> = rows
        .iter()
        .filter_map(|row| {
            let Some(id) = clean_field(&row.tconst) else {
                skipped += 1;
                return None;
            };
            let source = Source::Imdb;
            Some(MediatedRecord {
                title_norm: normalize_title(row.primary_title.as_deref()),
                year: row.start_year.as_deref().and_then(parse_year),
                genres_norm: normalize_genres(row.genres.as_deref(), source),
                rating_value: scale_rating_to_10(
                    row.average_rating.as_deref().and_then(parse_number),
                    source,
                ),
                rating_count: row.num_votes.as_deref().and_then(parse_count),
                ..MediatedRecord::new(source, id)
            })
        })
        .collect();
    SourceMapping::new(Source::Imdb, records, skipped)
}

pub fn map_movielens(rows: &[MovielensMovie]) -> SourceMapping {
    let mut skipped = 0usize;
    let records: Vec<MediatedRecord> = rows
        .iter()
        .filter_map(|row| {
            let Some(id) = clean_field(&row.movie_id) else {
                skipped += 1;
                return None;
            };
            let source = Source::Movielens;
            let title = row.title.as_deref();
            Some(MediatedRecord {
                title_norm: normalize_title(title),
                year: title.and_then(extract_year_from_title),
                genres_norm: normalize_genres(row.genres.as_deref(), source),
                rating_value: scale_rating_to_10(row.rating_mean, source),
                rating_count: row.rating_count,
                ..MediatedRecord::new(source, id)
            })
        })
        .collect();
    SourceMapping::new(Source::Movielens, records, skipped)
}

/// Maps whatever TMDb export shape was loaded. An empty table yields no
/// records rather than an error.
pub fn map_tmdb(table: &RawTable) -> SourceMapping {
    if table.is_empty() {
        return SourceMapping::default();
    }
    let schema = TmdbSchema::resolve(table.headers());
    let source = Source::Tmdb;
    let mut skipped = 0usize;

    let records: Vec<MediatedRecord> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let get = |idx: Option<usize>| field(row, idx).and_then(clean_field);
            let Some(id) = get(schema.id) else {
                skipped += 1;
                return None;
            };
            let year = match schema.year {
                YearColumn::ReleaseDate(idx) => get(Some(idx)).and_then(extract_year_from_date),
                YearColumn::Year(idx) => get(Some(idx)).and_then(parse_year),
                YearColumn::Absent => None,
            };
            Some(MediatedRecord {
                title_norm: normalize_title(get(schema.title)),
                year,
                genres_norm: normalize_genres(get(schema.genres), source),
                rating_value: scale_rating_to_10(
                    get(schema.vote_average).and_then(parse_number),
                    source,
                ),
                rating_count: get(schema.vote_count).and_then(parse_count),
                popularity: get(schema.popularity).and_then(parse_number),
                budget: get(schema.budget).and_then(parse_number),
                revenue: get(schema.revenue).and_then(parse_number),
                ..MediatedRecord::new(source, id)
            })
        })
        .collect();
    SourceMapping::new(source, records, skipped)
}

/// Source-native tables feeding one mediation run.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub imdb: Vec<ImdbMovie>,
    pub movielens: Vec<MovielensMovie>,
    pub tmdb: RawTable,
}

/// Load every source. IMDb and MovieLens are required; a missing TMDb export
/// is logged and replaced by an empty table.
pub fn load_sources(cfg: &PipelineConfig) -> PipelineResult<SourceTables> {
    let imdb = imdb::load(cfg)?;
    let movielens = movielens::load_movies(cfg)?;
    let tmdb = match tmdb::load(cfg) {
        Ok(table) => table,
        Err(PipelineError::MissingSource { path, .. }) => {
            warn!(path = %path.display(), "TMDb export not found; proceeding without TMDb");
            RawTable::default()
        }
        Err(e) => return Err(e),
    };
    Ok(SourceTables {
        imdb,
        movielens,
        tmdb,
    })
}

/// Map all sources and stack them in the fixed order IMDb, MovieLens, TMDb.
/// The mappers share nothing, so `parallel` only changes scheduling.
pub fn mediate(tables: &SourceTables, parallel: bool) -> MediationOutcome {
    let (imdb, (movielens, tmdb)) = if parallel {
        rayon::join(
            || map_imdb(&tables.imdb),
            || {
                rayon::join(
                    || map_movielens(&tables.movielens),
                    || map_tmdb(&tables.tmdb),
                )
            },
        )
    } else {
        (
            map_imdb(&tables.imdb),
            (map_movielens(&tables.movielens), map_tmdb(&tables.tmdb)),
        )
    };

    info!(
        imdb = imdb.records.len(),
        movielens = movielens.records.len(),
        tmdb = tmdb.records.len(),
        "mapped sources into mediated schema"
    );

    let mut outcome = MediationOutcome {
        records: Vec::with_capacity(
            imdb.records.len() + movielens.records.len() + tmdb.records.len(),
        ),
        skipped_blank_ids: IndexMap::with_capacity(Source::ALL.len()),
    };
    for (source, mapping) in [
        (Source::Imdb, imdb),
        (Source::Movielens, movielens),
        (Source::Tmdb, tmdb),
    ] {
        outcome.records.extend(mapping.records);
        outcome.skipped_blank_ids.insert(source, mapping.skipped);
    }
    outcome
}

/// Full mediator stage: load sources, then map and stack them.
pub fn build_mediated_table(cfg: &PipelineConfig) -> PipelineResult<MediationOutcome> {
    let tables = load_sources(cfg)?;
    if !cfg.parallel_mediation || cfg.threads == 0 {
        return Ok(mediate(&tables, cfg.parallel_mediation));
    }
    match ThreadPoolBuilder::new().num_threads(cfg.threads).build() {
        Ok(pool) => Ok(pool.install(|| mediate(&tables, true))),
        Err(e) => {
            warn!(threads = cfg.threads, error = %e, "could not build mediation pool; using global pool");
            Ok(mediate(&tables, true))
        }
    }
}
