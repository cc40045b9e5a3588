//! Memoized prep pipeline: mediated table → integrated movies → integrated
//! ratings. Each stage reuses its artifact when one is already on disk.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::RatingCoverage;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::integration::remap::{remap_ratings, ProvenanceIndex};
use crate::integration::{integrate_movies, provenance_mismatches};
use crate::mediation::build_mediated_table;
use crate::model::{IntegratedMovie, MediatedRecord, Source};
use crate::sources::movielens;
use crate::table::{load_or_build, load_or_build_raw, publish_atomically, remove_artifact, RawTable};

/// What one pipeline run produced, persisted as `pipeline_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    /// Marks the catalog generation; `movie_id` values are only comparable
    /// between artifacts sharing it.
    pub generated_at: DateTime<Utc>,
    pub mediated_records: usize,
    pub records_per_source: IndexMap<Source, usize>,
    /// Rows dropped per source for a blank id. `None` when the mediated
    /// table came from cache and no source was mapped in this run.
    pub skipped_blank_ids: Option<IndexMap<Source, usize>>,
    pub integrated_movies: usize,
    pub multi_source_movies: usize,
    pub provenance_mismatches: usize,
    pub ratings: RatingCoverage,
}

/// Remove every artifact and loader cache so the next run starts from the raw dumps.
pub fn clean(cfg: &PipelineConfig) -> PipelineResult<usize> {
    let mut removed = 0;
    for path in cfg
        .artifacts()
        .iter()
        .chain(cfg.loader_caches().iter())
        .chain(std::iter::once(&cfg.summary_path()))
    {
        if remove_artifact(path)? {
            removed += 1;
        }
    }
    info!(removed, dir = %cfg.processed_dir.display(), "cleaned processed directory");
    Ok(removed)
}

/// Mediated table, plus the blank-id counts when it was built in this run.
#[derive(Debug, Clone)]
pub struct MediatedStage {
    pub records: Vec<MediatedRecord>,
    pub skipped_blank_ids: Option<IndexMap<Source, usize>>,
}

pub fn mediated_stage(cfg: &PipelineConfig) -> PipelineResult<MediatedStage> {
    let mut skipped_blank_ids = None;
    let records = load_or_build(&cfg.mediated_path(), || {
        let outcome = build_mediated_table(cfg)?;
        skipped_blank_ids = Some(outcome.skipped_blank_ids);
        Ok(outcome.records)
    })?;
    Ok(MediatedStage {
        records,
        skipped_blank_ids,
    })
}

pub fn integrated_stage(
    cfg: &PipelineConfig,
    mediated: &[MediatedRecord],
) -> PipelineResult<Vec<IntegratedMovie>> {
    load_or_build(&cfg.integrated_movies_path(), || Ok(integrate_movies(mediated)))
}

/// Remapped ratings, plus the dropped-row count when the remap ran in this run.
#[derive(Debug, Clone)]
pub struct RatingsStage {
    pub table: RawTable,
    pub dropped: Option<usize>,
}

/// MovieLens ratings rewritten into `movie_id` space.
pub fn ratings_stage(cfg: &PipelineConfig, movies: &[IntegratedMovie]) -> PipelineResult<RatingsStage> {
    let mut dropped = None;
    let table = load_or_build_raw(&cfg.integrated_ratings_path(), || {
        let ratings = movielens::load_ratings(cfg)?;
        let index = ProvenanceIndex::build(movies, Source::Movielens);
        let outcome = remap_ratings(&ratings, &index, movielens::MOVIE_ID_COLUMN)?;
        dropped = Some(outcome.dropped);
        Ok(outcome.table)
    })?;
    Ok(RatingsStage { table, dropped })
}

/// Run all stages, then publish the run summary.
pub fn run(cfg: &PipelineConfig) -> PipelineResult<PipelineSummary> {
    if cfg.fresh {
        clean(cfg)?;
    }

    let MediatedStage {
        records: mediated,
        skipped_blank_ids,
    } = mediated_stage(cfg)?;
    let movies = integrated_stage(cfg, &mediated)?;

    // Cached artifacts from different generations show up here.
    let mismatches = provenance_mismatches(&mediated, &movies);
    if !mismatches.is_empty() {
        warn!(
            mismatches = mismatches.len(),
            "integrated movies do not cover the mediated table exactly; rerun with --fresh"
        );
    }

    let ratings = ratings_stage(cfg, &movies)?;
    // A cached remap carries no counts; compare against the raw ratings cache.
    let dropped = match ratings.dropped {
        Some(dropped) => dropped,
        None => movielens::load_ratings(cfg)?
            .len()
            .saturating_sub(ratings.table.len()),
    };
    let coverage = RatingCoverage::from_table(&ratings.table, dropped)?;

    let mut records_per_source: IndexMap<Source, usize> =
        Source::ALL.iter().map(|s| (*s, 0)).collect();
    for record in &mediated {
        *records_per_source.entry(record.source).or_default() += 1;
    }

    let summary = PipelineSummary {
        generated_at: Utc::now(),
        mediated_records: mediated.len(),
        records_per_source,
        skipped_blank_ids,
        integrated_movies: movies.len(),
        multi_source_movies: movies.iter().filter(|m| m.source_count() > 1).count(),
        provenance_mismatches: mismatches.len(),
        ratings: coverage,
    };
    write_summary(cfg, &summary)?;
    info!(
        movies = summary.integrated_movies,
        ratings_kept = summary.ratings.kept,
        ratings_dropped = summary.ratings.dropped,
        "pipeline finished"
    );
    Ok(summary)
}

fn write_summary(cfg: &PipelineConfig, summary: &PipelineSummary) -> PipelineResult<()> {
    publish_atomically(&cfg.summary_path(), |file| {
        serde_json::to_writer_pretty(file, summary)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_integrated_ratings, Catalog};
    use crate::error::PipelineError;
    use std::fs;
    use std::path::Path;

    fn write_raw(raw: &Path) {
        fs::create_dir_all(raw).unwrap();
        fs::write(
            raw.join("basics_imdb.csv"),
            "tconst,titleType,primaryTitle,startYear,genres\n\
             tt0114709,movie,Toy Story,1995,\"Animation,Comedy\"\n\
             tt0113277,movie,Heat,1995,\"Crime,Drama\"\n",
        )
        .unwrap();
        fs::write(
            raw.join("ratings_imdb.csv"),
            "tconst,averageRating,numVotes\ntt0114709,8.3,900\n",
        )
        .unwrap();
        fs::write(
            raw.join("movies_ml.csv"),
            "movieId,title,genres\n1,Toy Story (1995),Adventure|Animation|Comedy\n",
        )
        .unwrap();
        fs::write(
            raw.join("ratings_ml.csv"),
            "userId,movieId,rating,timestamp\n1,1,4.0,964982703\n2,1,4.0,964982224\n3,999,2.0,964981247\n",
        )
        .unwrap();
        fs::write(
            raw.join("movies_tmdb.csv"),
            "id,title,genres,release_date,vote_average,vote_count,popularity\n\
             862,Toy Story,\"['Animation', 'Family']\",1995-10-30,7.9,1000,21.9\n",
        )
        .unwrap();
    }

    fn config(root: &Path) -> PipelineConfig {
        let raw = root.join("raw");
        write_raw(&raw);
        PipelineConfig::with_dirs(raw, root.join("processed"))
    }

    #[test]
    fn end_to_end_merges_sources_and_remaps_ratings() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let summary = run(&cfg).unwrap();

        assert_eq!(summary.mediated_records, 4);
        assert_eq!(summary.records_per_source[&Source::Tmdb], 1);
        assert_eq!(summary.integrated_movies, 2);
        assert_eq!(summary.multi_source_movies, 1);
        assert_eq!(summary.provenance_mismatches, 0);
        assert_eq!(summary.ratings.kept, 2);
        assert_eq!(summary.ratings.dropped, 1);

        let catalog = Catalog::load(&cfg.integrated_movies_path()).unwrap();
        let toy = catalog.lookup_title("Toy Story").unwrap();
        assert_eq!(toy.movie_id, 1);
        assert_eq!(toy.year, Some(1995));
        assert_eq!(toy.imdb_ids.0, vec!["tt0114709"]);
        assert_eq!(toy.movielens_ids.0, vec!["1"]);
        assert_eq!(toy.tmdb_ids.0, vec!["862"]);
        assert_eq!(toy.rating_count, 1902);
        let rating = toy.rating_value.unwrap();
        assert!((7.9..=8.3).contains(&rating));
        assert_eq!(toy.popularity, Some(21.9));
        assert_eq!(toy.genres_norm, "adventure|animation|comedy|family");

        let heat = catalog.lookup_title("Heat").unwrap();
        assert_eq!(heat.rating_value, None);
        assert_eq!(heat.rating_count, 0);

        let ratings = load_integrated_ratings(&cfg.integrated_ratings_path()).unwrap();
        assert!(ratings.iter().all(|r| r.movie_id == toy.movie_id));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(cfg.summary_path()).unwrap()).unwrap();
        assert_eq!(json["integrated_movies"], 2);
        assert!(json["generated_at"].is_string());
    }

    #[test]
    fn cached_artifacts_survive_removed_raw_data_until_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        let first = run(&cfg).unwrap();

        fs::remove_dir_all(&cfg.raw_dir).unwrap();
        let second = run(&cfg).unwrap();
        assert_eq!(second.integrated_movies, first.integrated_movies);
        assert_eq!(second.ratings, first.ratings);
        assert!(first.skipped_blank_ids.is_some());
        assert!(second.skipped_blank_ids.is_none());

        cfg.fresh = true;
        let err = run(&cfg).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSource { dataset: Source::Imdb, .. }));
        assert!(!cfg.mediated_path().exists());
    }

    #[test]
    fn blank_source_ids_are_counted_in_summary() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(
            cfg.raw_dir.join("movies_tmdb.csv"),
            "id,title,release_date\n862,Toy Story,1995-10-30\n,Nameless,2001-01-01\n  ,Blank,2002-02-02\n",
        )
        .unwrap();

        let summary = run(&cfg).unwrap();
        let skipped = summary.skipped_blank_ids.clone().unwrap();
        assert_eq!(skipped[&Source::Tmdb], 2);
        assert_eq!(skipped[&Source::Imdb], 0);
        assert_eq!(skipped[&Source::Movielens], 0);
        assert_eq!(summary.records_per_source[&Source::Tmdb], 1);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(cfg.summary_path()).unwrap()).unwrap();
        assert_eq!(json["skipped_blank_ids"]["tmdb"], 2);
    }

    #[test]
    fn ratings_stage_reports_drops_only_when_it_remaps() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let mediated = mediated_stage(&cfg).unwrap();
        let movies = integrated_stage(&cfg, &mediated.records).unwrap();

        let built = ratings_stage(&cfg, &movies).unwrap();
        assert_eq!(built.dropped, Some(1));
        assert_eq!(built.table.len(), 2);

        let cached = ratings_stage(&cfg, &movies).unwrap();
        assert_eq!(cached.dropped, None);
        assert_eq!(cached.table.len(), 2);
    }

    #[test]
    fn clean_reports_removed_files() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        assert_eq!(clean(&cfg).unwrap(), 0);
        run(&cfg).unwrap();
        // three artifacts, three loader caches, one summary
        assert_eq!(clean(&cfg).unwrap(), 7);
    }

    #[test]
    fn stale_integrated_artifact_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        run(&cfg).unwrap();

        fs::remove_file(cfg.mediated_path()).unwrap();
        fs::write(
            cfg.raw_dir.join("movies_tmdb.csv"),
            "id,title,release_date\n862,Toy Story,1995-10-30\n11,Star Wars,1977-05-25\n",
        )
        .unwrap();
        let summary = run(&cfg).unwrap();
        assert_eq!(summary.mediated_records, 5);
        assert_eq!(summary.provenance_mismatches, 1);
    }
}
