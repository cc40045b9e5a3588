//! Entity resolution: mediated records → integrated movies.
//!
//! Records are the same movie iff their `(title_norm, year)` pairs are
//! identical, unknown year included. Groups keep the order in which their key
//! first appears in the mediated table and `movie_id` is the 1-based position
//! of the group in that order.

pub mod remap;

use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::info;

use crate::model::{IntegratedMovie, MediatedRecord, PipeList, Source};
use crate::normalization::union_genres;

/// Equality key for entity resolution.
pub type GroupKey<'a> = (Option<&'a str>, Option<i32>);

fn source_slot(source: Source) -> usize {
    match source {
        Source::Imdb => 0,
        Source::Movielens => 1,
        Source::Tmdb => 2,
    }
}

/// Running merge state for one group.
#[derive(Debug, Default)]
struct MergeAccumulator<'a> {
    members: usize,
    genres: Vec<&'a str>,
    weighted_sum: f64,
    /// Sum of counts over members carrying both a rating and a count.
    weight: u64,
    total_count: u64,
    popularity: Option<f64>,
    provenance: [Vec<String>; 3],
}

impl<'a> MergeAccumulator<'a> {
    fn absorb(&mut self, rec: &'a MediatedRecord) {
        self.members += 1;
        if !rec.genres_norm.is_empty() {
            self.genres.push(&rec.genres_norm);
        }
        if let (Some(rating), Some(count)) = (rec.rating_value, rec.rating_count) {
            self.weighted_sum += rating * count as f64;
            self.weight += count;
        }
        self.total_count += rec.rating_count.unwrap_or(0);
        if let Some(pop) = rec.popularity {
            self.popularity = Some(self.popularity.map_or(pop, |cur| cur.max(pop)));
        }
        self.provenance[source_slot(rec.source)].push(rec.source_id.clone());
    }

    fn finish(self, movie_id: u32, (title_norm, year): GroupKey<'_>) -> IntegratedMovie {
        let rating_value = if self.weight > 0 {
            Some(self.weighted_sum / self.weight as f64)
        } else {
            None
        };
        let [imdb_ids, movielens_ids, tmdb_ids] = self.provenance;
        IntegratedMovie {
            movie_id,
            title_norm: title_norm.map(str::to_string),
            year,
            genres_norm: union_genres(self.genres),
            rating_value,
            rating_count: self.total_count,
            popularity: self.popularity,
            imdb_ids: PipeList(imdb_ids),
            movielens_ids: PipeList(movielens_ids),
            tmdb_ids: PipeList(tmdb_ids),
        }
    }
}

/// Group, merge and number the mediated table.
///
/// Deterministic: the same records in the same order always produce the
/// same `movie_id` assignment.
pub fn integrate_movies(records: &[MediatedRecord]) -> Vec<IntegratedMovie> {
    let mut groups: IndexMap<GroupKey<'_>, MergeAccumulator<'_>> = IndexMap::new();
    for rec in records {
        groups
            .entry((rec.title_norm.as_deref(), rec.year))
            .or_default()
            .absorb(rec);
    }

    let merged = groups.values().filter(|acc| acc.members > 1).count();
    let movies: Vec<IntegratedMovie> = groups
        .into_iter()
        .zip(1u32..)
        .map(|((key, acc), movie_id)| acc.finish(movie_id, key))
        .collect();

    info!(
        records = records.len(),
        movies = movies.len(),
        merged_groups = merged,
        "integrated mediated records"
    );
    movies
}

/// Provenance cover violations: ids whose occurrence count in the catalog's
/// provenance differs from their count in the mediated table.
pub fn provenance_mismatches(
    records: &[MediatedRecord],
    movies: &[IntegratedMovie],
) -> Vec<(Source, String)> {
    let mut balance: HashMap<(Source, &str), i64> = HashMap::new();
    for rec in records {
        *balance.entry((rec.source, rec.source_id.as_str())).or_default() += 1;
    }
    for movie in movies {
        for source in Source::ALL {
            for id in movie.provenance(source).iter() {
                *balance.entry((source, id)).or_default() -= 1;
            }
        }
    }
    let mut mismatches: Vec<(Source, String)> = balance
        .into_iter()
        .filter(|(_, n)| *n != 0)
        .map(|((source, id), _)| (source, id.to_string()))
        .collect();
    mismatches.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
    mismatches
}
