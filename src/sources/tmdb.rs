use csv::StringRecord;
use tracing::info;

use super::ensure_exists;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::model::Source;
use crate::table::RawTable;

/// How the release year can be read from a TMDb dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearColumn {
    /// Full date (`YYYY-MM-DD`); the first four characters carry the year.
    ReleaseDate(usize),
    /// Literal integer year.
    Year(usize),
    Absent,
}

/// Which column plays which role in a particular TMDb export.
///
/// TMDb dumps drift between exports, so the roles are resolved once per
/// table from its header and the mapper only ever consults this descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmdbSchema {
    pub id: Option<usize>,
    pub title: Option<usize>,
    pub genres: Option<usize>,
    pub year: YearColumn,
    pub vote_average: Option<usize>,
    pub vote_count: Option<usize>,
    pub popularity: Option<usize>,
    pub budget: Option<usize>,
    pub revenue: Option<usize>,
}

const GENRE_COLUMNS: [&str; 2] = ["genre_names", "genres"];
const ID_COLUMNS: [&str; 2] = ["id", "tmdbId"];

impl TmdbSchema {
    pub fn resolve(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let first_of = |names: &[&str]| names.iter().find_map(|n| find(*n));

        let year = match (find("release_date"), find("year")) {
            (Some(idx), _) => YearColumn::ReleaseDate(idx),
            (None, Some(idx)) => YearColumn::Year(idx),
            (None, None) => YearColumn::Absent,
        };

        Self {
            // Unknown exports: the first column is the best guess for the id.
            id: first_of(&ID_COLUMNS).or(if headers.is_empty() { None } else { Some(0) }),
            title: find("title"),
            genres: first_of(&GENRE_COLUMNS),
            year,
            vote_average: find("vote_average"),
            vote_count: find("vote_count"),
            popularity: find("popularity"),
            budget: find("budget"),
            revenue: find("revenue"),
        }
    }
}

/// Raw TMDb table. A missing file surfaces as `MissingSource` so the caller
/// can decide whether TMDb is optional.
pub fn load(cfg: &PipelineConfig) -> PipelineResult<RawTable> {
    let path = cfg.tmdb_movies();
    ensure_exists(Source::Tmdb, &path)?;
    let table = RawTable::read_csv(&path)?;
    info!(rows = table.len(), path = %path.display(), "loaded TMDb export");
    Ok(table)
}
