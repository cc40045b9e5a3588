use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;

use crate::table::TableRow;

/// The three catalogs feeding the integrated catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Imdb,
    Movielens,
    Tmdb,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Imdb, Source::Movielens, Source::Tmdb];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Imdb => "imdb",
            Source::Movielens => "movielens",
            Source::Tmdb => "tmdb",
        }
    }

    /// Prefix used when building `temp_id` values (e.g. `ml:1`).
    pub fn temp_prefix(self) -> &'static str {
        match self {
            Source::Imdb => "imdb",
            Source::Movielens => "ml",
            Source::Tmdb => "tmdb",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List of strings persisted as a single `|`-joined CSV field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeList(pub Vec<String>);

impl PipeList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parse(raw: &str) -> Self {
        PipeList(
            raw.split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl Display for PipeList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

impl Serialize for PipeList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PipeList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| PipeList::parse(&s)).unwrap_or_default())
    }
}

/// Written in place of a title that normalized to nothing, so a cached table
/// keeps it apart from a missing title (an empty CSV field). Normalized titles
/// never contain `<`, so the marker cannot collide with a real title.
pub const EMPTY_TITLE_MARKER: &str = "<empty>";

mod title_field {
    use super::EMPTY_TITLE_MARKER;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        title: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match title.as_deref() {
            None => serializer.serialize_none(),
            Some("") => serializer.serialize_str(EMPTY_TITLE_MARKER),
            Some(t) => serializer.serialize_str(t),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|t| if t == EMPTY_TITLE_MARKER { String::new() } else { t }))
    }
}

/// One source observation of a movie, translated into the shared schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatedRecord {
    pub temp_id: String,
    pub source: Source,
    pub source_id: String,
    #[serde(default, with = "title_field")]
    pub title_norm: Option<String>,
    pub year: Option<i32>,
    /// Sorted, de-duplicated lowercase genre tokens joined with `|`.
    #[serde(default)]
    pub genres_norm: String,
    /// Always on the common 0-10 scale.
    pub rating_value: Option<f64>,
    pub rating_count: Option<u64>,
    pub popularity: Option<f64>,
    pub budget: Option<f64>,
    pub revenue: Option<f64>,
}

impl MediatedRecord {
    /// Skeleton record with every optional attribute unknown.
    pub fn new(source: Source, source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        Self {
            temp_id: format!("{}:{}", source.temp_prefix(), source_id),
            source,
            source_id,
            title_norm: None,
            year: None,
            genres_norm: String::new(),
            rating_value: None,
            rating_count: None,
            popularity: None,
            budget: None,
            revenue: None,
        }
    }
}

/// Canonical, cross-source merged movie. `movie_id` is only stable within
/// one generation of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedMovie {
    pub movie_id: u32,
    #[serde(default, with = "title_field")]
    pub title_norm: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub genres_norm: String,
    pub rating_value: Option<f64>,
    #[serde(default)]
    pub rating_count: u64,
    pub popularity: Option<f64>,
    #[serde(default)]
    pub imdb_ids: PipeList,
    #[serde(default)]
    pub movielens_ids: PipeList,
    #[serde(default)]
    pub tmdb_ids: PipeList,
}

impl IntegratedMovie {
    pub fn provenance(&self, source: Source) -> &PipeList {
        match source {
            Source::Imdb => &self.imdb_ids,
            Source::Movielens => &self.movielens_ids,
            Source::Tmdb => &self.tmdb_ids,
        }
    }

    /// Number of sources that contributed at least one record.
    pub fn source_count(&self) -> usize {
        Source::ALL
            .iter()
            .filter(|s| !self.provenance(**s).is_empty())
            .count()
    }
}

/// A user rating projected into canonical `movie_id` space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedRating {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub movie_id: u32,
    pub rating: f64,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl TableRow for MediatedRecord {
    const ARTIFACT: &'static str = "mediated table";
    const COLUMNS: &'static [&'static str] = &[
        "temp_id",
        "source",
        "source_id",
        "title_norm",
        "year",
        "genres_norm",
        "rating_value",
        "rating_count",
        "popularity",
        "budget",
        "revenue",
    ];
    const REQUIRED: &'static [&'static str] = &["temp_id", "source", "source_id"];
}

impl TableRow for IntegratedMovie {
    const ARTIFACT: &'static str = "integrated movies";
    const COLUMNS: &'static [&'static str] = &[
        "movie_id",
        "title_norm",
        "year",
        "genres_norm",
        "rating_value",
        "rating_count",
        "popularity",
        "imdb_ids",
        "movielens_ids",
        "tmdb_ids",
    ];
    const REQUIRED: &'static [&'static str] = &["movie_id"];
}

impl TableRow for IntegratedRating {
    const ARTIFACT: &'static str = "integrated ratings";
    const COLUMNS: &'static [&'static str] = &["userId", "movie_id", "rating", "timestamp"];
    const REQUIRED: &'static [&'static str] = &["userId", "movie_id", "rating"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_id_uses_source_prefix() {
        let rec = MediatedRecord::new(Source::Movielens, "42");
        assert_eq!(rec.temp_id, "ml:42");
        assert_eq!(rec.source_id, "42");
        let rec = MediatedRecord::new(Source::Imdb, "tt0111161");
        assert_eq!(rec.temp_id, "imdb:tt0111161");
    }

    #[test]
    fn pipe_list_skips_blank_segments() {
        let list = PipeList::parse("tt1||tt2| ");
        assert_eq!(list.0, vec!["tt1".to_string(), "tt2".to_string()]);
        assert_eq!(list.to_string(), "tt1|tt2");
        assert!(PipeList::parse("").is_empty());
    }

    #[test]
    fn integrated_movie_csv_round_trip_keeps_provenance() {
        let movie = IntegratedMovie {
            movie_id: 1,
            title_norm: Some("toy story".into()),
            year: Some(1995),
            genres_norm: "animation|comedy".into(),
            rating_value: Some(8.1),
            rating_count: 1950,
            popularity: None,
            imdb_ids: PipeList(vec!["tt1".into()]),
            movielens_ids: PipeList(vec!["1".into(), "7".into()]),
            tmdb_ids: PipeList::default(),
        };

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(&movie).unwrap();
        let bytes = wtr.into_inner().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(
            "movie_id,title_norm,year,genres_norm,rating_value,rating_count,popularity,imdb_ids,movielens_ids,tmdb_ids"
        ));
        assert!(text.contains(",tt1,1|7,"));

        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        let back: IntegratedMovie = rdr.deserialize().next().unwrap().unwrap();
        assert_eq!(back, movie);
        assert_eq!(back.source_count(), 2);
    }

    #[test]
    fn empty_title_survives_csv_apart_from_missing_title() {
        let mut empty = MediatedRecord::new(Source::Imdb, "tt1");
        empty.title_norm = Some(String::new());
        let missing = MediatedRecord::new(Source::Imdb, "tt2");

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.serialize(&empty).unwrap();
        wtr.serialize(&missing).unwrap();
        let bytes = wtr.into_inner().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("imdb:tt1,imdb,tt1,<empty>,"));
        assert!(text.contains("imdb:tt2,imdb,tt2,,"));

        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        let back: Vec<MediatedRecord> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(back, vec![empty, missing]);
    }
}
