//! CSV persistence for raw source tables and pipeline artifacts.
//!
//! Every write lands in a temp file next to the target and is renamed into
//! place only after the whole table has been flushed, so a failed stage never
//! leaves a truncated artifact behind for the next run to pick up.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// A row type persisted as one artifact file.
pub trait TableRow: Serialize + DeserializeOwned {
    /// Human-readable artifact name used in errors and logs.
    const ARTIFACT: &'static str;
    /// Full column set, written as the header even when there are no rows.
    const COLUMNS: &'static [&'static str];
    /// Columns a reader refuses to go without.
    const REQUIRED: &'static [&'static str];
}

/// Header-indexed table whose schema is only known at runtime.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            headers: headers.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    pub fn read_csv(path: &Path) -> PipelineResult<Self> {
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::with_capacity(1 << 20, file))?;
        debug!(rows = table.len(), path = %path.display(), "read raw table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> PipelineResult<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let rows = rdr.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn require_column(&self, artifact: &str, name: &str) -> PipelineResult<usize> {
        self.column(name)
            .ok_or_else(|| PipelineError::missing_column(artifact, name))
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn push(&mut self, row: StringRecord) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> PipelineResult<()> {
        publish_atomically(path, |file| {
            let mut wtr = WriterBuilder::new().flexible(true).from_writer(file);
            wtr.write_record(&self.headers)?;
            for row in &self.rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
            Ok(())
        })
    }
}

/// Field of `row` at `idx`, tolerating short (ragged) rows.
pub fn field(row: &StringRecord, idx: Option<usize>) -> Option<&str> {
    row.get(idx?)
}

/// Write `path` through a sibling temp file and rename it into place on success.
pub fn publish_atomically<F>(path: &Path, write: F) -> PipelineResult<()>
where
    F: FnOnce(&mut File) -> PipelineResult<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

pub fn read_records<T: TableRow>(path: &Path) -> PipelineResult<Vec<T>> {
    read_records_from(File::open(path)?)
}

pub fn read_records_from<T: TableRow, R: Read>(reader: R) -> PipelineResult<Vec<T>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    for column in T::REQUIRED {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(PipelineError::missing_column(T::ARTIFACT, *column));
        }
    }
    let rows = rdr.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

pub fn write_records<T: TableRow>(path: &Path, rows: &[T]) -> PipelineResult<()> {
    publish_atomically(path, |file| {
        let mut wtr = WriterBuilder::new().has_headers(true).from_writer(file);
        if rows.is_empty() {
            wtr.write_record(T::COLUMNS)?;
        }
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Memoized stage: reuse the artifact at `path` when present, otherwise build and persist it.
pub fn load_or_build<T, F>(path: &Path, build: F) -> PipelineResult<Vec<T>>
where
    T: TableRow,
    F: FnOnce() -> PipelineResult<Vec<T>>,
{
    if path.exists() {
        let rows = read_records::<T>(path)?;
        info!(artifact = T::ARTIFACT, rows = rows.len(), path = %path.display(), "loaded cached artifact");
        return Ok(rows);
    }
    let rows = build()?;
    write_records(path, &rows)?;
    info!(artifact = T::ARTIFACT, rows = rows.len(), path = %path.display(), "saved artifact");
    Ok(rows)
}

/// Same as [`load_or_build`] for tables without a fixed row type.
pub fn load_or_build_raw<F>(path: &Path, build: F) -> PipelineResult<RawTable>
where
    F: FnOnce() -> PipelineResult<RawTable>,
{
    if path.exists() {
        let table = RawTable::read_csv(path)?;
        info!(rows = table.len(), path = %path.display(), "loaded cached table");
        return Ok(table);
    }
    let table = build()?;
    table.write_csv(path)?;
    info!(rows = table.len(), path = %path.display(), "saved table");
    Ok(table)
}

/// Delete an artifact so the next run rebuilds it. Returns whether anything was removed.
pub fn remove_artifact(path: &Path) -> PipelineResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed artifact");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediatedRecord;
    use crate::model::Source;

    #[test]
    fn raw_table_indexes_columns_and_tolerates_ragged_rows() {
        let data = "id,title,extra\n1,Heat\n2,Ronin,x\n";
        let table = RawTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let extra = table.column("extra");
        assert_eq!(extra, Some(2));
        assert_eq!(field(&table.rows()[0], extra), None);
        assert_eq!(field(&table.rows()[1], extra), Some("x"));
        assert!(table.require_column("tmdb", "missing").is_err());
    }

    #[test]
    fn empty_typed_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediated.csv");
        write_records::<MediatedRecord>(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.trim_end(),
            "temp_id,source,source_id,title_norm,year,genres_norm,rating_value,rating_count,popularity,budget,revenue"
        );
        let back: Vec<MediatedRecord> = read_records(&path).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn load_or_build_reuses_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mediated.csv");

        let built = load_or_build(&path, || Ok(vec![MediatedRecord::new(Source::Tmdb, "862")]))
            .unwrap();
        assert_eq!(built.len(), 1);

        let cached: Vec<MediatedRecord> =
            load_or_build(&path, || panic!("should not rebuild")).unwrap();
        assert_eq!(cached, built);

        assert!(remove_artifact(&path).unwrap());
        assert!(!remove_artifact(&path).unwrap());
        let rebuilt: Vec<MediatedRecord> = load_or_build(&path, || Ok(Vec::new())).unwrap();
        assert!(rebuilt.is_empty());
    }

    #[test]
    fn failed_write_leaves_previous_artifact_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        fs::write(&path, "a\n1\n").unwrap();

        let result = publish_atomically(&path, |file| {
            use std::io::Write;
            file.write_all(b"partial")?;
            Err(PipelineError::missing_column("test", "boom"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n1\n");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn typed_reader_reports_missing_required_column() {
        let data = "temp_id,source\nimdb:tt1,imdb\n";
        let err = read_records_from::<MediatedRecord, _>(data.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "source_id"));
    }
}
