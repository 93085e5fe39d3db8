//! Tabular input and output: CSV in, annotated CSV out.
//!
//! ## Row model
//!
//! A [`Row`] is an insertion-ordered string map. Order matters twice: the
//! exported header is built from the first row's key order, and the `Review`
//! column must sit directly after the original columns. Inserting a key that
//! already exists replaces the value in place, so an input column that happens
//! to be called `Review` or `error` keeps its position.
//!
//! ## Header accumulation
//!
//! Result rows do not all carry the same keys (a failed row has `error` but no
//! score columns; a row without scores has no `Total Score`). The export
//! header is every key of the first row in order, then any key first seen in a
//! later row, in first-seen order. Cells for keys a row lacks are empty.

use crate::error::ReviewError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Default file name for exported results.
pub const DEFAULT_EXPORT_FILE: &str = "graphics-review-results.csv";

/// One record, keyed by column name, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    entries: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Set `key` to `value`. Existing keys keep their position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Insert every pair of `fields` in order.
    pub fn extend<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in fields {
            self.insert(k, v);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        row.extend(iter);
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A parsed spreadsheet: rows plus the header's column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Row>,
    pub fields: Vec<String>,
}

impl Table {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }
}

/// Parse delimited text with a header line. All values stay text.
///
/// Fully empty lines are skipped. A record shorter than the header yields a
/// row without the trailing columns; values beyond the header are dropped.
pub fn parse_csv<R: Read>(reader: R) -> Result<Table, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let fields: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows: Vec<Row> = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() > fields.len() {
            debug!(
                "CSV record {} has {} values for {} columns; extra values ignored",
                i + 1,
                record.len(),
                fields.len()
            );
        }
        rows.push(fields.iter().cloned().zip(record.iter().map(str::to_string)).collect());
    }

    Ok(Table { rows, fields })
}

/// Read and parse a CSV file from disk.
pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Table, ReviewError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| ReviewError::CsvRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let table = parse_csv(std::io::BufReader::new(file)).map_err(|e| ReviewError::CsvRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    info!(
        "Loaded {} rows with {} columns from {}",
        table.rows.len(),
        table.fields.len(),
        path.display()
    );
    Ok(table)
}

/// Export header: first row's keys in order, then new keys in first-seen order.
pub fn collect_headers<'a, I>(rows: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.to_string());
            }
        }
    }
    headers
}

/// Write rows as CSV. Fields are quoted only when they contain a comma,
/// a quote or a line break; records are separated by `\n`.
pub fn write_csv<'a, W, I>(writer: W, rows: I) -> Result<(), csv::Error>
where
    W: Write,
    I: IntoIterator<Item = &'a Row>,
    I::IntoIter: Clone,
{
    let rows = rows.into_iter();
    let headers = collect_headers(rows.clone());

    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(&headers)?;
    for row in rows {
        wtr.write_record(headers.iter().map(|h| row.get(h).unwrap_or("")))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render rows to an in-memory CSV string.
pub fn to_csv_string<'a, I>(rows: I) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = &'a Row>,
    I::IntoIter: Clone,
{
    let mut buf = Vec::new();
    write_csv(&mut buf, rows)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Save rows to `path`.
///
/// Does nothing and returns `Ok(false)` when `rows` is empty. The file is
/// written to a temp file beside the target and renamed into place, so a
/// failed export never leaves a half-written CSV.
pub fn export_csv(path: impl AsRef<Path>, rows: &[Row]) -> Result<bool, ReviewError> {
    let path = path.as_ref();
    if rows.is_empty() {
        debug!("No result rows; skipping export to {}", path.display());
        return Ok(false);
    }

    let write_err = |source: std::io::Error| ReviewError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    write_csv(&mut tmp, rows).map_err(|e| write_err(std::io::Error::other(e)))?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(true)
}
