//! Delimiter-separated event tables
//!
//! Event data arrives as delimiter-separated numeric files: a header row
//! naming the fields, then one row of floats per event. Comma-separated
//! `.csv` and tab-separated `.tsv` are supported. Every row must carry the
//! same field set as the header; anything else is incompatible data,
//! reported at load time before any worker is spawned.

use crate::error::{Error, Result};
use crate::shard::{ChunkSharder, Sharder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// An ordered set of named numeric columns, one row per event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    fields: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl EventTable {
    /// Create an empty table with the given field names
    pub fn new(fields: Vec<String>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::MalformedTable("no fields".to_string()));
        }
        for (index, field) in fields.iter().enumerate() {
            if fields[..index].contains(field) {
                return Err(Error::MalformedTable(format!(
                    "duplicate field '{}'",
                    field
                )));
            }
        }

        let columns = vec![Vec::new(); fields.len()];
        Ok(Self { fields, columns })
    }

    /// Field names, in header order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of events (rows)
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Whether the table holds no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One column by field name
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        let index = self.fields.iter().position(|f| f == name)?;
        Some(&self.columns[index])
    }

    /// Append one event; the row must match the field set exactly
    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.fields.len() {
            return Err(Error::MalformedTable(format!(
                "row has {} values, table has {} fields",
                row.len(),
                self.fields.len()
            )));
        }

        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(*value);
        }
        Ok(())
    }

    /// One event as a field-ordered vector
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index]).collect())
    }

    /// Split into `shards` worker-private tables by contiguous chunking
    ///
    /// Every event lands in exactly one shard; shards may be empty when
    /// there are more workers than events.
    pub fn split(&self, shards: usize) -> Vec<EventTable> {
        self.split_with(shards, &ChunkSharder::new())
    }

    /// Split with a caller-chosen sharding strategy
    pub fn split_with(&self, shards: usize, sharder: &dyn Sharder) -> Vec<EventTable> {
        sharder
            .bounds(self.len(), shards)
            .into_iter()
            .map(|range| self.slice(range))
            .collect()
    }

    fn slice(&self, range: Range<usize>) -> EventTable {
        EventTable {
            fields: self.fields.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c[range.clone()].to_vec())
                .collect(),
        }
    }
}

fn delimiter_for(path: &Path) -> Result<u8> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(b','),
        Some("tsv") => Ok(b'\t'),
        other => Err(Error::IncompatibleData {
            path: path.to_path_buf(),
            reason: format!("unsupported extension {:?}", other.unwrap_or("")),
        }),
    }
}

/// Read a delimiter-separated event file into a table
pub fn read_events(path: &Path) -> Result<EventTable> {
    let delimiter = delimiter_for(path)?;
    let file = File::open(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| incompatible(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    // A first row that parses entirely as numbers is data, not a header.
    if headers.iter().all(|h| h.trim().parse::<f64>().is_ok()) {
        return Err(incompatible(path, "no header row found".to_string()));
    }

    let mut table = EventTable::new(headers)?;

    for (row_index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| incompatible(path, e.to_string()))?;

        let mut row = Vec::with_capacity(table.fields().len());
        for value in record.iter() {
            let parsed = value.trim().parse::<f64>().map_err(|_| {
                incompatible(
                    path,
                    format!("non-numeric value '{}' in row {}", value, row_index + 1),
                )
            })?;
            row.push(parsed);
        }

        table
            .push_row(&row)
            .map_err(|_| incompatible(path, format!("ragged row {}", row_index + 1)))?;
    }

    debug!(path = %path.display(), events = table.len(), "event file loaded");
    Ok(table)
}

/// Write a table back out as a delimiter-separated file
///
/// Values are written in their shortest round-trip representation, so a
/// write-then-read cycle reproduces field names and values exactly.
pub fn write_events(path: &Path, table: &EventTable) -> Result<()> {
    let delimiter = delimiter_for(path)?;
    let file = File::create(path)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(file);

    writer
        .write_record(table.fields())
        .map_err(|e| incompatible(path, e.to_string()))?;

    for index in 0..table.len() {
        let row = table.row(index).unwrap_or_default();
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writer
            .write_record(&cells)
            .map_err(|e| incompatible(path, e.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

fn incompatible(path: &Path, reason: String) -> Error {
    Error::IncompatibleData {
        path: path.to_path_buf(),
        reason,
    }
}
