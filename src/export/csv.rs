//! CSV export tables
//!
//! One table per record class. Columns are the union of field names across
//! the class's records in first-seen order; a missing field is an empty cell.
//! When more than one table is produced they are bundled into a ZIP with a
//! manifest of per-table digests.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use serde::Serialize;
use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::common::hash::digest;
use crate::error::Result;
use crate::models::{Record, RecordClass};

use super::ExportMetadata;

/// One rendered class table
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub class: RecordClass,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

impl CsvTable {
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.class)
    }
}

#[derive(Serialize)]
struct Manifest<'a> {
    export_metadata: &'a ExportMetadata,
    tables: Vec<ManifestEntry>,
}

#[derive(Serialize)]
struct ManifestEntry {
    file: String,
    class: RecordClass,
    rows: usize,
    sha256: String,
}

/// Union of field names in first-seen order
pub fn columns(records: &[Record]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for name in record.field_names() {
            if seen.insert(name) {
                columns.push(name);
            }
        }
    }
    columns
}

/// Textual form of one field value
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // Nested arrays and objects stay machine-readable
        Some(nested) => nested.to_string(),
    }
}

pub fn render_table(class: RecordClass, records: &[Record]) -> Result<CsvTable> {
    let columns = columns(records);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| cell(record.get(c))))?;
    }
    let bytes = writer.into_inner()?;

    Ok(CsvTable {
        class,
        rows: records.len(),
        bytes,
    })
}

/// Fixed timestamp (1980-01-01, the ZIP epoch) for every entry
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

/// Deterministic ZIP of several tables plus `manifest.json`.
///
/// Entry timestamps are fixed and entries follow table order, so identical
/// input always yields identical bytes (and digest).
pub fn bundle(metadata: &ExportMetadata, tables: &[CsvTable]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = Vec::with_capacity(tables.len());
    for table in tables {
        let file = table.file_name();
        writer.start_file(file.as_str(), entry_options())?;
        writer.write_all(&table.bytes)?;
        entries.push(ManifestEntry {
            file,
            class: table.class,
            rows: table.rows,
            sha256: digest(&table.bytes),
        });
    }

    let manifest = serde_json::to_vec_pretty(&Manifest {
        export_metadata: metadata,
        tables: entries,
    })?;
    writer.start_file("manifest.json", entry_options())?;
    writer.write_all(&manifest)?;

    Ok(writer.finish()?.into_inner())
}
