//! Relational (SQLite) extraction
//!
//! Handset databases vary by vendor and app version, so tables are found by
//! name through the ranked alias lists in the schema catalog. Every alias
//! that exists is read, not just the first one: an old `sms` table and a
//! newer `messages` table can both hold live data.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Number, Value};
use tracing::{debug, trace};

use crate::config::{EngineConfig, TableMapping};
use crate::models::{
    DiagnosticScope, ExtractionDiagnostic, ExtractionOutcome, ExtractorKind, Record, RecordClass,
};

/// Open a database read-only; evidence files are never written
fn open_evidence_db(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// List table and view names from the schema catalog
pub fn list_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'view')")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Extract messages, contacts and call logs from one database file.
///
/// Never fails: an unreadable file yields an empty record set with an
/// artifact diagnostic, and a broken table only loses that table.
pub fn extract_database(path: &Path, config: &EngineConfig) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::new();
    let location = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let conn = match open_evidence_db(path) {
        Ok(conn) => conn,
        Err(e) => {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                &location,
                format!("Failed to open database: {e}"),
            ));
            return outcome;
        }
    };

    let tables = match list_tables(&conn) {
        Ok(tables) => tables,
        Err(e) => {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                &location,
                format!("Not a readable relational database: {e}"),
            ));
            return outcome;
        }
    };
    debug!(file = %location, tables = tables.len(), "Discovered database catalog");

    // A table feeds at most one class so no row is exported twice
    let mut claimed: HashSet<String> = HashSet::new();

    for class in RecordClass::ALL {
        for mapping in config.catalog.mappings(class) {
            let Some(table) = tables.iter().find(|t| t.eq_ignore_ascii_case(&mapping.table)) else {
                trace!(file = %location, alias = %mapping.table, "Alias not present");
                continue;
            };
            if !claimed.insert(table.to_lowercase()) {
                debug!(file = %location, table = %table, class = %class, "Table already claimed by another class");
                continue;
            }

            let table_location = format!("{location}:{table}");
            match extract_table(&conn, table, mapping, config.limits.max_rows_per_table) {
                Ok(TableRows { records, truncated }) => {
                    debug!(file = %location, table = %table, class = %class, rows = records.len(), "Extracted table");
                    for record in records {
                        outcome.records.push(class, record);
                    }
                    if truncated {
                        outcome.degrade(ExtractionDiagnostic::new(
                            DiagnosticScope::Table,
                            &table_location,
                            format!("Row limit of {} reached; remaining rows skipped", config.limits.max_rows_per_table),
                        ));
                    }
                }
                Err(e) => {
                    outcome.degrade(ExtractionDiagnostic::new(
                        DiagnosticScope::Table,
                        &table_location,
                        format!("Failed to read table: {e}"),
                    ));
                }
            }
        }
    }

    outcome
}

struct TableRows {
    records: Vec<Record>,
    truncated: bool,
}

fn extract_table(
    conn: &Connection,
    table: &str,
    mapping: &TableMapping,
    max_rows: usize,
) -> rusqlite::Result<TableRows> {
    let query = format!("SELECT * FROM {}", quote_identifier(table));
    let mut stmt = conn.prepare(&query)?;
    let fields: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|column| mapping.field_name(column).to_string())
        .collect();

    let mut records = Vec::new();
    let mut truncated = false;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if records.len() >= max_rows {
            truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            values.push((field.clone(), column_value(row.get_ref(i)?)));
        }
        records.push(Record::new(ExtractorKind::Relational, table, values));
    }

    Ok(TableRows { records, truncated })
}

/// Native column value; BLOBs become lowercase hex
fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
