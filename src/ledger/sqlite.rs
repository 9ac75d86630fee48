//! SQLite ledger
//!
//! Handles:
//! - Cases (name, investigator, status)
//! - Evidence (acquisition digests plus the extracted record set as JSON)
//! - Exports (immutable export audit trail)

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::models::{Case, EvidenceItem, ExportRecord};

use super::Ledger;

/// Connection wrapper for thread-safe access
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) a ledger at `path`, creating tables if needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Opening ledger");
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Per-user default location
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mobex")
            .join("ledger.db")
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let ledger = SqliteLedger { conn: Mutex::new(conn) };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Ledger("ledger connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS cases (
                case_id TEXT PRIMARY KEY,
                case_name TEXT NOT NULL,
                investigator TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL
            );

            -- Evidence (data, hashes and diagnostics are JSON documents)
            CREATE TABLE IF NOT EXISTS evidence (
                evidence_id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_hash TEXT NOT NULL,
                hashes TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                data TEXT NOT NULL,
                processed INTEGER NOT NULL,
                diagnostics TEXT NOT NULL,
                FOREIGN KEY (case_id) REFERENCES cases(case_id)
            );

            CREATE TABLE IF NOT EXISTS exports (
                export_id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL,
                exported_at TEXT NOT NULL,
                format TEXT NOT NULL,
                data_types TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                FOREIGN KEY (case_id) REFERENCES cases(case_id)
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_case ON evidence(case_id);
            CREATE INDEX IF NOT EXISTS idx_exports_case ON exports(case_id);
        "#)?;

        Ok(())
    }
}

/// Read a TEXT column holding a JSON document
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a TEXT column through `FromStr`
fn parsed_column<T: std::str::FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<Case> {
    Ok(Case {
        case_id: row.get(0)?,
        case_name: row.get(1)?,
        investigator: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        status: parsed_column(row, 5)?,
    })
}

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<EvidenceItem> {
    let processed: i32 = row.get(8)?;
    Ok(EvidenceItem {
        evidence_id: row.get(0)?,
        case_id: row.get(1)?,
        filename: row.get(2)?,
        file_size: row.get(3)?,
        file_hash: row.get(4)?,
        hashes: json_column(row, 5)?,
        uploaded_at: row.get(6)?,
        data: json_column(row, 7)?,
        processed: processed != 0,
        diagnostics: json_column(row, 9)?,
    })
}

fn export_from_row(row: &Row<'_>) -> rusqlite::Result<ExportRecord> {
    Ok(ExportRecord {
        export_id: row.get(0)?,
        case_id: row.get(1)?,
        exported_at: row.get(2)?,
        format: parsed_column(row, 3)?,
        data_types: json_column(row, 4)?,
        file_hash: row.get(5)?,
    })
}

/// Duplicate primary keys surface as ledger errors, not raw SQLite ones
fn map_insert_error(kind: &str, id: &str, err: rusqlite::Error) -> EngineError {
    match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => {
            EngineError::Ledger(format!("{kind} {id} violates a ledger constraint: {err}"))
        }
        _ => EngineError::Database(err),
    }
}

impl Ledger for SqliteLedger {
    fn insert_case(&self, case: &Case) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cases (case_id, case_name, investigator, description, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                case.case_id, case.case_name, case.investigator,
                case.description, case.created_at, case.status.as_str()
            ],
        )
        .map_err(|e| map_insert_error("case", &case.case_id, e))?;
        Ok(())
    }

    fn get_case(&self, case_id: &str) -> Result<Option<Case>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT case_id, case_name, investigator, description, created_at, status
             FROM cases WHERE case_id = ?1",
        )?;

        let mut rows = stmt.query(params![case_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(case_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn list_cases(&self) -> Result<Vec<Case>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT case_id, case_name, investigator, description, created_at, status
             FROM cases ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], case_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_evidence(&self, item: &EvidenceItem) -> Result<()> {
        let hashes = serde_json::to_string(&item.hashes)?;
        let data = serde_json::to_string(&item.data)?;
        let diagnostics = serde_json::to_string(&item.diagnostics)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO evidence (evidence_id, case_id, filename, file_size, file_hash, hashes,
                                   uploaded_at, data, processed, diagnostics)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.evidence_id, item.case_id, item.filename, item.file_size, item.file_hash,
                hashes, item.uploaded_at, data, item.processed as i32, diagnostics
            ],
        )
        .map_err(|e| map_insert_error("evidence", &item.evidence_id, e))?;
        Ok(())
    }

    fn evidence_for_case(&self, case_id: &str) -> Result<Vec<EvidenceItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT evidence_id, case_id, filename, file_size, file_hash, hashes,
                    uploaded_at, data, processed, diagnostics
             FROM evidence WHERE case_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![case_id], evidence_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_export(&self, record: &ExportRecord) -> Result<()> {
        let data_types = serde_json::to_string(&record.data_types)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO exports (export_id, case_id, exported_at, format, data_types, file_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.export_id, record.case_id, record.exported_at,
                record.format.as_str(), data_types, record.file_hash
            ],
        )
        .map_err(|e| map_insert_error("export", &record.export_id, e))?;
        Ok(())
    }

    fn exports_for_case(&self, case_id: &str) -> Result<Vec<ExportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT export_id, case_id, exported_at, format, data_types, file_hash
             FROM exports WHERE case_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![case_id], export_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
