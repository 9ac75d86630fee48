//! MOBEX - mobile evidence extraction and forensic export
//!
//! Pulls messages, contacts and call logs out of handset artifacts (SQLite
//! databases, property lists, ZIP backups), keeps them per case, and exports
//! them as digested JSON or CSV.

pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod extract;
pub mod ledger;
pub mod logging;
pub mod models;

pub use config::EngineConfig;
pub use engine::{EvidenceEngine, IngestReceipt};
pub use error::{EngineError, Result};
pub use export::{ExportArtifact, ExportRequest};
pub use extract::Extractor;
pub use ledger::{Ledger, MemoryLedger, SqliteLedger};
pub use models::{
    Case, EvidenceItem, ExportFormat, ExportRecord, ExtractionDiagnostic, ExtractionOutcome, Record, RecordClass,
    RecordSet,
};
