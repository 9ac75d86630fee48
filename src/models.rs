//! Core data model
//!
//! Records are immutable once an extractor builds them; record sets and the
//! ledger entities only ever grow by appending.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::audit;
use crate::common::hash::HashAlgorithm;

/// Provenance field naming the extractor that produced a record
pub const SOURCE_FIELD: &str = "source";
/// Provenance field naming the originating table or file
pub const ORIGIN_FIELD: &str = "origin";
/// Field holding the parsed tree of a structured document
pub const PAYLOAD_FIELD: &str = "payload";

// =============================================================================
// Record classes
// =============================================================================

/// One of the three recognized evidence categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordClass {
    Messages,
    Contacts,
    CallLogs,
}

impl RecordClass {
    pub const ALL: [RecordClass; 3] = [RecordClass::Messages, RecordClass::Contacts, RecordClass::CallLogs];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordClass::Messages => "messages",
            RecordClass::Contacts => "contacts",
            RecordClass::CallLogs => "call_logs",
        }
    }
}

impl FromStr for RecordClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "messages" => Ok(RecordClass::Messages),
            "contacts" => Ok(RecordClass::Contacts),
            "call_logs" => Ok(RecordClass::CallLogs),
            other => Err(format!(
                "Unknown record class: '{}'. Supported: messages, contacts, call_logs",
                other
            )),
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extractor identity written into the `source` provenance field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Relational,
    StructuredDocument,
}

impl ExtractorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorKind::Relational => "relational",
            ExtractorKind::StructuredDocument => "structured-document",
        }
    }
}

// =============================================================================
// Record
// =============================================================================

/// One extracted row or document, always carrying provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Build a record from raw fields and stamp provenance onto it.
    ///
    /// A raw field that collides with a provenance name is kept as
    /// `raw_<name>` so the provenance value stays authoritative. When the
    /// source already has a `raw_<name>` field, `raw_<name>_1`, `raw_<name>_2`
    /// and so on are tried until a free name is found.
    pub fn new<I>(extractor: ExtractorKind, origin: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let fields: Vec<(String, Value)> = fields.into_iter().collect();
        let taken: HashSet<String> = fields.iter().map(|(name, _)| name.clone()).collect();

        let mut map = Map::new();
        for (name, value) in fields {
            if name == SOURCE_FIELD || name == ORIGIN_FIELD {
                let renamed = free_raw_name(&name, &taken, &map);
                map.insert(renamed, value);
            } else {
                map.insert(name, value);
            }
        }
        map.insert(SOURCE_FIELD.to_string(), Value::String(extractor.as_str().to_string()));
        map.insert(ORIGIN_FIELD.to_string(), Value::String(origin.to_string()));
        Record(map)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Extractor identity (`relational`, `structured-document`)
    pub fn source(&self) -> Option<&str> {
        self.0.get(SOURCE_FIELD).and_then(Value::as_str)
    }

    /// Originating table or file name
    pub fn origin(&self) -> Option<&str> {
        self.0.get(ORIGIN_FIELD).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn free_raw_name(name: &str, taken: &HashSet<String>, map: &Map<String, Value>) -> String {
    let base = format!("raw_{name}");
    let mut candidate = base.clone();
    let mut suffix = 0;
    while taken.contains(&candidate) || map.contains_key(&candidate) {
        suffix += 1;
        candidate = format!("{base}_{suffix}");
    }
    candidate
}

// =============================================================================
// Record set
// =============================================================================

/// Records grouped by class; each record lives in exactly one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    messages: Vec<Record>,
    #[serde(default)]
    contacts: Vec<Record>,
    #[serde(default)]
    call_logs: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: RecordClass) -> &[Record] {
        match class {
            RecordClass::Messages => &self.messages,
            RecordClass::Contacts => &self.contacts,
            RecordClass::CallLogs => &self.call_logs,
        }
    }

    fn collection_mut(&mut self, class: RecordClass) -> &mut Vec<Record> {
        match class {
            RecordClass::Messages => &mut self.messages,
            RecordClass::Contacts => &mut self.contacts,
            RecordClass::CallLogs => &mut self.call_logs,
        }
    }

    pub fn push(&mut self, class: RecordClass, record: Record) {
        self.collection_mut(class).push(record);
    }

    /// Append every collection of `other` after the existing records
    pub fn merge(&mut self, other: RecordSet) {
        let RecordSet { messages, contacts, call_logs } = other;
        self.messages.extend(messages);
        self.contacts.extend(contacts);
        self.call_logs.extend(call_logs);
    }

    pub fn count(&self, class: RecordClass) -> usize {
        self.get(class).len()
    }

    pub fn total(&self) -> usize {
        self.messages.len() + self.contacts.len() + self.call_logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            messages_count: self.messages.len(),
            contacts_count: self.contacts.len(),
            call_logs_count: self.call_logs.len(),
        }
    }
}

/// Per-class record counts reported back to the uploader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub messages_count: usize,
    pub contacts_count: usize,
    pub call_logs_count: usize,
}

// =============================================================================
// Extraction diagnostics
// =============================================================================

/// What a degraded extraction was working on when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticScope {
    /// The whole artifact (not a database, not an archive)
    Artifact,
    /// One table inside a relational database
    Table,
    /// One file found during container traversal
    File,
    /// One entry inside an archive
    ArchiveEntry,
}

impl fmt::Display for DiagnosticScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticScope::Artifact => "artifact",
            DiagnosticScope::Table => "table",
            DiagnosticScope::File => "file",
            DiagnosticScope::ArchiveEntry => "archive_entry",
        };
        f.write_str(name)
    }
}

/// Non-fatal extraction problem: recorded, never raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionDiagnostic {
    pub scope: DiagnosticScope,
    pub location: String,
    pub message: String,
}

impl ExtractionDiagnostic {
    pub fn new(scope: DiagnosticScope, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scope,
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Records extracted from one artifact plus everything that went wrong
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub records: RecordSet,
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

impl ExtractionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a degraded table/file and write it to the audit trail
    pub fn degrade(&mut self, diagnostic: ExtractionDiagnostic) {
        audit::log_extraction_degraded(&diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn merge(&mut self, other: ExtractionOutcome) {
        self.records.merge(other.records);
        self.diagnostics.extend(other.diagnostics);
    }
}

// =============================================================================
// Ledger entities
// =============================================================================

/// Case lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Active,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Active => "active",
            CaseStatus::Closed => "closed",
        }
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CaseStatus::Active),
            "closed" => Ok(CaseStatus::Closed),
            other => Err(format!("Unknown case status: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: String,
    pub case_name: String,
    pub investigator: String,
    pub description: String,
    pub created_at: String,
    pub status: CaseStatus,
}

/// Supplementary digest recorded at ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEntry {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

/// One uploaded artifact and everything extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub evidence_id: String,
    pub case_id: String,
    pub filename: String,
    pub file_size: u64,
    /// SHA-256 of the uploaded bytes, computed once at ingestion
    pub file_hash: String,
    #[serde(default)]
    pub hashes: Vec<HashEntry>,
    pub uploaded_at: String,
    pub data: RecordSet,
    pub processed: bool,
    #[serde(default)]
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

impl EvidenceItem {
    pub fn summary(&self) -> EvidenceSummary {
        EvidenceSummary {
            evidence_id: self.evidence_id.clone(),
            case_id: self.case_id.clone(),
            filename: self.filename.clone(),
            file_size: self.file_size,
            file_hash: self.file_hash.clone(),
            uploaded_at: self.uploaded_at.clone(),
            processed: self.processed,
            summary: self.data.summary(),
            diagnostics_count: self.diagnostics.len(),
        }
    }
}

/// Evidence listing entry without the raw records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceSummary {
    pub evidence_id: String,
    pub case_id: String,
    pub filename: String,
    pub file_size: u64,
    pub file_hash: String,
    pub uploaded_at: String,
    pub processed: bool,
    pub summary: ExtractionSummary,
    pub diagnostics_count: usize,
}

/// Export serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("Unsupported export format: '{s}'. Supported: json, csv")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted metadata of one export; field names are a stable contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub export_id: String,
    pub case_id: String,
    pub exported_at: String,
    pub format: ExportFormat,
    pub data_types: Vec<RecordClass>,
    pub file_hash: String,
}
