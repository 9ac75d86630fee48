//! Forensic Audit Logging
//!
//! Chain-of-custody events are emitted under the `forensic_audit` target so
//! they can be routed separately from operational logs, e.g.
//! `RUST_LOG=forensic_audit=info`.

use tracing::{info, warn, span, Level};

use crate::models::{ExportRecord, ExtractionDiagnostic};

use super::time::now_forensic;

/// Log case registration
pub fn log_case_created(case_id: &str, case_name: &str, investigator: &str) {
    info!(
        target: "forensic_audit",
        operation = "case_create",
        case_id = case_id,
        case_name = case_name,
        investigator = investigator,
        timestamp = %now_forensic(),
        "Case created"
    );
}

/// Log evidence ingestion with its acquisition digest
pub fn log_evidence_ingested(
    case_id: &str,
    evidence_id: &str,
    filename: &str,
    file_size: u64,
    file_hash: &str,
) {
    let _span = span!(
        Level::INFO,
        "evidence_ingest",
        case_id = case_id,
        evidence_id = evidence_id,
    ).entered();

    info!(
        target: "forensic_audit",
        operation = "evidence_ingest",
        filename = filename,
        file_size = file_size,
        file_hash = file_hash,
        timestamp = %now_forensic(),
        "Evidence ingested"
    );
}

/// Log a table or file that could not be extracted
pub fn log_extraction_degraded(diagnostic: &ExtractionDiagnostic) {
    warn!(
        target: "forensic_audit",
        operation = "extraction_degraded",
        scope = %diagnostic.scope,
        location = %diagnostic.location,
        message = %diagnostic.message,
        timestamp = %now_forensic(),
        "Extraction degraded"
    );
}

/// Log export creation
pub fn log_export_created(record: &ExportRecord, bytes_exported: u64) {
    info!(
        target: "forensic_audit",
        operation = "data_export",
        export_id = %record.export_id,
        case_id = %record.case_id,
        format = %record.format,
        data_types = ?record.data_types,
        file_hash = %record.file_hash,
        bytes_exported = bytes_exported,
        timestamp = %now_forensic(),
        "Forensic export created"
    );
}

/// Log hash verification of an artifact
pub fn log_hash_verification(
    identifier: &str,
    algorithm: &str,
    computed_hash: &str,
    expected_hash: &str,
    verified: bool,
) {
    let status = if verified { "VERIFIED" } else { "MISMATCH" };

    info!(
        target: "forensic_audit",
        operation = "hash_verification",
        identifier = identifier,
        algorithm = algorithm,
        computed_hash = computed_hash,
        expected_hash = expected_hash,
        status = status,
        timestamp = %now_forensic(),
        "Hash verification completed"
    );
}
