//! Case, evidence and export facade
//!
//! Ties extraction and export to the ledger. Only request-level failures
//! (unknown case, bad export request) are errors here; an artifact that
//! yields nothing is still a successful ingest.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::common::audit;
use crate::common::hash::{compute_hash, digest};
use crate::common::time::now_forensic;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::export::{self, ExportArtifact, ExportRequest};
use crate::extract::Extractor;
use crate::ledger::Ledger;
use crate::models::{
    Case, CaseStatus, EvidenceItem, EvidenceSummary, ExportRecord, ExtractionDiagnostic, ExtractionSummary,
    HashEntry,
};

/// Acknowledgment returned for every accepted upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReceipt {
    pub evidence_id: String,
    pub file_hash: String,
    pub summary: ExtractionSummary,
    pub diagnostics: Vec<ExtractionDiagnostic>,
}

pub struct EvidenceEngine {
    extractor: Extractor,
    ledger: Arc<dyn Ledger>,
}

impl EvidenceEngine {
    pub fn new(config: EngineConfig, ledger: Arc<dyn Ledger>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: Extractor::new(config)?,
            ledger,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.extractor.config()
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn create_case(&self, case_name: &str, investigator: &str, description: &str) -> Result<Case> {
        let case = Case {
            case_id: Uuid::new_v4().to_string(),
            case_name: case_name.to_string(),
            investigator: investigator.to_string(),
            description: description.to_string(),
            created_at: now_forensic(),
            status: CaseStatus::Active,
        };
        self.ledger.insert_case(&case)?;
        audit::log_case_created(&case.case_id, &case.case_name, &case.investigator);
        Ok(case)
    }

    pub fn list_cases(&self) -> Result<Vec<Case>> {
        self.ledger.list_cases()
    }

    fn require_case(&self, case_id: &str) -> Result<Case> {
        self.ledger
            .get_case(case_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Case {case_id} not found")))
    }

    /// Hash, extract and record one uploaded artifact
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn ingest(&self, case_id: &str, bytes: &[u8], filename: &str) -> Result<IngestReceipt> {
        self.require_case(case_id)?;

        let file_hash = digest(bytes);
        let hashes = self
            .config()
            .supplementary_hashes
            .iter()
            .map(|algorithm| HashEntry {
                algorithm: *algorithm,
                value: compute_hash(bytes, *algorithm),
            })
            .collect();

        let outcome = self.extractor.extract(bytes, filename);
        let summary = outcome.records.summary();

        let item = EvidenceItem {
            evidence_id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            filename: filename.to_string(),
            file_size: bytes.len() as u64,
            file_hash,
            hashes,
            uploaded_at: now_forensic(),
            data: outcome.records,
            processed: true,
            diagnostics: outcome.diagnostics,
        };
        self.ledger.insert_evidence(&item)?;
        audit::log_evidence_ingested(case_id, &item.evidence_id, &item.filename, item.file_size, &item.file_hash);
        info!(
            evidence_id = %item.evidence_id,
            messages = summary.messages_count,
            contacts = summary.contacts_count,
            call_logs = summary.call_logs_count,
            degraded = item.diagnostics.len(),
            "Evidence processed"
        );

        Ok(IngestReceipt {
            evidence_id: item.evidence_id,
            file_hash: item.file_hash,
            summary,
            diagnostics: item.diagnostics,
        })
    }

    /// Evidence listing without the extracted records
    pub fn evidence_summaries(&self, case_id: &str) -> Result<Vec<EvidenceSummary>> {
        self.require_case(case_id)?;
        Ok(self
            .ledger
            .evidence_for_case(case_id)?
            .iter()
            .map(EvidenceItem::summary)
            .collect())
    }

    /// Aggregate, serialize and record an export.
    ///
    /// The request is validated before any evidence is fetched.
    #[instrument(skip(self, classes))]
    pub fn export<S: AsRef<str>>(&self, case_id: &str, classes: &[S], format: &str) -> Result<ExportArtifact> {
        let request = ExportRequest::parse(classes, format)?;
        self.require_case(case_id)?;

        let evidence = self.ledger.evidence_for_case(case_id)?;
        let artifact = export::build_export(case_id, &evidence, &request)?;
        self.ledger.insert_export(&artifact.record)?;
        audit::log_export_created(&artifact.record, artifact.len() as u64);
        Ok(artifact)
    }

    pub fn export_history(&self, case_id: &str) -> Result<Vec<ExportRecord>> {
        self.require_case(case_id)?;
        self.ledger.exports_for_case(case_id)
    }
}
