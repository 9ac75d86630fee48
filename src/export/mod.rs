//! Aggregation and export pipeline
//!
//! Aggregates the requested record classes across every evidence item of a
//! case (ledger order, then each item's own record order), serializes them,
//! and digests the exact bytes handed back to the caller.

pub mod csv;
pub mod json;

use std::io::Cursor;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::common::audit;
use crate::common::hash::{compare_hashes, digest, HashAlgorithm};
use crate::common::time::now_forensic;
use crate::error::{EngineError, Result};
use crate::models::{EvidenceItem, ExportFormat, ExportRecord, RecordClass, RecordSet};

/// Validated export parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub classes: Vec<RecordClass>,
    pub format: ExportFormat,
}

impl ExportRequest {
    /// Parse caller-supplied class names and format tag.
    ///
    /// Classes are deduplicated keeping first occurrence. Unknown names, an
    /// empty list and unsupported formats are all `InvalidFormat`.
    pub fn parse<S: AsRef<str>>(classes: &[S], format: &str) -> Result<Self> {
        let format: ExportFormat = format.parse().map_err(EngineError::InvalidFormat)?;

        let mut parsed: Vec<RecordClass> = Vec::with_capacity(classes.len());
        for name in classes {
            let class: RecordClass = name.as_ref().parse().map_err(EngineError::InvalidFormat)?;
            if !parsed.contains(&class) {
                parsed.push(class);
            }
        }
        if parsed.is_empty() {
            return Err(EngineError::InvalidFormat("No record classes requested".to_string()));
        }

        Ok(Self { classes: parsed, format })
    }
}

/// Metadata embedded in the export body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMetadata {
    pub export_id: String,
    pub case_id: String,
    pub exported_at: String,
    pub data_types: Vec<RecordClass>,
    pub format: ExportFormat,
}

/// Serialized export plus its ledger record
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub record: ExportRecord,
    pub filename: String,
    pub content_type: &'static str,
    body: Vec<u8>,
}

impl ExportArtifact {
    pub fn export_id(&self) -> &str {
        &self.record.export_id
    }

    /// SHA-256 of [`Self::bytes`], advertised out of band
    pub fn file_hash(&self) -> &str {
        &self.record.file_hash
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Stream over the body
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.body.as_slice())
    }

    /// Re-hash the body and compare it with the advertised digest
    pub fn verify(&self) -> Result<()> {
        let computed = digest(&self.body);
        let result = compare_hashes(&computed, &self.record.file_hash);
        audit::log_hash_verification(
            &self.record.export_id,
            HashAlgorithm::Sha256.name(),
            &computed,
            &self.record.file_hash,
            result.is_match(),
        );
        if result.is_match() {
            Ok(())
        } else {
            Err(EngineError::Integrity(format!(
                "export {} digest {} does not match advertised {}",
                self.record.export_id, computed, self.record.file_hash
            )))
        }
    }
}

/// Concatenate the requested classes across evidence items, in order.
///
/// Classes that were not requested stay empty.
pub fn aggregate(evidence: &[EvidenceItem], classes: &[RecordClass]) -> RecordSet {
    let mut aggregated = RecordSet::new();
    for item in evidence {
        for class in classes {
            for record in item.data.get(*class) {
                aggregated.push(*class, record.clone());
            }
        }
    }
    aggregated
}

/// Build an export of `evidence` for `case_id`.
///
/// Nothing is persisted here; the caller stores `artifact.record`.
pub fn build_export(case_id: &str, evidence: &[EvidenceItem], request: &ExportRequest) -> Result<ExportArtifact> {
    if evidence.is_empty() {
        return Err(EngineError::NotFound(format!("No evidence found for case {case_id}")));
    }

    let metadata = ExportMetadata {
        export_id: Uuid::new_v4().to_string(),
        case_id: case_id.to_string(),
        exported_at: now_forensic(),
        data_types: request.classes.clone(),
        format: request.format,
    };
    let records = aggregate(evidence, &request.classes);
    debug!(
        case_id = %case_id,
        evidence_items = evidence.len(),
        records = records.total(),
        "Aggregated export records"
    );

    let (body, filename, content_type) = match request.format {
        ExportFormat::Json => (
            json::render(&metadata, &records, &request.classes)?,
            format!("forensics_export_{}.json", metadata.export_id),
            "application/json",
        ),
        ExportFormat::Csv => render_csv(&metadata, &records, &request.classes)?,
    };

    let record = ExportRecord {
        export_id: metadata.export_id,
        case_id: metadata.case_id,
        exported_at: metadata.exported_at,
        format: metadata.format,
        data_types: metadata.data_types,
        file_hash: digest(&body),
    };
    info!(
        export_id = %record.export_id,
        format = %record.format,
        bytes = body.len(),
        "Export serialized"
    );

    Ok(ExportArtifact {
        record,
        filename,
        content_type,
        body,
    })
}

fn render_csv(
    metadata: &ExportMetadata,
    records: &RecordSet,
    classes: &[RecordClass],
) -> Result<(Vec<u8>, String, &'static str)> {
    let mut tables = Vec::new();
    for class in classes {
        let rows = records.get(*class);
        if !rows.is_empty() {
            tables.push(csv::render_table(*class, rows)?);
        }
    }

    match tables.len() {
        0 => Err(EngineError::InvalidFormat(
            "No records available for the requested classes".to_string(),
        )),
        1 => {
            let table = tables.remove(0);
            let filename = format!("forensics_export_{}_{}.csv", table.class, metadata.export_id);
            Ok((table.bytes, filename, "text/csv"))
        }
        _ => Ok((
            csv::bundle(metadata, &tables)?,
            format!("forensics_export_{}.zip", metadata.export_id),
            "application/zip",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractorKind, Record};
    use serde_json::{json, Value};
    use std::io::Read;

    fn item(id: &str, messages: usize, calls: usize) -> EvidenceItem {
        let mut data = RecordSet::new();
        for i in 0..messages {
            data.push(
                RecordClass::Messages,
                Record::new(ExtractorKind::Relational, "sms", [("body".to_string(), json!(format!("{id}-{i}")))]),
            );
        }
        for i in 0..calls {
            data.push(
                RecordClass::CallLogs,
                Record::new(ExtractorKind::Relational, "calls", [("duration".to_string(), json!(i))]),
            );
        }
        EvidenceItem {
            evidence_id: id.to_string(),
            case_id: "c1".to_string(),
            filename: format!("{id}.db"),
            file_size: 0,
            file_hash: String::new(),
            hashes: Vec::new(),
            uploaded_at: now_forensic(),
            data,
            processed: true,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_request_parsing() {
        let request = ExportRequest::parse(&["Messages", "contacts", "messages"], "JSON").unwrap();
        assert_eq!(request.classes, vec![RecordClass::Messages, RecordClass::Contacts]);
        assert_eq!(request.format, ExportFormat::Json);

        assert!(matches!(ExportRequest::parse(&["messages"], "xml"), Err(EngineError::InvalidFormat(_))));
        assert!(matches!(ExportRequest::parse(&["photos"], "json"), Err(EngineError::InvalidFormat(_))));
        let none: [&str; 0] = [];
        assert!(matches!(ExportRequest::parse(&none, "csv"), Err(EngineError::InvalidFormat(_))));
    }

    #[test]
    fn test_aggregation_order() {
        let evidence = vec![item("a", 2, 1), item("b", 1, 0)];
        let set = aggregate(&evidence, &[RecordClass::Messages]);
        let bodies: Vec<&Value> = set.get(RecordClass::Messages).iter().map(|r| r.get("body").unwrap()).collect();
        assert_eq!(bodies, vec![&json!("a-0"), &json!("a-1"), &json!("b-0")]);
        assert_eq!(set.count(RecordClass::CallLogs), 0);
    }

    #[test]
    fn test_json_export_digest_round_trip() {
        let evidence = vec![item("a", 3, 0), item("b", 3, 0)];
        let request = ExportRequest::parse(&["messages"], "json").unwrap();
        let artifact = build_export("c1", &evidence, &request).unwrap();

        let mut received = Vec::new();
        artifact.reader().read_to_end(&mut received).unwrap();
        assert_eq!(digest(&received), artifact.file_hash());
        artifact.verify().unwrap();

        let doc: Value = serde_json::from_slice(&received).unwrap();
        assert_eq!(doc["data"]["messages"].as_array().unwrap().len(), 6);
        assert_eq!(doc["export_metadata"]["export_id"], json!(artifact.export_id()));
        assert_eq!(artifact.filename, format!("forensics_export_{}.json", artifact.export_id()));
        assert_eq!(artifact.content_type, "application/json");
    }

    #[test]
    fn test_csv_single_and_bundle() {
        let evidence = vec![item("a", 3, 2)];

        let single = build_export("c1", &evidence, &ExportRequest::parse(&["messages", "contacts"], "csv").unwrap()).unwrap();
        assert_eq!(single.content_type, "text/csv");
        assert_eq!(single.filename, format!("forensics_export_messages_{}.csv", single.export_id()));
        let mut reader = ::csv::Reader::from_reader(single.bytes());
        assert_eq!(reader.records().count(), 3);

        let bundle = build_export("c1", &evidence, &ExportRequest::parse(&["call_logs", "messages"], "csv").unwrap()).unwrap();
        assert_eq!(bundle.content_type, "application/zip");
        let archive = zip::ZipArchive::new(bundle.reader()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["call_logs.csv", "messages.csv", "manifest.json"]);
        bundle.verify().unwrap();
    }

    #[test]
    fn test_csv_nothing_to_export() {
        let evidence = vec![item("a", 0, 0)];
        let request = ExportRequest::parse(&["contacts"], "csv").unwrap();
        assert!(matches!(build_export("c1", &evidence, &request), Err(EngineError::InvalidFormat(_))));
    }

    #[test]
    fn test_no_evidence() {
        let request = ExportRequest::parse(&["messages"], "json").unwrap();
        assert!(matches!(build_export("c1", &[], &request), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let request = ExportRequest::parse(&["messages"], "json").unwrap();
        let mut artifact = build_export("c1", &[item("a", 1, 0)], &request).unwrap();
        artifact.body.push(b'\n');
        assert!(matches!(artifact.verify(), Err(EngineError::Integrity(_))));
    }
}
