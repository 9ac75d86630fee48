//! Structured-document (property list) extraction
//!
//! Binary and XML plists are decoded into a generic JSON tree and wrapped as
//! a single record. Content is not inspected: every parsed document goes to
//! `EngineConfig::document_class` (contacts by default), which is a heuristic
//! and should be reviewed per case.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use tracing::debug;

use crate::common::time::format_forensic;
use crate::config::EngineConfig;
use crate::models::{
    DiagnosticScope, ExtractionDiagnostic, ExtractionOutcome, ExtractorKind, Record, PAYLOAD_FIELD,
};

/// Parse one property list into a record under the configured class
pub fn extract_document(path: &Path, config: &EngineConfig) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::new();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match plist::Value::from_file(path) {
        Ok(value) => {
            let record = Record::new(
                ExtractorKind::StructuredDocument,
                &file_name,
                [(PAYLOAD_FIELD.to_string(), plist_to_json(value))],
            );
            debug!(file = %file_name, class = %config.document_class, "Classified property list by heuristic");
            outcome.records.push(config.document_class, record);
        }
        Err(e) => {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::File,
                file_name,
                format!("Failed to parse property list: {e}"),
            ));
        }
    }

    outcome
}

/// Lossless-as-practical conversion; data blobs become hex, dates RFC 3339
fn plist_to_json(value: plist::Value) -> Value {
    match value {
        plist::Value::Array(items) => Value::Array(items.into_iter().map(plist_to_json).collect()),
        plist::Value::Dictionary(dict) => Value::Object(
            dict.into_iter()
                .map(|(key, value)| (key, plist_to_json(value)))
                .collect(),
        ),
        plist::Value::Boolean(b) => Value::Bool(b),
        plist::Value::Data(bytes) => Value::String(hex::encode(bytes)),
        plist::Value::Date(date) => {
            let instant: DateTime<Utc> = SystemTime::from(date).into();
            Value::String(format_forensic(&instant))
        }
        plist::Value::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        plist::Value::Integer(i) => i
            .as_signed()
            .map(Value::from)
            .or_else(|| i.as_unsigned().map(Value::from))
            .unwrap_or(Value::Null),
        plist::Value::String(s) => Value::String(s),
        plist::Value::Uid(uid) => Value::from(uid.get()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordClass;
    use serde_json::json;

    fn contact_plist() -> plist::Value {
        let mut dict = plist::Dictionary::new();
        dict.insert("First".into(), plist::Value::String("Ann".into()));
        dict.insert("Phones".into(), plist::Value::Array(vec![plist::Value::String("+15550001".into())]));
        dict.insert("Starred".into(), plist::Value::Boolean(true));
        dict.insert("Avatar".into(), plist::Value::Data(vec![0xde, 0xad]));
        dict.insert("Count".into(), plist::Value::Integer(3i64.into()));
        plist::Value::Dictionary(dict)
    }

    #[test]
    fn test_binary_plist_becomes_contact_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AddressBookMe.plist");
        contact_plist().to_file_binary(&path).unwrap();

        let outcome = extract_document(&path, &EngineConfig::default());
        assert!(outcome.diagnostics.is_empty());
        let contacts = outcome.records.get(RecordClass::Contacts);
        assert_eq!(contacts.len(), 1);
        let record = &contacts[0];
        assert_eq!(record.source(), Some("structured-document"));
        assert_eq!(record.origin(), Some("AddressBookMe.plist"));
        assert_eq!(
            record.get("payload"),
            Some(&json!({
                "First": "Ann",
                "Phones": ["+15550001"],
                "Starred": true,
                "Avatar": "dead",
                "Count": 3
            }))
        );
    }

    #[test]
    fn test_xml_plist_and_configured_class() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.plist");
        contact_plist().to_file_xml(&path).unwrap();

        let config = EngineConfig {
            document_class: RecordClass::Messages,
            ..EngineConfig::default()
        };
        let outcome = extract_document(&path, &config);
        assert_eq!(outcome.records.count(RecordClass::Messages), 1);
        assert_eq!(outcome.records.count(RecordClass::Contacts), 0);
    }

    #[test]
    fn test_corrupt_plist_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.plist");
        std::fs::write(&path, b"bplist00\x00\x01garbage").unwrap();

        let outcome = extract_document(&path, &EngineConfig::default());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].scope, DiagnosticScope::File);
        assert_eq!(outcome.diagnostics[0].location, "broken.plist");
    }

    #[test]
    fn test_date_conversion() {
        let date = plist::Date::from(SystemTime::UNIX_EPOCH);
        assert_eq!(plist_to_json(plist::Value::Date(date)), json!("1970-01-01T00:00:00.000000Z"));
    }
}
