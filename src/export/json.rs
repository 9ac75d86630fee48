//! JSON export document

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{RecordClass, RecordSet};

use super::ExportMetadata;

#[derive(Serialize)]
struct JsonExport<'a> {
    export_metadata: &'a ExportMetadata,
    data: Map<String, Value>,
}

/// Pretty-printed `{export_metadata, data}` document.
///
/// `data` holds exactly the requested classes, in request order, each as the
/// aggregated record list (possibly empty).
pub fn render(metadata: &ExportMetadata, records: &RecordSet, classes: &[RecordClass]) -> Result<Vec<u8>> {
    let mut data = Map::new();
    for class in classes {
        data.insert(class.as_str().to_string(), serde_json::to_value(records.get(*class))?);
    }
    Ok(serde_json::to_vec_pretty(&JsonExport { export_metadata: metadata, data })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExportFormat, ExtractorKind, Record};
    use serde_json::json;

    #[test]
    fn test_document_shape() {
        let metadata = ExportMetadata {
            export_id: "x1".into(),
            case_id: "c1".into(),
            exported_at: "2024-01-01T00:00:00.000000Z".into(),
            data_types: vec![RecordClass::CallLogs, RecordClass::Messages],
            format: ExportFormat::Json,
        };
        let mut records = RecordSet::new();
        records.push(
            RecordClass::Messages,
            Record::new(ExtractorKind::Relational, "sms", [("date".to_string(), json!(1_700_000_000_000i64))]),
        );
        records.push(
            RecordClass::Contacts,
            Record::new(ExtractorKind::Relational, "contacts", [("name".to_string(), json!("Ann"))]),
        );

        let bytes = render(&metadata, &records, &metadata.data_types).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["export_metadata"]["format"], json!("json"));
        assert_eq!(doc["export_metadata"]["data_types"], json!(["call_logs", "messages"]));
        assert_eq!(doc["data"]["messages"][0]["date"], json!(1_700_000_000_000i64));
        assert_eq!(doc["data"]["call_logs"], json!([]));
        assert!(doc["data"].get("contacts").is_none());

        let keys: Vec<&String> = doc["data"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["call_logs", "messages"]);
    }
}
