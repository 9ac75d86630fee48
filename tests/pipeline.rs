//! End-to-end ingest and export scenarios

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use mobex_lib::common::hash::digest;
use mobex_lib::models::ExtractionSummary;
use mobex_lib::{EngineConfig, EngineError, EvidenceEngine, MemoryLedger, RecordClass, SqliteLedger};
use serde_json::Value;
use zip::write::SimpleFileOptions;

const HANDSET_SCHEMA: &str = "
    CREATE TABLE sms (_id INTEGER PRIMARY KEY, address TEXT, body TEXT, date INTEGER);
    INSERT INTO sms (address, body, date) VALUES
        ('+15550100', 'Meet at 6', 1700000000000),
        ('+15550101', 'ok', 1700000060000),
        ('+15550100', 'running late', 1700000120000);
    CREATE TABLE contacts (name TEXT, number TEXT);
    INSERT INTO contacts VALUES ('Ann', '+15550100'), ('Bo', '+15550101'), ('Cy', NULL);
    CREATE TABLE calls (number TEXT, duration INTEGER, type INTEGER);
    INSERT INTO calls VALUES ('+15550100', 42, 1), ('+15550102', 0, 3), ('+15550101', 310, 2);
";

fn sqlite_bytes(sql: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.db");
    rusqlite::Connection::open(&path).unwrap().execute_batch(sql).unwrap();
    std::fs::read(path).unwrap()
}

fn engine(work: &Path) -> EvidenceEngine {
    let config = EngineConfig {
        work_dir: Some(work.to_path_buf()),
        ..EngineConfig::default()
    };
    EvidenceEngine::new(config, Arc::new(MemoryLedger::new())).unwrap()
}

#[test]
fn handset_database_ingest_and_json_export() {
    let work = tempfile::tempdir().unwrap();
    let engine = engine(work.path());
    let case = engine.create_case("Op Harbor", "J. Doe", "seized handset").unwrap();

    let receipt = engine.ingest(&case.case_id, &sqlite_bytes(HANDSET_SCHEMA), "mmssms.db").unwrap();
    assert_eq!(
        receipt.summary,
        ExtractionSummary { messages_count: 3, contacts_count: 3, call_logs_count: 3 }
    );
    assert!(receipt.diagnostics.is_empty());

    let artifact = engine
        .export(&case.case_id, &["messages", "contacts", "call_logs"], "json")
        .unwrap();
    let mut body = Vec::new();
    artifact.reader().read_to_end(&mut body).unwrap();
    assert_eq!(digest(&body), artifact.file_hash());

    let doc: Value = serde_json::from_slice(&body).unwrap();
    let messages = doc["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["source"], "relational");
    assert_eq!(messages[0]["origin"], "sms");
    assert_eq!(messages[0]["date"], 1700000000000i64);
    assert_eq!(doc["data"]["contacts"][2]["number"], Value::Null);
    assert_eq!(doc["export_metadata"]["case_id"], case.case_id.as_str());

    // Work directory is left empty after every request
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn two_evidence_items_aggregate_in_order() {
    let work = tempfile::tempdir().unwrap();
    let engine = engine(work.path());
    let case = engine.create_case("c", "i", "d").unwrap();

    engine.ingest(&case.case_id, &sqlite_bytes(HANDSET_SCHEMA), "first.db").unwrap();
    engine
        .ingest(
            &case.case_id,
            &sqlite_bytes(
                "CREATE TABLE message (text TEXT, date INTEGER);
                 INSERT INTO message VALUES ('x', 1), ('y', 2), ('z', 3);",
            ),
            "chat.sqlite",
        )
        .unwrap();

    let artifact = engine.export(&case.case_id, &["messages"], "json").unwrap();
    let doc: Value = serde_json::from_slice(artifact.bytes()).unwrap();
    let origins: Vec<&str> = doc["data"]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["origin"].as_str().unwrap())
        .collect();
    assert_eq!(origins, vec!["sms", "sms", "sms", "message", "message", "message"]);
}

#[test]
fn csv_export_rows_match_aggregated_records() {
    let work = tempfile::tempdir().unwrap();
    let engine = engine(work.path());
    let case = engine.create_case("c", "i", "d").unwrap();
    engine.ingest(&case.case_id, &sqlite_bytes(HANDSET_SCHEMA), "handset.db").unwrap();

    let artifact = engine.export(&case.case_id, &["call_logs"], "CSV").unwrap();
    assert_eq!(artifact.content_type, "text/csv");
    let text = std::str::from_utf8(artifact.bytes()).unwrap();
    assert_eq!(text.lines().count(), 1 + 3);

    let mut reader = csv::Reader::from_reader(artifact.bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["number", "duration", "type", "source", "origin"]);
    artifact.verify().unwrap();
}

#[test]
fn multi_class_csv_is_a_bundle() {
    let work = tempfile::tempdir().unwrap();
    let engine = engine(work.path());
    let case = engine.create_case("c", "i", "d").unwrap();
    engine.ingest(&case.case_id, &sqlite_bytes(HANDSET_SCHEMA), "handset.db").unwrap();

    let artifact = engine.export(&case.case_id, &["messages", "contacts"], "csv").unwrap();
    assert_eq!(artifact.content_type, "application/zip");
    assert!(artifact.filename.ends_with(".zip"));

    let mut archive = zip::ZipArchive::new(artifact.reader()).unwrap();
    let mut messages = String::new();
    archive.by_name("messages.csv").unwrap().read_to_string(&mut messages).unwrap();
    assert_eq!(messages.lines().count(), 4);
    assert!(archive.by_name("contacts.csv").is_ok());
    assert!(archive.by_name("manifest.json").is_ok());
}

#[test]
fn unsupported_format_and_empty_case() {
    let work = tempfile::tempdir().unwrap();
    let engine = engine(work.path());
    let case = engine.create_case("c", "i", "d").unwrap();

    let err = engine.export(&case.case_id, &["messages"], "json").unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(err.is_client_error());

    engine.ingest(&case.case_id, &sqlite_bytes(HANDSET_SCHEMA), "handset.db").unwrap();
    let err = engine.export(&case.case_id, &["messages"], "xml").unwrap_err();
    assert!(matches!(err, EngineError::InvalidFormat(_)));
}

#[test]
fn zipped_backup_with_plist_and_corrupt_member() {
    let work = tempfile::tempdir().unwrap();
    let engine = engine(work.path());
    let case = engine.create_case("c", "i", "d").unwrap();

    let mut dict = plist::Dictionary::new();
    dict.insert("FirstName".into(), plist::Value::String("Dee".into()));
    let mut plist_bytes = Vec::new();
    plist::Value::Dictionary(dict).to_writer_binary(&mut plist_bytes).unwrap();

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let entries: [(&str, Vec<u8>); 4] = [
        ("HomeDomain/Library/SMS/sms.db", sqlite_bytes(HANDSET_SCHEMA)),
        ("HomeDomain/Library/Preferences/me.plist", plist_bytes),
        ("AppDomain/broken.sqlite", b"garbage".to_vec()),
        ("Media/DCIM/IMG_0001.JPG", vec![0xff, 0xd8, 0xff]),
    ];
    for (name, data) in &entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    let backup = writer.finish().unwrap().into_inner();

    let receipt = engine.ingest(&case.case_id, &backup, "backup.zip").unwrap();
    assert_eq!(receipt.summary.messages_count, 3);
    assert_eq!(receipt.summary.contacts_count, 3 + 1);
    assert_eq!(receipt.summary.call_logs_count, 3);
    assert_eq!(receipt.diagnostics.len(), 1);
    assert!(receipt.diagnostics[0].location.ends_with("broken.sqlite"));
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn sqlite_ledger_persists_across_engines() {
    let work = tempfile::tempdir().unwrap();
    let ledger_path = work.path().join("ledger/ledger.db");
    let scratch = work.path().join("scratch");
    let config = EngineConfig {
        work_dir: Some(scratch),
        ..EngineConfig::default()
    };

    let case_id = {
        let engine =
            EvidenceEngine::new(config.clone(), Arc::new(SqliteLedger::open(&ledger_path).unwrap())).unwrap();
        let case = engine.create_case("c", "i", "d").unwrap();
        engine.ingest(&case.case_id, &sqlite_bytes(HANDSET_SCHEMA), "handset.db").unwrap();
        case.case_id
    };

    let engine = EvidenceEngine::new(config, Arc::new(SqliteLedger::open(&ledger_path).unwrap())).unwrap();
    let artifact = engine.export(&case_id, &["contacts"], "json").unwrap();
    let doc: Value = serde_json::from_slice(artifact.bytes()).unwrap();
    assert_eq!(doc["data"]["contacts"].as_array().unwrap().len(), 3);

    let history = engine.export_history(&case_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].data_types, vec![RecordClass::Contacts]);
}
