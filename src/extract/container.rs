//! Container traversal
//!
//! Walks an unpacked backup tree at any depth and feeds every recognized
//! file to its extractor. Results merge in walk order (sorted by file name),
//! so the same tree always yields the same record order, parallel or not.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::models::{DiagnosticScope, ExtractionDiagnostic, ExtractionOutcome};

use super::{archive, document, relational, ArtifactKind, ArtifactPatterns};

/// Extract every recognized file under `root`.
///
/// Nested archives are unpacked under `scope`, the caller's request-scoped
/// working directory; `root` itself is only read. `depth` is the archive
/// nesting level of `root` (0 for the uploaded archive itself).
pub fn extract_container(
    root: &Path,
    scope: &Path,
    config: &EngineConfig,
    patterns: &ArtifactPatterns,
    depth: usize,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::new();
    let candidates = discover_files(root, config, patterns, &mut outcome);
    debug!(root = %root.display(), files = candidates.len(), depth = depth, "Container files discovered");

    let extract_one = |(path, kind): &(PathBuf, ArtifactKind)| -> ExtractionOutcome {
        match kind {
            ArtifactKind::Relational => relational::extract_database(path, config),
            ArtifactKind::Document => document::extract_document(path, config),
            ArtifactKind::Archive => extract_nested_archive(path, scope, config, patterns, depth),
        }
    };

    let partials: Vec<ExtractionOutcome> = if config.parallel {
        candidates.par_iter().map(extract_one).collect()
    } else {
        candidates.iter().map(extract_one).collect()
    };

    for partial in partials {
        outcome.merge(partial);
    }

    info!(
        root = %root.display(),
        messages = outcome.records.summary().messages_count,
        contacts = outcome.records.summary().contacts_count,
        call_logs = outcome.records.summary().call_logs_count,
        degraded = outcome.diagnostics.len(),
        "Container extraction complete"
    );
    outcome
}

/// Recursively list recognized files, capped at `max_container_files`
fn discover_files(
    root: &Path,
    config: &EngineConfig,
    patterns: &ArtifactPatterns,
    outcome: &mut ExtractionOutcome,
) -> Vec<(PathBuf, ArtifactKind)> {
    let max_files = config.limits.max_container_files;
    let mut visited = 0usize;
    let mut candidates = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let location = e
                    .path()
                    .map(|p| relative_display(root, p))
                    .unwrap_or_else(|| root.display().to_string());
                outcome.degrade(ExtractionDiagnostic::new(
                    DiagnosticScope::File,
                    location,
                    format!("Failed to read directory entry: {e}"),
                ));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        visited += 1;
        if visited > max_files {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                root.display().to_string(),
                format!("File limit of {max_files} reached; remaining files skipped"),
            ));
            break;
        }

        let name = entry.file_name().to_string_lossy();
        if let Some(kind) = patterns.classify(&name) {
            candidates.push((entry.into_path(), kind));
        }
    }

    candidates
}

fn extract_nested_archive(
    path: &Path,
    scope: &Path,
    config: &EngineConfig,
    patterns: &ArtifactPatterns,
    depth: usize,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::new();
    let location = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if depth >= config.limits.max_archive_depth {
        outcome.degrade(ExtractionDiagnostic::new(
            DiagnosticScope::File,
            location,
            format!("Nested archive beyond depth {} skipped", config.limits.max_archive_depth),
        ));
        return outcome;
    }

    if let Some(unpacked) = archive::unpack_archive(path, scope, &config.limits, &mut outcome) {
        outcome.merge(extract_container(unpacked.path(), unpacked.path(), config, patterns, depth + 1));
    }
    outcome
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordClass;
    use rusqlite::Connection;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn write_db(path: &Path, sql: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        Connection::open(path).unwrap().execute_batch(sql).unwrap();
    }

    fn write_plist(path: &Path) {
        let mut dict = plist::Dictionary::new();
        dict.insert("Name".into(), plist::Value::String("Ann".into()));
        plist::Value::Dictionary(dict).to_file_binary(path).unwrap();
    }

    fn backup_tree(root: &Path) {
        write_db(&root.join("HomeDomain/Library/SMS/sms.db"), "CREATE TABLE sms (body TEXT); INSERT INTO sms VALUES ('a'), ('b');");
        write_db(&root.join("a/b/c/calls.sqlite3"), "CREATE TABLE call_history (n TEXT); INSERT INTO call_history VALUES ('1');");
        write_plist(&root.join("Info.plist"));
        std::fs::write(root.join("broken.plist"), b"bplist00 truncated").unwrap();
        std::fs::write(root.join("README.txt"), b"ignored").unwrap();
        std::fs::write(root.join("corrupt.db"), b"not a database, just bytes long enough to have a header").unwrap();
    }

    fn config(parallel: bool) -> EngineConfig {
        EngineConfig { parallel, ..EngineConfig::default() }
    }

    #[test]
    fn test_merges_files_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        backup_tree(dir.path());
        let config = config(false);
        let patterns = ArtifactPatterns::from_config(&config).unwrap();

        let outcome = extract_container(dir.path(), scratch.path(), &config, &patterns, 0);
        assert_eq!(outcome.records.count(RecordClass::Messages), 2);
        assert_eq!(outcome.records.count(RecordClass::CallLogs), 1);
        // broken.plist and corrupt.db degrade, their siblings still extract
        assert_eq!(outcome.records.count(RecordClass::Contacts), 1);
        assert_eq!(outcome.records.get(RecordClass::Contacts)[0].origin(), Some("Info.plist"));
        let locations: Vec<&str> = outcome.diagnostics.iter().map(|d| d.location.as_str()).collect();
        assert_eq!(locations, vec!["broken.plist", "corrupt.db"]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        backup_tree(dir.path());
        let sequential = config(false);
        let parallel = config(true);
        let patterns = ArtifactPatterns::from_config(&sequential).unwrap();

        let a = extract_container(dir.path(), scratch.path(), &sequential, &patterns, 0);
        let b = extract_container(dir.path(), scratch.path(), &parallel, &patterns, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_file_limit() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        backup_tree(dir.path());
        let mut config = config(false);
        config.limits.max_container_files = 2;
        let patterns = ArtifactPatterns::from_config(&config).unwrap();

        let outcome = extract_container(dir.path(), scratch.path(), &config, &patterns, 0);
        assert!(outcome.diagnostics.iter().any(|d| d.message.contains("File limit")));
    }

    #[test]
    fn test_nested_archive_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let inner_db = dir.path().join("staging/inner.db");
        write_db(&inner_db, "CREATE TABLE contacts (name TEXT); INSERT INTO contacts VALUES ('Zed');");

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("apps/inner.db", SimpleFileOptions::default()).unwrap();
        writer.write_all(&std::fs::read(&inner_db).unwrap()).unwrap();
        let nested = writer.finish().unwrap().into_inner();

        let tree = dir.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("app_backup.zip"), nested).unwrap();

        let config = config(false);
        let patterns = ArtifactPatterns::from_config(&config).unwrap();
        let outcome = extract_container(&tree, scratch.path(), &config, &patterns, 0);
        assert_eq!(outcome.records.count(RecordClass::Contacts), 1);
        // Evidence tree is never written to
        assert_eq!(std::fs::read_dir(&tree).unwrap().count(), 1);
        assert_eq!(outcome.records.get(RecordClass::Contacts)[0].origin(), Some("contacts"));

        let mut shallow = config.clone();
        shallow.limits.max_archive_depth = 0;
        let outcome = extract_container(&tree, scratch.path(), &shallow, &patterns, 0);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
