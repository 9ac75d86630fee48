//! ZIP backup unpacking into request-scoped storage
//!
//! Entries are written under a fresh `TempDir`; the directory and everything
//! in it is removed when the returned handle drops, on success or failure.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::common::path_security::safe_join;
use crate::config::Limits;
use crate::models::{DiagnosticScope, ExtractionDiagnostic, ExtractionOutcome};

/// Unpack `archive_path` into a new temp dir under `scope_root`.
///
/// Returns `None` (with an artifact diagnostic) when the archive cannot be
/// opened at all. Bad entries are skipped individually.
pub fn unpack_archive(
    archive_path: &Path,
    scope_root: &Path,
    limits: &Limits,
    outcome: &mut ExtractionOutcome,
) -> Option<TempDir> {
    let location = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive_path.display().to_string());

    let mut archive = match File::open(archive_path)
        .map_err(zip::result::ZipError::Io)
        .and_then(zip::ZipArchive::new)
    {
        Ok(archive) => archive,
        Err(e) => {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                &location,
                format!("Failed to read ZIP archive: {e}"),
            ));
            return None;
        }
    };

    let scope = match tempfile::Builder::new().prefix("unpacked-").tempdir_in(scope_root) {
        Ok(dir) => dir,
        Err(e) => {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                &location,
                format!("Failed to create working directory: {e}"),
            ));
            return None;
        }
    };

    let mut total_bytes: u64 = 0;
    let mut files_written = 0usize;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                outcome.degrade(ExtractionDiagnostic::new(
                    DiagnosticScope::ArchiveEntry,
                    format!("{location}#{i}"),
                    format!("Unreadable entry: {e}"),
                ));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let entry_location = format!("{location}/{}", entry.name());
        let Some(relative) = entry.enclosed_name() else {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::ArchiveEntry,
                entry_location,
                "Entry path escapes the archive root",
            ));
            continue;
        };

        if entry.size() > limits.max_archive_entry_bytes {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::ArchiveEntry,
                entry_location,
                format!("Entry exceeds {} byte limit", limits.max_archive_entry_bytes),
            ));
            continue;
        }
        let remaining = limits.max_archive_total_bytes.saturating_sub(total_bytes);
        if entry.size() > remaining {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                &location,
                format!("Archive exceeds {} unpacked byte limit; remaining entries skipped", limits.max_archive_total_bytes),
            ));
            break;
        }

        let target = match safe_join(scope.path(), &relative) {
            Ok(target) => target,
            Err(e) => {
                outcome.degrade(ExtractionDiagnostic::new(DiagnosticScope::ArchiveEntry, entry_location, e.to_string()));
                continue;
            }
        };

        // Declared sizes are untrusted; read at most one byte past the cap
        let cap = limits.max_archive_entry_bytes.min(remaining);
        match write_entry(&mut entry, &target, cap) {
            Ok(written) if written > cap => {
                let _ = std::fs::remove_file(&target);
                outcome.degrade(ExtractionDiagnostic::new(
                    DiagnosticScope::ArchiveEntry,
                    entry_location,
                    "Entry inflated past its size limit",
                ));
            }
            Ok(written) => {
                total_bytes += written;
                files_written += 1;
            }
            Err(e) => {
                let _ = std::fs::remove_file(&target);
                outcome.degrade(ExtractionDiagnostic::new(
                    DiagnosticScope::ArchiveEntry,
                    entry_location,
                    format!("Failed to unpack entry: {e}"),
                ));
            }
        }
    }

    info!(
        archive = %location,
        files = files_written,
        bytes = total_bytes,
        "Archive unpacked"
    );
    debug!(dir = %scope.path().display(), "Unpack scope");
    Some(scope)
}

fn write_entry<R: Read>(entry: &mut R, target: &Path, cap: u64) -> io::Result<u64> {
    let mut file = File::create(target)?;
    io::copy(&mut entry.take(cap.saturating_add(1)), &mut file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_unpack_nested_paths() {
        let work = tempfile::tempdir().unwrap();
        let zip_path = work.path().join("backup.zip");
        std::fs::write(&zip_path, build_zip(&[("Library/SMS/sms.db", b"data"), ("Info.plist", b"plist")])).unwrap();

        let mut outcome = ExtractionOutcome::new();
        let scope = unpack_archive(&zip_path, work.path(), &Limits::default(), &mut outcome).unwrap();
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(std::fs::read(scope.path().join("Library/SMS/sms.db")).unwrap(), b"data");
        assert!(scope.path().join("Info.plist").is_file());

        let scope_path = scope.path().to_path_buf();
        drop(scope);
        assert!(!scope_path.exists());
    }

    #[test]
    fn test_traversal_entry_rejected() {
        let work = tempfile::tempdir().unwrap();
        let zip_path = work.path().join("evil.zip");
        std::fs::write(&zip_path, build_zip(&[("../../escape.db", b"x"), ("ok.db", b"y")])).unwrap();

        let mut outcome = ExtractionOutcome::new();
        let scope = unpack_archive(&zip_path, work.path(), &Limits::default(), &mut outcome).unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].scope, DiagnosticScope::ArchiveEntry);
        assert!(scope.path().join("ok.db").is_file());
        assert!(!work.path().parent().unwrap().join("escape.db").exists());
    }

    #[test]
    fn test_entry_size_limit() {
        let work = tempfile::tempdir().unwrap();
        let zip_path = work.path().join("big.zip");
        std::fs::write(&zip_path, build_zip(&[("big.db", &[0u8; 64]), ("small.db", b"1")])).unwrap();

        let limits = Limits { max_archive_entry_bytes: 16, ..Limits::default() };
        let mut outcome = ExtractionOutcome::new();
        let scope = unpack_archive(&zip_path, work.path(), &limits, &mut outcome).unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(!scope.path().join("big.db").exists());
        assert!(scope.path().join("small.db").exists());
    }

    #[test]
    fn test_not_a_zip() {
        let work = tempfile::tempdir().unwrap();
        let zip_path = work.path().join("fake.zip");
        std::fs::write(&zip_path, b"definitely not a zip").unwrap();

        let mut outcome = ExtractionOutcome::new();
        assert!(unpack_archive(&zip_path, work.path(), &Limits::default(), &mut outcome).is_none());
        assert_eq!(outcome.diagnostics[0].scope, DiagnosticScope::Artifact);
    }
}
