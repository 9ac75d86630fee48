//! Evidence extraction
//!
//! Dispatches an uploaded artifact by file name:
//! - relational suffix (`.db`, `.sqlite`, `.sqlite3`, `.sqlitedb`) → [`relational`]
//! - archive suffix (`.zip`) → unpack, then [`container`] traversal
//! - document suffix (`.plist`) → [`document`], deliberately ahead of the
//!   relational fallback that would otherwise take it
//! - anything else → [`relational`] as a best-effort fallback
//!
//! Extraction never fails the upload. Problems become diagnostics on the
//! returned [`ExtractionOutcome`], and "nothing extracted" is a valid result.

pub mod archive;
pub mod container;
pub mod document;
pub mod relational;

use std::fs;
use std::path::Path;

use regex::Regex;
use tempfile::TempDir;
use tracing::{info, instrument, warn};

use crate::common::path_security::sanitize_filename;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{DiagnosticScope, ExtractionDiagnostic, ExtractionOutcome};

/// How an artifact is handled, decided from its file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Relational,
    Document,
    Archive,
}

/// Compiled suffix patterns from the configuration
#[derive(Debug, Clone)]
pub struct ArtifactPatterns {
    relational: Regex,
    document: Regex,
    archive: Regex,
}

impl ArtifactPatterns {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| EngineError::Config(format!("Invalid {name} pattern: {e}")))
        };
        Ok(Self {
            relational: compile("relational_suffix_pattern", &config.relational_suffix_pattern)?,
            document: compile("document_suffix_pattern", &config.document_suffix_pattern)?,
            archive: compile("archive_suffix_pattern", &config.archive_suffix_pattern)?,
        })
    }

    /// Classify a file name; `None` means the file is not evidence we read
    pub fn classify(&self, file_name: &str) -> Option<ArtifactKind> {
        if self.archive.is_match(file_name) {
            Some(ArtifactKind::Archive)
        } else if self.relational.is_match(file_name) {
            Some(ArtifactKind::Relational)
        } else if self.document.is_match(file_name) {
            Some(ArtifactKind::Document)
        } else {
            None
        }
    }
}

/// Artifact extractor bound to one configuration
#[derive(Debug, Clone)]
pub struct Extractor {
    config: EngineConfig,
    patterns: ArtifactPatterns,
}

impl Extractor {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let patterns = ArtifactPatterns::from_config(&config)?;
        Ok(Self { config, patterns })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract records from uploaded bytes.
    ///
    /// The bytes are staged in a request-scoped temp dir which is removed
    /// before this returns, including every failure path.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn extract(&self, bytes: &[u8], filename_hint: &str) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::new();

        let scope = match self.scope() {
            Ok(scope) => scope,
            Err(e) => {
                outcome.degrade(ExtractionDiagnostic::new(
                    DiagnosticScope::Artifact,
                    filename_hint,
                    format!("Failed to create working directory: {e}"),
                ));
                return outcome;
            }
        };

        let staged = scope.path().join(sanitize_filename(filename_hint));
        if let Err(e) = fs::write(&staged, bytes) {
            outcome.degrade(ExtractionDiagnostic::new(
                DiagnosticScope::Artifact,
                filename_hint,
                format!("Failed to stage artifact: {e}"),
            ));
            return outcome;
        }

        outcome.merge(self.dispatch(&staged, filename_hint, scope.path()));
        release(scope);
        outcome
    }

    /// Extract from a file or an already unpacked directory on disk.
    ///
    /// The evidence path is only read; nested archives unpack into a
    /// scoped temp dir.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn extract_path(&self, path: &Path) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::new();
        let scope = match self.scope() {
            Ok(scope) => scope,
            Err(e) => {
                outcome.degrade(ExtractionDiagnostic::new(
                    DiagnosticScope::Artifact,
                    path.display().to_string(),
                    format!("Failed to create working directory: {e}"),
                ));
                return outcome;
            }
        };

        if path.is_dir() {
            outcome.merge(container::extract_container(path, scope.path(), &self.config, &self.patterns, 0));
        } else {
            let hint = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            outcome.merge(self.dispatch(path, &hint, scope.path()));
        }
        release(scope);
        outcome
    }

    fn dispatch(&self, path: &Path, filename_hint: &str, scope: &Path) -> ExtractionOutcome {
        let kind = self.patterns.classify(filename_hint);
        info!(filename = %filename_hint, kind = ?kind, "Dispatching artifact");

        match kind {
            Some(ArtifactKind::Archive) => {
                let mut outcome = ExtractionOutcome::new();
                if let Some(unpacked) = archive::unpack_archive(path, scope, &self.config.limits, &mut outcome) {
                    outcome.merge(container::extract_container(
                        unpacked.path(),
                        unpacked.path(),
                        &self.config,
                        &self.patterns,
                        0,
                    ));
                }
                outcome
            }
            Some(ArtifactKind::Document) => document::extract_document(path, &self.config),
            Some(ArtifactKind::Relational) | None => relational::extract_database(path, &self.config),
        }
    }

    fn scope(&self) -> std::io::Result<TempDir> {
        let root = self.config.work_root();
        fs::create_dir_all(&root)?;
        tempfile::Builder::new().prefix("mobex-").tempdir_in(root)
    }
}

/// Remove a scoped working directory, logging (not failing) on error
fn release(scope: TempDir) {
    let path = scope.path().display().to_string();
    if let Err(e) = scope.close() {
        warn!(dir = %path, error = %e, "Failed to remove working directory");
    }
}
