//! Engine configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields a working engine. New device or app schemas are added to
//! the catalog here, not in code:
//!
//! ```toml
//! [[catalog.messages]]
//! table = "chat_message"
//! rename = { text = "body", date_sent = "date" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::hash::HashAlgorithm;
use crate::error::{EngineError, Result};
use crate::extract::ArtifactPatterns;
use crate::models::RecordClass;

/// One candidate table for a record class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    /// Table name as it appears in the database catalog (matched case-insensitively)
    pub table: String,
    /// Column-to-field projection; unlisted columns keep their own name
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

impl TableMapping {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            rename: BTreeMap::new(),
        }
    }

    /// Output field name for a source column
    pub fn field_name<'a>(&'a self, column: &'a str) -> &'a str {
        self.rename.get(column).map(String::as_str).unwrap_or(column)
    }
}

/// Ranked alias lists per record class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaCatalog {
    pub messages: Vec<TableMapping>,
    pub contacts: Vec<TableMapping>,
    pub call_logs: Vec<TableMapping>,
}

impl SchemaCatalog {
    pub fn mappings(&self, class: RecordClass) -> &[TableMapping] {
        match class {
            RecordClass::Messages => &self.messages,
            RecordClass::Contacts => &self.contacts,
            RecordClass::CallLogs => &self.call_logs,
        }
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        let aliases = |names: &[&str]| names.iter().map(|n| TableMapping::new(n)).collect();
        Self {
            messages: aliases(&["sms", "messages", "message"]),
            contacts: aliases(&["contacts", "contact", "phone_book"]),
            call_logs: aliases(&["calls", "call_log", "call_history"]),
        }
    }
}

/// Bounds that keep one malformed artifact from consuming a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Rows read from any single table
    pub max_rows_per_table: usize,
    /// Files visited during one container traversal
    pub max_container_files: usize,
    /// Uncompressed size of a single archive entry
    pub max_archive_entry_bytes: u64,
    /// Uncompressed size of everything unpacked from one archive
    pub max_archive_total_bytes: u64,
    /// Nesting depth for archives found inside archives
    pub max_archive_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rows_per_table: 1_000_000,
            max_container_files: 100_000,
            max_archive_entry_bytes: 2 * 1024 * 1024 * 1024,
            max_archive_total_bytes: 16 * 1024 * 1024 * 1024,
            max_archive_depth: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub catalog: SchemaCatalog,
    pub relational_suffix_pattern: String,
    pub document_suffix_pattern: String,
    pub archive_suffix_pattern: String,
    /// Class assigned to every parsed structured document.
    /// Heuristic placeholder: most property lists in handset backups are
    /// address-book adjacent, but content is not inspected.
    pub document_class: RecordClass,
    pub limits: Limits,
    /// Extract container files on the rayon pool
    pub parallel: bool,
    /// Root for request-scoped temporary storage (system temp dir if unset)
    pub work_dir: Option<PathBuf>,
    /// Digests recorded at ingestion in addition to SHA-256
    pub supplementary_hashes: Vec<HashAlgorithm>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog: SchemaCatalog::default(),
            relational_suffix_pattern: r"(?i)\.(db|sqlite|sqlite3|sqlitedb)$".to_string(),
            document_suffix_pattern: r"(?i)\.plist$".to_string(),
            archive_suffix_pattern: r"(?i)\.zip$".to_string(),
            document_class: RecordClass::Contacts,
            limits: Limits::default(),
            parallel: true,
            work_dir: None,
            supplementary_hashes: vec![HashAlgorithm::Md5, HashAlgorithm::Sha1],
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml(&raw)?;
        debug!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw)
            .map_err(|e| EngineError::Config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make extraction silently do nothing
    pub fn validate(&self) -> Result<()> {
        ArtifactPatterns::from_config(self)?;

        for class in RecordClass::ALL {
            if let Some(empty) = self.catalog.mappings(class).iter().find(|m| m.table.trim().is_empty()) {
                return Err(EngineError::Config(format!(
                    "Empty table name in {class} catalog (rename: {:?})",
                    empty.rename
                )));
            }
        }

        let limits = &self.limits;
        if limits.max_rows_per_table == 0 || limits.max_container_files == 0 {
            return Err(EngineError::Config("Row and file limits must be greater than zero".into()));
        }
        if limits.max_archive_entry_bytes == 0 || limits.max_archive_total_bytes == 0 {
            return Err(EngineError::Config("Archive byte limits must be greater than zero".into()));
        }

        Ok(())
    }

    /// Directory under which scoped temp dirs are created
    pub fn work_root(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
