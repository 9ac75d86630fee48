//! Path Security Utilities
//!
//! Archive entry names and upload filenames are attacker-controlled. These
//! helpers keep every file the engine writes inside its scoped working
//! directory.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Error type for path security operations
#[derive(Debug, Clone, Error)]
pub enum PathSecurityError {
    /// Path traversal attempt detected
    #[error("Path traversal detected: {0}")]
    TraversalDetected(String),
    /// Path canonicalization failed
    #[error("Failed to canonicalize path: {0}")]
    CanonicalizationFailed(String),
    /// Path is not under expected base
    #[error("Path '{path}' is not under base '{base}'")]
    NotUnderBase { path: String, base: String },
}

/// Result type for path security operations
pub type PathSecurityResult<T> = Result<T, PathSecurityError>;

/// Check if a relative path contains traversal or absolute components.
///
/// Detects `..` components, absolute roots, Windows drive prefixes, null
/// bytes and URL-encoded separators. Names that merely contain two dots
/// (`file..name.txt`) are fine.
pub fn contains_traversal_pattern(name: &str) -> bool {
    if name.contains('\0') {
        return true;
    }

    if name.starts_with('/') || name.starts_with('\\') {
        return true;
    }

    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }

    let lower = name.to_lowercase();
    if lower.contains("%2e%2e") || lower.contains("%2f") || lower.contains("%5c") {
        return true;
    }

    name.split(['/', '\\']).any(|part| part == "..")
}

/// Join a relative path under `base`, creating intermediate directories.
///
/// The parent of the joined path is canonicalized and must remain under the
/// canonical base, which also defeats symlinks planted by earlier entries.
pub fn safe_join(base: &Path, relative: &Path) -> PathSecurityResult<PathBuf> {
    let shown = relative.to_string_lossy();
    if contains_traversal_pattern(&shown)
        || relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        warn!(target: "security", path = %shown, "Path traversal pattern detected");
        return Err(PathSecurityError::TraversalDetected(shown.to_string()));
    }

    let file_name = relative
        .file_name()
        .ok_or_else(|| PathSecurityError::TraversalDetected(shown.to_string()))?;

    let canonical_base = base
        .canonicalize()
        .map_err(|e| PathSecurityError::CanonicalizationFailed(format!("Base path: {e}")))?;

    let joined = canonical_base.join(relative);
    let parent = joined.parent().unwrap_or(&canonical_base);
    std::fs::create_dir_all(parent)
        .map_err(|e| PathSecurityError::CanonicalizationFailed(format!("Parent path: {e}")))?;
    let canonical_parent = parent
        .canonicalize()
        .map_err(|e| PathSecurityError::CanonicalizationFailed(format!("Parent path: {e}")))?;

    if !canonical_parent.starts_with(&canonical_base) {
        warn!(
            target: "security",
            path = %canonical_parent.display(),
            base = %canonical_base.display(),
            "Path escapes base directory"
        );
        return Err(PathSecurityError::NotUnderBase {
            path: canonical_parent.display().to_string(),
            base: canonical_base.display().to_string(),
        });
    }

    Ok(canonical_parent.join(file_name))
}

/// Sanitize a filename by removing dangerous characters.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '\0'..='\x1f' | '\x7f' => continue,
            '/' | '\\' => sanitized.push('_'),
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => continue,
            _ => sanitized.push(c),
        }
    }

    let trimmed = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}
