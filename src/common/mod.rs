// Common utilities shared across extractors and the export pipeline

pub mod audit;
pub mod hash;
pub mod path_security;
pub mod time;

// Re-exports for convenience
pub use hash::{compute_hash, digest, hashes_match, HashAlgorithm};
pub use path_security::{safe_join, sanitize_filename};
pub use time::now_forensic;
