// Hash utilities for evidence integrity
//
// SHA-256 is the canonical digest: it identifies evidence items and seals
// exports. MD5, SHA-1, SHA-512 and BLAKE3 are available as supplementary
// digests recorded at ingestion.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use md5::Md5;
use sha1::{Sha1, Digest};
use sha2::{Sha256, Sha512};
use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Read buffer for streaming file hashes
const BUFFER_SIZE: usize = 1024 * 1024;

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported hash algorithms
/// - SHA256: canonical evidence and export digest
/// - MD5/SHA1: legacy digests many case-management systems still expect
/// - SHA512/BLAKE3: stronger or faster alternatives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    /// Get the canonical algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Blake3 => "BLAKE3",
        }
    }

    /// Get expected hash length in hex characters
    pub fn hash_length(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
            HashAlgorithm::Blake3 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    /// Parse algorithm name (case-insensitive)
    fn from_str(algorithm: &str) -> Result<Self, Self::Err> {
        match algorithm.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(format!(
                "Unsupported hash algorithm: '{}'. Supported: md5, sha1, sha256, sha512, blake3",
                algorithm
            )),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(algorithm: HashAlgorithm) -> Self {
        algorithm.name().to_string()
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Streaming Hasher
// =============================================================================

/// Incremental hasher over any supported algorithm
/// Note: Blake3Hasher is boxed because it's ~1920 bytes
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<Blake3Hasher>),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => StreamingHasher::Sha512(Sha512::new()),
            HashAlgorithm::Blake3 => StreamingHasher::Blake3(Box::new(Blake3Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
            StreamingHasher::Sha512(h) => Digest::update(h, data),
            StreamingHasher::Blake3(h) => { h.update(data); }
        }
    }

    /// Finalize and return the hash as a lowercase hex string
    pub fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha512(h) => hex::encode(h.finalize()),
            StreamingHasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

// =============================================================================
// One-shot Hash Computation
// =============================================================================

/// Compute hash of in-memory data
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Canonical content digest (SHA-256, lowercase hex)
///
/// Deterministic and infallible for any input, including the empty slice.
pub fn digest(data: &[u8]) -> String {
    compute_hash(data, HashAlgorithm::Sha256)
}

/// Hash a file on disk without loading it into memory
#[instrument(skip_all, fields(path = %path.display(), algorithm = %algorithm))]
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = StreamingHasher::new(algorithm);

    loop {
        let buf = reader.fill_buf()?;
        let len = buf.len();
        if len == 0 {
            break;
        }
        hasher.update(buf);
        reader.consume(len);
    }

    let hash = hasher.finalize();
    debug!(hash = %hash, "File hash complete");
    Ok(hash)
}

// =============================================================================
// Hash Comparison
// =============================================================================

/// Result of hash comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HashMatchResult {
    /// Exact match (same case)
    Exact,
    /// Match but different case (e.g., "abc" vs "ABC")
    CaseInsensitive,
    /// Hashes do not match
    Mismatch,
    /// One or both hashes are invalid format
    Invalid,
}

impl HashMatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, HashMatchResult::Exact | HashMatchResult::CaseInsensitive)
    }
}

/// Compare two hash strings with detailed result
pub fn compare_hashes(computed: &str, expected: &str) -> HashMatchResult {
    let computed = computed.trim();
    let expected = expected.trim();

    if computed.is_empty()
        || !computed.chars().all(|c| c.is_ascii_hexdigit())
        || !expected.chars().all(|c| c.is_ascii_hexdigit())
    {
        return HashMatchResult::Invalid;
    }

    if computed.len() != expected.len() {
        return HashMatchResult::Mismatch;
    }

    if computed == expected {
        return HashMatchResult::Exact;
    }

    if computed.eq_ignore_ascii_case(expected) {
        return HashMatchResult::CaseInsensitive;
    }

    HashMatchResult::Mismatch
}

/// Compare two hashes (case-insensitive)
pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
    compare_hashes(hash1, hash2).is_match()
}

/// Validate that a string looks like a valid hash for the given algorithm
pub fn is_valid_hash(hash: &str, algorithm: HashAlgorithm) -> bool {
    hash.len() == algorithm.hash_length() && hash.chars().all(|c| c.is_ascii_hexdigit())
}
