use std::fmt;

use sha2::{Digest, Sha256};

use super::CacheError;
use crate::models::TermSet;

/// Longest key accepted from a path parameter or produced from a filename.
const MAX_KEY_LEN: usize = 100;

/// Identifier of one cache entry.
///
/// Keys are always safe to use as a single path component: ASCII
/// alphanumerics plus `.`, `-` and `_`, never containing `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for an extraction entry, derived from the uploaded filename.
    ///
    /// Two uploads with the same name map to the same key; the later one wins.
    pub fn from_filename(name: &str) -> Self {
        Self(sanitize_filename(name))
    }

    /// Key for a judgement entry: SHA-256 over the task description and the
    /// JSON serialization of the term list, as lowercase hex.
    ///
    /// Term order is part of the key. The task amount is not.
    pub fn for_judgement(description: &str, terms: &TermSet) -> Result<Self, CacheError> {
        let canonical = serde_json::to_vec(&terms.terms)?;
        let mut hasher = Sha256::new();
        hasher.update(description.as_bytes());
        hasher.update([0u8]);
        hasher.update(&canonical);
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Validate a key received from a client.
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_KEY_LEN
            && !raw.contains("..")
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(CacheError::InvalidKey(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitize a filename: removes path components and special characters.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers on some platforms send the full client path.
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(name);

    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut sanitized = sanitized;
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    // All remaining characters are ASCII, so byte truncation is safe.
    sanitized.truncate(MAX_KEY_LEN);

    if sanitized.is_empty() || sanitized == "." {
        "document".into()
    } else {
        sanitized
    }
}
