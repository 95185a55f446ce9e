//! On-disk memoization of extraction results and task judgements.
//!
//! An entry's presence is the completion signal observed by pollers, so
//! entries are only ever written whole (temp file + rename). Failed jobs
//! leave a tombstone in a separate `failed/` namespace instead.

pub mod key;
pub mod store;

use std::marker::PhantomData;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use key::{sanitize_filename, CacheKey};
pub use store::{EntryStore, FsEntryStore};

use crate::models::{ExtractionEntry, Judgement};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
}

/// Tombstone recorded when a job for a key fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureMarker {
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Typed JSON cache over an [`EntryStore`], with a parallel failure store.
pub struct ResultCache<T> {
    entries: Box<dyn EntryStore>,
    failures: Box<dyn EntryStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ResultCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(entries: Box<dyn EntryStore>, failures: Box<dyn EntryStore>) -> Self {
        Self {
            entries,
            failures,
            _marker: PhantomData,
        }
    }

    /// File-backed cache rooted at `dir`; tombstones live in `dir/failed`.
    pub fn on_disk(dir: &Path, fan_out: bool) -> Self {
        let failed = dir.join("failed");
        if fan_out {
            Self::new(
                Box::new(FsEntryStore::with_fan_out(dir)),
                Box::new(FsEntryStore::with_fan_out(failed)),
            )
        } else {
            Self::new(
                Box::new(FsEntryStore::new(dir)),
                Box::new(FsEntryStore::new(failed)),
            )
        }
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        match self.entries.read(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The stored JSON exactly as written.
    pub fn get_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        self.entries.read(key)
    }

    /// Write a complete entry and drop any tombstone for the key.
    pub fn put(&self, key: &CacheKey, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.entries.write(key, &bytes)?;
        self.failures.remove(key)
    }

    pub fn exists(&self, key: &CacheKey) -> bool {
        self.entries.exists(key)
    }

    pub fn mark_failed(&self, key: &CacheKey, error: &str) -> Result<(), CacheError> {
        let marker = FailureMarker {
            error: error.to_string(),
            failed_at: Utc::now(),
        };
        self.failures.write(key, &serde_json::to_vec(&marker)?)
    }

    pub fn failure(&self, key: &CacheKey) -> Result<Option<FailureMarker>, CacheError> {
        match self.failures.read(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn clear_failure(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.failures.remove(key)
    }
}

/// The two caches used by the service.
pub struct Caches {
    pub terms: ResultCache<ExtractionEntry>,
    pub judgements: ResultCache<Judgement>,
}

impl Caches {
    /// Open (and create) the cache layout under `root`:
    /// `terms/<key>.json` and `judgements/<hh>/<hash>.json`.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        let terms_dir = root.join("terms");
        let judgements_dir = root.join("judgements");
        std::fs::create_dir_all(&terms_dir)?;
        std::fs::create_dir_all(&judgements_dir)?;

        tracing::info!(root = %root.display(), "Result cache opened");

        Ok(Self {
            terms: ResultCache::on_disk(&terms_dir, false),
            judgements: ResultCache::on_disk(&judgements_dir, true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, Term, TermSet};

    fn sample_entry() -> ExtractionEntry {
        ExtractionEntry::new(
            vec![
                "1. Services.".into(),
                "Contractor shall provide development services.".into(),
            ],
            TermSet::new(vec![Term {
                section: "1".into(),
                name: "Services".into(),
                description: "Contractor provides development services".into(),
            }]),
        )
    }

    #[test]
    fn round_trip_preserves_paragraphs_and_terms() {
        let dir = tempfile::tempdir().unwrap();
        let caches = Caches::open(dir.path()).unwrap();
        let key = CacheKey::from_filename("Contract.docx");
        let entry = sample_entry();

        caches.terms.put(&key, &entry).unwrap();
        let back = caches.terms.get(&key).unwrap().unwrap();

        assert_eq!(back, entry);
        assert!(dir.path().join("terms").join("Contract.docx.json").is_file());
    }

    #[test]
    fn absent_key_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let caches = Caches::open(dir.path()).unwrap();
        let key = CacheKey::from_filename("missing.docx");
        assert!(caches.terms.get(&key).unwrap().is_none());
        assert!(!caches.terms.exists(&key));
    }

    #[test]
    fn failure_marker_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let caches = Caches::open(dir.path()).unwrap();
        let key = CacheKey::from_filename("bad.docx");

        caches.terms.mark_failed(&key, "provider returned nothing").unwrap();
        let marker = caches.terms.failure(&key).unwrap().unwrap();
        assert_eq!(marker.error, "provider returned nothing");
        assert!(!caches.terms.exists(&key));

        caches.terms.clear_failure(&key).unwrap();
        assert!(caches.terms.failure(&key).unwrap().is_none());
    }

    #[test]
    fn put_clears_previous_failure() {
        let dir = tempfile::tempdir().unwrap();
        let caches = Caches::open(dir.path()).unwrap();
        let key = CacheKey::from_filename("retry.docx");

        caches.terms.mark_failed(&key, "timeout").unwrap();
        caches.terms.put(&key, &sample_entry()).unwrap();

        assert!(caches.terms.failure(&key).unwrap().is_none());
        assert!(caches.terms.exists(&key));
    }

    #[test]
    fn judgements_are_fanned_out_by_hash_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let caches = Caches::open(dir.path()).unwrap();
        let terms = sample_entry().term_set();
        let key = CacheKey::for_judgement("Build API", &terms).unwrap();
        let judgement = Judgement {
            task: Task::new("Build API", "100"),
            status: crate::models::JudgementStatus::Valid,
            ambiguous: false,
            related_terms: terms,
            explanation: "Covered by section 1".into(),
            contract_objective: None,
        };

        caches.judgements.put(&key, &judgement).unwrap();

        let expected = dir
            .path()
            .join("judgements")
            .join(&key.as_str()[..2])
            .join(format!("{key}.json"));
        assert!(expected.is_file());
        assert_eq!(caches.judgements.get(&key).unwrap().unwrap(), judgement);
    }

    #[test]
    fn raw_bytes_are_the_stored_json() {
        let dir = tempfile::tempdir().unwrap();
        let caches = Caches::open(dir.path()).unwrap();
        let key = CacheKey::from_filename("Contract.docx");
        caches.terms.put(&key, &sample_entry()).unwrap();

        let raw = caches.terms.get_raw(&key).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["paragraphs"].as_array().unwrap().len(), 2);
    }
}
