//! Background work: term extraction and task validation.
//!
//! Jobs go through a bounded queue drained by a fixed pool of workers. A key
//! is tracked as in flight from dispatch until its entry or tombstone has been
//! written, so a poller always sees either pending or a terminal state.

pub mod runner;

pub use runner::{JobRunner, RunnerSettings};

use thiserror::Error;
use uuid::Uuid;

use crate::cache::{CacheKey, FailureMarker};
use crate::models::{Task, TermSet};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("Job queue is full, try again shortly")]
    QueueFull,

    #[error("Job runner has shut down")]
    Closed,
}

/// Which cache namespace a job writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Extraction,
    Validation,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Extraction => "extraction",
            JobKind::Validation => "validation",
        }
    }
}

/// A unit of background work and everything it needs.
#[derive(Debug)]
pub enum Job {
    /// Parse an uploaded contract and extract its terms.
    Extract { key: CacheKey, document: Vec<u8> },
    /// Judge one task against a cached term set.
    Validate {
        key: CacheKey,
        task: Task,
        terms: TermSet,
    },
}

impl Job {
    pub fn key(&self) -> &CacheKey {
        match self {
            Job::Extract { key, .. } | Job::Validate { key, .. } => key,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Job::Extract { .. } => JobKind::Extraction,
            Job::Validate { .. } => JobKind::Validation,
        }
    }
}

/// Outcome of a dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Queued(Uuid),
    /// A job for the same key is already queued or running.
    AlreadyRunning,
}

/// What a poller can know about a key.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState<T> {
    /// No entry, no tombstone, nothing in flight (e.g. after a restart).
    NotStarted,
    Pending,
    Complete(T),
    Failed(FailureMarker),
}

impl<T> JobState<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }
}
