use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Dispatch, Job, JobError, JobKind, JobState};
use crate::cache::{CacheError, CacheKey, Caches, ResultCache};
use crate::models::{ExtractionEntry, Judgement};
use crate::pipeline::llm::LlmClient;
use crate::pipeline::loader::{extract_paragraphs, LoaderError};
use crate::pipeline::{extract_terms, validate_task, ExtractionError, ValidationError};

/// Runner tuning, taken from [`crate::config::AppConfig`].
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub workers: usize,
    pub queue_depth: usize,
    pub job_timeout: Duration,
    pub extraction_model: String,
    pub validation_model: String,
}

/// Why a job ended without an entry. Recorded as the tombstone's summary.
#[derive(Error, Debug)]
enum JobFailure {
    #[error("{0}")]
    Loader(#[from] LoaderError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Could not store result: {0}")]
    Cache(#[from] CacheError),
}

type PendingWrite = Box<dyn FnOnce(&Shared) -> Result<(), CacheError>>;

struct Queued {
    id: Uuid,
    job: Job,
}

struct Shared {
    caches: Arc<Caches>,
    llm: Arc<dyn LlmClient>,
    settings: RunnerSettings,
    in_flight: Mutex<HashSet<(JobKind, CacheKey)>>,
}

/// Handle to the worker pool. Cheap to clone; workers stop once every
/// handle has been dropped and the queue is drained.
#[derive(Clone)]
pub struct JobRunner {
    shared: Arc<Shared>,
    sender: mpsc::Sender<Queued>,
}

impl JobRunner {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(caches: Arc<Caches>, llm: Arc<dyn LlmClient>, settings: RunnerSettings) -> Self {
        let workers = settings.workers.max(1);
        let (sender, receiver) = mpsc::channel(settings.queue_depth.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let shared = Arc::new(Shared {
            caches,
            llm,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        });

        for worker in 0..workers {
            tokio::spawn(worker_loop(worker, shared.clone(), receiver.clone()));
        }
        tracing::info!(
            workers,
            queue_depth = shared.settings.queue_depth,
            timeout_secs = shared.settings.job_timeout.as_secs(),
            "Job runner started"
        );

        Self { shared, sender }
    }

    pub fn caches(&self) -> &Caches {
        &self.shared.caches
    }

    /// Queue a job unless one for the same key is already in flight.
    ///
    /// Any old tombstone for the key is cleared first.
    pub fn dispatch(&self, job: Job) -> Result<Dispatch, JobError> {
        let slot = (job.kind(), job.key().clone());
        {
            let mut in_flight = self.lock_in_flight();
            if in_flight.contains(&slot) {
                tracing::debug!(kind = slot.0.as_str(), key = %slot.1, "Job already in flight");
                return Ok(Dispatch::AlreadyRunning);
            }
            in_flight.insert(slot.clone());
        }

        if let Err(e) = self.shared.clear_failure(slot.0, &slot.1) {
            tracing::warn!(key = %slot.1, error = %e, "Failed to clear old tombstone");
        }

        let id = Uuid::new_v4();
        match self.sender.try_send(Queued { id, job }) {
            Ok(()) => {
                tracing::info!(job_id = %id, kind = slot.0.as_str(), key = %slot.1, "Job queued");
                Ok(Dispatch::Queued(id))
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared.release(&slot);
                tracing::warn!(kind = slot.0.as_str(), key = %slot.1, "Job queue full");
                Err(JobError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.shared.release(&slot);
                Err(JobError::Closed)
            }
        }
    }

    pub fn is_in_flight(&self, kind: JobKind, key: &CacheKey) -> bool {
        self.lock_in_flight().contains(&(kind, key.clone()))
    }

    pub fn terms_state(&self, key: &CacheKey) -> Result<JobState<ExtractionEntry>, CacheError> {
        self.state_of(&self.shared.caches.terms, JobKind::Extraction, key)
    }

    pub fn judgement_state(&self, key: &CacheKey) -> Result<JobState<Judgement>, CacheError> {
        self.state_of(&self.shared.caches.judgements, JobKind::Validation, key)
    }

    // The in-flight set is checked first. A key leaves the set only after its
    // entry or tombstone is on disk, so once it is gone the reads below see
    // the outcome. A job re-running over an older entry reports Pending.
    fn state_of<T>(
        &self,
        cache: &ResultCache<T>,
        kind: JobKind,
        key: &CacheKey,
    ) -> Result<JobState<T>, CacheError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        if self.is_in_flight(kind, key) {
            return Ok(JobState::Pending);
        }
        if let Some(entry) = cache.get(key)? {
            return Ok(JobState::Complete(entry));
        }
        Ok(match cache.failure(key)? {
            Some(marker) => JobState::Failed(marker),
            None => JobState::NotStarted,
        })
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<(JobKind, CacheKey)>> {
        self.shared.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn worker_loop(
    worker: usize,
    shared: Arc<Shared>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Queued>>>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        match next {
            Some(queued) => run_job(&shared, queued).await,
            None => break,
        }
    }
    tracing::debug!(worker, "Job worker stopped");
}

/// First writer wins: either the job's own result or the timeout tombstone.
#[derive(Default)]
struct Settlement {
    settled: Mutex<bool>,
}

impl Settlement {
    fn settle(&self, write: impl FnOnce()) -> bool {
        let mut settled = self.settled.lock().unwrap_or_else(|e| e.into_inner());
        if *settled {
            return false;
        }
        write();
        *settled = true;
        true
    }
}

async fn run_job(shared: &Arc<Shared>, queued: Queued) {
    let Queued { id, job } = queued;
    let slot = (job.kind(), job.key().clone());
    let settlement = Arc::new(Settlement::default());
    let started = std::time::Instant::now();

    tracing::info!(job_id = %id, kind = slot.0.as_str(), key = %slot.1, "Job started");

    let work = {
        let shared = shared.clone();
        let settlement = settlement.clone();
        tokio::task::spawn_blocking(move || shared.execute(job, &settlement))
    };

    match tokio::time::timeout(shared.settings.job_timeout, work).await {
        Ok(Ok(true)) => {
            tracing::info!(
                job_id = %id,
                key = %slot.1,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job finished"
            );
        }
        Ok(Ok(false)) => {}
        Ok(Err(join_error)) => {
            tracing::error!(job_id = %id, key = %slot.1, error = %join_error, "Job panicked");
            settle_failure(shared, &settlement, &slot, "Job crashed unexpectedly".into()).await;
        }
        Err(_) => {
            let secs = shared.settings.job_timeout.as_secs();
            tracing::warn!(job_id = %id, key = %slot.1, timeout_secs = secs, "Job timed out");
            let message = format!("Job timed out after {secs}s");
            settle_failure(shared, &settlement, &slot, message).await;
        }
    }

    shared.release(&slot);
}

/// Write the tombstone for a job that never settled itself, on the
/// blocking pool.
async fn settle_failure(
    shared: &Arc<Shared>,
    settlement: &Arc<Settlement>,
    slot: &(JobKind, CacheKey),
    message: String,
) {
    let shared = shared.clone();
    let settlement = settlement.clone();
    let (kind, key) = slot.clone();
    let write = tokio::task::spawn_blocking(move || {
        settlement.settle(|| shared.record_failure(kind, &key, &message))
    });
    if let Err(e) = write.await {
        tracing::error!(key = %slot.1, error = %e, "Tombstone write crashed");
    }
}

impl Shared {
    /// Run a job to completion on the current (blocking) thread and record
    /// its outcome. Returns false if the job succeeded but its result was
    /// discarded because a timeout had already been recorded.
    fn execute(&self, job: Job, settlement: &Settlement) -> bool {
        let kind = job.kind();
        let key = job.key().clone();

        match self.produce(job) {
            Ok(write) => {
                let mut stored = Ok(());
                let accepted = settlement.settle(|| stored = write(self));
                match stored {
                    Ok(()) if accepted => true,
                    Ok(()) => {
                        tracing::info!(key = %key, "Discarding result of timed-out job");
                        false
                    }
                    Err(e) => {
                        let failure = JobFailure::from(e);
                        tracing::error!(key = %key, error = %failure, "Job result not stored");
                        self.record_failure(kind, &key, &failure.to_string());
                        false
                    }
                }
            }
            Err(failure) => {
                tracing::warn!(kind = kind.as_str(), key = %key, error = %failure, "Job failed");
                settlement.settle(|| self.record_failure(kind, &key, &failure.to_string()));
                false
            }
        }
    }

    /// Do the slow part of a job and return the cache write that completes it.
    fn produce(&self, job: Job) -> Result<PendingWrite, JobFailure> {
        match job {
            Job::Extract { key, document } => {
                let paragraphs = extract_paragraphs(&document)?;
                tracing::debug!(key = %key, paragraphs = paragraphs.len(), "Document parsed");
                let terms = extract_terms(
                    self.llm.as_ref(),
                    &self.settings.extraction_model,
                    &paragraphs,
                )?;
                let entry = ExtractionEntry::new(paragraphs, terms);
                Ok(Box::new(move |shared: &Shared| shared.caches.terms.put(&key, &entry)))
            }
            Job::Validate { key, task, terms } => {
                let judgement = validate_task(
                    self.llm.as_ref(),
                    &self.settings.validation_model,
                    &task,
                    &terms,
                )?;
                Ok(Box::new(move |shared: &Shared| {
                    shared.caches.judgements.put(&key, &judgement)
                }))
            }
        }
    }

    fn record_failure(&self, kind: JobKind, key: &CacheKey, message: &str) {
        let result = match kind {
            JobKind::Extraction => self.caches.terms.mark_failed(key, message),
            JobKind::Validation => self.caches.judgements.mark_failed(key, message),
        };
        if let Err(e) = result {
            tracing::error!(key = %key, error = %e, "Failed to write tombstone");
        }
    }

    fn clear_failure(&self, kind: JobKind, key: &CacheKey) -> Result<(), CacheError> {
        match kind {
            JobKind::Extraction => self.caches.terms.clear_failure(key),
            JobKind::Validation => self.caches.judgements.clear_failure(key),
        }
    }

    fn release(&self, slot: &(JobKind, CacheKey)) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EntryStore, FsEntryStore};
    use crate::models::{JudgementStatus, Task, Term, TermSet};
    use crate::pipeline::llm::schema::{
        TASK_RELEVANCY_SCHEMA_NAME, TERM_LIST_SCHEMA_NAME, VALIDITY_SCHEMA_NAME,
    };
    use crate::pipeline::llm::MockLlmClient;
    use crate::pipeline::loader::fixtures::build_docx;
    use serde_json::json;

    fn settings(timeout: Duration) -> RunnerSettings {
        RunnerSettings {
            workers: 2,
            queue_depth: 8,
            job_timeout: timeout,
            extraction_model: "gpt-4o-mini".into(),
            validation_model: "gpt-4o".into(),
        }
    }

    fn start(
        dir: &tempfile::TempDir,
        llm: Arc<MockLlmClient>,
        settings: RunnerSettings,
    ) -> JobRunner {
        let caches = Arc::new(Caches::open(dir.path()).unwrap());
        JobRunner::start(caches, llm, settings)
    }

    async fn wait_terminal<T>(mut poll: impl FnMut() -> JobState<T>) -> JobState<T> {
        for _ in 0..200 {
            let state = poll();
            if state.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job did not finish");
    }

    fn terms() -> TermSet {
        TermSet::new(vec![Term {
            section: "1".into(),
            name: "Scope".into(),
            description: "Software development.".into(),
        }])
    }

    fn scripted_validation() -> MockLlmClient {
        MockLlmClient::new()
            .with_reply(
                TASK_RELEVANCY_SCHEMA_NAME,
                json!({"contract_objective": "Software", "relevant": true, "ambiguous": false}),
            )
            .with_reply(
                VALIDITY_SCHEMA_NAME,
                json!({"related_terms": [], "explanation": "In scope.", "status": "valid"}),
            )
    }

    #[tokio::test]
    async fn extraction_job_writes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new().with_reply(
            TERM_LIST_SCHEMA_NAME,
            json!({"terms": [{"section": "1", "name": "Scope", "description": "Dev"}]}),
        ));
        let runner = start(&dir, llm.clone(), settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("Contract.docx");

        let dispatch = runner
            .dispatch(Job::Extract {
                key: key.clone(),
                document: build_docx(&["Contract", "1. Scope"]),
            })
            .unwrap();
        assert!(matches!(dispatch, Dispatch::Queued(_)));

        match wait_terminal(|| runner.terms_state(&key).unwrap()).await {
            JobState::Complete(entry) => {
                assert_eq!(entry.paragraphs, vec!["Contract", "1. Scope"]);
                assert_eq!(entry.terms.len(), 1);
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(!runner.is_in_flight(JobKind::Extraction, &key));
    }

    #[tokio::test]
    async fn unknown_key_is_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let runner = start(&dir, Arc::new(MockLlmClient::new()), settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("never.docx");
        assert_eq!(runner.terms_state(&key).unwrap(), JobState::NotStarted);
    }

    /// Takes its snapshot of an entry, then stalls before handing it back.
    struct SlowReads {
        inner: FsEntryStore,
        stall: Duration,
    }

    impl EntryStore for SlowReads {
        fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
            let snapshot = self.inner.read(key)?;
            std::thread::sleep(self.stall);
            Ok(snapshot)
        }

        fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
            self.inner.write(key, bytes)
        }

        fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
            self.inner.remove(key)
        }

        fn exists(&self, key: &CacheKey) -> bool {
            self.inner.exists(key)
        }
    }

    #[tokio::test]
    async fn poll_overlapping_job_completion_never_reports_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let terms_dir = dir.path().join("terms");
        let caches = Arc::new(Caches {
            terms: ResultCache::new(
                Box::new(SlowReads {
                    inner: FsEntryStore::new(terms_dir.clone()),
                    stall: Duration::from_millis(400),
                }),
                Box::new(FsEntryStore::new(terms_dir.join("failed"))),
            ),
            judgements: ResultCache::on_disk(&dir.path().join("judgements"), true),
        });
        let llm = Arc::new(
            MockLlmClient::new()
                .with_reply(
                    TERM_LIST_SCHEMA_NAME,
                    json!({"terms": [{"section": "1", "name": "Scope", "description": "Dev"}]}),
                )
                .with_delay(Duration::from_millis(50)),
        );
        let runner = JobRunner::start(caches, llm, settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("Contract.docx");

        runner
            .dispatch(Job::Extract {
                key: key.clone(),
                document: build_docx(&["Contract", "1. Scope"]),
            })
            .unwrap();

        let poller = runner.clone();
        let poll_key = key.clone();
        let observed = tokio::task::spawn_blocking(move || {
            let mut seen = Vec::new();
            for _ in 0..50 {
                let state = poller.terms_state(&poll_key).unwrap();
                let terminal = state.is_terminal();
                seen.push(state);
                if terminal {
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            seen
        })
        .await
        .unwrap();

        assert!(
            matches!(observed.last(), Some(JobState::Complete(_))),
            "poller settled on {observed:?}"
        );
        assert!(!observed.contains(&JobState::NotStarted));
    }

    #[tokio::test]
    async fn rerun_over_existing_entry_is_pending_until_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            MockLlmClient::new()
                .with_reply(
                    TERM_LIST_SCHEMA_NAME,
                    json!({"terms": [{"section": "1", "name": "Scope", "description": "Dev"}]}),
                )
                .with_delay(Duration::from_millis(100)),
        );
        let runner = start(&dir, llm, settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("Contract.docx");
        runner
            .caches()
            .terms
            .put(&key, &ExtractionEntry::new(vec!["Old".into()], TermSet::new(vec![])))
            .unwrap();

        runner
            .dispatch(Job::Extract {
                key: key.clone(),
                document: build_docx(&["New contract"]),
            })
            .unwrap();
        assert_eq!(runner.terms_state(&key).unwrap(), JobState::Pending);

        match wait_terminal(|| runner.terms_state(&key).unwrap()).await {
            JobState::Complete(entry) => assert_eq!(entry.paragraphs, vec!["New contract"]),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_dispatch_collapses_into_one_job() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(scripted_validation().with_delay(Duration::from_millis(100)));
        let runner = start(&dir, llm.clone(), settings(Duration::from_secs(5)));
        let task = Task::new("Build API", "100");
        let key = CacheKey::for_judgement(&task.description, &terms()).unwrap();

        let first = runner
            .dispatch(Job::Validate {
                key: key.clone(),
                task: task.clone(),
                terms: terms(),
            })
            .unwrap();
        let second = runner
            .dispatch(Job::Validate {
                key: key.clone(),
                task,
                terms: terms(),
            })
            .unwrap();

        assert!(matches!(first, Dispatch::Queued(_)));
        assert_eq!(second, Dispatch::AlreadyRunning);
        assert_eq!(runner.judgement_state(&key).unwrap(), JobState::Pending);

        match wait_terminal(|| runner.judgement_state(&key).unwrap()).await {
            JobState::Complete(judgement) => assert_eq!(judgement.status, JudgementStatus::Valid),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(llm.calls(TASK_RELEVANCY_SCHEMA_NAME), 1);
        assert_eq!(llm.calls(VALIDITY_SCHEMA_NAME), 1);
    }

    #[tokio::test]
    async fn failed_job_leaves_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new().with_error(TERM_LIST_SCHEMA_NAME, "quota exceeded"));
        let runner = start(&dir, llm, settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("Contract.docx");

        runner
            .dispatch(Job::Extract {
                key: key.clone(),
                document: build_docx(&["Contract"]),
            })
            .unwrap();

        match wait_terminal(|| runner.terms_state(&key).unwrap()).await {
            JobState::Failed(marker) => assert!(marker.error.contains("quota exceeded")),
            other => panic!("unexpected state {other:?}"),
        }
        assert!(!runner.caches().terms.exists(&key));
    }

    #[tokio::test]
    async fn corrupt_document_fails_without_calling_model() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new());
        let runner = start(&dir, llm.clone(), settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("broken.docx");

        runner
            .dispatch(Job::Extract {
                key: key.clone(),
                document: b"not a zip".to_vec(),
            })
            .unwrap();

        let state = wait_terminal(|| runner.terms_state(&key).unwrap()).await;
        assert!(matches!(state, JobState::Failed(_)));
        assert_eq!(llm.calls(TERM_LIST_SCHEMA_NAME), 0);
    }

    #[tokio::test]
    async fn timeout_writes_tombstone_and_discards_late_result() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(scripted_validation().with_delay(Duration::from_millis(300)));
        let runner = start(&dir, llm, settings(Duration::from_millis(50)));
        let task = Task::new("Build API", "100");
        let key = CacheKey::for_judgement(&task.description, &terms()).unwrap();

        runner
            .dispatch(Job::Validate {
                key: key.clone(),
                task,
                terms: terms(),
            })
            .unwrap();

        match wait_terminal(|| runner.judgement_state(&key).unwrap()).await {
            JobState::Failed(marker) => assert!(marker.error.contains("timed out")),
            other => panic!("unexpected state {other:?}"),
        }

        // Both stages sleep; give the abandoned job time to finish.
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!runner.caches().judgements.exists(&key));
    }

    #[tokio::test]
    async fn redispatch_after_failure_clears_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(
            MockLlmClient::new()
                .with_error(TERM_LIST_SCHEMA_NAME, "temporary outage")
                .with_reply(
                    TERM_LIST_SCHEMA_NAME,
                    json!({"terms": [{"section": "1", "name": "Scope", "description": "Dev"}]}),
                ),
        );
        let runner = start(&dir, llm, settings(Duration::from_secs(5)));
        let key = CacheKey::from_filename("Contract.docx");
        let job = || Job::Extract {
            key: key.clone(),
            document: build_docx(&["Contract"]),
        };

        runner.dispatch(job()).unwrap();
        let state = wait_terminal(|| runner.terms_state(&key).unwrap()).await;
        assert!(matches!(state, JobState::Failed(_)));

        runner.dispatch(job()).unwrap();
        let state = wait_terminal(|| runner.terms_state(&key).unwrap()).await;
        assert!(matches!(state, JobState::Complete(_)));
        assert!(runner.caches().terms.failure(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn full_queue_rejects_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(scripted_validation().with_delay(Duration::from_millis(200)));
        let mut settings = settings(Duration::from_secs(5));
        settings.workers = 1;
        settings.queue_depth = 1;
        let runner = start(&dir, llm, settings);

        let results: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|description| {
                let key = CacheKey::for_judgement(description, &terms()).unwrap();
                runner.dispatch(Job::Validate {
                    key,
                    task: Task::new(*description, "1"),
                    terms: terms(),
                })
            })
            .collect();

        assert!(results.iter().any(|r| r == &Err(JobError::QueueFull)));
        let rejected = results
            .iter()
            .zip(["a", "b", "c"])
            .find(|(r, _)| r.is_err())
            .map(|(_, d)| d)
            .unwrap();
        let key = CacheKey::for_judgement(rejected, &terms()).unwrap();
        assert!(!runner.is_in_flight(JobKind::Validation, &key));
    }
}
