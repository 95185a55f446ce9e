use std::sync::Arc;

use crate::cache::Caches;
use crate::jobs::{JobRunner, RunnerSettings};
use crate::pipeline::llm::LlmClient;

// ═══════════════════════════════════════════════════════════
// App context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes.
#[derive(Clone)]
pub struct AppContext {
    pub caches: Arc<Caches>,
    pub runner: JobRunner,
}

impl AppContext {
    /// Wire the caches to a fresh job runner. Must be called from within a
    /// tokio runtime.
    pub fn new(caches: Arc<Caches>, llm: Arc<dyn LlmClient>, settings: RunnerSettings) -> Self {
        let runner = JobRunner::start(caches.clone(), llm, settings);
        Self { caches, runner }
    }
}
