use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::types::{LlmClient, StructuredRequest};
use super::LlmError;

type Reply = Result<serde_json::Value, String>;

/// Mock LLM client for testing (no network dependency).
///
/// Replies are scripted per schema name. Several replies for one schema are
/// returned in order; the last one repeats once the queue is down to it.
#[derive(Default)]
pub struct MockLlmClient {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    prompts: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, schema_name: &str, reply: serde_json::Value) -> Self {
        self.push(schema_name, Ok(reply));
        self
    }

    /// Script a provider failure for `schema_name`.
    pub fn with_error(self, schema_name: &str, message: &str) -> Self {
        self.push(schema_name, Err(message.to_string()));
        self
    }

    /// Block every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made with `schema_name`.
    pub fn calls(&self, schema_name: &str) -> usize {
        self.lock_prompts()
            .iter()
            .filter(|(name, _)| name == schema_name)
            .count()
    }

    /// Prompts sent with `schema_name`, oldest first.
    pub fn prompts(&self, schema_name: &str) -> Vec<String> {
        self.lock_prompts()
            .iter()
            .filter(|(name, _)| name == schema_name)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    fn push(&self, schema_name: &str, reply: Reply) {
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        replies
            .entry(schema_name.to_string())
            .or_default()
            .push_back(reply);
    }

    fn lock_prompts(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LlmClient for MockLlmClient {
    fn complete_structured(
        &self,
        request: &StructuredRequest<'_>,
    ) -> Result<serde_json::Value, LlmError> {
        self.lock_prompts()
            .push((request.schema_name.to_string(), request.prompt.to_string()));

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        let queue = replies
            .get_mut(request.schema_name)
            .ok_or(LlmError::EmptyResponse)?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        match reply {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(LlmError::Provider {
                status: 500,
                body: message,
            }),
            None => Err(LlmError::EmptyResponse),
        }
    }
}
