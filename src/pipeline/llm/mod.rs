//! Structured-output access to a hosted language model.
//!
//! Every call carries a JSON schema; the reply is parsed against the caller's
//! type immediately and rejected if it does not fit. Nothing downstream ever
//! sees an unchecked model response.

pub mod mock;
pub mod openai;
pub mod schema;
pub mod types;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use types::{LlmClient, StructuredRequest};

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM provider is not reachable at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM provider returned error (status {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("No API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Model refused the request: {0}")]
    Refusal(String),

    #[error("LLM returned no content")]
    EmptyResponse,

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM response does not match the {schema} schema: {detail}")]
    SchemaMismatch { schema: String, detail: String },
}

/// Run one structured completion and parse the reply into `T`.
pub fn request_structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: &StructuredRequest<'_>,
) -> Result<T, LlmError> {
    let value = client.complete_structured(request)?;
    serde_json::from_value(value).map_err(|e| LlmError::SchemaMismatch {
        schema: request.schema_name.to_string(),
        detail: e.to_string(),
    })
}

/// Pull a JSON document out of model text, tolerating a fenced code block.
pub fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip an optional language tag on the opening fence line.
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    trimmed
}
