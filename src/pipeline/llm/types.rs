use super::LlmError;

/// One structured-output completion request.
#[derive(Debug, Clone, Copy)]
pub struct StructuredRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    /// Name reported to the provider and used in error messages.
    pub schema_name: &'a str,
    pub schema: &'a serde_json::Value,
}

/// LLM client abstraction (allows mocking).
///
/// Calls are blocking; run them off the async runtime.
pub trait LlmClient: Send + Sync {
    /// Return the model's reply as JSON. Conformance to the schema is checked
    /// by the caller.
    fn complete_structured(
        &self,
        request: &StructuredRequest<'_>,
    ) -> Result<serde_json::Value, LlmError>;
}
