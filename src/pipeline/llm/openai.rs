use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{LlmClient, StructuredRequest};
use super::{extract_json, LlmError};
use crate::config::LlmConfig;

/// Client for an OpenAI-compatible `/chat/completions` endpoint using
/// `response_format: json_schema` with strict schemas.
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(&config.base_url, config.api_key.clone(), config.request_timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the HTTP client for one call.
    ///
    /// A blocking reqwest client owns its own runtime and must be dropped off
    /// the async executor, so it lives only inside the blocking call.
    fn http(&self) -> Result<reqwest::blocking::Client, LlmError> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat<'a>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

fn build_request<'a>(request: &StructuredRequest<'a>) -> ChatRequest<'a> {
    ChatRequest {
        model: request.model,
        messages: [
            ChatMessage {
                role: "system",
                content: request.system,
            },
            ChatMessage {
                role: "user",
                content: request.prompt,
            },
        ],
        response_format: ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: request.schema_name,
                strict: true,
                schema: request.schema,
            },
        },
        temperature: 0.0,
    }
}

/// Turn a raw `/chat/completions` body into the model's JSON reply.
fn parse_chat_response(body: &str) -> Result<serde_json::Value, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or(LlmError::EmptyResponse)?;

    if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(LlmError::Refusal(refusal));
    }

    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    serde_json::from_str(extract_json(&content))
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

impl LlmClient for OpenAiClient {
    fn complete_structured(
        &self,
        request: &StructuredRequest<'_>,
    ) -> Result<serde_json::Value, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let body = build_request(request);

        tracing::debug!(
            model = request.model,
            schema = request.schema_name,
            prompt_chars = request.prompt.len(),
            "Sending structured completion"
        );

        let response = self
            .http()?
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_secs())
                } else {
                    LlmError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_chat_response(&text)
    }
}
