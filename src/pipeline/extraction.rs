use serde::Deserialize;
use thiserror::Error;

use super::llm::{request_structured, schema, LlmClient, LlmError, StructuredRequest};
use super::prompt::{build_extraction_prompt, LEGAL_SYSTEM_PROMPT};
use crate::models::{Term, TermSet};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document has no text to extract terms from")]
    EmptyDocument,

    #[error("Term extraction failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Deserialize)]
struct TermListReply {
    terms: Vec<Term>,
}

/// Ask the model for every key term in `paragraphs`.
///
/// One call produces the whole set; a reply that does not fit the term list
/// schema is an error, never a partial set.
pub fn extract_terms(
    llm: &dyn LlmClient,
    model: &str,
    paragraphs: &[String],
) -> Result<TermSet, ExtractionError> {
    if paragraphs.is_empty() {
        return Err(ExtractionError::EmptyDocument);
    }

    let prompt = build_extraction_prompt(paragraphs);
    let schema = schema::term_list();
    let request = StructuredRequest {
        model,
        system: LEGAL_SYSTEM_PROMPT,
        prompt: &prompt,
        schema_name: schema::TERM_LIST_SCHEMA_NAME,
        schema: &schema,
    };

    let reply: TermListReply = request_structured(llm, &request)?;
    tracing::info!(
        paragraphs = paragraphs.len(),
        terms = reply.terms.len(),
        "Terms extracted"
    );
    Ok(TermSet::new(reply.terms))
}
