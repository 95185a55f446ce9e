//! Two-stage task validation.
//!
//! ```text
//! classify-relevance ─┬─ not relevant ──────────────────────> INVALID
//!                     └─ relevant ─> classify-validity ─┬──> VALID
//!                                                       ├──> INVALID
//!                                                       └──> AMBIGUOUS
//! ```

use thiserror::Error;

use super::llm::{request_structured, schema, LlmClient, LlmError, StructuredRequest};
use super::prompt::{build_relevancy_prompt, build_validity_prompt, LEGAL_SYSTEM_PROMPT};
use crate::models::{
    Judgement, JudgementStatus, Task, TaskRelevancy, TermSet, ValidityAssessment,
};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Relevance check failed: {0}")]
    Relevance(#[source] LlmError),

    #[error("Validity check failed: {0}")]
    Validity(#[source] LlmError),
}

/// Judge one task against a term set.
pub fn validate_task(
    llm: &dyn LlmClient,
    model: &str,
    task: &Task,
    terms: &TermSet,
) -> Result<Judgement, ValidationError> {
    let relevancy = classify_relevance(llm, model, task, terms)?;

    if !relevancy.relevant {
        tracing::info!(
            ambiguous = relevancy.ambiguous,
            "Task not relevant to contract objective, skipping validity check"
        );
        return Ok(not_relevant(task, relevancy));
    }

    let assessment = classify_validity(llm, model, task, terms)?;
    tracing::info!(
        status = assessment.status.as_str(),
        related_terms = assessment.related_terms.len(),
        "Task validated"
    );

    Ok(Judgement {
        task: task.clone(),
        status: assessment.status,
        ambiguous: relevancy.ambiguous || assessment.status == JudgementStatus::Ambiguous,
        related_terms: TermSet::new(assessment.related_terms),
        explanation: assessment.explanation,
        contract_objective: Some(relevancy.contract_objective),
    })
}

fn classify_relevance(
    llm: &dyn LlmClient,
    model: &str,
    task: &Task,
    terms: &TermSet,
) -> Result<TaskRelevancy, ValidationError> {
    let prompt = build_relevancy_prompt(task, terms);
    let schema = schema::task_relevancy();
    let request = StructuredRequest {
        model,
        system: LEGAL_SYSTEM_PROMPT,
        prompt: &prompt,
        schema_name: schema::TASK_RELEVANCY_SCHEMA_NAME,
        schema: &schema,
    };
    request_structured(llm, &request).map_err(ValidationError::Relevance)
}

fn classify_validity(
    llm: &dyn LlmClient,
    model: &str,
    task: &Task,
    terms: &TermSet,
) -> Result<ValidityAssessment, ValidationError> {
    let prompt = build_validity_prompt(task, terms);
    let schema = schema::validity_assessment();
    let request = StructuredRequest {
        model,
        system: LEGAL_SYSTEM_PROMPT,
        prompt: &prompt,
        schema_name: schema::VALIDITY_SCHEMA_NAME,
        schema: &schema,
    };
    request_structured(llm, &request).map_err(ValidationError::Validity)
}

fn not_relevant(task: &Task, relevancy: TaskRelevancy) -> Judgement {
    let explanation = if relevancy.ambiguous {
        format!(
            "The relevance of this task to the contract could not be determined confidently. \
             It does not appear to serve the contract's main objective: {}",
            relevancy.contract_objective
        )
    } else {
        format!(
            "This task is not relevant to the contract's main objective: {}",
            relevancy.contract_objective
        )
    };

    Judgement {
        task: task.clone(),
        status: JudgementStatus::Invalid,
        ambiguous: relevancy.ambiguous,
        related_terms: TermSet::default(),
        explanation,
        contract_objective: Some(relevancy.contract_objective),
    }
}
