//! Task validation submission and polling.

use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::Form;
use serde::Deserialize;

use super::blocking;
use crate::api::error::ApiError;
use crate::api::render;
use crate::api::types::AppContext;
use crate::cache::CacheKey;
use crate::jobs::{Dispatch, Job};
use crate::models::Task;

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    pub terms_key: String,
    pub description: String,
    #[serde(default)]
    pub amount: String,
}

/// `GET /validate?terms_key=..&description=..&amount=..`
pub async fn validate_query(
    State(ctx): State<AppContext>,
    Query(params): Query<ValidateParams>,
) -> Result<Html<String>, ApiError> {
    blocking(move || submit(&ctx, params)).await
}

/// `POST /validate` with the same fields form-encoded.
pub async fn validate_form(
    State(ctx): State<AppContext>,
    Form(params): Form<ValidateParams>,
) -> Result<Html<String>, ApiError> {
    blocking(move || submit(&ctx, params)).await
}

/// Start (or reuse) the judgement of one task against a cached term set.
///
/// A cached judgement is returned as is. Otherwise a job is dispatched, which
/// also retries after an earlier failure.
fn submit(ctx: &AppContext, params: ValidateParams) -> Result<Html<String>, ApiError> {
    let terms_key = CacheKey::parse(&params.terms_key)?;
    if params.description.trim().is_empty() {
        return Err(ApiError::BadRequest("Task description is empty".into()));
    }

    let entry = ctx
        .caches
        .terms
        .get(&terms_key)?
        .ok_or_else(|| ApiError::NotFound(format!("No extracted terms for {terms_key}")))?;
    let terms = entry.term_set();
    let key = CacheKey::for_judgement(&params.description, &terms)?;

    if ctx.caches.judgements.exists(&key) {
        tracing::debug!(key = %key, "Judgement cache hit");
    } else {
        let task = Task::new(params.description, params.amount);
        if let Dispatch::Queued(job_id) = ctx.runner.dispatch(Job::Validate {
            key: key.clone(),
            task,
            terms,
        })? {
            tracing::debug!(key = %key, job_id = %job_id, terms_key = %terms_key, "Validation dispatched");
        }
    }

    let state = ctx.runner.judgement_state(&key)?;
    Ok(Html(render::judgement_fragment(&key, &state)))
}

/// `GET|POST /judgements/:key`: validation status or verdict.
pub async fn poll(
    State(ctx): State<AppContext>,
    Path(raw_key): Path<String>,
) -> Result<Html<String>, ApiError> {
    let key = CacheKey::parse(&raw_key)?;
    let runner = ctx.runner.clone();
    let poll_key = key.clone();
    let state = blocking(move || Ok(runner.judgement_state(&poll_key)?)).await?;
    Ok(Html(render::judgement_fragment(&key, &state)))
}
