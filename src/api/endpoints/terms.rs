//! Contract upload, extraction polling and the JSON download.

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};

use super::{blocking, read_file_field};
use crate::api::error::ApiError;
use crate::api::render;
use crate::api::types::AppContext;
use crate::cache::CacheKey;
use crate::config::CONTRACT_EXTENSION;
use crate::jobs::Job;

/// `GET /`: upload form.
pub async fn index() -> Html<String> {
    Html(render::index_page())
}

/// `POST /upload`: accept a contract and start extracting its terms.
///
/// Uploading a file with the name of an earlier upload replaces its entry.
pub async fn upload(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let file = read_file_field(&mut multipart, "uf").await?;
    if !file.filename.ends_with(CONTRACT_EXTENSION) {
        tracing::info!(filename = %file.filename, "Rejected upload with wrong extension");
        return Err(ApiError::UnsupportedFileType {
            expected: CONTRACT_EXTENSION,
        });
    }

    let key = CacheKey::from_filename(&file.filename);
    tracing::info!(key = %key, bytes = file.bytes.len(), "Contract uploaded");

    let runner = ctx.runner.clone();
    let job_key = key.clone();
    let state = blocking(move || {
        runner.dispatch(Job::Extract {
            key: job_key.clone(),
            document: file.bytes,
        })?;
        Ok(runner.terms_state(&job_key)?)
    })
    .await?;
    Ok(Html(render::terms_fragment(&key, &state)))
}

/// `GET|POST /terms/:key`: extraction status or result.
pub async fn poll(
    State(ctx): State<AppContext>,
    Path(raw_key): Path<String>,
) -> Result<Html<String>, ApiError> {
    let key = CacheKey::parse(&raw_key)?;
    let runner = ctx.runner.clone();
    let poll_key = key.clone();
    let state = blocking(move || Ok(runner.terms_state(&poll_key)?)).await?;
    Ok(Html(render::terms_fragment(&key, &state)))
}

/// `GET /terms/:key/json`: the cached `{paragraphs, terms}` document.
pub async fn download(
    State(ctx): State<AppContext>,
    Path(raw_key): Path<String>,
) -> Result<Response, ApiError> {
    let key = CacheKey::parse(&raw_key)?;
    let caches = ctx.caches.clone();
    let read_key = key.clone();
    let bytes = blocking(move || Ok(caches.terms.get_raw(&read_key)?))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No extracted terms for {key}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{key}.json\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
