//! Task list upload.

use axum::extract::{Multipart, Path, State};
use axum::response::Html;

use super::{blocking, read_file_field};
use crate::api::error::ApiError;
use crate::api::render;
use crate::api::types::AppContext;
use crate::cache::CacheKey;
use crate::config::TASK_LIST_EXTENSION;
use crate::pipeline::loader::read_tasks;

/// `POST /terms/:key/tasks`: parse a task list and render one validate
/// form per task.
pub async fn upload(
    State(ctx): State<AppContext>,
    Path(raw_key): Path<String>,
    mut multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let key = CacheKey::parse(&raw_key)?;
    let caches = ctx.caches.clone();
    let lookup_key = key.clone();
    if !blocking(move || Ok(caches.terms.exists(&lookup_key))).await? {
        return Err(ApiError::NotFound(format!("No extracted terms for {key}")));
    }

    let file = read_file_field(&mut multipart, "tf").await?;
    if !file.filename.ends_with(TASK_LIST_EXTENSION) {
        return Err(ApiError::UnsupportedFileType {
            expected: TASK_LIST_EXTENSION,
        });
    }

    let tasks = blocking(move || Ok(read_tasks(&file.bytes)?)).await?;

    tracing::info!(key = %key, tasks = tasks.len(), "Task list loaded");
    Ok(Html(render::task_table(&key, &tasks)))
}
