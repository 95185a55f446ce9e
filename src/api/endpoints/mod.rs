//! Route handlers, one module per resource.

pub mod health;
pub mod judgements;
pub mod tasks;
pub mod terms;

use axum::extract::Multipart;

use crate::api::error::ApiError;

/// A file part pulled out of a multipart body.
pub(crate) struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Read the file sent under `field_name`, ignoring any other parts.
pub(crate) async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let filename = field.file_name().unwrap_or("document").to_string();
        let bytes = field.bytes().await?;
        return Ok(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest(format!("No file provided in field {field_name:?}")))
}

/// Run cache and dispatch work on the blocking pool. Every cache call touches
/// the filesystem.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {e}")))?
}
