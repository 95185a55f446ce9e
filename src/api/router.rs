use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints::{health, judgements, tasks, terms};
use crate::api::types::AppContext;
use crate::config::MAX_UPLOAD_BYTES;

/// Build the application router.
///
/// Polling endpoints accept both GET and POST: htmx polls with POST, a
/// browser reload or a script uses GET.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn app_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(terms::index))
        .route("/health", get(health::check))
        .route("/upload", post(terms::upload))
        .route("/terms/:key", get(terms::poll).post(terms::poll))
        .route("/terms/:key/json", get(terms::download))
        .route("/terms/:key/tasks", post(tasks::upload))
        .route(
            "/validate",
            get(judgements::validate_query).post(judgements::validate_form),
        )
        .route(
            "/judgements/:key",
            get(judgements::poll).post(judgements::poll),
        )
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}
