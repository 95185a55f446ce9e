//! Web surface.
//!
//! Every page is server-rendered HTML; long-running work is started in the
//! background and the browser polls a fragment endpoint until the result is
//! in the cache. `app_router()` returns a `Router` that can be mounted on
//! any axum server.

pub mod endpoints;
pub mod error;
pub mod render;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::app_router;
pub use server::{serve, start_server_on, ServerError, ServerHandle};
pub use types::AppContext;
