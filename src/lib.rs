pub mod api;
pub mod cache;
pub mod config;
pub mod jobs;
pub mod models;
pub mod pipeline;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheError, Caches};
use crate::config::{AppConfig, ConfigError};
use crate::jobs::RunnerSettings;
use crate::pipeline::llm::OpenAiClient;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Cannot open cache: {0}")]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Start the service and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    if config.llm.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; extraction and validation jobs will fail");
    }

    let caches = Arc::new(Caches::open(&config.cache_dir)?);
    let llm = Arc::new(OpenAiClient::from_config(&config.llm));
    let ctx = api::AppContext::new(caches, llm, runner_settings(&config));

    api::serve(config.bind, ctx).await?;
    Ok(())
}

fn runner_settings(config: &AppConfig) -> RunnerSettings {
    RunnerSettings {
        workers: config.workers,
        queue_depth: config.queue_depth,
        job_timeout: config.job_timeout,
        extraction_model: config.llm.extraction_model.clone(),
        validation_model: config.llm.validation_model.clone(),
    }
}
