use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "termcheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Contract documents must carry this extension.
pub const CONTRACT_EXTENSION: &str = ".docx";
/// Task lists must carry this extension.
pub const TASK_LIST_EXTENSION: &str = ".xlsx";

/// Polling interval used by pending fragments.
pub const POLL_INTERVAL: &str = "1s";

const DEFAULT_BIND: &str = "127.0.0.1:5001";
const DEFAULT_CACHE_DIR: &str = "terms_cache";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_VALIDATION_MODEL: &str = "gpt-4o-2024-08-06";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 300;
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Maximum accepted upload size (20 MB).
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// True when `DEBUG=1` is set in the environment.
pub fn debug_enabled() -> bool {
    std::env::var("DEBUG").map(|v| v == "1").unwrap_or(false)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if debug_enabled() {
        "termcheck_lib=debug,termcheck=debug,tower_http=debug,info"
    } else {
        "termcheck_lib=info,termcheck=info,warn"
    }
}

/// Settings for the LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub extraction_model: String,
    pub validation_model: String,
    pub request_timeout: Duration,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub cache_dir: PathBuf,
    pub llm: LlmConfig,
    pub job_timeout: Duration,
    pub workers: usize,
    pub queue_depth: usize,
}

impl AppConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset. Malformed values are reported, not ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("TERMCHECK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "TERMCHECK_BIND",
            value: bind_raw.clone(),
        })?;

        let cache_dir = lookup("TERMCHECK_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        let llm = LlmConfig {
            base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            extraction_model: lookup("TERMCHECK_EXTRACTION_MODEL")
                .unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
            validation_model: lookup("TERMCHECK_VALIDATION_MODEL")
                .unwrap_or_else(|| DEFAULT_VALIDATION_MODEL.to_string()),
            request_timeout: Duration::from_secs(parse_number(
                &lookup,
                "TERMCHECK_LLM_TIMEOUT_SECS",
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
        };

        let job_timeout = Duration::from_secs(parse_number(
            &lookup,
            "TERMCHECK_JOB_TIMEOUT_SECS",
            DEFAULT_JOB_TIMEOUT_SECS,
        )?);
        let workers = parse_number(&lookup, "TERMCHECK_WORKERS", DEFAULT_WORKERS)?.max(1);
        let queue_depth =
            parse_number(&lookup, "TERMCHECK_QUEUE_DEPTH", DEFAULT_QUEUE_DEPTH)?.max(1);

        Ok(Self {
            bind,
            cache_dir,
            llm,
            job_timeout,
            workers,
            queue_depth,
        })
    }
}

fn parse_number<F, N>(lookup: &F, name: &'static str, default: N) -> Result<N, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
