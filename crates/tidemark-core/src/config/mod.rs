//! Engine configuration loaded from the process environment.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::models::OwnerId;
use crate::util::{is_http_url, normalize_text_option};

const ENV_API_BASE_URL: &str = "TIDEMARK_API_BASE_URL";
const ENV_API_TOKEN: &str = "TIDEMARK_API_TOKEN";
const ENV_DB_PATH: &str = "TIDEMARK_DB_PATH";
const ENV_CACHE_DIR: &str = "TIDEMARK_CACHE_DIR";
const ENV_OWNER_ID: &str = "TIDEMARK_OWNER_ID";

const DEFAULT_DB_PATH: &str = "tidemark.db";
const DEFAULT_CACHE_DIR: &str = "tidemark-cache";

/// Everything the engine needs to talk to its stores.
///
/// Secrets stay in the environment; this struct is assembled per process
/// and never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Sync service base URL, e.g. `https://api.example.com`.
    pub api_base_url: String,
    /// Bearer token for the sync service.
    pub api_token: String,
    /// Local database file path.
    pub db_path: PathBuf,
    /// Local attachment cache directory.
    pub cache_dir: PathBuf,
    /// Owner to sync as, when configured via environment.
    pub owner_id: Option<OwnerId>,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// `TIDEMARK_API_BASE_URL` and `TIDEMARK_API_TOKEN` are required; the
    /// database path, cache directory, and owner have defaults or are
    /// optional.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<EngineConfig> {
    let api_base_url = normalize_text_option(lookup(ENV_API_BASE_URL));
    let api_token = normalize_text_option(lookup(ENV_API_TOKEN));

    let mut missing = Vec::new();
    if api_base_url.is_none() {
        missing.push(ENV_API_BASE_URL);
    }
    if api_token.is_none() {
        missing.push(ENV_API_TOKEN);
    }
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Engine configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    let api_base_url = api_base_url.expect("validated above");
    if !is_http_url(&api_base_url) {
        return Err(Error::InvalidInput(format!(
            "{ENV_API_BASE_URL} must include http:// or https://"
        )));
    }

    let db_path = normalize_text_option(lookup(ENV_DB_PATH))
        .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from);
    let cache_dir = normalize_text_option(lookup(ENV_CACHE_DIR))
        .map_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR), PathBuf::from);

    let owner_id = normalize_text_option(lookup(ENV_OWNER_ID))
        .map(OwnerId::new)
        .transpose()?;

    Ok(EngineConfig {
        api_base_url: api_base_url.trim_end_matches('/').to_string(),
        api_token: api_token.expect("validated above"),
        db_path,
        cache_dir,
        owner_id,
    })
}
