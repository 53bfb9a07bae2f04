use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_RECIPES_PATH: &str = "./data/recipes.json";
const DEFAULT_LLM_BASE_URL: &str = "http://127.0.0.1:11434/v1";
const DEFAULT_LLM_MODEL: &str = "llama3";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LLM_TEMPERATURE: f32 = 0.3;
const DEFAULT_LLM_MAX_ERROR_BODY_BYTES: usize = 8 * 1024;
const DEFAULT_GENERATION_MAX_COUNT: usize = 6;
const DEFAULT_SEARCH_MAX_LIMIT: usize = 50;
const DEFAULT_PLAN_FALLBACK_INGREDIENTS: &str = "egg,chicken,tofu,paneer,chickpeas,curd";

/// Application configuration loaded from environment variables.
///
/// Every setting has a default, so an empty environment yields a server that reads the
/// bundled seed corpus and talks to a local Ollama host.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON seed corpus. Used directly when Redis is off, imported into an empty Redis otherwise.
    pub recipes_path: PathBuf,
    /// Redis connection URL. `None` keeps the corpus in memory.
    pub redis_url: Option<String>,
    /// OpenAI-compatible base URL, including the `/v1` suffix.
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub llm_temperature: f32,
    pub llm_max_error_body_bytes: usize,
    pub generation_max_count: usize,
    pub search_max_limit: usize,
    pub plan_fallback_ingredients: Vec<String>,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Optional (defaults in parentheses):
    /// - `RECIPES_PATH` (`./data/recipes.json`)
    /// - `REDIS_URL` (unset: in-memory corpus)
    /// - `LLM_BASE_URL` (`http://127.0.0.1:11434/v1`), `LLM_MODEL` (`llama3`)
    /// - `LLM_TIMEOUT_SECS` (120), `LLM_TEMPERATURE` (0.3), `LLM_MAX_ERROR_BODY_BYTES` (8192)
    /// - `GENERATION_MAX_COUNT` (6), `SEARCH_MAX_LIMIT` (50)
    /// - `PLAN_FALLBACK_INGREDIENTS` (`egg,chicken,tofu,paneer,chickpeas,curd`)
    /// - `MCP_TCP_LISTEN_ADDR` (unset: stdio)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let llm_timeout_secs: u64 = parse(&get, "LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?;
        if llm_timeout_secs == 0 {
            return Err(AppError::Config("LLM_TIMEOUT_SECS must be positive".to_string()));
        }
        let llm_temperature: f32 = parse(&get, "LLM_TEMPERATURE", DEFAULT_LLM_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&llm_temperature) {
            return Err(AppError::Config(
                "LLM_TEMPERATURE must be between 0 and 2".to_string(),
            ));
        }
        let generation_max_count =
            parse(&get, "GENERATION_MAX_COUNT", DEFAULT_GENERATION_MAX_COUNT)?;
        let search_max_limit = parse(&get, "SEARCH_MAX_LIMIT", DEFAULT_SEARCH_MAX_LIMIT)?;
        if generation_max_count == 0 || search_max_limit == 0 {
            return Err(AppError::Config(
                "GENERATION_MAX_COUNT and SEARCH_MAX_LIMIT must be positive".to_string(),
            ));
        }

        let plan_fallback_ingredients = get("PLAN_FALLBACK_INGREDIENTS")
            .unwrap_or_else(|| DEFAULT_PLAN_FALLBACK_INGREDIENTS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            recipes_path: PathBuf::from(
                get("RECIPES_PATH").unwrap_or_else(|| DEFAULT_RECIPES_PATH.to_string()),
            ),
            redis_url: get("REDIS_URL"),
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            llm_temperature,
            llm_max_error_body_bytes: parse(
                &get,
                "LLM_MAX_ERROR_BODY_BYTES",
                DEFAULT_LLM_MAX_ERROR_BODY_BYTES,
            )?,
            generation_max_count,
            search_max_limit,
            plan_fallback_ingredients,
            tcp_listen_addr: get("MCP_TCP_LISTEN_ADDR"),
        })
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has invalid value {raw:?}"))),
    }
}
