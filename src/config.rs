//! Configuration management for Aegis.
//!
//! Configuration can be set via environment variables:
//! - `GEMINI_API_KEY` - Required unless `MOCK_MODE` is on. Key for the Gemini API.
//! - `DEFAULT_MODEL` - Optional. Generation model. Defaults to `gemini-1.5-flash`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `MAX_ITERATIONS` - Optional. Iteration ceiling per session. Defaults to `15`.
//! - `LLM_TIMEOUT_SECS` - Optional. Timeout for one reasoning call. Defaults to `60`.
//! - `TOOL_TIMEOUT_SECS` - Optional. Timeout for one tool call. Defaults to `30`.
//! - `MAX_OBSERVATION_CHARS` - Optional. Observation truncation limit. Defaults to `4000`.
//! - `MOCK_MODE` - Optional. Answer with canned responses instead of calling Gemini.
//! - `DATABASE_PATH` - Optional. SQLite financials database. Defaults to `financials.db`.
//! - `TAVILY_API_KEY` - Optional. Enables the `web_search` tool.
//! - `ENABLE_DOCUMENT_TOOL` - Optional. Enables the `query_10k_report` tool.
//! - `CHROMA_HOST` / `CHROMA_PORT` - Optional. Vector store location.
//! - `COLLECTION_NAME` - Optional. Vector collection. Defaults to `google_10k_2023`.
//! - `EMBED_MODEL` - Optional. Embedding model. Defaults to `text-embedding-004`.
//! - `RETRIEVAL_TOP_K` - Optional. Chunks retrieved per document query. Defaults to `5`.
//! - `ENABLED_TOOLS` - Optional. Comma-separated allow-list of tool names.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Tool catalog configuration.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// SQLite database holding the `quarterly_financials` table
    pub database_path: PathBuf,

    /// Tavily API key (web search is disabled without it)
    pub tavily_api_key: Option<String>,

    /// Feature flag for the 10-K document retrieval tool
    pub enable_document_tool: bool,

    /// Chroma host
    pub chroma_host: String,

    /// Chroma port
    pub chroma_port: u16,

    /// Chroma collection holding the report chunks
    pub collection_name: String,

    /// Embedding model used to embed retrieval queries
    pub embed_model: String,

    /// Number of chunks retrieved per query
    pub top_k: usize,

    /// Optional allow-list; `None` keeps every available tool
    pub enabled_tools: Option<Vec<String>>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("financials.db"),
            tavily_api_key: None,
            enable_document_tool: false,
            chroma_host: "localhost".to_string(),
            chroma_port: 8000,
            collection_name: "google_10k_2023".to_string(),
            embed_model: "text-embedding-004".to_string(),
            top_k: 5,
            enabled_tools: None,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: Option<String>,

    /// Generation model identifier
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Timeout for a single reasoning engine call
    pub llm_timeout: Duration,

    /// Timeout for a single tool invocation
    pub tool_timeout: Duration,

    /// Observations longer than this are truncated before entering the scratchpad
    pub max_observation_chars: usize,

    /// Canned responses instead of real model calls
    pub mock_mode: bool,

    /// Tool catalog configuration
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set outside
    /// mock mode, and `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mock_mode = env_bool("MOCK_MODE")?.unwrap_or(false);

        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() && !mock_mode {
            return Err(ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()));
        }

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_parse("PORT", 8000u16)?;

        let max_iterations = env_parse("MAX_ITERATIONS", 15usize)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let llm_timeout = Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 60u64)?);
        let tool_timeout = Duration::from_secs(env_parse("TOOL_TIMEOUT_SECS", 30u64)?);
        let max_observation_chars = env_parse("MAX_OBSERVATION_CHARS", 4000usize)?;

        let defaults = ToolsConfig::default();
        let tools = ToolsConfig {
            database_path: std::env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            tavily_api_key: std::env::var("TAVILY_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            enable_document_tool: env_bool("ENABLE_DOCUMENT_TOOL")?.unwrap_or(false),
            chroma_host: std::env::var("CHROMA_HOST").unwrap_or(defaults.chroma_host),
            chroma_port: env_parse("CHROMA_PORT", defaults.chroma_port)?,
            collection_name: std::env::var("COLLECTION_NAME").unwrap_or(defaults.collection_name),
            embed_model: std::env::var("EMBED_MODEL").unwrap_or(defaults.embed_model),
            top_k: env_parse("RETRIEVAL_TOP_K", defaults.top_k)?,
            enabled_tools: std::env::var("ENABLED_TOOLS")
                .ok()
                .map(|v| parse_name_list(&v)),
        };

        Ok(Self {
            api_key,
            default_model,
            host,
            port,
            max_iterations,
            llm_timeout,
            tool_timeout,
            max_observation_chars,
            mock_mode,
            tools,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_key,
            default_model,
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_iterations: 15,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            max_observation_chars: 4000,
            mock_mode: false,
            tools: ToolsConfig::default(),
        }
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    std::env::var(name)
        .ok()
        .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue(name.to_string(), e)))
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

/// Split a comma-separated list, dropping blanks.
pub(crate) fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
