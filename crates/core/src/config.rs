//! Configuration management for the estate RAG tool.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - YAML config file (`estate.yaml` in the working directory, or an explicit path)
//! - Environment variables (`ESTATE_*`)
//! - Command-line flags
//!
//! The external-service credential is only ever read from the environment.
//! It is skipped during serialization and redacted from `Debug` output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "estate.yaml";

/// Environment variable that always takes precedence for the credential.
pub const API_KEY_ENV: &str = "ESTATE_API_KEY";

const CHAT_PROVIDERS: [&str; 2] = ["openai", "ollama"];
const EMBEDDING_PROVIDERS: [&str; 3] = ["openai", "ollama", "mock"];
const METRICS: [&str; 5] = ["euclidean", "l2", "inner_product", "ip", "dot"];

/// Main application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Chat-completion provider ("openai", "ollama")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Optional chat endpoint override
    pub endpoint: Option<String>,

    /// System prompt sent with every completion
    pub system_prompt: String,

    /// Embedding provider ("openai", "ollama", "mock")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Dimensionality produced by the embedding model
    pub embedding_dimensions: usize,

    /// Optional embedding endpoint override
    pub embedding_endpoint: Option<String>,

    /// Texts per embedding request
    pub embedding_batch_size: usize,

    /// Maximum characters per guideline chunk
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,

    /// Number of items retrieved per question
    pub top_k: usize,

    /// Distance metric for the vector store
    pub metric: String,

    /// Attempts per external call (first try included)
    pub max_attempts: u32,

    /// Backoff before the first retry, doubled each attempt
    pub initial_backoff_ms: u64,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Name of the environment variable holding the credential
    pub api_key_env: String,

    /// Credential, resolved from the environment only
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Log filter override
    pub log_level: Option<String>,

    /// Log output format ("pretty", "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    embedding: Option<EmbeddingSection>,
    retrieval: Option<RetrievalSection>,
    retry: Option<RetrySection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(rename = "systemPrompt")]
    system_prompt: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    endpoint: Option<String>,
    #[serde(rename = "batchSize")]
    batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetrievalSection {
    #[serde(rename = "chunkSize")]
    chunk_size: Option<usize>,
    #[serde(rename = "chunkOverlap")]
    chunk_overlap: Option<usize>,
    #[serde(rename = "topK")]
    top_k: Option<usize>,
    metric: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetrySection {
    #[serde(rename = "maxAttempts")]
    max_attempts: Option<u32>,
    #[serde(rename = "initialBackoffMs")]
    initial_backoff_ms: Option<u64>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

/// Command-line overrides applied on top of file and environment settings.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            provider: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            endpoint: None,
            system_prompt: "You are a helpful real estate assistant.".to_string(),
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            embedding_endpoint: None,
            embedding_batch_size: 64,
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 5,
            metric: "euclidean".to_string(),
            max_attempts: 3,
            initial_backoff_ms: 500,
            request_timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            log_level: None,
            log_format: "pretty".to_string(),
            verbose: false,
            no_color: false,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("config_file", &self.config_file)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("embedding_endpoint", &self.embedding_endpoint)
            .field("embedding_batch_size", &self.embedding_batch_size)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("top_k", &self.top_k)
            .field("metric", &self.metric)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("log_level", &self.log_level)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional YAML file and the environment.
    ///
    /// When `config_file` is `None`, `ESTATE_CONFIG` is consulted, then
    /// `estate.yaml` in the working directory. An explicitly named file that
    /// does not exist is an error; the implicit default is optional.
    ///
    /// Environment variables:
    /// - `ESTATE_CONFIG`: Path to config file
    /// - `ESTATE_PROVIDER` / `ESTATE_MODEL`: chat provider and model
    /// - `ESTATE_EMBEDDING_PROVIDER` / `ESTATE_EMBEDDING_MODEL`: embedding provider and model
    /// - `ESTATE_TOP_K`: retrieved item count
    /// - `ESTATE_API_KEY`: credential (else the variable named by `apiKeyEnv`)
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use estate_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Model: {}", config.model);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ESTATE_CONFIG").ok().map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Some(path)
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            config = config.merge_yaml(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?;
            config.config_file = Some(path);
        }

        config.apply_env();
        config.api_key = config.resolve_api_key();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration text into this config.
    fn merge_yaml(&self, contents: &str) -> AppResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(llm) = file.llm {
            merge(&mut result.provider, llm.provider);
            merge(&mut result.model, llm.model);
            merge(&mut result.system_prompt, llm.system_prompt);
            merge(&mut result.api_key_env, llm.api_key_env);
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
        }

        if let Some(embedding) = file.embedding {
            merge(&mut result.embedding_provider, embedding.provider);
            merge(&mut result.embedding_model, embedding.model);
            merge(&mut result.embedding_dimensions, embedding.dimensions);
            merge(&mut result.embedding_batch_size, embedding.batch_size);
            if embedding.endpoint.is_some() {
                result.embedding_endpoint = embedding.endpoint;
            }
        }

        if let Some(retrieval) = file.retrieval {
            merge(&mut result.chunk_size, retrieval.chunk_size);
            merge(&mut result.chunk_overlap, retrieval.chunk_overlap);
            merge(&mut result.top_k, retrieval.top_k);
            merge(&mut result.metric, retrieval.metric);
        }

        if let Some(retry) = file.retry {
            merge(&mut result.max_attempts, retry.max_attempts);
            merge(&mut result.initial_backoff_ms, retry.initial_backoff_ms);
            merge(&mut result.request_timeout_secs, retry.timeout_secs);
        }

        if let Some(logging) = file.logging {
            if logging.level.is_some() {
                result.log_level = logging.level;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            merge(&mut result.log_format, logging.format);
        }

        Ok(result)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) {
        merge(&mut self.provider, std::env::var("ESTATE_PROVIDER").ok());
        merge(&mut self.model, std::env::var("ESTATE_MODEL").ok());
        merge(
            &mut self.embedding_provider,
            std::env::var("ESTATE_EMBEDDING_PROVIDER").ok(),
        );
        merge(
            &mut self.embedding_model,
            std::env::var("ESTATE_EMBEDDING_MODEL").ok(),
        );

        if let Ok(top_k) = std::env::var("ESTATE_TOP_K") {
            match top_k.parse() {
                Ok(k) => self.top_k = k,
                Err(_) => tracing::warn!("Ignoring invalid ESTATE_TOP_K value: {}", top_k),
            }
        }
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over file and environment settings.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        merge(&mut self.provider, overrides.provider);
        merge(&mut self.model, overrides.model);
        merge(&mut self.embedding_provider, overrides.embedding_provider);
        merge(&mut self.embedding_model, overrides.embedding_model);
        merge(&mut self.chunk_size, overrides.chunk_size);
        merge(&mut self.chunk_overlap, overrides.chunk_overlap);
        merge(&mut self.top_k, overrides.top_k);
        merge(&mut self.log_format, overrides.log_format);

        if overrides.log_level.is_some() {
            self.log_level = overrides.log_level;
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the credential from the environment.
    ///
    /// `ESTATE_API_KEY` wins over the provider-specific variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Whether any configured provider needs a credential.
    pub fn requires_api_key(&self) -> bool {
        self.provider == "openai" || self.embedding_provider == "openai"
    }

    /// Validate the configuration before any work starts.
    pub fn validate(&self) -> AppResult<()> {
        if !CHAT_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                CHAT_PROVIDERS.join(", ")
            )));
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding_provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if !METRICS.contains(&self.metric.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown distance metric: {}. Supported: euclidean, inner_product",
                self.metric
            )));
        }

        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk size must be positive".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top-k must be at least 1".to_string()));
        }

        if self.embedding_dimensions == 0 || self.embedding_batch_size == 0 {
            return Err(AppError::Config(
                "embedding dimensions and batch size must be positive".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(AppError::Config(
                "retry attempts must be at least 1".to_string(),
            ));
        }

        if self.requires_api_key() && self.api_key.is_none() {
            return Err(AppError::Config(format!(
                "API key not found. Set {} or {}",
                API_KEY_ENV, self.api_key_env
            )));
        }

        Ok(())
    }
}

fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
