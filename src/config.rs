use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default Cohere embed endpoint.
const COHERE_EMBED_URL: &str = "https://api.cohere.ai/v1/embed";
/// Default Cohere embedding model.
const DEFAULT_MODEL: &str = "embed-english-v3.0";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Directory holding one JSON file per library.
    pub data_dir: PathBuf,
    /// Load the bundled seed corpus at startup.
    pub testing_data: bool,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    /// Provider credential; calls fail with `EmbeddingAuth` when absent.
    pub api_key: Option<String>,
    /// Maximum texts per provider call.
    pub batch_size: usize,
    /// Concurrent provider calls per embed request.
    pub concurrency: usize,
    /// Retries after the initial attempt, for transient failures.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub base_delay_ms: u64,
    /// Per-call HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: COHERE_EMBED_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            batch_size: 96,
            concurrency: 4,
            max_retries: 4,
            base_delay_ms: 250,
            timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            data_dir: PathBuf::from("data"),
            testing_data: false,
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from the environment, falling back to defaults.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `BIND_ADDR` | server bind address (`0.0.0.0:8000`) |
    /// | `DATA_DIR` | persistence directory (`data`) |
    /// | `TESTING_DATA` | `true` loads the seed corpus |
    /// | `COHERE_API_KEY` | provider credential |
    /// | `COHERE_EMBED_URL` | provider endpoint override |
    /// | `EMBEDDING_MODEL` | provider model name |
    /// | `EMBED_BATCH_SIZE` | texts per provider call (96) |
    /// | `EMBED_CONCURRENCY` | concurrent provider calls (4) |
    /// | `EMBED_MAX_RETRIES` | retries on transient failure (4) |
    /// | `EMBED_TIMEOUT_SECS` | per-call timeout (30) |
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(bind) = std::env::var("BIND_ADDR") {
            config.bind = bind;
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("TESTING_DATA") {
            config.testing_data = flag.eq_ignore_ascii_case("true");
        }

        config.embedding.api_key = std::env::var("COHERE_API_KEY").ok();
        if let Ok(url) = std::env::var("COHERE_EMBED_URL") {
            config.embedding.api_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(v) = std::env::var("EMBED_BATCH_SIZE") {
            config.embedding.batch_size =
                v.parse().context("EMBED_BATCH_SIZE must be an integer")?;
        }
        if let Ok(v) = std::env::var("EMBED_CONCURRENCY") {
            config.embedding.concurrency =
                v.parse().context("EMBED_CONCURRENCY must be an integer")?;
        }
        if let Ok(v) = std::env::var("EMBED_MAX_RETRIES") {
            config.embedding.max_retries =
                v.parse().context("EMBED_MAX_RETRIES must be an integer")?;
        }
        if let Ok(v) = std::env::var("EMBED_TIMEOUT_SECS") {
            config.embedding.timeout_secs =
                v.parse().context("EMBED_TIMEOUT_SECS must be an integer")?;
        }

        if config.embedding.batch_size == 0 {
            anyhow::bail!("EMBED_BATCH_SIZE must be > 0");
        }
        if config.embedding.concurrency == 0 {
            anyhow::bail!("EMBED_CONCURRENCY must be > 0");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind, "0.0.0.0:8000");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(!config.testing_data);
        assert_eq!(config.embedding.batch_size, 96);
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.embedding.max_retries, 4);
        assert_eq!(config.embedding.base_delay_ms, 250);
        assert_eq!(config.embedding.timeout_secs, 30);
    }
}
