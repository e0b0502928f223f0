pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM provider rejected the request (rate limit or quota): {0}")]
    RateLimited(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A model endpoint that turns a rendered prompt into a raw completion.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    generator: Box<dyn SqlGenerator + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn SqlGenerator + Send + Sync> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self::with_generator(generator))
    }

    pub fn with_generator(generator: Box<dyn SqlGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    /// One model call, no retries. The completion comes back with code fences removed.
    pub async fn generate_sql(&self, prompt: &str) -> Result<String, LlmError> {
        let raw = self.generator.generate_sql(prompt).await?;
        debug!("Raw completion: {}", raw);

        let sql = clean_sql(&raw);
        if sql.is_empty() {
            return Err(LlmError::ResponseError(
                "Model returned an empty completion".to_string(),
            ));
        }

        info!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

// A language tag only counts when the fence line ends right after it.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```[a-z0-9_+-]*[ \t]*\r?\n|```").unwrap()
});

/// Strips markdown code fences (with or without a language tag) and surrounding whitespace.
pub fn clean_sql(completion: &str) -> String {
    CODE_FENCE.replace_all(completion.trim(), "").trim().to_string()
}
