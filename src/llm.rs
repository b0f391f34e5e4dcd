//! LLM provider abstraction
//!
//! A thin client used by the LLM-backed advice and image collaborators.

mod anthropic;
mod error;
mod types;

pub use anthropic::AnthropicService;
pub use error::LlmError;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Model used when `TRIAGE_MODEL` is not set
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Configuration for the LLM provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// Gateway base URL; the gateway handles authentication
    pub gateway: Option<String>,
    pub model: Option<String>,
}

impl LlmConfig {
    /// Direct mode needs a non-empty key, gateway mode does not
    pub fn is_available(&self) -> bool {
        self.gateway.is_some()
            || self
                .anthropic_api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Build the configured service wrapped in `LoggingService`, if any
pub fn build_service(config: &LlmConfig) -> Result<Option<Arc<dyn LlmService>>, LlmError> {
    if !config.is_available() {
        return Ok(None);
    }
    // In gateway mode, use "implicit" as the API key
    let api_key = if config.gateway.is_some() {
        "implicit".to_string()
    } else {
        config.anthropic_api_key.clone().unwrap_or_default()
    };
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    let service = AnthropicService::new(api_key, model, config.gateway.as_deref())?;
    Ok(Some(Arc::new(LoggingService::new(Arc::new(service)))))
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
