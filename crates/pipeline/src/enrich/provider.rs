use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider API error: {0}")]
    Api(String),

    #[error("provider returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("provider rate limit hit")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider call timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Rate limiting is an expected steady-state condition, not a failure
    /// of the provider; the circuit breaker treats it differently.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// One external text-generation provider.
///
/// The quota, cooldown, coalescing, and fallback logic is written once
/// against this trait; adding a provider means implementing `complete`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}
