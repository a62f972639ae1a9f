//! Scriptable provider used by the test suite.

use crate::enrich::provider::{CompletionProvider, ProviderError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    None,
    RateLimited,
    Timeout,
    Network,
    Malformed,
}

pub struct MockProvider {
    response: String,
    failure_mode: FailureMode,
    latency: Duration,
    call_count: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            response: r#"{
                "explanation": "Mock model explanation of the finding.",
                "business_impact": "Mock impact statement.",
                "remediation": "Mock remediation steps.",
                "suggested_patch": null,
                "risk_score": 85,
                "priority": "P1",
                "false_positive_score": 0.1,
                "confidence": 0.9
            }"#
            .to_string(),
            failure_mode: FailureMode::None,
            latency: Duration::ZERO,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn failing(mode: FailureMode) -> Self {
        let mut provider = Self::new();
        provider.failure_mode = mode;
        provider
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Keeps the pending slot occupied long enough for a concurrent caller
    /// to observe it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.failure_mode {
            FailureMode::None => Ok(self.response.clone()),
            FailureMode::RateLimited => Err(ProviderError::RateLimited),
            FailureMode::Timeout => Err(ProviderError::Timeout(30)),
            FailureMode::Network => Err(ProviderError::Network("connection refused".to_string())),
            FailureMode::Malformed => Ok("I am unable to produce JSON right now.".to_string()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
