use crate::core::Severity;
use crate::enrich::quota::QuotaLimits;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "openai")]
    OpenAi {
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key: Option<String>, // If not provided, use OPENAI_API_KEY env var
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>, // For OpenAI-compatible gateways
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    #[serde(default)]
    pub limits: QuotaLimits,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,

    /// Findings at or above this severity are selected for enrichment.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

fn default_request_timeout_secs() -> u64 {
    20
}
fn default_max_tokens() -> u32 {
    1200
}
fn default_memo_capacity() -> usize {
    512
}
fn default_min_severity() -> Severity {
    Severity::High
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: Some(ProviderConfig::OpenAi {
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                base_url: None,
            }),
            limits: QuotaLimits::default(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: default_max_tokens(),
            memo_capacity: default_memo_capacity(),
            min_severity: default_min_severity(),
        }
    }
}

impl EnrichmentConfig {
    /// Build the configured provider. `None` means enrichment runs in
    /// rule-based-only mode: no credential, no network calls.
    #[cfg(feature = "llm")]
    pub fn build_provider(
        &self,
    ) -> Option<std::sync::Arc<dyn crate::enrich::provider::CompletionProvider>> {
        use crate::enrich::provider::CompletionProvider;
        use crate::enrich::provider_openai::OpenAiProvider;
        use std::sync::Arc;

        match self.provider.as_ref()? {
            ProviderConfig::OpenAi {
                model,
                api_key,
                base_url,
            } => {
                let provider = match api_key {
                    Some(key) => Some(OpenAiProvider::new(key.clone(), model.clone(), base_url.clone())),
                    None => OpenAiProvider::from_env(model.clone(), base_url.clone()),
                };
                provider.map(|p| Arc::new(p) as Arc<dyn CompletionProvider>)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EnrichmentConfig::default();
        assert!(matches!(config.provider, Some(ProviderConfig::OpenAi { .. })));
        assert_eq!(config.min_severity, Severity::High);
        assert_eq!(config.limits.cooldown_secs, 60);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EnrichmentConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: EnrichmentConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.max_tokens, config.max_tokens);
        assert_eq!(parsed.min_severity, config.min_severity);
    }
}
