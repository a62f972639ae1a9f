use crate::dedup::DedupConfig;
use crate::enrich::EnrichmentConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl PipelineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("REPOGUARD_ENRICH_MODEL") {
            if let Some(crate::enrich::ProviderConfig::OpenAi { model: ref mut m, .. }) =
                config.enrichment.provider
            {
                *m = model;
            }
        }

        if let Ok(cap) = std::env::var("REPOGUARD_ENRICH_DAILY_CAP") {
            if let Ok(value) = cap.parse::<u32>() {
                config.enrichment.limits.daily_cap = value;
            }
        }

        if let Ok(interval) = std::env::var("REPOGUARD_ENRICH_MIN_INTERVAL_SECS") {
            if let Ok(value) = interval.parse::<u64>() {
                config.enrichment.limits.min_interval_secs = value;
            }
        }

        config
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub const EXAMPLE_CONFIG: &str = r#"
# repoguard pipeline configuration

dedup:
  # Tie-break order between tools reporting the same issue at equal
  # confidence. First entry wins.
  tool_priority: [sast, sca, secret, iac, container]
  line_bucket: 10

enrichment:
  provider:
    type: openai
    model: gpt-4o-mini
    # api_key: sk-...  # Optional, defaults to OPENAI_API_KEY env var
    # base_url: http://localhost:8080/v1
  limits:
    daily_cap: 500
    min_interval_secs: 2
    cooldown_secs: 60
    max_consecutive_failures: 5
  request_timeout_secs: 20
  max_tokens: 1200
  memo_capacity: 512
  min_severity: high
"#;
