//! Quota-aware enrichment client.
//!
//! `enrich` and `generate_title` are total: every failure path — no
//! credential, open breaker, cooldown, daily cap, spacing, busy slot,
//! provider error, bad response — terminates in the rule-based fallback.
//! Callers never see an error and never block on admission control.
//!
//! One physical provider call runs at a time. A concurrent caller for the
//! same cache key attaches to the pending call's result channel instead of
//! issuing a duplicate; a caller for a different key takes the fallback
//! immediately. Admission (daily cap, cooldown, spacing, breaker) is
//! decided inside the quota mutex while holding the pending-slot mutex, so
//! two callers cannot both pass the gate.

use crate::core::Finding;
use crate::enrich::config::EnrichmentConfig;
use crate::enrich::fallback;
use crate::enrich::provider::CompletionProvider;
use crate::enrich::prompts;
use crate::enrich::quota::{Admission, QuotaState};
use crate::enrich::schemas::{self, EnrichmentResult, EnrichmentSource, GeneratedTitle};
use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TitleRequest {
    pub rule_id: String,
    pub category: crate::core::ToolKind,
    pub severity: crate::core::Severity,
    pub description: String,
}

#[derive(Debug, Clone)]
enum PendingValue {
    Enrichment(EnrichmentResult),
    Title(GeneratedTitle),
}

struct InFlight {
    key: String,
    rx: watch::Receiver<Option<PendingValue>>,
}

enum Role {
    Leader(watch::Sender<Option<PendingValue>>),
    Follower(watch::Receiver<Option<PendingValue>>),
    Fallback,
}

#[derive(Debug, Deserialize)]
struct RawTitle {
    title: Option<String>,
}

pub struct EnrichmentClient {
    provider: Option<Arc<dyn CompletionProvider>>,
    config: EnrichmentConfig,
    quota: Mutex<QuotaState>,
    memo: Mutex<LruCache<String, EnrichmentResult>>,
    title_memo: Mutex<LruCache<String, GeneratedTitle>>,
    pending: Mutex<Option<InFlight>>,
}

impl EnrichmentClient {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>, config: EnrichmentConfig) -> Self {
        let capacity = NonZeroUsize::new(config.memo_capacity.max(1)).unwrap();
        Self {
            provider,
            quota: Mutex::new(QuotaState::new(Utc::now())),
            memo: Mutex::new(LruCache::new(capacity)),
            title_memo: Mutex::new(LruCache::new(capacity)),
            pending: Mutex::new(None),
            config,
        }
    }

    /// Client wired from configuration; without a resolvable credential the
    /// provider stays `None` and every call is served rule-based.
    #[cfg(feature = "llm")]
    pub fn from_config(config: EnrichmentConfig) -> Self {
        let provider = config.build_provider();
        if provider.is_none() {
            info!("no enrichment credential configured, running rule-based only");
        }
        Self::new(provider, config)
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub fn quota_snapshot(&self) -> QuotaState {
        self.quota.lock().clone()
    }

    /// Structurally identical findings share one enrichment.
    fn memo_key(finding: &Finding) -> String {
        format!("{}:{}:{}", finding.rule_id, finding.category, finding.severity)
    }

    fn title_key(request: &TitleRequest) -> String {
        format!("title:{}:{}:{}", request.rule_id, request.category, request.severity)
    }

    /// Attach to, claim, or bounce off the single in-flight slot.
    fn claim(&self, key: &str) -> Role {
        let mut pending = self.pending.lock();
        match pending.as_ref() {
            Some(inflight) if inflight.key == key => Role::Follower(inflight.rx.clone()),
            Some(_) => {
                debug!(key, "another enrichment in flight, using fallback");
                Role::Fallback
            }
            None => match self.quota.lock().admit(&self.config.limits, Utc::now()) {
                Admission::Granted => {
                    let (tx, rx) = watch::channel(None);
                    *pending = Some(InFlight {
                        key: key.to_string(),
                        rx,
                    });
                    Role::Leader(tx)
                }
                Admission::Denied(reason) => {
                    debug!(key, ?reason, "enrichment denied, using fallback");
                    Role::Fallback
                }
            },
        }
    }

    fn release(&self, tx: watch::Sender<Option<PendingValue>>, value: PendingValue) {
        *self.pending.lock() = None;
        let _ = tx.send(Some(value));
    }

    pub async fn enrich(&self, finding: &Finding) -> EnrichmentResult {
        let fallback = fallback::generate(finding);
        let Some(provider) = self.provider.clone() else {
            return fallback;
        };

        let key = Self::memo_key(finding);
        if let Some(hit) = self.memo.lock().get(&key) {
            return hit.clone();
        }

        match self.claim(&key) {
            Role::Fallback => fallback,
            Role::Follower(mut rx) => {
                if rx.changed().await.is_ok() {
                    if let Some(PendingValue::Enrichment(result)) = rx.borrow().clone() {
                        return result;
                    }
                }
                fallback
            }
            Role::Leader(tx) => {
                let result = self.call_enrichment(provider.as_ref(), finding, fallback).await;
                if result.source == EnrichmentSource::Ai {
                    self.memo.lock().put(key, result.clone());
                }
                self.release(tx, PendingValue::Enrichment(result.clone()));
                result
            }
        }
    }

    pub async fn generate_title(&self, request: &TitleRequest) -> GeneratedTitle {
        let fallback = fallback::generate_title(&request.rule_id, request.category, request.severity);
        let Some(provider) = self.provider.clone() else {
            return fallback;
        };

        let key = Self::title_key(request);
        if let Some(hit) = self.title_memo.lock().get(&key) {
            return hit.clone();
        }

        match self.claim(&key) {
            Role::Fallback => fallback,
            Role::Follower(mut rx) => {
                if rx.changed().await.is_ok() {
                    if let Some(PendingValue::Title(title)) = rx.borrow().clone() {
                        return title;
                    }
                }
                fallback
            }
            Role::Leader(tx) => {
                let title = self.call_title(provider.as_ref(), request, fallback).await;
                if title.source == EnrichmentSource::Ai {
                    self.title_memo.lock().put(key, title.clone());
                }
                self.release(tx, PendingValue::Title(title.clone()));
                title
            }
        }
    }

    async fn call_enrichment(
        &self,
        provider: &dyn CompletionProvider,
        finding: &Finding,
        fallback: EnrichmentResult,
    ) -> EnrichmentResult {
        let prompt = prompts::enrichment_prompt(finding);
        match self.call_raw(provider, &prompt).await {
            Some(text) => match schemas::parse_enrichment(&text) {
                Some(raw) => {
                    self.quota.lock().record_success();
                    schemas::merge(raw, &fallback)
                }
                None => {
                    warn!(rule = %finding.rule_id, "provider response unparsable, using fallback");
                    self.quota.lock().record_failure();
                    fallback
                }
            },
            None => fallback,
        }
    }

    async fn call_title(
        &self,
        provider: &dyn CompletionProvider,
        request: &TitleRequest,
        fallback: GeneratedTitle,
    ) -> GeneratedTitle {
        let prompt = prompts::title_prompt(
            &request.rule_id,
            request.category,
            request.severity,
            &request.description,
        );
        match self.call_raw(provider, &prompt).await {
            Some(text) => {
                let parsed = schemas::extract_json_object(&text)
                    .and_then(|json| serde_json::from_str::<RawTitle>(json).ok())
                    .and_then(|raw| raw.title)
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty());
                match parsed {
                    Some(title) => {
                        self.quota.lock().record_success();
                        GeneratedTitle {
                            title,
                            source: EnrichmentSource::Ai,
                        }
                    }
                    None => {
                        self.quota.lock().record_failure();
                        fallback
                    }
                }
            }
            None => fallback,
        }
    }

    /// One timed provider call; breaker bookkeeping for the transport-level
    /// outcomes. Returns `None` when the fallback must be used.
    async fn call_raw(&self, provider: &dyn CompletionProvider, prompt: &str) -> Option<String> {
        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        match tokio::time::timeout(timeout, provider.complete(prompt, self.config.max_tokens)).await {
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "provider call timed out");
                self.quota.lock().record_failure();
                None
            }
            Ok(Err(err)) if err.is_rate_limit() => {
                info!("provider rate limited, entering cooldown");
                self.quota
                    .lock()
                    .record_rate_limited(&self.config.limits, Utc::now());
                None
            }
            Ok(Err(err)) => {
                warn!(%err, "provider call failed");
                self.quota.lock().record_failure();
                None
            }
            Ok(Ok(text)) => Some(text),
        }
    }
}
