//! Selective finding enrichment with an always-available fallback.
//!
//! ## Design Philosophy: Degrade, Never Fail
//!
//! Enrichment is the only part of the pipeline that talks to a metered
//! external service, so it is built around budget protection: a daily
//! request cap, minimum spacing between calls, a cooldown on provider
//! rate limits, and a self-healing circuit breaker on repeated failures.
//! When any of those gates closes — or the provider misbehaves in any way
//! — the deterministic rule-based generator answers instead. The finding
//! pipeline never sees an enrichment error.
//!
//! Provider specifics live behind `CompletionProvider`; the budget and
//! fallback logic is written once against that trait.

pub mod client;
pub mod config;
pub mod fallback;
pub mod mock_provider;
pub mod prompts;
pub mod provider;
pub mod quota;
pub mod schemas;

#[cfg(feature = "llm")]
pub mod provider_openai;

pub use client::{EnrichmentClient, TitleRequest};
pub use config::{EnrichmentConfig, ProviderConfig};
pub use mock_provider::{FailureMode, MockProvider};
pub use provider::{CompletionProvider, ProviderError};
pub use quota::{Admission, DenyReason, QuotaLimits, QuotaState};
pub use schemas::{EnrichmentResult, EnrichmentSource, GeneratedTitle, Priority};

#[cfg(feature = "llm")]
pub use provider_openai::OpenAiProvider;
