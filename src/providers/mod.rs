/*!
 * Machine translation providers.
 *
 * The engine only depends on the `MtProvider` capability:
 * - Mock: deterministic in-process provider for tests and offline use
 * - Ollama: local LLM server over HTTP
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{ProviderConfig, ProviderKind};
use crate::errors::ProviderError;

pub mod mock;
pub mod ollama;

/// Prior translation passed to the provider as a hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtContextMatch {
    pub source_text: String,
    pub target_text: String,
    pub similarity: f64,
}

/// One machine translation call
#[derive(Debug, Clone, PartialEq)]
pub struct MtRequest {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    /// Fuzzy TM matches, best first
    pub context: Vec<MtContextMatch>,
    pub domain: Option<String>,
}

impl MtRequest {
    pub fn new(source_text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            context: Vec::new(),
            domain: None,
        }
    }
}

/// Candidate translation returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtResponse {
    pub text: String,
    /// Confidence 0-100
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<String>,
    /// Problems the provider noticed in its own output
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Machine translation capability
///
/// A failure is always an `Err`; providers never echo the source text back
/// as a successful translation.
#[async_trait]
pub trait MtProvider: Send + Sync + Debug {
    /// Translate one text
    async fn translate(&self, request: MtRequest) -> Result<MtResponse, ProviderError>;

    /// Short provider name used in logs and TM attribution
    fn name(&self) -> &str;
}

/// Build the provider selected in the configuration
pub fn build_provider(config: &ProviderConfig) -> Arc<dyn MtProvider> {
    match config.provider_type {
        ProviderKind::Mock => Arc::new(mock::MockMtProvider::new(config.default_confidence)),
        ProviderKind::Ollama => Arc::new(ollama::Ollama::from_config(config)),
    }
}
