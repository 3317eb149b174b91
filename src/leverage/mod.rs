/*!
 * Leverage resolver: turns a source string into a proposed translation.
 *
 * Resolution order:
 * 1. exact TM match (the MT provider is not called)
 * 2. fuzzy TM matches, passed to the MT provider as context
 * 3. glossary substitution
 * 4. target-language rules and style normalization
 * 5. quality estimate and method tag
 * 6. good machine drafts are remembered as unverified TM entries
 *
 * When the provider fails, the best fuzzy match becomes a low-confidence
 * draft. Without one the caller gets `ProviderUnavailable`; the source text
 * is never returned as a translation.
 */

pub mod postprocess;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::app_config::{MemoryConfig, ProviderConfig};
use crate::errors::{ProviderError, WorkflowError, WorkflowResult};
use crate::glossary::{AppliedTerm, GlossaryStore};
use crate::memory::{FuzzyMatch, InsertOutcome, NewMemoryEntry, TranslationMemory};
use crate::providers::{MtContextMatch, MtProvider, MtRequest};
use crate::quality::{estimate_quality, EstimateInput};

use postprocess::{normalize_style, PostProcessRules, StyleNormalization};

/// Weight of the best fuzzy match in a hybrid confidence
const HYBRID_FUZZY_WEIGHT: f64 = 0.3;
/// Weight of the MT confidence in a hybrid confidence
const HYBRID_MT_WEIGHT: f64 = 0.7;

/// How a draft was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeverageMethod {
    TmExact,
    TmFuzzy,
    Hybrid,
    Ai,
}

impl fmt::Display for LeverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeverageMethod::TmExact => "tm_exact",
            LeverageMethod::TmFuzzy => "tm_fuzzy",
            LeverageMethod::Hybrid => "hybrid",
            LeverageMethod::Ai => "ai",
        };
        write!(f, "{}", name)
    }
}

/// A string to resolve
#[derive(Debug, Clone, PartialEq)]
pub struct LeverageRequest {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub domain: Option<String>,
    pub style: StyleNormalization,
}

impl LeverageRequest {
    pub fn new(source_text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            domain: None,
            style: StyleNormalization::None,
        }
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_style(mut self, style: StyleNormalization) -> Self {
        self.style = style;
        self
    }
}

/// Proposed translation
#[derive(Debug, Clone, PartialEq)]
pub struct LeverageProposal {
    pub text: String,
    pub method: LeverageMethod,
    /// Confidence 0-100
    pub confidence: f64,
    /// Heuristic quality estimate 0-100
    pub quality_estimate: f64,
    /// Set when the draft is a fallback after a provider failure
    pub low_confidence: bool,
    /// TM entry reused verbatim
    pub exact_entry_id: Option<String>,
    pub fuzzy_matches: Vec<FuzzyMatch>,
    pub glossary_applied: Vec<AppliedTerm>,
    pub alternatives: Vec<String>,
    pub issues: Vec<String>,
    /// Whether the draft was written to the TM
    pub stored_in_memory: bool,
}

/// Settings of the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub memory: MemoryConfig,
    pub mt_enabled: bool,
    pub mt_timeout: Duration,
    /// Concurrent MT calls across all callers
    pub mt_concurrency: usize,
}

impl ResolverSettings {
    pub fn new(memory: &MemoryConfig, provider: &ProviderConfig) -> Self {
        Self {
            memory: memory.clone(),
            mt_enabled: provider.enabled,
            mt_timeout: Duration::from_secs(provider.timeout_secs.max(1)),
            mt_concurrency: provider.concurrent_requests.max(1),
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::new(&MemoryConfig::default(), &ProviderConfig::default())
    }
}

/// Combines the TM, the glossary and an MT provider
#[derive(Clone)]
pub struct LeverageResolver {
    memory: TranslationMemory,
    glossary: GlossaryStore,
    provider: Arc<dyn MtProvider>,
    rules: Arc<PostProcessRules>,
    settings: ResolverSettings,
    mt_permits: Arc<Semaphore>,
}

impl LeverageResolver {
    pub fn new(
        memory: TranslationMemory,
        glossary: GlossaryStore,
        provider: Arc<dyn MtProvider>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            memory,
            glossary,
            provider,
            rules: Arc::new(PostProcessRules::default()),
            mt_permits: Arc::new(Semaphore::new(settings.mt_concurrency.max(1))),
            settings,
        }
    }

    /// Replace the post-processing rule table
    pub fn with_rules(mut self, rules: PostProcessRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn memory(&self) -> &TranslationMemory {
        &self.memory
    }

    pub fn glossary(&self) -> &GlossaryStore {
        &self.glossary
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Propose a translation without writing to the TM
    pub async fn propose(&self, request: &LeverageRequest) -> WorkflowResult<LeverageProposal> {
        if request.source_text.trim().is_empty() {
            return Err(WorkflowError::ValidationFailure(
                "source text is empty".to_string(),
            ));
        }

        let domain = request.domain.as_deref();

        if let Some(entry) = self.memory.exact_match(
            &request.source_text,
            &request.source_language,
            &request.target_language,
            domain,
        ) {
            if let Err(e) = self.memory.record_usage(&entry.id).await {
                warn!("Failed to record usage of TM entry {}: {:#}", entry.id, e);
            }
            return Ok(LeverageProposal {
                text: entry.target_text.clone(),
                method: LeverageMethod::TmExact,
                confidence: entry.confidence,
                quality_estimate: entry.confidence,
                low_confidence: false,
                exact_entry_id: Some(entry.id),
                fuzzy_matches: Vec::new(),
                glossary_applied: Vec::new(),
                alternatives: Vec::new(),
                issues: Vec::new(),
                stored_in_memory: false,
            });
        }

        let fuzzy_matches = self.memory.fuzzy_matches(
            &request.source_text,
            &request.source_language,
            &request.target_language,
            domain,
            self.settings.memory.fuzzy_min_similarity,
            self.settings.memory.fuzzy_limit,
        );

        let best_fuzzy = fuzzy_matches.first();

        let (candidate, method, confidence, low_confidence, provider_issues, alternatives, mut issues) =
            match self.machine_translate(request, &fuzzy_matches).await {
                Ok(response) => {
                    let (method, confidence) = match best_fuzzy {
                        Some(best) => (
                            LeverageMethod::Hybrid,
                            HYBRID_FUZZY_WEIGHT * best.entry.confidence + HYBRID_MT_WEIGHT * response.confidence,
                        ),
                        None => (LeverageMethod::Ai, response.confidence),
                    };
                    let provider_issues = response.issues.len();
                    (
                        response.text,
                        method,
                        confidence,
                        false,
                        provider_issues,
                        response.alternatives,
                        response.issues,
                    )
                }
                Err(e) => match best_fuzzy {
                    Some(best) => {
                        warn!(
                            "Machine translation unavailable ({}), falling back to fuzzy match {}",
                            e, best.entry.id
                        );
                        (
                            best.entry.target_text.clone(),
                            LeverageMethod::TmFuzzy,
                            best.entry.confidence * best.similarity,
                            true,
                            0,
                            Vec::new(),
                            vec![format!("machine translation unavailable: {}", e)],
                        )
                    }
                    None => {
                        info!("Translation unavailable for '{}': {}", request.source_text, e);
                        return Err(WorkflowError::ProviderUnavailable(e));
                    }
                },
            };

        let glossary = self.glossary.apply(
            &candidate,
            &request.source_language,
            &request.target_language,
            domain,
        );

        let processed = self.rules.apply(&glossary.text, &request.target_language);
        let text = normalize_style(&processed, &request.target_language, request.style);

        let quality_estimate = estimate_quality(&EstimateInput {
            source_text: &request.source_text,
            draft_text: &text,
            source_language: &request.source_language,
            target_language: &request.target_language,
            confidence,
            provider_issues,
            glossary_terms_applied: glossary.applied.len(),
        });

        if text.trim().is_empty() {
            issues.push("draft is empty after post-processing".to_string());
        }

        debug!(
            "Resolved '{}' via {} (confidence {:.1}, estimate {:.1})",
            request.source_text, method, confidence, quality_estimate
        );

        Ok(LeverageProposal {
            text,
            method,
            confidence: confidence.clamp(0.0, 100.0),
            quality_estimate,
            low_confidence,
            exact_entry_id: None,
            fuzzy_matches,
            glossary_applied: glossary.applied,
            alternatives,
            issues,
            stored_in_memory: false,
        })
    }

    /// Store a machine-produced draft in the TM when it is good enough
    ///
    /// Only `ai` and `hybrid` drafts qualify; the entry is unverified and
    /// carries the quality estimate as its confidence.
    pub async fn remember(&self, request: &LeverageRequest, proposal: &mut LeverageProposal) -> WorkflowResult<bool> {
        let qualifies = matches!(proposal.method, LeverageMethod::Ai | LeverageMethod::Hybrid)
            && proposal.quality_estimate >= self.settings.memory.insert_threshold;
        if !qualifies {
            return Ok(false);
        }

        let entry = NewMemoryEntry::unverified(
            &request.source_text,
            &proposal.text,
            &request.source_language,
            &request.target_language,
            proposal.quality_estimate,
            self.provider.name(),
        )
        .with_domain(request.domain.clone());

        let outcome = self.memory.insert(entry).await?;
        proposal.stored_in_memory = matches!(outcome, InsertOutcome::Inserted { .. });
        Ok(proposal.stored_in_memory)
    }

    /// Propose and remember
    pub async fn resolve(&self, request: &LeverageRequest) -> WorkflowResult<LeverageProposal> {
        let mut proposal = self.propose(request).await?;
        self.remember(request, &mut proposal).await?;
        Ok(proposal)
    }

    /// Resolve many strings with at most `concurrency` in flight; results
    /// keep the input order
    pub async fn resolve_batch(
        &self,
        requests: Vec<LeverageRequest>,
        concurrency: usize,
    ) -> Vec<WorkflowResult<LeverageProposal>> {
        let mut results: Vec<(usize, WorkflowResult<LeverageProposal>)> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| {
                let resolver = self.clone();
                async move { (index, resolver.resolve(&request).await) }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn machine_translate(
        &self,
        request: &LeverageRequest,
        fuzzy_matches: &[FuzzyMatch],
    ) -> Result<crate::providers::MtResponse, ProviderError> {
        if !self.settings.mt_enabled {
            return Err(ProviderError::Disabled);
        }

        let mt_request = MtRequest {
            source_text: request.source_text.clone(),
            source_language: request.source_language.clone(),
            target_language: request.target_language.clone(),
            context: fuzzy_matches
                .iter()
                .take(self.settings.memory.mt_context_matches)
                .map(|m| MtContextMatch {
                    source_text: m.entry.source_text.clone(),
                    target_text: m.entry.target_text.clone(),
                    similarity: m.similarity,
                })
                .collect(),
            domain: request.domain.clone(),
        };

        let _permit = self
            .mt_permits
            .acquire()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let response = tokio::time::timeout(self.settings.mt_timeout, self.provider.translate(mt_request))
            .await
            .map_err(|_| ProviderError::Timeout(self.settings.mt_timeout.as_secs()))??;

        if response.text.trim().is_empty() {
            return Err(ProviderError::ParseError(
                "provider returned an empty translation".to_string(),
            ));
        }
        Ok(response)
    }
}
