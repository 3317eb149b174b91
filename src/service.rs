/*!
 * Inbound operations of the localization workflow.
 *
 * `WorkflowService` ties the stores, the state machine, the scheduler and
 * the external collaborators together. Every operation on one request runs
 * under that request's async mutex and commits the new state together with
 * its events in one transaction, guarded by the request's version counter.
 * Operations on different requests run concurrently.
 */

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::analytics::{AnalyticsReport, DateRange, WorkflowAnalytics};
use crate::app_config::{AssignmentPolicy, Config, WorkflowConfig};
use crate::collaborators::{
    ContentSource, LocalizationPublisher, PublishMetadata, Translator, TranslatorDirectory,
};
use crate::database::Repository;
use crate::errors::{DirectoryError, WorkflowError, WorkflowResult};
use crate::glossary::GlossaryStore;
use crate::language_utils::normalize_language_code;
use crate::leverage::postprocess::StyleNormalization;
use crate::leverage::{LeverageMethod, LeverageProposal, LeverageRequest, LeverageResolver, ResolverSettings};
use crate::memory::{InsertOutcome, MemoryStats, NewMemoryEntry, TranslationMemory};
use crate::providers::MtProvider;
use crate::quality::{Assessment, QualityAggregator};
use crate::scheduler::{
    Assignment, AssignmentCriteria, AssignmentFailure, AssignmentOutcome, AssignmentScheduler,
    AutoAssignReport,
};
use crate::workflow::models::{Comment, FuzzySuggestion, LeverageDraft};
use crate::workflow::state_machine::{self, is_legal};
use crate::workflow::{
    Actor, CommentKind, EventType, NewRequestParams, Page, Priority, RequestFilter, RequestMetadata,
    RequestStatus, TranslationRequest, Transition, WorkflowEvent,
};

/// Attempts to find a translator with spare capacity when reservations race
const MAX_RESERVATION_ATTEMPTS: usize = 3;

/// External systems the workflow talks to
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentSource>,
    pub directory: Arc<dyn TranslatorDirectory>,
    pub publisher: Arc<dyn LocalizationPublisher>,
}

/// Optional settings of a new translation request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub context: Option<String>,
    pub style: StyleNormalization,
    pub tone: Option<String>,
    pub confidential: bool,
}

/// Reviewer decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Mark as reviewed, final decision pending
    Review,
    Approve,
    Reject,
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewDecision::Review => "review",
            ReviewDecision::Approve => "approve",
            ReviewDecision::Reject => "reject",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "review" | "reviewed" => Ok(ReviewDecision::Review),
            "approve" | "approved" => Ok(ReviewDecision::Approve),
            "reject" | "rejected" => Ok(ReviewDecision::Reject),
            _ => Err(anyhow::anyhow!("Invalid review decision: {}", s)),
        }
    }
}

/// The localization workflow engine
#[derive(Clone)]
pub struct WorkflowService {
    repo: Repository,
    resolver: LeverageResolver,
    scheduler: AssignmentScheduler,
    aggregator: QualityAggregator,
    collaborators: Collaborators,
    workflow: WorkflowConfig,
    batch_concurrency: usize,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl WorkflowService {
    pub fn new(
        config: &Config,
        repo: Repository,
        resolver: LeverageResolver,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            scheduler: AssignmentScheduler::new(collaborators.directory.clone(), &config.scheduler),
            aggregator: QualityAggregator::new(config.quality.pass_threshold),
            workflow: config.workflow.clone(),
            batch_concurrency: config.provider.concurrent_requests.max(1),
            locks: Arc::new(Mutex::new(HashMap::new())),
            repo,
            resolver,
            collaborators,
        }
    }

    /// Open the TM and the glossary from `repo` and build the service
    pub async fn open(
        config: &Config,
        repo: Repository,
        provider: Arc<dyn MtProvider>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let memory = TranslationMemory::open(config.memory.clone(), repo.clone()).await?;
        let glossary = GlossaryStore::open(repo.clone()).await?;
        let resolver = LeverageResolver::new(
            memory,
            glossary,
            provider,
            ResolverSettings::new(&config.memory, &config.provider),
        );
        Ok(Self::new(config, repo, resolver, collaborators))
    }

    /// Close the TM and the glossary
    pub fn close(&self) {
        self.resolver.memory().close();
        self.resolver.glossary().close();
    }

    pub fn resolver(&self) -> &LeverageResolver {
        &self.resolver
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.resolver.memory().stats()
    }

    // =========================================================================
    // Locking and persistence helpers
    // =========================================================================

    fn task_lock(&self, request_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        // Only the registry holds idle locks
        if locks.len() > 1024 {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry(request_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn load(&self, request_id: &str) -> WorkflowResult<TranslationRequest> {
        self.repo
            .get_request(request_id)
            .await?
            .ok_or_else(|| WorkflowError::request_not_found(request_id))
    }

    async fn commit(&self, request: &mut TranslationRequest, events: Vec<WorkflowEvent>) -> WorkflowResult<()> {
        if !self.repo.commit_request(request, events).await? {
            return Err(WorkflowError::ConcurrentModification(request.id.clone()));
        }
        request.version += 1;
        Ok(())
    }

    /// Load, change and commit one request under its lock
    async fn mutate<F>(&self, request_id: &str, change: F) -> WorkflowResult<TranslationRequest>
    where
        F: FnOnce(&mut TranslationRequest, DateTime<Utc>) -> WorkflowResult<Vec<WorkflowEvent>>,
    {
        let lock = self.task_lock(request_id);
        let _guard = lock.lock().await;

        let mut request = self.load(request_id).await?;
        let events = change(&mut request, Utc::now())?;
        self.commit(&mut request, events).await?;
        Ok(request)
    }

    fn ensure_legal(request: &TranslationRequest, to: RequestStatus) -> WorkflowResult<()> {
        if is_legal(request.status(), to) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                request_id: request.id.clone(),
                from: request.status().to_string(),
                to: to.to_string(),
            })
        }
    }

    async fn release_translator(&self, translator_id: &str) {
        if let Err(e) = self.collaborators.directory.release_workload(translator_id).await {
            warn!("Failed to release workload of translator {}: {}", translator_id, e);
        }
    }

    // =========================================================================
    // Request lifecycle
    // =========================================================================

    /// Create one request per target language for a content item
    pub async fn request_translation(
        &self,
        content_id: &str,
        target_languages: &[String],
        options: RequestOptions,
        actor: &Actor,
    ) -> WorkflowResult<Vec<TranslationRequest>> {
        if target_languages.is_empty() {
            return Err(WorkflowError::ValidationFailure(
                "at least one target language is required".to_string(),
            ));
        }

        let content = self
            .collaborators
            .content
            .get_source_content(content_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound {
                kind: "content",
                id: content_id.to_string(),
            })?;

        if content.text.trim().is_empty() {
            return Err(WorkflowError::ValidationFailure(format!(
                "content {} has no text",
                content_id
            )));
        }

        let now = Utc::now();
        if options.deadline.is_some_and(|deadline| deadline <= now) {
            return Err(WorkflowError::ValidationFailure(
                "deadline must be in the future".to_string(),
            ));
        }

        let source_language = validate_language(&content.language)?;
        let mut targets: Vec<String> = Vec::new();
        for language in target_languages {
            let target = validate_language(language)?;
            if target == source_language {
                return Err(WorkflowError::ValidationFailure(format!(
                    "target language {} equals the source language",
                    language
                )));
            }
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        let mut created = Vec::with_capacity(targets.len());
        for target_language in targets {
            let params = NewRequestParams {
                content_id: content.id.clone(),
                source_language: source_language.clone(),
                target_language,
                text: content.text.clone(),
                context: options.context.clone(),
                priority: options.priority,
                deadline: options.deadline,
                metadata: RequestMetadata {
                    domain: content.domain.clone(),
                    audience: content.audience.clone(),
                    style: options.style,
                    tone: options.tone.clone(),
                    confidential: options.confidential,
                    tags: content.tags.clone(),
                },
            };
            let request = TranslationRequest::new(
                Uuid::new_v4().to_string(),
                params,
                self.workflow.rate_type,
                self.workflow.rate(),
                self.workflow.words_per_hour,
                now,
            );
            let event = WorkflowEvent::status_change(&request.id, None, RequestStatus::Requested, actor, now);
            self.repo.insert_request(&request, vec![event]).await?;

            info!(
                "Created request {} ({} -> {}) for content {}",
                request.id, request.source_language, request.target_language, content_id
            );
            created.push(request);
        }

        Ok(created)
    }

    /// Draft a translation with the leverage resolver and attach it
    ///
    /// Returns `None` when the request was withdrawn while the draft was
    /// being produced; the draft is then discarded and not remembered.
    pub async fn resolve(&self, request_id: &str) -> WorkflowResult<Option<LeverageProposal>> {
        let request = self.load(request_id).await?;
        if request.status() == RequestStatus::Withdrawn {
            return Ok(None);
        }
        if !request.status().accepts_draft() {
            return Err(WorkflowError::ValidationFailure(format!(
                "request {} is {}; drafts can no longer be attached",
                request_id,
                request.status()
            )));
        }

        let leverage_request = LeverageRequest::new(
            &request.source.text,
            &request.source_language,
            &request.target_language,
        )
        .with_domain(request.source.domain.clone())
        .with_style(request.metadata.style);

        let outcome = self.resolver.propose(&leverage_request).await;

        let lock = self.task_lock(request_id);
        let _guard = lock.lock().await;
        let mut current = self.load(request_id).await?;

        if current.status() == RequestStatus::Withdrawn {
            info!("Discarding draft for withdrawn request {}", request_id);
            return Ok(None);
        }

        let now = Utc::now();
        let mut proposal = match outcome {
            Ok(proposal) => proposal,
            Err(e) => {
                current.leverage.last_error = Some(e.to_string());
                current.updated_at = now;
                if let Err(commit_error) = self.commit(&mut current, Vec::new()).await {
                    warn!("Failed to record drafting error on {}: {}", request_id, commit_error);
                }
                return Err(e);
            }
        };

        if !current.status().accepts_draft() {
            return Err(WorkflowError::ValidationFailure(format!(
                "request {} moved to {} while drafting",
                request_id,
                current.status()
            )));
        }

        current.leverage.draft = Some(LeverageDraft {
            text: proposal.text.clone(),
            method: proposal.method,
            confidence: proposal.confidence,
            quality_estimate: proposal.quality_estimate,
            low_confidence: proposal.low_confidence,
            resolved_at: now,
        });
        if proposal.method != LeverageMethod::Ai {
            current.leverage.tm_matches_applied += 1;
        }
        current.leverage.glossary_terms_applied = proposal.glossary_applied.clone();
        current.leverage.fuzzy_suggestions = proposal
            .fuzzy_matches
            .iter()
            .map(|m| FuzzySuggestion {
                entry_id: m.entry.id.clone(),
                source_text: m.entry.source_text.clone(),
                target_text: m.entry.target_text.clone(),
                similarity: m.similarity,
                confidence: m.entry.confidence,
            })
            .collect();
        current.leverage.last_error = None;
        current.updated_at = now;
        self.commit(&mut current, Vec::new()).await?;

        self.resolver.remember(&leverage_request, &mut proposal).await?;
        debug!(
            "Request {} drafted via {} (confidence {:.1})",
            request_id, proposal.method, proposal.confidence
        );
        Ok(Some(proposal))
    }

    /// Assign a translator chosen by a manager
    pub async fn assign(&self, request_id: &str, translator_id: &str, actor: &Actor) -> WorkflowResult<TranslationRequest> {
        let lock = self.task_lock(request_id);
        let _guard = lock.lock().await;

        let mut request = self.load(request_id).await?;
        Self::ensure_legal(&request, RequestStatus::Assigned)?;

        let translator = self
            .collaborators
            .directory
            .get(translator_id)
            .await?
            .ok_or_else(|| WorkflowError::translator_not_found(translator_id))?;

        match self.collaborators.directory.reserve_workload(&translator.id).await {
            Ok(()) => {}
            Err(DirectoryError::AtCapacity { id, max_workload }) => {
                return Err(WorkflowError::ValidationFailure(format!(
                    "translator {} is at maximum workload ({})",
                    id, max_workload
                )));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.commit_assignment(&mut request, &translator, actor).await {
            self.release_translator(&translator.id).await;
            return Err(e);
        }
        Ok(request)
    }

    /// Apply `-> assigned` and commit; the workload must already be reserved
    async fn commit_assignment(
        &self,
        request: &mut TranslationRequest,
        translator: &Translator,
        actor: &Actor,
    ) -> WorkflowResult<()> {
        let now = Utc::now();
        let mut next = request.clone();
        let status_event = state_machine::apply(
            &mut next,
            Transition::Assign {
                translator: translator.clone(),
            },
            actor,
            now,
        )?;
        let assignment_event = WorkflowEvent::new(
            &next.id,
            EventType::Assignment,
            actor,
            now,
            json!({ "translatorId": translator.id, "translatorName": translator.name }),
        );

        self.commit(&mut next, vec![status_event, assignment_event]).await?;
        *request = next;
        info!("Request {} assigned to {}", request.id, translator.id);
        Ok(())
    }

    /// `assigned -> in_progress`
    pub async fn start(&self, request_id: &str, actor: &Actor) -> WorkflowResult<TranslationRequest> {
        self.mutate(request_id, |request, now| {
            Ok(vec![state_machine::apply(request, Transition::Start, actor, now)?])
        })
        .await
    }

    /// Submit the translated text and free the translator
    pub async fn submit(&self, request_id: &str, text: &str, actor: &Actor) -> WorkflowResult<TranslationRequest> {
        let request = self
            .mutate(request_id, |request, now| {
                let status_event = state_machine::apply(
                    request,
                    Transition::Complete {
                        text: text.to_string(),
                        author_id: actor.id.clone(),
                    },
                    actor,
                    now,
                )?;
                let submission_event = WorkflowEvent::new(
                    &request.id,
                    EventType::Submission,
                    actor,
                    now,
                    json!({
                        "wordCount": request.translation.word_count,
                        "method": request.translation.method,
                        "hours": request.workflow.actual_hours,
                    }),
                );
                Ok(vec![status_event, submission_event])
            })
            .await?;

        if let Some(translator_id) = request.translator_id() {
            self.release_translator(translator_id).await;
        }
        Ok(request)
    }

    /// Record a reviewer decision, optionally with a score
    ///
    /// An approval is followed by publication when auto-publish is on. A
    /// failed publication leaves the request `approved` for a later
    /// [`publish`](Self::publish).
    pub async fn review(
        &self,
        request_id: &str,
        decision: ReviewDecision,
        score: Option<f64>,
        feedback: Option<String>,
        reviewer: &Actor,
    ) -> WorkflowResult<TranslationRequest> {
        let lock = self.task_lock(request_id);
        let _guard = lock.lock().await;

        let mut request = self.load(request_id).await?;
        let now = Utc::now();
        let mut events = Vec::new();

        let transition = match decision {
            ReviewDecision::Review => Transition::Review { reviewer: reviewer.clone() },
            ReviewDecision::Approve => Transition::Approve { reviewer: reviewer.clone() },
            ReviewDecision::Reject => Transition::Reject { reviewer: reviewer.clone() },
        };
        Self::ensure_legal(&request, transition.target())?;

        if let Some(score) = score {
            let assessment = Assessment::uniform(&reviewer.id, score, feedback.clone(), now);
            self.aggregator.add_assessment(&mut request.quality, assessment)?;
            events.push(WorkflowEvent::new(
                &request.id,
                EventType::Review,
                reviewer,
                now,
                json!({ "score": score, "finalScore": request.quality.final_score }),
            ));
        }

        events.push(state_machine::apply(&mut request, transition, reviewer, now)?);
        match decision {
            ReviewDecision::Approve => events.push(WorkflowEvent::new(
                &request.id,
                EventType::Approval,
                reviewer,
                now,
                json!({ "score": score, "feedback": feedback }),
            )),
            ReviewDecision::Reject => events.push(WorkflowEvent::new(
                &request.id,
                EventType::Rejection,
                reviewer,
                now,
                json!({ "score": score, "feedback": feedback }),
            )),
            ReviewDecision::Review => {}
        }

        self.commit(&mut request, events).await?;

        if decision == ReviewDecision::Approve && self.workflow.auto_publish {
            if let Err(e) = self.publish_locked(&mut request, &Actor::system()).await {
                warn!("Request {} approved but not published: {}", request.id, e);
            }
        }
        Ok(request)
    }

    /// Attach a full quality assessment
    pub async fn add_assessment(
        &self,
        request_id: &str,
        assessment: Assessment,
        actor: &Actor,
    ) -> WorkflowResult<TranslationRequest> {
        let aggregator = self.aggregator;
        self.mutate(request_id, |request, now| {
            if !request.status().is_completed_or_later() {
                return Err(WorkflowError::ValidationFailure(format!(
                    "request {} has no translation to assess ({})",
                    request.id,
                    request.status()
                )));
            }

            let details = json!({
                "assessorId": assessment.assessor_id,
                "overall": assessment.overall,
                "issues": assessment.issues.len(),
            });
            aggregator.add_assessment(&mut request.quality, assessment)?;
            request.updated_at = now;

            Ok(vec![WorkflowEvent::new(&request.id, EventType::Review, actor, now, details)])
        })
        .await
    }

    /// Publish an approved request, e.g. after a failed automatic publication
    pub async fn publish(&self, request_id: &str, actor: &Actor) -> WorkflowResult<TranslationRequest> {
        let lock = self.task_lock(request_id);
        let _guard = lock.lock().await;

        let mut request = self.load(request_id).await?;
        self.publish_locked(&mut request, actor).await?;
        Ok(request)
    }

    async fn publish_locked(&self, request: &mut TranslationRequest, actor: &Actor) -> WorkflowResult<()> {
        Self::ensure_legal(request, RequestStatus::Published)?;

        let text = request.translation.text.clone().ok_or_else(|| {
            WorkflowError::ValidationFailure(format!("request {} has no translated text", request.id))
        })?;
        let metadata = PublishMetadata {
            request_id: request.id.clone(),
            translator_id: request.translator_id().map(str::to_string),
            reviewer_id: request.workflow.reviewer.as_ref().map(|r| r.id.clone()),
            final_score: request.quality.final_score,
            approved_at: request
                .workflow
                .reviewer
                .as_ref()
                .map(|r| r.reviewed_at)
                .unwrap_or(request.updated_at),
        };

        self.collaborators
            .publisher
            .publish(&request.content_id, &request.target_language, &text, &metadata)
            .await
            .map_err(|e| WorkflowError::Publisher(format!("{:#}", e)))?;

        let mut next = request.clone();
        let event = state_machine::apply(&mut next, Transition::Publish, actor, Utc::now())?;
        self.commit(&mut next, vec![event]).await?;
        *request = next;
        Ok(())
    }

    /// Move a request to the terminal `withdrawn` state
    pub async fn withdraw(&self, request_id: &str, reason: &str, actor: &Actor) -> WorkflowResult<TranslationRequest> {
        let mut held_by = None;
        let request = self
            .mutate(request_id, |request, now| {
                if request.status().holds_translator() {
                    held_by = request.translator_id().map(str::to_string);
                }
                let status_event = state_machine::apply(request, Transition::Withdraw, actor, now)?;
                let reason_event = WorkflowEvent::new(
                    &request.id,
                    EventType::Comment,
                    actor,
                    now,
                    json!({ "kind": "withdrawal", "text": reason }),
                );
                Ok(vec![status_event, reason_event])
            })
            .await?;

        if let Some(translator_id) = held_by {
            self.release_translator(&translator_id).await;
        }
        info!("Request {} withdrawn: {}", request_id, reason);
        Ok(request)
    }

    // =========================================================================
    // Communication and deadlines
    // =========================================================================

    /// Add a comment, query or change request; returns the new comment id
    pub async fn add_comment(
        &self,
        request_id: &str,
        kind: CommentKind,
        text: &str,
        author: &Actor,
    ) -> WorkflowResult<String> {
        if text.trim().is_empty() {
            return Err(WorkflowError::ValidationFailure("comment text is empty".to_string()));
        }

        let comment_id = Uuid::new_v4().to_string();
        self.mutate(request_id, |request, now| {
            request.communication.entries.push(Comment {
                id: comment_id.clone(),
                kind,
                author: author.clone(),
                text: text.to_string(),
                created_at: now,
                resolved: false,
            });
            request.updated_at = now;

            Ok(vec![WorkflowEvent::new(
                &request.id,
                EventType::Comment,
                author,
                now,
                json!({ "commentId": comment_id, "kind": kind, "text": text }),
            )])
        })
        .await?;

        Ok(comment_id)
    }

    /// Mark a query or change request as resolved
    pub async fn resolve_query(&self, request_id: &str, comment_id: &str, actor: &Actor) -> WorkflowResult<TranslationRequest> {
        self.mutate(request_id, |request, now| {
            let comment = request
                .communication
                .entries
                .iter_mut()
                .find(|c| c.id == comment_id)
                .ok_or_else(|| WorkflowError::NotFound {
                    kind: "comment",
                    id: comment_id.to_string(),
                })?;
            comment.resolved = true;
            request.updated_at = now;

            Ok(vec![WorkflowEvent::new(
                &request.id,
                EventType::Comment,
                actor,
                now,
                json!({ "commentId": comment_id, "resolved": true }),
            )])
        })
        .await
    }

    /// Set or clear the deadline
    pub async fn change_deadline(
        &self,
        request_id: &str,
        deadline: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> WorkflowResult<TranslationRequest> {
        self.mutate(request_id, |request, now| {
            if matches!(request.status(), RequestStatus::Published | RequestStatus::Withdrawn) {
                return Err(WorkflowError::ValidationFailure(format!(
                    "request {} is {}; its deadline can no longer change",
                    request.id,
                    request.status()
                )));
            }
            if deadline.is_some_and(|d| d <= now) {
                return Err(WorkflowError::ValidationFailure(
                    "deadline must be in the future".to_string(),
                ));
            }

            let old = std::mem::replace(&mut request.workflow.deadline, deadline);
            request.updated_at = now;

            Ok(vec![WorkflowEvent::new(
                &request.id,
                EventType::DeadlineChange,
                actor,
                now,
                json!({ "oldDeadline": old, "newDeadline": deadline }),
            )])
        })
        .await
    }

    // =========================================================================
    // Translation memory
    // =========================================================================

    /// Store a human correction as a verified TM entry
    #[allow(clippy::too_many_arguments)]
    pub async fn record_correction(
        &self,
        source_text: &str,
        corrected_text: &str,
        source_language: &str,
        target_language: &str,
        domain: Option<String>,
        confidence: f64,
        actor: &Actor,
    ) -> WorkflowResult<InsertOutcome> {
        if source_text.trim().is_empty() || corrected_text.trim().is_empty() {
            return Err(WorkflowError::ValidationFailure(
                "source and corrected text are required".to_string(),
            ));
        }
        let entry = NewMemoryEntry::correction(
            source_text,
            corrected_text,
            &validate_language(source_language)?,
            &validate_language(target_language)?,
            confidence,
            &actor.id,
        )
        .with_domain(domain);

        Ok(self.resolver.memory().insert(entry).await?)
    }

    /// Resolve many strings with bounded parallelism; one result per item,
    /// in input order
    pub async fn translate_batch(&self, items: Vec<LeverageRequest>) -> Vec<WorkflowResult<LeverageProposal>> {
        let mut slots: Vec<Option<WorkflowResult<LeverageProposal>>> = Vec::with_capacity(items.len());
        let mut valid = Vec::new();
        let mut positions = Vec::new();

        for (index, mut item) in items.into_iter().enumerate() {
            match (validate_language(&item.source_language), validate_language(&item.target_language)) {
                (Ok(source), Ok(target)) => {
                    item.source_language = source;
                    item.target_language = target;
                    positions.push(index);
                    valid.push(item);
                    slots.push(None);
                }
                (Err(e), _) | (_, Err(e)) => slots.push(Some(Err(e))),
            }
        }

        let resolved = self.resolver.resolve_batch(valid, self.batch_concurrency).await;
        for (position, result) in positions.into_iter().zip(resolved) {
            slots[position] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Assign pending requests matching `criteria`
    pub async fn auto_assign(&self, criteria: &AssignmentCriteria) -> WorkflowResult<AutoAssignReport> {
        let pending: Vec<TranslationRequest> = self
            .repo
            .list_pending(None)
            .await?
            .into_iter()
            .filter(|r| criteria.matches(r))
            .take(criteria.limit.unwrap_or(usize::MAX))
            .collect();

        let policy = criteria.policy.unwrap_or(self.scheduler.default_policy());
        Ok(self
            .scheduler
            .run(pending, |request| self.auto_assign_one(request.id, policy))
            .await)
    }

    async fn auto_assign_one(&self, request_id: String, policy: AssignmentPolicy) -> AssignmentOutcome {
        let failed = |reason: String| {
            AssignmentOutcome::Failed(AssignmentFailure {
                request_id: request_id.clone(),
                reason,
            })
        };

        let lock = self.task_lock(&request_id);
        let _guard = lock.lock().await;

        let mut request = match self.load(&request_id).await {
            Ok(request) => request,
            Err(e) => return failed(e.to_string()),
        };
        // Another run or a manager got here first
        if request.status() != RequestStatus::Requested {
            return AssignmentOutcome::Skipped {
                request_id: request_id.clone(),
            };
        }

        for _ in 0..MAX_RESERVATION_ATTEMPTS {
            let translator = match self.scheduler.choose_translator(&request, Some(policy)).await {
                Ok(translator) => translator,
                Err(e) => return failed(e.to_string()),
            };

            match self.collaborators.directory.reserve_workload(&translator.id).await {
                Ok(()) => {}
                Err(DirectoryError::AtCapacity { .. }) => {
                    debug!("Translator {} filled up, choosing again for {}", translator.id, request_id);
                    continue;
                }
                Err(e) => return failed(e.to_string()),
            }

            return match self.commit_assignment(&mut request, &translator, &Actor::scheduler()).await {
                Ok(()) => AssignmentOutcome::Assigned(Assignment {
                    request_id: request.id.clone(),
                    translator_id: translator.id.clone(),
                    translator_name: translator.name.clone(),
                }),
                Err(e) => {
                    self.release_translator(&translator.id).await;
                    failed(e.to_string())
                }
            };
        }

        failed(
            WorkflowError::NoEligibleTranslator {
                request_id: request_id.clone(),
            }
            .to_string(),
        )
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_request(&self, request_id: &str) -> WorkflowResult<TranslationRequest> {
        self.load(request_id).await
    }

    pub async fn events_for(&self, request_id: &str) -> WorkflowResult<Vec<WorkflowEvent>> {
        Ok(self.repo.events_for_request(request_id).await?)
    }

    pub async fn search_requests(&self, filter: &RequestFilter) -> WorkflowResult<Page<TranslationRequest>> {
        let mut filter = filter.clone();
        if let Some(language) = filter.source_language.take() {
            filter.source_language = Some(validate_language(&language)?);
        }
        if let Some(language) = filter.target_language.take() {
            filter.target_language = Some(validate_language(&language)?);
        }
        if let (Some(from), Some(to)) = (filter.created_from, filter.created_to) {
            if from > to {
                return Err(WorkflowError::ValidationFailure(
                    "created_from is after created_to".to_string(),
                ));
            }
        }

        Ok(self.repo.search_requests(&filter, self.workflow.page_size).await?)
    }

    pub async fn get_analytics(&self, range: DateRange) -> WorkflowResult<AnalyticsReport> {
        if range.from > range.to {
            return Err(WorkflowError::ValidationFailure(
                "analytics range starts after it ends".to_string(),
            ));
        }

        let requests = self.repo.list_requests_created_between(range.from, range.to).await?;
        let events = self
            .repo
            .events_for_requests_created_between(range.from, range.to)
            .await?;
        Ok(WorkflowAnalytics::compute(range, &requests, &events))
    }
}

/// Normalize an ISO 639-1/639-2 code, rejecting unknown ones
pub fn validate_language(code: &str) -> WorkflowResult<String> {
    normalize_language_code(code)
        .map_err(|_| WorkflowError::ValidationFailure(format!("invalid language code: {}", code)))
}
