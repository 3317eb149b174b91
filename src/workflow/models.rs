/*!
 * Translation request aggregate and its building blocks.
 *
 * A `TranslationRequest` is persisted as a single JSON document; the
 * repository additionally indexes the columns used for filtering.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app_config::RateType;
use crate::glossary::AppliedTerm;
use crate::leverage::postprocess::StyleNormalization;
use crate::leverage::LeverageMethod;
use crate::quality::QualityBlock;

use super::events::Actor;

/// Lifecycle status of a translation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Requested,
    Assigned,
    InProgress,
    Completed,
    Reviewed,
    Approved,
    Rejected,
    Published,
    Withdrawn,
}

impl RequestStatus {
    /// Every status, in lifecycle order
    pub const ALL: [RequestStatus; 9] = [
        RequestStatus::Requested,
        RequestStatus::Assigned,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Reviewed,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Published,
        RequestStatus::Withdrawn,
    ];

    /// Whether translated work exists (`actual_hours` is set from here on)
    pub fn is_completed_or_later(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed
                | RequestStatus::Reviewed
                | RequestStatus::Approved
                | RequestStatus::Rejected
                | RequestStatus::Published
        )
    }

    /// Whether a translator currently holds the task
    pub fn holds_translator(&self) -> bool {
        matches!(self, RequestStatus::Assigned | RequestStatus::InProgress)
    }

    /// Whether a leverage draft may still be attached
    pub fn accepts_draft(&self) -> bool {
        matches!(
            self,
            RequestStatus::Requested | RequestStatus::Assigned | RequestStatus::InProgress
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Requested => "requested",
            RequestStatus::Assigned => "assigned",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Reviewed => "reviewed",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Published => "published",
            RequestStatus::Withdrawn => "withdrawn",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requested" => Ok(RequestStatus::Requested),
            "assigned" => Ok(RequestStatus::Assigned),
            "in_progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            "reviewed" => Ok(RequestStatus::Reviewed),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "published" => Ok(RequestStatus::Published),
            "withdrawn" => Ok(RequestStatus::Withdrawn),
            _ => Err(anyhow::anyhow!("Invalid request status: {}", s)),
        }
    }
}

/// Scheduling priority, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Numeric rank stored in the database for ordering
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" | "medium" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(anyhow::anyhow!("Invalid priority: {}", s)),
        }
    }
}

/// Complexity tier derived from the source word count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    Medium,
    Complex,
}

impl ComplexityTier {
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0..=49 => ComplexityTier::Simple,
            50..=249 => ComplexityTier::Medium,
            _ => ComplexityTier::Complex,
        }
    }

    /// Effort multiplier applied to hour estimates
    pub fn effort_multiplier(&self) -> f64 {
        match self {
            ComplexityTier::Simple => 1.0,
            ComplexityTier::Medium => 1.25,
            ComplexityTier::Complex => 1.5,
        }
    }
}

/// How the final translated text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMethod {
    Human,
    Ai,
    Hybrid,
}

/// Source text and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub text: String,
    pub word_count: usize,
    pub character_count: usize,
    pub complexity: ComplexityTier,
    pub domain: Option<String>,
    pub context: Option<String>,
}

impl SourceBlock {
    pub fn new(text: &str, domain: Option<String>, context: Option<String>) -> Self {
        let word_count = count_words(text);
        Self {
            text: text.to_string(),
            word_count,
            character_count: text.chars().count(),
            complexity: ComplexityTier::from_word_count(word_count),
            domain,
            context,
        }
    }
}

/// Translated text and its metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslatedBlock {
    pub text: Option<String>,
    pub word_count: usize,
    /// Hours between assignment and submission
    pub translation_time_hours: Option<f64>,
    pub method: Option<TranslationMethod>,
}

/// Snapshot of the assigned translator taken at assignment time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatorSnapshot {
    pub id: String,
    pub name: String,
    pub specializations: Vec<String>,
    pub certifications: Vec<String>,
    pub rating: f64,
    pub assigned_at: DateTime<Utc>,
}

/// Snapshot of the reviewer taken at review time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerSnapshot {
    pub id: String,
    pub name: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Workflow bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowBlock {
    pub status: RequestStatus,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: f64,
    /// Only set once the request reaches `completed`
    pub actual_hours: Option<f64>,
    pub assigned_translator: Option<TranslatorSnapshot>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub reviewer: Option<ReviewerSnapshot>,
}

/// Draft proposed by the leverage resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageDraft {
    pub text: String,
    pub method: LeverageMethod,
    pub confidence: f64,
    pub quality_estimate: f64,
    pub low_confidence: bool,
    pub resolved_at: DateTime<Utc>,
}

/// Fuzzy TM match offered to the translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzySuggestion {
    pub entry_id: String,
    pub source_text: String,
    pub target_text: String,
    pub similarity: f64,
    pub confidence: f64,
}

/// Reuse of prior translations and terminology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeverageBlock {
    pub draft: Option<LeverageDraft>,
    pub tm_matches_applied: u32,
    pub glossary_terms_applied: Vec<AppliedTerm>,
    /// Sentences that occur more than once in the source text
    pub repeated_segments: u32,
    pub fuzzy_suggestions: Vec<FuzzySuggestion>,
    /// Last drafting failure, cleared by a successful draft
    pub last_error: Option<String>,
}

/// One content snapshot in the version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u32,
    pub content: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub approved: bool,
}

/// Kind of communication entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Comment,
    Query,
    ChangeRequest,
}

impl std::str::FromStr for CommentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "comment" => Ok(CommentKind::Comment),
            "query" => Ok(CommentKind::Query),
            "change_request" => Ok(CommentKind::ChangeRequest),
            _ => Err(anyhow::anyhow!("Invalid comment kind: {}", s)),
        }
    }
}

/// Comment, query or change request attached to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub kind: CommentKind,
    pub author: Actor,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

/// Communication log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationLog {
    pub entries: Vec<Comment>,
}

impl CommunicationLog {
    /// Queries nobody has answered yet
    pub fn open_queries(&self) -> impl Iterator<Item = &Comment> {
        self.entries
            .iter()
            .filter(|c| c.kind == CommentKind::Query && !c.resolved)
    }

    /// Change requests still pending
    pub fn open_change_requests(&self) -> impl Iterator<Item = &Comment> {
        self.entries
            .iter()
            .filter(|c| c.kind == CommentKind::ChangeRequest && !c.resolved)
    }
}

/// Billing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingBlock {
    pub rate_type: RateType,
    pub rate: f64,
    pub word_count: usize,
    pub hours: Option<f64>,
    /// Leverage discount in percent (0-100)
    pub discount_percent: f64,
    pub cost: Option<f64>,
}

impl BillingBlock {
    pub fn new(rate_type: RateType, rate: f64, word_count: usize) -> Self {
        Self {
            rate_type,
            rate,
            word_count,
            hours: None,
            discount_percent: 0.0,
            cost: None,
        }
    }

    /// Discount granted for a draft produced with the given leverage method
    pub fn discount_for(method: Option<LeverageMethod>) -> f64 {
        match method {
            Some(LeverageMethod::TmExact) => 70.0,
            Some(LeverageMethod::TmFuzzy) | Some(LeverageMethod::Hybrid) => 30.0,
            Some(LeverageMethod::Ai) | None => 0.0,
        }
    }

    /// Compute the cost once the actual hours are known
    pub fn settle(&mut self, actual_hours: f64, leverage: Option<LeverageMethod>) {
        self.hours = Some(actual_hours);
        self.discount_percent = Self::discount_for(leverage);

        let gross = match self.rate_type {
            RateType::PerWord => self.word_count as f64 * self.rate,
            RateType::PerHour => actual_hours * self.rate,
        };
        let net = gross * (1.0 - self.discount_percent / 100.0);
        self.cost = Some((net * 100.0).round() / 100.0);
    }
}

/// Descriptive metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub domain: Option<String>,
    pub audience: Option<String>,
    #[serde(default)]
    pub style: StyleNormalization,
    pub tone: Option<String>,
    #[serde(default)]
    pub confidential: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Aggregate root of the localization workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub id: String,
    pub content_id: String,
    pub source_language: String,
    pub target_language: String,
    pub source: SourceBlock,
    pub translation: TranslatedBlock,
    pub workflow: WorkflowBlock,
    pub quality: QualityBlock,
    pub leverage: LeverageBlock,
    pub versions: Vec<VersionRecord>,
    pub communication: CommunicationLog,
    pub billing: BillingBlock,
    pub metadata: RequestMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every commit
    pub version: i64,
}

/// Parameters for a new translation request
#[derive(Debug, Clone)]
pub struct NewRequestParams {
    pub content_id: String,
    pub source_language: String,
    pub target_language: String,
    pub text: String,
    pub context: Option<String>,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
    pub metadata: RequestMetadata,
}

impl TranslationRequest {
    /// Build a request in `requested` status
    pub fn new(
        id: String,
        params: NewRequestParams,
        rate_type: RateType,
        rate: f64,
        words_per_hour: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let source = SourceBlock::new(&params.text, params.metadata.domain.clone(), params.context);
        let estimated_hours =
            source.word_count as f64 / words_per_hour * source.complexity.effort_multiplier();
        let repeated_segments = count_repeated_segments(&params.text);
        let billing = BillingBlock::new(rate_type, rate, source.word_count);

        Self {
            id,
            content_id: params.content_id,
            source_language: params.source_language,
            target_language: params.target_language,
            source,
            translation: TranslatedBlock::default(),
            workflow: WorkflowBlock {
                status: RequestStatus::Requested,
                priority: params.priority,
                deadline: params.deadline,
                estimated_hours: (estimated_hours * 100.0).round() / 100.0,
                actual_hours: None,
                assigned_translator: None,
                assigned_date: None,
                reviewer: None,
            },
            quality: QualityBlock::default(),
            leverage: LeverageBlock {
                repeated_segments,
                ..LeverageBlock::default()
            },
            versions: Vec::new(),
            communication: CommunicationLog::default(),
            billing,
            metadata: params.metadata,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.workflow.status
    }

    pub fn domain(&self) -> Option<&str> {
        self.source.domain.as_deref()
    }

    pub fn translator_id(&self) -> Option<&str> {
        self.workflow
            .assigned_translator
            .as_ref()
            .map(|t| t.id.as_str())
    }

    /// Whether the latest approval happened on or before the deadline
    pub fn delivered_on_time(&self, approved_at: DateTime<Utc>) -> Option<bool> {
        self.workflow.deadline.map(|deadline| approved_at <= deadline)
    }
}

/// Filter for request searches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    #[serde(default)]
    pub statuses: Vec<RequestStatus>,
    pub content_id: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub translator_id: Option<String>,
    pub priority: Option<Priority>,
    pub domain: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Zero-based page index
    #[serde(default)]
    pub page: usize,
    pub page_size: Option<usize>,
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

/// Whitespace-separated word count
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Number of distinct sentences that appear more than once
pub fn count_repeated_segments(text: &str) -> u32 {
    let mut seen = std::collections::HashMap::new();
    for segment in text
        .split(['.', '!', '?', '\n'])
        .map(crate::similarity::normalize_text)
        .filter(|s| !s.is_empty())
    {
        *seen.entry(segment).or_insert(0u32) += 1;
    }
    seen.values().filter(|count| **count > 1).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(text: &str) -> NewRequestParams {
        NewRequestParams {
            content_id: "lesson-1".to_string(),
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            text: text.to_string(),
            context: None,
            priority: Priority::High,
            deadline: None,
            metadata: RequestMetadata {
                domain: Some("education".to_string()),
                ..RequestMetadata::default()
            },
        }
    }

    #[test]
    fn test_newRequest_shouldStartRequestedWithMetadata() {
        let request = TranslationRequest::new(
            "req-1".to_string(),
            params("Good morning class. Open your books."),
            RateType::PerWord,
            0.1,
            250.0,
            Utc::now(),
        );

        assert_eq!(request.status(), RequestStatus::Requested);
        assert_eq!(request.source.word_count, 6);
        assert_eq!(request.source.complexity, ComplexityTier::Simple);
        assert_eq!(request.domain(), Some("education"));
        assert!(request.workflow.actual_hours.is_none());
        assert_eq!(request.version, 0);
    }

    #[test]
    fn test_complexityTier_fromWordCount_shouldUseBoundaries() {
        assert_eq!(ComplexityTier::from_word_count(49), ComplexityTier::Simple);
        assert_eq!(ComplexityTier::from_word_count(50), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::from_word_count(250), ComplexityTier::Complex);
    }

    #[test]
    fn test_countRepeatedSegments_shouldCountDistinctRepeats() {
        let text = "Count with me. One, two. Count with me! Goodbye. one, two.";
        assert_eq!(count_repeated_segments(text), 2);
        assert_eq!(count_repeated_segments("No repeats here."), 0);
    }

    #[test]
    fn test_billingSettle_perWordWithExactDiscount() {
        let mut billing = BillingBlock::new(RateType::PerWord, 0.10, 100);
        billing.settle(2.0, Some(LeverageMethod::TmExact));
        assert_eq!(billing.discount_percent, 70.0);
        assert_eq!(billing.cost, Some(3.0));
    }

    #[test]
    fn test_billingSettle_perHourWithoutLeverage() {
        let mut billing = BillingBlock::new(RateType::PerHour, 40.0, 100);
        billing.settle(1.5, None);
        assert_eq!(billing.cost, Some(60.0));
    }

    #[test]
    fn test_status_parseDisplay_shouldRoundTripAll() {
        for status in RequestStatus::ALL {
            assert_eq!(status.to_string().parse::<RequestStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_priority_ordering_shouldFollowRank() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Normal);
        assert_eq!(Priority::Urgent.rank(), 3);
    }
}
