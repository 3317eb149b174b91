/*!
 * Workflow state machine for a single translation request.
 *
 * The legal transition table is fixed. Applying a transition either fully
 * succeeds (new status, entry effects, one `status_change` event) or leaves
 * the request untouched.
 */

use chrono::{DateTime, Utc};
use log::debug;

use crate::collaborators::Translator;
use crate::errors::{WorkflowError, WorkflowResult};

use super::events::{Actor, WorkflowEvent};
use super::models::{
    count_words, RequestStatus, ReviewerSnapshot, TranslationMethod, TranslationRequest,
    TranslatorSnapshot, VersionRecord,
};

use RequestStatus::*;

/// Legal edges, excluding withdrawal which is allowed from every live status
const LEGAL_TRANSITIONS: &[(RequestStatus, RequestStatus)] = &[
    (Requested, Assigned),
    (Assigned, InProgress),
    (Assigned, Completed),
    (InProgress, Completed),
    (Completed, Reviewed),
    (Completed, Approved),
    (Completed, Rejected),
    (Reviewed, Approved),
    (Reviewed, Rejected),
    (Approved, Published),
    // Re-assignment after rejection is a fresh edge, not a rollback
    (Rejected, Assigned),
];

/// Whether `from -> to` is in the transition table
pub fn is_legal(from: RequestStatus, to: RequestStatus) -> bool {
    if to == Withdrawn {
        return !matches!(from, Published | Withdrawn);
    }
    LEGAL_TRANSITIONS.contains(&(from, to))
}

/// Statuses reachable from `from`
pub fn next_statuses(from: RequestStatus) -> Vec<RequestStatus> {
    RequestStatus::ALL
        .into_iter()
        .filter(|to| is_legal(from, *to))
        .collect()
}

/// A requested transition together with the data its entry effects need
#[derive(Debug, Clone)]
pub enum Transition {
    /// `requested|rejected -> assigned`
    Assign { translator: Translator },
    /// `assigned -> in_progress`
    Start,
    /// `assigned|in_progress -> completed`
    Complete { text: String, author_id: String },
    /// `completed -> reviewed`
    Review { reviewer: Actor },
    /// `completed|reviewed -> approved`
    Approve { reviewer: Actor },
    /// `completed|reviewed -> rejected`
    Reject { reviewer: Actor },
    /// `approved -> published`
    Publish,
    /// any live status -> `withdrawn`
    Withdraw,
}

impl Transition {
    pub fn target(&self) -> RequestStatus {
        match self {
            Transition::Assign { .. } => Assigned,
            Transition::Start => InProgress,
            Transition::Complete { .. } => Completed,
            Transition::Review { .. } => Reviewed,
            Transition::Approve { .. } => Approved,
            Transition::Reject { .. } => Rejected,
            Transition::Publish => Published,
            Transition::Withdraw => Withdrawn,
        }
    }
}

/// Apply `transition` to `request` and return the resulting `status_change` event
pub fn apply(
    request: &mut TranslationRequest,
    transition: Transition,
    actor: &Actor,
    now: DateTime<Utc>,
) -> WorkflowResult<WorkflowEvent> {
    let from = request.status();
    let to = transition.target();

    if !is_legal(from, to) {
        return Err(WorkflowError::InvalidTransition {
            request_id: request.id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let mut next = request.clone();

    match transition {
        Transition::Assign { translator } => enter_assigned(&mut next, &translator, now)?,
        Transition::Start | Transition::Publish | Transition::Withdraw => {}
        Transition::Complete { text, author_id } => enter_completed(&mut next, text, author_id, now)?,
        Transition::Review { reviewer } | Transition::Reject { reviewer } => {
            attach_reviewer(&mut next, &reviewer, now);
        }
        Transition::Approve { reviewer } => {
            attach_reviewer(&mut next, &reviewer, now);
            if let Some(latest) = next.versions.last_mut() {
                latest.approved = true;
            }
        }
    }

    next.workflow.status = to;
    next.updated_at = now;
    *request = next;

    debug!("Request {}: {} -> {}", request.id, from, to);

    Ok(WorkflowEvent::status_change(&request.id, Some(from), to, actor, now))
}

fn enter_assigned(
    request: &mut TranslationRequest,
    translator: &Translator,
    now: DateTime<Utc>,
) -> WorkflowResult<()> {
    if !translator.speaks(&request.source_language) || !translator.speaks(&request.target_language) {
        return Err(WorkflowError::ValidationFailure(format!(
            "translator {} does not cover {} -> {}",
            translator.id, request.source_language, request.target_language
        )));
    }
    if !translator.has_capacity() {
        return Err(WorkflowError::ValidationFailure(format!(
            "translator {} is at maximum workload ({})",
            translator.id, translator.max_workload
        )));
    }

    request.workflow.assigned_translator = Some(TranslatorSnapshot {
        id: translator.id.clone(),
        name: translator.name.clone(),
        specializations: translator.specializations.clone(),
        certifications: translator.certifications.clone(),
        rating: translator.rating_average,
        assigned_at: now,
    });
    request.workflow.assigned_date = Some(now);
    request.workflow.actual_hours = None;
    request.workflow.reviewer = None;
    Ok(())
}

fn enter_completed(
    request: &mut TranslationRequest,
    text: String,
    author_id: String,
    now: DateTime<Utc>,
) -> WorkflowResult<()> {
    if text.trim().is_empty() {
        return Err(WorkflowError::ValidationFailure(
            "submitted translation is empty".to_string(),
        ));
    }

    let assigned_at = request.workflow.assigned_date.unwrap_or(request.created_at);
    let elapsed_hours = (now - assigned_at).num_milliseconds().max(0) as f64 / 3_600_000.0;

    let draft = request.leverage.draft.as_ref();
    let method = match draft {
        None => TranslationMethod::Human,
        Some(draft) if draft.text.trim() == text.trim() => TranslationMethod::Ai,
        Some(_) => TranslationMethod::Hybrid,
    };
    let leverage_method = draft.map(|d| d.method);

    request.translation.word_count = count_words(&text);
    request.translation.translation_time_hours = Some(elapsed_hours);
    request.translation.method = Some(method);
    request.translation.text = Some(text.clone());
    request.workflow.actual_hours = Some(elapsed_hours);
    request.billing.settle(elapsed_hours, leverage_method);

    let version = request.versions.len() as u32 + 1;
    request.versions.push(VersionRecord {
        version,
        content: text,
        author_id,
        created_at: now,
        approved: false,
    });
    Ok(())
}

fn attach_reviewer(request: &mut TranslationRequest, reviewer: &Actor, now: DateTime<Utc>) {
    request.workflow.reviewer = Some(ReviewerSnapshot {
        id: reviewer.id.clone(),
        name: reviewer.name.clone(),
        reviewed_at: now,
    });
}
