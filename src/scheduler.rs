/*!
 * Automatic translator assignment.
 *
 * Pending requests are placed onto translators by a selection policy:
 * - `performance`: highest rating
 * - `balanced`: highest `rating × (1 − workload/max)`, ties to the lowest workload
 * - `random`: uniform among eligible translators
 *
 * The scheduler only decides. Committing an assignment (per-task lock,
 * workload reservation, state transition) is done by the caller through
 * the closure handed to [`AssignmentScheduler::run`].
 */

use futures::stream::{self, StreamExt};
use log::{debug, info};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;

use crate::app_config::{AssignmentPolicy, SchedulerConfig};
use crate::collaborators::{Translator, TranslatorDirectory};
use crate::errors::{WorkflowError, WorkflowResult};
use crate::language_utils::language_codes_match;
use crate::workflow::{Priority, TranslationRequest};

type PolicyFn = fn(&[Translator]) -> Option<&Translator>;

/// Policy dispatch table
const POLICIES: &[(AssignmentPolicy, PolicyFn)] = &[
    (AssignmentPolicy::Performance, pick_by_performance),
    (AssignmentPolicy::Balanced, pick_balanced),
    (AssignmentPolicy::Random, pick_random),
];

fn balanced_score(translator: &Translator) -> f64 {
    translator.rating_average * (1.0 - translator.load_ratio())
}

fn pick_by_performance(candidates: &[Translator]) -> Option<&Translator> {
    candidates.iter().reduce(|best, next| {
        match next.rating_average.total_cmp(&best.rating_average) {
            Ordering::Greater => next,
            Ordering::Equal if next.current_workload < best.current_workload => next,
            _ => best,
        }
    })
}

fn pick_balanced(candidates: &[Translator]) -> Option<&Translator> {
    candidates.iter().reduce(|best, next| {
        match balanced_score(next).total_cmp(&balanced_score(best)) {
            Ordering::Greater => next,
            Ordering::Equal if next.current_workload < best.current_workload => next,
            _ => best,
        }
    })
}

fn pick_random(candidates: &[Translator]) -> Option<&Translator> {
    candidates.choose(&mut rand::rng())
}

/// Pick a translator for the language pair among `candidates`
///
/// Only translators covering both languages with spare capacity are
/// considered. Returns `None` when nobody is eligible.
pub fn select_translator(
    policy: AssignmentPolicy,
    candidates: &[Translator],
    source_language: &str,
    target_language: &str,
) -> Option<Translator> {
    let eligible: Vec<Translator> = candidates
        .iter()
        .filter(|t| t.is_eligible(source_language, target_language))
        .cloned()
        .collect();

    let pick = POLICIES
        .iter()
        .find(|(p, _)| *p == policy)
        .map(|(_, pick)| *pick)
        .unwrap_or(pick_balanced);

    pick(&eligible).cloned()
}

/// Which pending requests an auto-assignment run considers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentCriteria {
    /// Overrides the configured policy
    pub policy: Option<AssignmentPolicy>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    /// Skip requests below this priority
    pub min_priority: Option<Priority>,
    /// Maximum number of pending requests to consider
    pub limit: Option<usize>,
}

impl AssignmentCriteria {
    pub fn matches(&self, request: &TranslationRequest) -> bool {
        let language_ok = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().is_none_or(|w| language_codes_match(w, actual))
        };

        language_ok(&self.source_language, &request.source_language)
            && language_ok(&self.target_language, &request.target_language)
            && self
                .min_priority
                .is_none_or(|min| request.workflow.priority >= min)
    }
}

/// A committed assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub request_id: String,
    pub translator_id: String,
    pub translator_name: String,
}

/// A request that could not be assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentFailure {
    pub request_id: String,
    pub reason: String,
}

/// Result of trying to assign one pending request
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Assigned(Assignment),
    Failed(AssignmentFailure),
    /// The request was no longer pending when its lock was taken
    Skipped { request_id: String },
}

/// Summary of an auto-assignment run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignReport {
    pub assigned_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub assignments: Vec<Assignment>,
    pub failures: Vec<AssignmentFailure>,
}

impl AutoAssignReport {
    fn record(&mut self, outcome: AssignmentOutcome) {
        match outcome {
            AssignmentOutcome::Assigned(assignment) => {
                self.assigned_count += 1;
                self.assignments.push(assignment);
            }
            AssignmentOutcome::Failed(failure) => {
                self.failed_count += 1;
                self.failures.push(failure);
            }
            AssignmentOutcome::Skipped { .. } => self.skipped_count += 1,
        }
    }
}

/// Selects translators for pending requests
#[derive(Clone)]
pub struct AssignmentScheduler {
    directory: Arc<dyn TranslatorDirectory>,
    default_policy: AssignmentPolicy,
    max_concurrent: usize,
}

impl AssignmentScheduler {
    pub fn new(directory: Arc<dyn TranslatorDirectory>, config: &SchedulerConfig) -> Self {
        Self {
            directory,
            default_policy: config.policy,
            max_concurrent: config.max_concurrent_assignments.max(1),
        }
    }

    pub fn default_policy(&self) -> AssignmentPolicy {
        self.default_policy
    }

    pub fn directory(&self) -> &Arc<dyn TranslatorDirectory> {
        &self.directory
    }

    /// Choose a translator for `request`, reading live workloads from the directory
    pub async fn choose_translator(
        &self,
        request: &TranslationRequest,
        policy: Option<AssignmentPolicy>,
    ) -> WorkflowResult<Translator> {
        let policy = policy.unwrap_or(self.default_policy);
        let candidates = self
            .directory
            .list_available(&request.source_language, &request.target_language)
            .await?;

        select_translator(policy, &candidates, &request.source_language, &request.target_language)
            .ok_or_else(|| WorkflowError::NoEligibleTranslator {
                request_id: request.id.clone(),
            })
    }

    /// Run `assign` over `pending` with bounded parallelism
    ///
    /// Outcomes are reported in the order of `pending`.
    pub async fn run<F, Fut>(&self, pending: Vec<TranslationRequest>, assign: F) -> AutoAssignReport
    where
        F: Fn(TranslationRequest) -> Fut,
        Fut: Future<Output = AssignmentOutcome>,
    {
        let total = pending.len();
        debug!("Auto-assigning {} pending requests ({} at a time)", total, self.max_concurrent);

        let mut outcomes: Vec<(usize, AssignmentOutcome)> = stream::iter(pending.into_iter().enumerate())
            .map(|(index, request)| {
                let fut = assign(request);
                async move { (index, fut.await) }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = AutoAssignReport::default();
        for (_, outcome) in outcomes {
            report.record(outcome);
        }

        info!(
            "Auto-assignment finished: {} assigned, {} failed, {} skipped of {}",
            report.assigned_count, report.failed_count, report.skipped_count, total
        );
        report
    }
}
