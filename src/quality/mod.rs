/*!
 * Quality assessment aggregation.
 *
 * Assessments carry six 0-100 scores. The final score of a request is the
 * mean of every assessment's `overall`, recomputed from scratch each time an
 * assessment is added.
 */

pub mod estimate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{WorkflowError, WorkflowResult};

pub use estimate::{estimate_quality, EstimateInput};

/// Severity of a reported quality issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(anyhow::anyhow!("Invalid severity: {}", s)),
        }
    }
}

/// An issue found by an assessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub description: String,
}

impl QualityIssue {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
        }
    }
}

/// One quality assessment of a translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessor_id: String,
    pub accuracy: f64,
    pub fluency: f64,
    pub adequacy: f64,
    pub cultural_appropriateness: f64,
    pub terminology: f64,
    pub overall: f64,
    pub feedback: Option<String>,
    #[serde(default)]
    pub issues: Vec<QualityIssue>,
    pub assessed_at: DateTime<Utc>,
}

impl Assessment {
    /// Assessment where every dimension carries the same score
    pub fn uniform(
        assessor_id: impl Into<String>,
        score: f64,
        feedback: Option<String>,
        assessed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            assessor_id: assessor_id.into(),
            accuracy: score,
            fluency: score,
            adequacy: score,
            cultural_appropriateness: score,
            terminology: score,
            overall: score,
            feedback,
            issues: Vec::new(),
            assessed_at,
        }
    }

    pub fn with_issue(mut self, issue: QualityIssue) -> Self {
        self.issues.push(issue);
        self
    }

    /// Reject scores outside 0-100
    pub fn validate(&self) -> WorkflowResult<()> {
        let scores = [
            ("accuracy", self.accuracy),
            ("fluency", self.fluency),
            ("adequacy", self.adequacy),
            ("cultural_appropriateness", self.cultural_appropriateness),
            ("terminology", self.terminology),
            ("overall", self.overall),
        ];
        for (name, score) in scores {
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return Err(WorkflowError::ValidationFailure(format!(
                    "{} score {} is outside 0-100",
                    name, score
                )));
            }
        }
        Ok(())
    }

    pub fn has_critical_issue(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }
}

/// Quality block of a translation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityBlock {
    pub assessments: Vec<Assessment>,
    pub final_score: Option<f64>,
    pub passes_qa: bool,
    pub requires_revision: bool,
}

/// Folds assessments into a final score and pass/fail flags
#[derive(Debug, Clone, Copy)]
pub struct QualityAggregator {
    pass_threshold: f64,
}

impl Default for QualityAggregator {
    fn default() -> Self {
        Self::new(80.0)
    }
}

impl QualityAggregator {
    pub fn new(pass_threshold: f64) -> Self {
        Self { pass_threshold }
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Validate and append an assessment, then recompute the block
    pub fn add_assessment(&self, block: &mut QualityBlock, assessment: Assessment) -> WorkflowResult<()> {
        assessment.validate()?;
        block.assessments.push(assessment);
        self.recompute(block);
        Ok(())
    }

    /// Recompute every derived field from the assessment list
    pub fn recompute(&self, block: &mut QualityBlock) {
        if block.assessments.is_empty() {
            block.final_score = None;
            block.passes_qa = false;
            block.requires_revision = false;
            return;
        }

        let total: f64 = block.assessments.iter().map(|a| a.overall).sum();
        let final_score = total / block.assessments.len() as f64;

        block.final_score = Some(final_score);
        block.passes_qa = final_score >= self.pass_threshold;
        block.requires_revision = block.assessments.iter().any(Assessment::has_critical_issue);
    }
}
