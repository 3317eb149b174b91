/*!
 * Translation memory: previously produced (source, target) pairs.
 *
 * Entries are partitioned per language pair and looked up by their
 * normalized source text (trimmed, whitespace-collapsed, lowercased).
 * Verified entries are immutable; unverified ones may be superseded.
 */

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::similarity::normalize_text;

pub use crate::app_config::MemoryConfig;
pub use store::{InsertOutcome, MemoryStats, PairStats, TranslationMemory};

/// Confidence floor of human corrections
pub const CORRECTION_CONFIDENCE_FLOOR: f64 = 95.0;

/// A stored translation memory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub source_text: String,
    pub target_text: String,
    pub source_language: String,
    pub target_language: String,
    pub domain: Option<String>,
    pub context: Option<String>,
    /// Confidence 0-100
    pub confidence: f64,
    pub verified: bool,
    pub usage_count: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Lookup key of the source text
    pub fn source_key(&self) -> String {
        source_key(&self.source_text)
    }

    /// Whether the entry applies to a request in `domain`; entries without
    /// a domain are generic
    pub fn matches_domain(&self, domain: Option<&str>) -> bool {
        match (domain, self.domain.as_deref()) {
            (Some(wanted), Some(own)) => wanted.eq_ignore_ascii_case(own),
            _ => true,
        }
    }

    fn same_domain(&self, domain: Option<&str>) -> bool {
        match (self.domain.as_deref(), domain) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

/// A new pair to remember
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemoryEntry {
    pub source_text: String,
    pub target_text: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_created_by() -> String {
    "import".to_string()
}

impl NewMemoryEntry {
    /// Machine-produced pair that met the insertion threshold
    pub fn unverified(
        source_text: &str,
        target_text: &str,
        source_language: &str,
        target_language: &str,
        confidence: f64,
        created_by: &str,
    ) -> Self {
        Self {
            source_text: source_text.to_string(),
            target_text: target_text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            domain: None,
            context: None,
            confidence: confidence.clamp(0.0, 100.0),
            verified: false,
            created_by: created_by.to_string(),
        }
    }

    /// Human correction: always verified with a confidence of at least 95
    pub fn correction(
        source_text: &str,
        target_text: &str,
        source_language: &str,
        target_language: &str,
        confidence: f64,
        created_by: &str,
    ) -> Self {
        Self {
            confidence: confidence.clamp(CORRECTION_CONFIDENCE_FLOOR, 100.0),
            verified: true,
            ..Self::unverified(
                source_text,
                target_text,
                source_language,
                target_language,
                confidence,
                created_by,
            )
        }
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }
}

/// Fuzzy lookup result
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub entry: MemoryEntry,
    /// Similarity of the normalized source texts, in (0, 1)
    pub similarity: f64,
}

/// Normalized lookup key of a source text
pub fn source_key(text: &str) -> String {
    normalize_text(text)
}

/// SHA-256 of the normalized source text, used as the persisted lookup key
pub fn source_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_key(text).as_bytes());
    format!("{:x}", hasher.finalize())
}
