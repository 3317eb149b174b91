/*!
 * Boundary contracts with the systems around the workflow engine.
 *
 * - `ContentSource`: read-only access to source content
 * - `TranslatorDirectory`: translator profiles and workload counters
 * - `LocalizationPublisher`: receives approved translations
 *
 * In-memory implementations are provided for tests and for the CLI, which
 * loads them from JSON files.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::DirectoryError;
use crate::language_utils::language_codes_match;

/// Source content as provided by the content system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContent {
    pub id: String,
    pub text: String,
    /// Language the content is authored in
    pub language: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Read-only access to source content
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch one content item; `None` when the id is unknown
    async fn get_source_content(&self, content_id: &str) -> Result<Option<SourceContent>>;
}

/// Window in which a translator accepts new work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AvailabilityWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AvailabilityWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.until.is_none_or(|until| at <= until)
    }
}

/// Translator profile from the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translator {
    pub id: String,
    pub name: String,
    pub languages: Vec<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub rating_average: f64,
    #[serde(default)]
    pub current_workload: u32,
    pub max_workload: u32,
    #[serde(default)]
    pub availability: AvailabilityWindow,
}

impl Translator {
    /// Whether the translator works in the given language
    pub fn speaks(&self, language: &str) -> bool {
        self.languages
            .iter()
            .any(|known| language_codes_match(known, language))
    }

    /// Whether another task fits under the maximum workload
    pub fn has_capacity(&self) -> bool {
        self.current_workload < self.max_workload
    }

    /// Language coverage and capacity, the assignment preconditions
    pub fn is_eligible(&self, source_language: &str, target_language: &str) -> bool {
        self.speaks(source_language) && self.speaks(target_language) && self.has_capacity()
    }

    /// Fraction of capacity in use (1.0 when the maximum is zero)
    pub fn load_ratio(&self) -> f64 {
        if self.max_workload == 0 {
            1.0
        } else {
            self.current_workload as f64 / self.max_workload as f64
        }
    }
}

/// Translator directory
#[async_trait]
pub trait TranslatorDirectory: Send + Sync {
    /// Translators covering both languages and available now
    async fn list_available(
        &self,
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<Translator>, DirectoryError>;

    /// Look up one translator
    async fn get(&self, translator_id: &str) -> Result<Option<Translator>, DirectoryError>;

    /// Take one unit of workload; fails when the translator is at capacity
    async fn reserve_workload(&self, translator_id: &str) -> Result<(), DirectoryError>;

    /// Give back one unit of workload
    async fn release_workload(&self, translator_id: &str) -> Result<(), DirectoryError>;
}

/// Metadata handed to the publisher together with the approved text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub request_id: String,
    pub translator_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub final_score: Option<f64>,
    pub approved_at: DateTime<Utc>,
}

/// Receives approved translations into the content's localization set
#[async_trait]
pub trait LocalizationPublisher: Send + Sync {
    async fn publish(
        &self,
        content_id: &str,
        language: &str,
        translated_text: &str,
        metadata: &PublishMetadata,
    ) -> Result<()>;
}

/// Content source backed by a map
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentSource {
    items: Arc<RwLock<HashMap<String, SourceContent>>>,
}

impl InMemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of content items
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content catalog: {}", path.display()))?;
        let items: Vec<SourceContent> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse content catalog: {}", path.display()))?;

        let source = Self::new();
        for item in items {
            source.insert(item);
        }
        Ok(source)
    }

    pub fn insert(&self, content: SourceContent) {
        self.items.write().insert(content.id.clone(), content);
    }
}

#[async_trait]
impl ContentSource for InMemoryContentSource {
    async fn get_source_content(&self, content_id: &str) -> Result<Option<SourceContent>> {
        Ok(self.items.read().get(content_id).cloned())
    }
}

/// Translator directory backed by a map; workload counters live in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTranslatorDirectory {
    translators: Arc<RwLock<HashMap<String, Translator>>>,
}

impl InMemoryTranslatorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translators(translators: Vec<Translator>) -> Self {
        let directory = Self::new();
        for translator in translators {
            directory.upsert(translator);
        }
        directory
    }

    /// Load a JSON array of translator profiles
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read translator roster: {}", path.display()))?;
        let translators: Vec<Translator> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse translator roster: {}", path.display()))?;
        Ok(Self::with_translators(translators))
    }

    /// Write the roster, including current workloads, back to a JSON file
    pub fn save_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut translators = self.snapshot();
        translators.sort_by(|a, b| a.id.cmp(&b.id));
        let json = serde_json::to_string_pretty(&translators)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write translator roster: {}", path.display()))
    }

    pub fn upsert(&self, translator: Translator) {
        self.translators
            .write()
            .insert(translator.id.clone(), translator);
    }

    pub fn snapshot(&self) -> Vec<Translator> {
        self.translators.read().values().cloned().collect()
    }
}

#[async_trait]
impl TranslatorDirectory for InMemoryTranslatorDirectory {
    async fn list_available(
        &self,
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<Translator>, DirectoryError> {
        let now = Utc::now();
        let mut available: Vec<Translator> = self
            .translators
            .read()
            .values()
            .filter(|t| t.speaks(source_language) && t.speaks(target_language))
            .filter(|t| t.availability.contains(now))
            .cloned()
            .collect();
        available.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(available)
    }

    async fn get(&self, translator_id: &str) -> Result<Option<Translator>, DirectoryError> {
        Ok(self.translators.read().get(translator_id).cloned())
    }

    async fn reserve_workload(&self, translator_id: &str) -> Result<(), DirectoryError> {
        let mut translators = self.translators.write();
        let translator = translators
            .get_mut(translator_id)
            .ok_or_else(|| DirectoryError::UnknownTranslator(translator_id.to_string()))?;

        if !translator.has_capacity() {
            return Err(DirectoryError::AtCapacity {
                id: translator.id.clone(),
                max_workload: translator.max_workload,
            });
        }

        translator.current_workload += 1;
        debug!(
            "Reserved workload for {} ({}/{})",
            translator.id, translator.current_workload, translator.max_workload
        );
        Ok(())
    }

    async fn release_workload(&self, translator_id: &str) -> Result<(), DirectoryError> {
        let mut translators = self.translators.write();
        let translator = translators
            .get_mut(translator_id)
            .ok_or_else(|| DirectoryError::UnknownTranslator(translator_id.to_string()))?;

        translator.current_workload = translator.current_workload.saturating_sub(1);
        Ok(())
    }
}

/// Publisher that keeps published translations in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<RwLock<Vec<PublishedTranslation>>>,
    fail: bool,
}

/// One publication seen by `RecordingPublisher`
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedTranslation {
    pub content_id: String,
    pub language: String,
    pub text: String,
    pub metadata: PublishMetadata,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose every call fails
    pub fn failing() -> Self {
        Self {
            published: Arc::default(),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<PublishedTranslation> {
        self.published.read().clone()
    }
}

#[async_trait]
impl LocalizationPublisher for RecordingPublisher {
    async fn publish(
        &self,
        content_id: &str,
        language: &str,
        translated_text: &str,
        metadata: &PublishMetadata,
    ) -> Result<()> {
        if self.fail {
            return Err(anyhow::anyhow!("localization set for {} is read-only", content_id));
        }

        info!("Published {} translation of {}", language, content_id);
        self.published.write().push(PublishedTranslation {
            content_id: content_id.to_string(),
            language: language.to_string(),
            text: translated_text.to_string(),
            metadata: metadata.clone(),
        });
        Ok(())
    }
}
