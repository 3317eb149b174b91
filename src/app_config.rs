use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the engine configuration including loading,
/// validating and saving configuration settings.
/// Represents the engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Persistence settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Translation memory and leverage settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Quality assurance settings
    #[serde(default)]
    pub quality: QualityConfig,

    /// Automatic assignment settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Machine translation provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Workflow, estimation and billing settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Machine translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: deterministic in-process stub
    #[default]
    Mock,
    // @provider: Ollama HTTP API
    Ollama,
}

impl ProviderKind {
    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Mock => "mock".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translator selection policy used by automatic assignment
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentPolicy {
    /// Highest rating wins
    Performance,
    /// Rating weighted by spare capacity
    #[default]
    Balanced,
    /// Uniform choice among eligible translators
    Random,
}

impl std::fmt::Display for AssignmentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Performance => write!(f, "performance"),
            Self::Balanced => write!(f, "balanced"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for AssignmentPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "performance" => Ok(Self::Performance),
            "balanced" => Ok(Self::Balanced),
            "random" => Ok(Self::Random),
            _ => Err(anyhow!("Invalid assignment policy: {}", s)),
        }
    }
}

/// Billing rate type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    #[default]
    PerWord,
    PerHour,
}

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Path of the SQLite file; the user data directory is used when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Translation memory configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Lowest similarity a fuzzy match may have (0.0-1.0)
    #[serde(default = "default_fuzzy_min_similarity")]
    pub fuzzy_min_similarity: f64,

    /// Maximum number of fuzzy matches returned by a lookup
    #[serde(default = "default_fuzzy_limit")]
    pub fuzzy_limit: usize,

    /// Number of fuzzy matches passed to the MT provider as context
    #[serde(default = "default_mt_context_matches")]
    pub mt_context_matches: usize,

    /// Per language pair cap; oldest entries are evicted first
    #[serde(default = "default_max_entries_per_pair")]
    pub max_entries_per_pair: usize,

    /// Minimum quality estimate for a resolved draft to enter the memory
    #[serde(default = "default_insert_threshold")]
    pub insert_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_similarity: default_fuzzy_min_similarity(),
            fuzzy_limit: default_fuzzy_limit(),
            mt_context_matches: default_mt_context_matches(),
            max_entries_per_pair: default_max_entries_per_pair(),
            insert_threshold: default_insert_threshold(),
        }
    }
}

/// Quality assurance configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    /// Final score needed to pass QA (0-100)
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
        }
    }
}

/// Assignment scheduler configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Default selection policy
    #[serde(default)]
    pub policy: AssignmentPolicy,

    /// Maximum number of tasks assigned in parallel
    #[serde(default = "default_concurrent_requests")]
    pub max_concurrent_assignments: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: AssignmentPolicy::default(),
            max_concurrent_assignments: default_concurrent_requests(),
        }
    }
}

/// Machine translation provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type", default)]
    pub provider_type: ProviderKind,

    // @field: Whether MT is called at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,

    // @field: Service URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Confidence reported for providers that do not score their output
    #[serde(default = "default_provider_confidence")]
    pub default_confidence: f64,

    // @field: Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Max concurrent provider requests in batch operations
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderKind::default(),
            enabled: true,
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            timeout_secs: default_timeout_secs(),
            default_confidence: default_provider_confidence(),
            temperature: default_temperature(),
            concurrent_requests: default_concurrent_requests(),
        }
    }
}

/// Workflow configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkflowConfig {
    /// Publish and move to `published` right after approval
    #[serde(default = "default_true")]
    pub auto_publish: bool,

    /// Translator throughput used for estimates
    #[serde(default = "default_words_per_hour")]
    pub words_per_hour: f64,

    /// Billing rate type for new requests
    #[serde(default)]
    pub rate_type: RateType,

    /// Rate per source word
    #[serde(default = "default_per_word_rate")]
    pub per_word_rate: f64,

    /// Rate per hour of work
    #[serde(default = "default_per_hour_rate")]
    pub per_hour_rate: f64,

    /// Default page size for request searches
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_publish: true,
            words_per_hour: default_words_per_hour(),
            rate_type: RateType::default(),
            per_word_rate: default_per_word_rate(),
            per_hour_rate: default_per_hour_rate(),
            page_size: default_page_size(),
        }
    }
}

impl WorkflowConfig {
    /// Rate matching the configured rate type
    pub fn rate(&self) -> f64 {
        match self.rate_type {
            RateType::PerWord => self.per_word_rate,
            RateType::PerHour => self.per_hour_rate,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_fuzzy_min_similarity() -> f64 {
    0.7
}

fn default_fuzzy_limit() -> usize {
    5
}

fn default_mt_context_matches() -> usize {
    3
}

fn default_max_entries_per_pair() -> usize {
    10_000
}

fn default_insert_threshold() -> f64 {
    80.0
}

fn default_pass_threshold() -> f64 {
    80.0
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_provider_confidence() -> f64 {
    75.0
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama2".to_string()
}

fn default_words_per_hour() -> f64 {
    250.0
}

fn default_per_word_rate() -> f64 {
    0.12
}

fn default_per_hour_rate() -> f64 {
    40.0
}

fn default_page_size() -> usize {
    20
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let memory = &self.memory;
        if !(0.0..=1.0).contains(&memory.fuzzy_min_similarity) {
            return Err(anyhow!(
                "memory.fuzzy_min_similarity must be within 0.0-1.0, got {}",
                memory.fuzzy_min_similarity
            ));
        }
        if memory.fuzzy_limit == 0 {
            return Err(anyhow!("memory.fuzzy_limit must be at least 1"));
        }
        if memory.max_entries_per_pair == 0 {
            return Err(anyhow!("memory.max_entries_per_pair must be at least 1"));
        }
        if !(0.0..=100.0).contains(&memory.insert_threshold) {
            return Err(anyhow!(
                "memory.insert_threshold must be within 0-100, got {}",
                memory.insert_threshold
            ));
        }
        if !(0.0..=100.0).contains(&self.quality.pass_threshold) {
            return Err(anyhow!(
                "quality.pass_threshold must be within 0-100, got {}",
                self.quality.pass_threshold
            ));
        }
        if self.scheduler.max_concurrent_assignments == 0 {
            return Err(anyhow!("scheduler.max_concurrent_assignments must be at least 1"));
        }
        if self.provider.concurrent_requests == 0 {
            return Err(anyhow!("provider.concurrent_requests must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.provider.default_confidence) {
            return Err(anyhow!("provider.default_confidence must be within 0-100"));
        }
        if self.provider.provider_type == ProviderKind::Ollama {
            url::Url::parse(&self.provider.endpoint)
                .with_context(|| format!("Invalid provider endpoint: {}", self.provider.endpoint))?;
        }
        if self.workflow.words_per_hour <= 0.0 {
            return Err(anyhow!("workflow.words_per_hour must be positive"));
        }
        if self.workflow.per_word_rate < 0.0 || self.workflow.per_hour_rate < 0.0 {
            return Err(anyhow!("workflow rates cannot be negative"));
        }
        if self.workflow.page_size == 0 {
            return Err(anyhow!("workflow.page_size must be at least 1"));
        }

        Ok(())
    }

    /// Load the configuration from a JSON file, writing defaults when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }
}
