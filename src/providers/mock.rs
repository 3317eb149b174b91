/*!
 * Mock machine translation provider.
 *
 * Behaviors:
 * - `MockMtProvider::new()` - answers from a fixed phrase table, failing on unknown text
 * - `MockMtProvider::failing()` - always fails with an error
 * - `MockMtProvider::slow()` - answers after a delay (for timeout testing)
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::similarity::normalize_text;

use super::{MtProvider, MtRequest, MtResponse};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Answers from the phrase table
    Working,
    /// Always fails with an error
    Failing,
    /// Answers from the phrase table after a delay
    Slow { delay_ms: u64 },
}

#[derive(Debug, Clone)]
struct Canned {
    text: String,
    confidence: f64,
    issues: Vec<String>,
}

/// Deterministic provider for tests and offline runs
#[derive(Debug, Clone)]
pub struct MockMtProvider {
    behavior: MockBehavior,
    default_confidence: f64,
    /// Canned translations keyed by (normalized source, target language)
    phrases: Arc<Mutex<HashMap<(String, String), Canned>>>,
    request_count: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<MtRequest>>>,
}

impl Default for MockMtProvider {
    fn default() -> Self {
        Self::new(75.0)
    }
}

impl MockMtProvider {
    pub fn new(default_confidence: f64) -> Self {
        Self::with_behavior(MockBehavior::Working, default_confidence)
    }

    pub fn with_behavior(behavior: MockBehavior, default_confidence: f64) -> Self {
        Self {
            behavior,
            default_confidence,
            phrases: Arc::new(Mutex::new(HashMap::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing() -> Self {
        Self::with_behavior(MockBehavior::Failing, 0.0)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::with_behavior(MockBehavior::Slow { delay_ms }, 75.0)
    }

    /// Register a canned translation
    pub fn with_translation(self, source: &str, target_language: &str, text: &str, confidence: f64) -> Self {
        self.add_translation(source, target_language, text, confidence, Vec::new());
        self
    }

    /// Register a canned translation that reports issues
    pub fn with_issues(self, source: &str, target_language: &str, text: &str, confidence: f64, issues: &[&str]) -> Self {
        let issues = issues.iter().map(|s| s.to_string()).collect();
        self.add_translation(source, target_language, text, confidence, issues);
        self
    }

    pub fn add_translation(&self, source: &str, target_language: &str, text: &str, confidence: f64, issues: Vec<String>) {
        self.phrases.lock().insert(
            (normalize_text(source), target_language.to_lowercase()),
            Canned {
                text: text.to_string(),
                confidence,
                issues,
            },
        );
    }

    /// Number of translate calls received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<MtRequest> {
        self.last_request.lock().clone()
    }

    fn answer(&self, request: &MtRequest) -> Result<MtResponse, ProviderError> {
        let key = (normalize_text(&request.source_text), request.target_language.to_lowercase());
        let phrases = self.phrases.lock();
        match phrases.get(&key) {
            Some(canned) => Ok(MtResponse {
                text: canned.text.clone(),
                confidence: canned.confidence,
                alternatives: Vec::new(),
                issues: canned.issues.clone(),
            }),
            None if self.default_confidence > 0.0 => Ok(MtResponse {
                text: format!("[{}] {}", request.target_language, request.source_text),
                confidence: self.default_confidence,
                alternatives: Vec::new(),
                issues: Vec::new(),
            }),
            None => Err(ProviderError::ApiError {
                status_code: 404,
                message: format!("no mock translation for '{}'", request.source_text),
            }),
        }
    }
}

#[async_trait]
impl MtProvider for MockMtProvider {
    async fn translate(&self, request: MtRequest) -> Result<MtResponse, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());

        match self.behavior {
            MockBehavior::Working => self.answer(&request),
            MockBehavior::Failing => Err(ProviderError::ConnectionError(
                "Mock provider failure".to_string(),
            )),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                self.answer(&request)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_translate_cannedPhrase_shouldReturnIt() {
        let provider = MockMtProvider::new(0.0).with_translation("Good morning", "es", "Buenos dias", 85.0);

        let response = provider.translate(MtRequest::new("good  morning", "en", "es")).await.unwrap();

        assert_eq!(response.text, "Buenos dias");
        assert_eq!(response.confidence, 85.0);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_translate_unknownWithoutDefault_shouldFail() {
        let provider = MockMtProvider::new(0.0);

        assert!(provider.translate(MtRequest::new("Hello", "en", "es")).await.is_err());
    }

    #[tokio::test]
    async fn test_translate_unknownWithDefault_shouldTagText() {
        let provider = MockMtProvider::new(70.0);

        let response = provider.translate(MtRequest::new("Hello", "en", "es")).await.unwrap();

        assert_eq!(response.text, "[es] Hello");
        assert_eq!(response.confidence, 70.0);
    }

    #[tokio::test]
    async fn test_failing_shouldAlwaysError() {
        let provider = MockMtProvider::failing();

        let result = provider.translate(MtRequest::new("Hello", "en", "es")).await;

        assert!(matches!(result, Err(ProviderError::ConnectionError(_))));
        assert_eq!(provider.last_request().unwrap().source_text, "Hello");
    }
}
