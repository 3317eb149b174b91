/*!
 * Common test utilities for the locflow test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use locflow::app_config::Config;
use locflow::collaborators::{
    AvailabilityWindow, InMemoryContentSource, InMemoryTranslatorDirectory, RecordingPublisher,
    SourceContent, Translator,
};
use locflow::database::Repository;
use locflow::providers::mock::MockMtProvider;
use locflow::workflow::{Actor, ActorRole, TranslationRequest};
use locflow::{Collaborators, RequestOptions, WorkflowService};

/// A service wired to in-memory collaborators, plus handles to inspect them
pub struct TestEnv {
    pub service: WorkflowService,
    pub provider: Arc<MockMtProvider>,
    pub content: Arc<InMemoryContentSource>,
    pub directory: Arc<InMemoryTranslatorDirectory>,
    pub publisher: Arc<RecordingPublisher>,
}

impl TestEnv {
    /// Current workload of a translator as seen by the directory
    pub fn workload(&self, translator_id: &str) -> u32 {
        self.directory
            .snapshot()
            .into_iter()
            .find(|t| t.id == translator_id)
            .map(|t| t.current_workload)
            .unwrap_or_default()
    }

    /// Create one request for `content_id` in the given target language
    pub async fn request(&self, content_id: &str, target_language: &str) -> TranslationRequest {
        self.service
            .request_translation(
                content_id,
                &[target_language.to_string()],
                RequestOptions::default(),
                &manager(),
            )
            .await
            .expect("request_translation failed")
            .remove(0)
    }
}

/// Initialize logging once; repeated calls are ignored
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build an environment over an in-memory database
pub async fn build_env(config: Config, provider: MockMtProvider, publisher: RecordingPublisher) -> Result<TestEnv> {
    build_env_with_repo(config, Repository::new_in_memory()?, provider, publisher).await
}

/// Build an environment over the given repository
pub async fn build_env_with_repo(
    config: Config,
    repo: Repository,
    provider: MockMtProvider,
    publisher: RecordingPublisher,
) -> Result<TestEnv> {
    init_logging();

    let provider = Arc::new(provider);
    let content = Arc::new(InMemoryContentSource::new());
    let directory = Arc::new(InMemoryTranslatorDirectory::new());
    let publisher = Arc::new(publisher);

    let collaborators = Collaborators {
        content: content.clone(),
        directory: directory.clone(),
        publisher: publisher.clone(),
    };
    let service = WorkflowService::open(&config, repo, provider.clone(), collaborators).await?;

    Ok(TestEnv {
        service,
        provider,
        content,
        directory,
        publisher,
    })
}

/// Default environment: mock provider knows "Good morning" in Spanish
pub async fn default_env() -> Result<TestEnv> {
    let provider = MockMtProvider::new(0.0).with_translation("Good morning", "es", "Buenos días", 85.0);
    let env = build_env(Config::default(), provider, RecordingPublisher::new()).await?;
    env.content.insert(content("greeting", "Good morning", "en"));
    Ok(env)
}

pub fn content(id: &str, text: &str, language: &str) -> SourceContent {
    SourceContent {
        id: id.to_string(),
        text: text.to_string(),
        language: language.to_string(),
        domain: None,
        audience: None,
        tags: Vec::new(),
    }
}

pub fn translator(id: &str, languages: &[&str], rating: f64, workload: u32, max_workload: u32) -> Translator {
    Translator {
        id: id.to_string(),
        name: format!("Translator {}", id),
        languages: languages.iter().map(|l| l.to_string()).collect(),
        specializations: Vec::new(),
        certifications: Vec::new(),
        rating_average: rating,
        current_workload: workload,
        max_workload,
        availability: AvailabilityWindow::default(),
    }
}

pub fn manager() -> Actor {
    Actor::new("pm-1", "Project Manager", ActorRole::Manager)
}

pub fn translator_actor(id: &str) -> Actor {
    Actor::new(id, id, ActorRole::Translator)
}

pub fn reviewer(id: &str) -> Actor {
    Actor::new(id, id, ActorRole::Reviewer)
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}
