/*!
 * Integration tests for draft resolution through the workflow service
 */

use anyhow::Result;
use locflow::app_config::Config;
use locflow::collaborators::{RecordingPublisher, SourceContent};
use locflow::glossary::GlossaryTerm;
use locflow::memory::InsertOutcome;
use locflow::providers::mock::MockMtProvider;
use locflow::{LeverageMethod, LeverageRequest, WorkflowError};

use crate::common;

#[tokio::test]
async fn test_resolve_newText_shouldUseMachineTranslationThenMemory() -> Result<()> {
    let env = common::default_env().await?;
    let first = env.request("greeting", "es").await;

    let proposal = env.service.resolve(&first.id).await?.unwrap();

    assert_eq!(proposal.method, LeverageMethod::Ai);
    assert_eq!(proposal.text, "Buenos días");
    assert_eq!(proposal.confidence, 85.0);
    let entry = env
        .service
        .resolver()
        .memory()
        .exact_match("Good morning", "en", "es", None)
        .unwrap();
    assert!(!entry.verified);
    assert_eq!(entry.confidence, 85.0);

    let stored = env.service.get_request(&first.id).await?;
    let draft = stored.leverage.draft.unwrap();
    assert_eq!(draft.method, LeverageMethod::Ai);
    assert_eq!(stored.leverage.tm_matches_applied, 0);

    env.content.insert(common::content("greeting-2", "Good morning", "en"));
    let second = env.request("greeting-2", "es").await;
    let reused = env.service.resolve(&second.id).await?.unwrap();

    assert_eq!(reused.method, LeverageMethod::TmExact);
    assert_eq!(reused.confidence, 85.0);
    assert_eq!(env.provider.request_count(), 1);
    let stored = env.service.get_request(&second.id).await?;
    assert_eq!(stored.leverage.tm_matches_applied, 1);
    Ok(())
}

#[tokio::test]
async fn test_resolve_glossaryDomain_shouldSubstituteVerifiedTerm() -> Result<()> {
    let provider = MockMtProvider::new(0.0).with_translation("Hello kid", "es", "Hola kid", 82.0);
    let env = common::build_env(Config::default(), provider, RecordingPublisher::new()).await?;
    env.content.insert(SourceContent {
        domain: Some("education".to_string()),
        ..common::content("lesson", "Hello kid", "en")
    });
    env.service
        .resolver()
        .glossary()
        .upsert(GlossaryTerm::new("kid", "en", "education").with_translation("es", "niño", true))
        .await?;
    let request = env.request("lesson", "es").await;

    let proposal = env.service.resolve(&request.id).await?.unwrap();

    assert_eq!(proposal.text, "Hola niño");
    let stored = env.service.get_request(&request.id).await?;
    assert_eq!(stored.leverage.glossary_terms_applied.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_resolve_providerDown_shouldRecordLastError() -> Result<()> {
    let env = common::build_env(Config::default(), MockMtProvider::failing(), RecordingPublisher::new()).await?;
    env.content.insert(common::content("greeting", "Good morning", "en"));
    let request = env.request("greeting", "es").await;

    let err = env.service.resolve(&request.id).await.unwrap_err();

    assert!(matches!(err, WorkflowError::ProviderUnavailable(_)));
    let stored = env.service.get_request(&request.id).await?;
    assert!(stored.leverage.draft.is_none());
    assert!(stored.leverage.last_error.is_some());
    Ok(())
}

#[tokio::test]
async fn test_recordCorrection_shouldBeVerifiedAndPreferred() -> Result<()> {
    let env = common::default_env().await?;
    let first = env.request("greeting", "es").await;
    env.service.resolve(&first.id).await?;

    let outcome = env
        .service
        .record_correction("Good morning", "Buenos días a todos", "en", "spa", None, 80.0, &common::manager())
        .await?;

    assert!(matches!(outcome, InsertOutcome::Inserted { superseded: 1, .. }));
    let entry = env
        .service
        .resolver()
        .memory()
        .exact_match("Good morning", "en", "es", None)
        .unwrap();
    assert!(entry.verified);
    assert_eq!(entry.target_text, "Buenos días a todos");
    assert!(entry.confidence >= 95.0);
    Ok(())
}

#[tokio::test]
async fn test_recordCorrection_emptyText_shouldBeValidationFailure() -> Result<()> {
    let env = common::default_env().await?;

    let result = env
        .service
        .record_correction("Good morning", "  ", "en", "es", None, 99.0, &common::manager())
        .await;

    assert!(matches!(result, Err(WorkflowError::ValidationFailure(_))));
    Ok(())
}

#[tokio::test]
async fn test_translateBatch_shouldKeepOrderWithPerItemErrors() -> Result<()> {
    let provider = MockMtProvider::new(0.0)
        .with_translation("One apple", "es", "Una manzana", 90.0)
        .with_translation("Three apples", "fr", "Trois pommes", 90.0);
    let env = common::build_env(Config::default(), provider, RecordingPublisher::new()).await?;

    let results = env
        .service
        .translate_batch(vec![
            LeverageRequest::new("One apple", "en", "es"),
            LeverageRequest::new("Two apples", "en", "nope"),
            LeverageRequest::new("Three apples", "eng", "fra"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().text, "Una manzana");
    assert!(matches!(results[1], Err(WorkflowError::ValidationFailure(_))));
    assert_eq!(results[2].as_ref().unwrap().text, "Trois pommes");
    Ok(())
}

#[tokio::test]
async fn test_memoryStats_shouldCountHitsAndEntries() -> Result<()> {
    let env = common::default_env().await?;
    let request = env.request("greeting", "es").await;
    env.service.resolve(&request.id).await?;

    let stats = env.service.memory_stats();

    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.pairs.len(), 1);
    Ok(())
}
