/*!
 * Integration tests for persistence across service restarts
 */

use anyhow::Result;
use locflow::app_config::Config;
use locflow::collaborators::RecordingPublisher;
use locflow::database::{DatabaseConnection, Repository};
use locflow::glossary::GlossaryTerm;
use locflow::providers::mock::MockMtProvider;
use locflow::workflow::{RequestFilter, RequestStatus};

use crate::common;

fn provider() -> MockMtProvider {
    MockMtProvider::new(0.0).with_translation("Good morning", "es", "Buenos días", 85.0)
}

#[tokio::test]
async fn test_reopen_shouldRestoreRequestsMemoryAndGlossary() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let db_path = dir.path().join("data").join("locflow.db");

    let request_id = {
        let repo = Repository::new(DatabaseConnection::new(&db_path)?);
        let env = common::build_env_with_repo(Config::default(), repo, provider(), RecordingPublisher::new()).await?;
        env.content.insert(common::content("greeting", "Good morning", "en"));
        env.service
            .resolver()
            .glossary()
            .upsert(GlossaryTerm::new("lesson", "en", "education").with_translation("es", "lección", true))
            .await?;
        let request = env.request("greeting", "es").await;
        env.service.resolve(&request.id).await?;
        env.service.close();
        request.id
    };

    let repo = Repository::new(DatabaseConnection::new(&db_path)?);
    let env = common::build_env_with_repo(Config::default(), repo, provider(), RecordingPublisher::new()).await?;

    let restored = env.service.get_request(&request_id).await?;
    assert_eq!(restored.status(), RequestStatus::Requested);
    assert_eq!(restored.leverage.draft.unwrap().text, "Buenos días");
    assert!(env
        .service
        .resolver()
        .memory()
        .exact_match("Good morning", "en", "es", None)
        .is_some());
    assert_eq!(env.service.resolver().glossary().len(), 1);
    assert_eq!(env.service.events_for(&request_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_searchRequests_shouldFilterAndPaginate() -> Result<()> {
    let env = common::default_env().await?;
    for target in ["es", "fr", "de"] {
        env.request("greeting", target).await;
    }

    let page = env
        .service
        .search_requests(&RequestFilter {
            page_size: Some(2),
            ..RequestFilter::default()
        })
        .await?;
    let french = env
        .service
        .search_requests(&RequestFilter {
            target_language: Some("fra".to_string()),
            ..RequestFilter::default()
        })
        .await?;

    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(french.total, 1);
    assert_eq!(french.items[0].target_language, "fr");
    Ok(())
}
