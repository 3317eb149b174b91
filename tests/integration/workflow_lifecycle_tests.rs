/*!
 * Integration tests for the request lifecycle
 */

use anyhow::Result;
use chrono::{Duration, Utc};
use locflow::app_config::Config;
use locflow::collaborators::RecordingPublisher;
use locflow::providers::mock::MockMtProvider;
use locflow::workflow::models::TranslationMethod;
use locflow::workflow::{CommentKind, EventType, RequestStatus};
use locflow::{RequestOptions, ReviewDecision, WorkflowError};

use crate::common::{self, TestEnv};

async fn env_with_translator() -> Result<TestEnv> {
    let env = common::default_env().await?;
    env.directory.upsert(common::translator("t1", &["en", "es"], 4.5, 0, 3));
    Ok(env)
}

#[tokio::test]
async fn test_fullLifecycle_shouldPublishAndRecordEvents() -> Result<()> {
    let env = env_with_translator().await?;
    let request = env.request("greeting", "es").await;
    let id = request.id.as_str();

    let proposal = env.service.resolve(id).await?.unwrap();
    env.service.assign(id, "t1", &common::manager()).await?;
    assert_eq!(env.workload("t1"), 1);

    env.service.start(id, &common::translator_actor("t1")).await?;
    let submitted = env.service.submit(id, &proposal.text, &common::translator_actor("t1")).await?;
    assert_eq!(submitted.status(), RequestStatus::Completed);
    assert_eq!(submitted.translation.method, Some(TranslationMethod::Ai));
    assert!(submitted.workflow.actual_hours.is_some());
    assert_eq!(env.workload("t1"), 0);

    let published = env
        .service
        .review(id, ReviewDecision::Approve, Some(90.0), None, &common::reviewer("r1"))
        .await?;

    assert_eq!(published.status(), RequestStatus::Published);
    assert_eq!(published.quality.final_score, Some(90.0));
    let deliveries = env.publisher.published();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].text, "Buenos días");
    assert_eq!(deliveries[0].metadata.reviewer_id.as_deref(), Some("r1"));

    let statuses: Vec<RequestStatus> = env
        .service
        .events_for(id)
        .await?
        .iter()
        .filter_map(|e| e.new_status())
        .collect();
    assert_eq!(
        statuses,
        vec![
            RequestStatus::Requested,
            RequestStatus::Assigned,
            RequestStatus::InProgress,
            RequestStatus::Completed,
            RequestStatus::Approved,
            RequestStatus::Published,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_requestTranslation_multipleTargets_shouldCreateOneRequestEach() -> Result<()> {
    let env = common::default_env().await?;

    let requests = env
        .service
        .request_translation(
            "greeting",
            &["es".to_string(), "fra".to_string(), "spa".to_string()],
            RequestOptions::default(),
            &common::manager(),
        )
        .await?;

    let targets: Vec<&str> = requests.iter().map(|r| r.target_language.as_str()).collect();
    assert_eq!(targets, vec!["es", "fr"]);
    assert!(requests.iter().all(|r| r.status() == RequestStatus::Requested));
    Ok(())
}

#[tokio::test]
async fn test_requestTranslation_invalidInput_shouldBeValidationFailure() -> Result<()> {
    let env = common::default_env().await?;
    let manager = common::manager();

    let same_language = env
        .service
        .request_translation("greeting", &["en".to_string()], RequestOptions::default(), &manager)
        .await;
    let bad_code = env
        .service
        .request_translation("greeting", &["zz".to_string()], RequestOptions::default(), &manager)
        .await;
    let past_deadline = env
        .service
        .request_translation(
            "greeting",
            &["es".to_string()],
            RequestOptions {
                deadline: Some(Utc::now() - Duration::hours(1)),
                ..RequestOptions::default()
            },
            &manager,
        )
        .await;
    let unknown_content = env
        .service
        .request_translation("missing", &["es".to_string()], RequestOptions::default(), &manager)
        .await;

    assert!(matches!(same_language, Err(WorkflowError::ValidationFailure(_))));
    assert!(matches!(bad_code, Err(WorkflowError::ValidationFailure(_))));
    assert!(matches!(past_deadline, Err(WorkflowError::ValidationFailure(_))));
    assert!(matches!(unknown_content, Err(WorkflowError::NotFound { kind: "content", .. })));
    Ok(())
}

#[tokio::test]
async fn test_publish_fromRequested_shouldFailAndKeepStatus() -> Result<()> {
    let env = common::default_env().await?;
    let request = env.request("greeting", "es").await;

    let err = env.service.publish(&request.id, &common::manager()).await.unwrap_err();

    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    let stored = env.service.get_request(&request.id).await?;
    assert_eq!(stored.status(), RequestStatus::Requested);
    assert_eq!(stored.version, request.version);
    assert_eq!(env.service.events_for(&request.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_getRequest_unknownId_shouldBeNotFound() -> Result<()> {
    let env = common::default_env().await?;

    let err = env.service.get_request("nope").await.unwrap_err();

    assert!(matches!(err, WorkflowError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_review_twoAssessments_shouldAverageScores() -> Result<()> {
    let env = env_with_translator().await?;
    let request = env.request("greeting", "es").await;
    env.service.assign(&request.id, "t1", &common::manager()).await?;
    env.service
        .submit(&request.id, "Buen día", &common::translator_actor("t1"))
        .await?;

    env.service
        .review(&request.id, ReviewDecision::Review, Some(90.0), None, &common::reviewer("r1"))
        .await?;
    let reviewed = env
        .service
        .review(&request.id, ReviewDecision::Reject, Some(70.0), Some("tone".to_string()), &common::reviewer("r2"))
        .await?;

    assert_eq!(reviewed.status(), RequestStatus::Rejected);
    assert_eq!(reviewed.quality.final_score, Some(80.0));
    assert!(reviewed.quality.passes_qa);
    assert_eq!(reviewed.translation.method, Some(TranslationMethod::Human));
    Ok(())
}

#[tokio::test]
async fn test_rejected_shouldAllowReassignment() -> Result<()> {
    let env = env_with_translator().await?;
    env.directory.upsert(common::translator("t2", &["en", "es"], 4.0, 0, 3));
    let request = env.request("greeting", "es").await;
    env.service.assign(&request.id, "t1", &common::manager()).await?;
    env.service.submit(&request.id, "Hola", &common::translator_actor("t1")).await?;
    env.service
        .review(&request.id, ReviewDecision::Reject, Some(40.0), None, &common::reviewer("r1"))
        .await?;

    let reassigned = env.service.assign(&request.id, "t2", &common::manager()).await?;

    assert_eq!(reassigned.status(), RequestStatus::Assigned);
    assert_eq!(reassigned.translator_id(), Some("t2"));
    assert!(reassigned.workflow.reviewer.is_none());
    Ok(())
}

#[tokio::test]
async fn test_publisherFailure_shouldStayApprovedUntilRetry() -> Result<()> {
    let provider = MockMtProvider::new(80.0);
    let env = common::build_env(Config::default(), provider, RecordingPublisher::failing()).await?;
    env.content.insert(common::content("greeting", "Good morning", "en"));
    env.directory.upsert(common::translator("t1", &["en", "es"], 4.5, 0, 3));
    let request = env.request("greeting", "es").await;
    env.service.assign(&request.id, "t1", &common::manager()).await?;
    env.service.submit(&request.id, "Buenos días", &common::translator_actor("t1")).await?;

    let approved = env
        .service
        .review(&request.id, ReviewDecision::Approve, Some(95.0), None, &common::reviewer("r1"))
        .await?;
    assert_eq!(approved.status(), RequestStatus::Approved);

    let retry = env.service.publish(&request.id, &common::manager()).await;
    assert!(matches!(retry, Err(WorkflowError::Publisher(_))));
    assert_eq!(env.service.get_request(&request.id).await?.status(), RequestStatus::Approved);
    Ok(())
}

#[tokio::test]
async fn test_publish_manualAfterApproval_shouldPublish() -> Result<()> {
    let mut config = Config::default();
    config.workflow.auto_publish = false;
    let env = common::build_env(config, MockMtProvider::new(80.0), RecordingPublisher::new()).await?;
    env.content.insert(common::content("greeting", "Good morning", "en"));
    env.directory.upsert(common::translator("t1", &["en", "es"], 4.5, 0, 3));
    let request = env.request("greeting", "es").await;
    env.service.assign(&request.id, "t1", &common::manager()).await?;
    env.service.submit(&request.id, "Buenos días", &common::translator_actor("t1")).await?;
    env.service
        .review(&request.id, ReviewDecision::Approve, None, None, &common::reviewer("r1"))
        .await?;
    assert!(env.publisher.published().is_empty());

    let published = env.service.publish(&request.id, &common::manager()).await?;

    assert_eq!(published.status(), RequestStatus::Published);
    assert_eq!(env.publisher.published().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_withdraw_assigned_shouldReleaseWorkloadAndBeTerminal() -> Result<()> {
    let env = env_with_translator().await?;
    let request = env.request("greeting", "es").await;
    env.service.assign(&request.id, "t1", &common::manager()).await?;
    assert_eq!(env.workload("t1"), 1);

    let withdrawn = env
        .service
        .withdraw(&request.id, "content retired", &common::manager())
        .await?;

    assert_eq!(withdrawn.status(), RequestStatus::Withdrawn);
    assert_eq!(env.workload("t1"), 0);
    let start = env.service.start(&request.id, &common::translator_actor("t1")).await;
    assert!(matches!(start, Err(WorkflowError::InvalidTransition { .. })));
    assert!(env.service.resolve(&request.id).await?.is_none());

    let events = env.service.events_for(&request.id).await?;
    let reason = events.iter().find(|e| e.event_type == EventType::Comment).unwrap();
    assert_eq!(reason.details["text"], "content retired");
    Ok(())
}

#[tokio::test]
async fn test_comments_queryResolution_shouldUpdateLog() -> Result<()> {
    let env = common::default_env().await?;
    let request = env.request("greeting", "es").await;

    let query_id = env
        .service
        .add_comment(&request.id, CommentKind::Query, "Formal or informal?", &common::translator_actor("t1"))
        .await?;
    let before = env.service.get_request(&request.id).await?;
    assert_eq!(before.communication.open_queries().count(), 1);

    let after = env
        .service
        .resolve_query(&request.id, &query_id, &common::manager())
        .await?;
    let missing = env
        .service
        .resolve_query(&request.id, "unknown", &common::manager())
        .await;

    assert_eq!(after.communication.open_queries().count(), 0);
    assert!(matches!(missing, Err(WorkflowError::NotFound { kind: "comment", .. })));
    Ok(())
}

#[tokio::test]
async fn test_changeDeadline_shouldRecordOldAndNewValues() -> Result<()> {
    let env = common::default_env().await?;
    let request = env.request("greeting", "es").await;
    let deadline = Utc::now() + Duration::days(3);

    let updated = env
        .service
        .change_deadline(&request.id, Some(deadline), &common::manager())
        .await?;

    assert_eq!(updated.workflow.deadline, Some(deadline));
    let events = env.service.events_for(&request.id).await?;
    let change = events.iter().find(|e| e.event_type == EventType::DeadlineChange).unwrap();
    assert!(change.details["oldDeadline"].is_null());
    assert!(!change.details["newDeadline"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_concurrentTransitions_shouldSerializePerRequest() -> Result<()> {
    let env = env_with_translator().await?;
    let request = env.request("greeting", "es").await;
    env.service.assign(&request.id, "t1", &common::manager()).await?;

    let actor = common::translator_actor("t1");
    let (first, second) = tokio::join!(
        env.service.start(&request.id, &actor),
        env.service.start(&request.id, &actor)
    );

    assert!(first.is_ok() != second.is_ok());
    let stored = env.service.get_request(&request.id).await?;
    assert_eq!(stored.status(), RequestStatus::InProgress);
    assert_eq!(stored.version, 2);
    Ok(())
}

#[tokio::test]
async fn test_withdraw_duringDrafting_shouldDiscardDraft() -> Result<()> {
    let env = common::build_env(Config::default(), MockMtProvider::slow(300), RecordingPublisher::new()).await?;
    env.content.insert(common::content("greeting", "Good morning", "en"));
    let request = env.request("greeting", "es").await;

    let service = env.service.clone();
    let id = request.id.clone();
    let drafting = tokio::spawn(async move { service.resolve(&id).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    env.service
        .withdraw(&request.id, "no longer needed", &common::manager())
        .await?;

    let outcome = drafting.await??;

    assert!(outcome.is_none());
    assert!(env.service.resolver().memory().is_empty());
    let stored = env.service.get_request(&request.id).await?;
    assert_eq!(stored.status(), RequestStatus::Withdrawn);
    assert!(stored.leverage.draft.is_none());
    Ok(())
}

#[tokio::test]
async fn test_concurrentAssign_shouldReserveOnlyWinner() -> Result<()> {
    let env = env_with_translator().await?;
    env.directory.upsert(common::translator("t2", &["en", "es"], 4.0, 0, 3));
    let request = env.request("greeting", "es").await;

    let manager = common::manager();
    let (first, second) = tokio::join!(
        env.service.assign(&request.id, "t1", &manager),
        env.service.assign(&request.id, "t2", &manager)
    );

    assert!(first.is_ok() != second.is_ok());
    assert_eq!(env.workload("t1") + env.workload("t2"), 1);
    let stored = env.service.get_request(&request.id).await?;
    assert_eq!(stored.status(), RequestStatus::Assigned);
    let winner = if first.is_ok() { "t1" } else { "t2" };
    assert_eq!(stored.translator_id(), Some(winner));
    Ok(())
}
