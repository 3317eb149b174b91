/*!
 * Integration tests for translator assignment
 */

use anyhow::Result;
use locflow::app_config::AssignmentPolicy;
use locflow::scheduler::AssignmentCriteria;
use locflow::workflow::{Priority, RequestStatus};
use locflow::{RequestOptions, WorkflowError};

use crate::common::{self, TestEnv};

async fn env_with_pending(count: usize) -> Result<(TestEnv, Vec<String>)> {
    let env = common::default_env().await?;
    let mut ids = Vec::new();
    for i in 0..count {
        let content_id = format!("item-{}", i);
        env.content.insert(common::content(&content_id, "Good morning", "en"));
        ids.push(env.request(&content_id, "es").await.id);
    }
    Ok((env, ids))
}

#[tokio::test]
async fn test_autoAssign_shouldRespectCapacityAndBeIdempotent() -> Result<()> {
    let (env, _) = env_with_pending(3).await?;
    env.directory.upsert(common::translator("t1", &["en", "es"], 4.8, 0, 1));
    env.directory.upsert(common::translator("t2", &["en", "es"], 4.0, 0, 1));

    let report = env.service.auto_assign(&AssignmentCriteria::default()).await?;

    assert_eq!(report.assigned_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(env.workload("t1"), 1);
    assert_eq!(env.workload("t2"), 1);

    let rerun = env.service.auto_assign(&AssignmentCriteria::default()).await?;
    assert_eq!(rerun.assigned_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_autoAssign_performancePolicy_shouldPickHighestRating() -> Result<()> {
    let (env, ids) = env_with_pending(1).await?;
    env.directory.upsert(common::translator("steady", &["en", "es"], 4.2, 0, 5));
    env.directory.upsert(common::translator("star", &["en", "es"], 4.9, 3, 5));

    let criteria = AssignmentCriteria {
        policy: Some(AssignmentPolicy::Performance),
        ..AssignmentCriteria::default()
    };
    let report = env.service.auto_assign(&criteria).await?;

    assert_eq!(report.assignments[0].translator_id, "star");
    let stored = env.service.get_request(&ids[0]).await?;
    assert_eq!(stored.status(), RequestStatus::Assigned);
    assert_eq!(stored.translator_id(), Some("star"));
    Ok(())
}

#[tokio::test]
async fn test_autoAssign_noLanguageMatch_shouldReportFailure() -> Result<()> {
    let (env, ids) = env_with_pending(1).await?;
    env.directory.upsert(common::translator("t-fr", &["en", "fr"], 5.0, 0, 5));

    let report = env.service.auto_assign(&AssignmentCriteria::default()).await?;

    assert_eq!(report.assigned_count, 0);
    assert_eq!(report.failures[0].request_id, ids[0]);
    assert_eq!(env.service.get_request(&ids[0]).await?.status(), RequestStatus::Requested);
    Ok(())
}

#[tokio::test]
async fn test_autoAssign_criteria_shouldFilterByPriorityAndLimit() -> Result<()> {
    let env = common::default_env().await?;
    env.directory.upsert(common::translator("t1", &["en", "es", "fr"], 4.5, 0, 10));
    let urgent = env
        .service
        .request_translation(
            "greeting",
            &["fr".to_string()],
            RequestOptions {
                priority: Priority::Urgent,
                ..RequestOptions::default()
            },
            &common::manager(),
        )
        .await?
        .remove(0);
    env.request("greeting", "es").await;

    let criteria = AssignmentCriteria {
        min_priority: Some(Priority::High),
        limit: Some(5),
        ..AssignmentCriteria::default()
    };
    let report = env.service.auto_assign(&criteria).await?;

    assert_eq!(report.assigned_count, 1);
    assert_eq!(report.assignments[0].request_id, urgent.id);
    Ok(())
}

#[tokio::test]
async fn test_assign_unknownTranslator_shouldBeNotFound() -> Result<()> {
    let (env, ids) = env_with_pending(1).await?;

    let err = env.service.assign(&ids[0], "ghost", &common::manager()).await.unwrap_err();

    assert!(matches!(err, WorkflowError::NotFound { kind: "translator", .. }));
    Ok(())
}

#[tokio::test]
async fn test_assign_translatorAtCapacity_shouldFailWithoutChanges() -> Result<()> {
    let (env, ids) = env_with_pending(1).await?;
    env.directory.upsert(common::translator("busy", &["en", "es"], 4.5, 2, 2));

    let err = env.service.assign(&ids[0], "busy", &common::manager()).await.unwrap_err();

    assert!(matches!(err, WorkflowError::ValidationFailure(_)));
    assert_eq!(env.workload("busy"), 2);
    assert_eq!(env.service.get_request(&ids[0]).await?.status(), RequestStatus::Requested);
    Ok(())
}

#[tokio::test]
async fn test_assign_wrongLanguages_shouldReleaseReservation() -> Result<()> {
    let (env, ids) = env_with_pending(1).await?;
    env.directory.upsert(common::translator("t-de", &["en", "de"], 4.5, 0, 2));

    let err = env.service.assign(&ids[0], "t-de", &common::manager()).await.unwrap_err();

    assert!(matches!(err, WorkflowError::ValidationFailure(_)));
    assert_eq!(env.workload("t-de"), 0);
    Ok(())
}
