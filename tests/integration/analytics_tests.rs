/*!
 * Integration tests for workflow analytics
 */

use anyhow::Result;
use chrono::{Duration, Utc};
use locflow::workflow::RequestStatus;
use locflow::{DateRange, ReviewDecision, WorkflowError};

use crate::common;

#[tokio::test]
async fn test_getAnalytics_emptyWindow_shouldReportZeros() -> Result<()> {
    let env = common::default_env().await?;

    let report = env.service.get_analytics(DateRange::last_days(7, Utc::now())).await?;

    assert_eq!(report.total_requests, 0);
    assert_eq!(report.completion_rate, 0.0);
    assert!(report.average_quality.is_none());
    assert!(report.bottlenecks.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_getAnalytics_mixedRequests_shouldSummarize() -> Result<()> {
    let env = common::default_env().await?;
    env.directory.upsert(common::translator("t1", &["en", "es", "fr"], 4.5, 0, 5));
    let done = env.request("greeting", "es").await;
    env.request("greeting", "fr").await;

    env.service.assign(&done.id, "t1", &common::manager()).await?;
    env.service
        .submit(&done.id, "Buenos días", &common::translator_actor("t1"))
        .await?;
    env.service
        .review(&done.id, ReviewDecision::Approve, Some(88.0), None, &common::reviewer("r1"))
        .await?;

    let report = env.service.get_analytics(DateRange::last_days(1, Utc::now() + Duration::minutes(1))).await?;

    assert_eq!(report.total_requests, 2);
    assert_eq!(report.completed_requests, 1);
    assert_eq!(report.completion_rate, 0.5);
    assert_eq!(report.average_quality, Some(88.0));
    assert_eq!(report.by_language.len(), 2);
    assert_eq!(report.by_translator.len(), 1);
    assert_eq!(report.by_translator[0].translator_id, "t1");
    assert_eq!(report.quality_trend.len(), 1);
    assert!(report.bottlenecks.iter().any(|stage| stage.status == RequestStatus::Requested));
    Ok(())
}

#[tokio::test]
async fn test_getAnalytics_requestsOutsideWindow_shouldBeExcluded() -> Result<()> {
    let env = common::default_env().await?;
    env.request("greeting", "es").await;
    let past = Utc::now() - Duration::days(30);

    let report = env
        .service
        .get_analytics(DateRange::new(past, past + Duration::days(1)))
        .await?;

    assert_eq!(report.total_requests, 0);
    Ok(())
}

#[tokio::test]
async fn test_getAnalytics_invertedRange_shouldBeValidationFailure() -> Result<()> {
    let env = common::default_env().await?;
    let now = Utc::now();

    let result = env.service.get_analytics(DateRange::new(now, now - Duration::days(1))).await;

    assert!(matches!(result, Err(WorkflowError::ValidationFailure(_))));
    Ok(())
}
