//! End-to-end engine tests driven by the deterministic mock account

use async_trait::async_trait;
use chrono::{Duration, Utc};
use finops_cloud::{ClientFactory, CloudError, MockFactory, WorkspaceCloud};
use finops_core::analyzers::round2;
use finops_core::model::{
    JobStatus, RecommendationStatus, ResourceRecord, Workspace, WorkspaceStatus, STATE_NOT_FOUND,
};
use finops_core::pricing::BYTES_PER_GB;
use finops_db::{DbPool, JobRunRepo, RecommendationRepo, ResourceRepo, WorkspaceRepo};
use finops_engine::{JobRunner, Scheduler};
use std::sync::Arc;

const SEED: u64 = 42;

async fn seeded_workspace(pool: &DbPool) -> Workspace {
    let workspace = Workspace {
        id: uuid::Uuid::new_v4().to_string(),
        name: "acme-prod".to_string(),
        role_arn: "arn:aws:iam::123456789012:role/finops-readonly".to_string(),
        aws_account_id: "123456789012".to_string(),
        status: WorkspaceStatus::Pending,
        user_id: "user-1".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    WorkspaceRepo::new(pool.clone())
        .insert(&workspace)
        .await
        .unwrap();
    workspace
}

fn mock_runner(pool: &DbPool) -> JobRunner {
    JobRunner::new(pool.clone(), Arc::new(MockFactory::new(SEED)))
}

#[tokio::test]
async fn test_mock_run_produces_core_recommendation_types() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    let runner = mock_runner(&pool);

    runner.process_workspace(&workspace.id).await.unwrap();

    let recommendations = RecommendationRepo::new(pool.clone())
        .list_for_workspace(&workspace.id)
        .await
        .unwrap();
    for expected in ["EC2_DOWN_SIZE", "EBS_ORPHAN", "S3_LIFECYCLE", "RDS_DOWN_SIZE"] {
        assert!(
            recommendations
                .iter()
                .any(|r| r.rec_type.as_str() == expected),
            "missing {expected}"
        );
    }

    let run = JobRunRepo::new(pool.clone())
        .latest(&workspace.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, JobStatus::Completed);
    assert_eq!(run.recommendations_found, recommendations.len() as i64);
    assert!(run.completed_at.unwrap() >= run.started_at);

    let workspace = WorkspaceRepo::new(pool)
        .get(&workspace.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(workspace.status, WorkspaceStatus::Connected);
}

#[tokio::test]
async fn test_t3_medium_monthly_cost() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    mock_runner(&pool)
        .process_workspace(&workspace.id)
        .await
        .unwrap();

    let resource = ResourceRepo::new(pool)
        .get(&workspace.id, "i-0a1b2c3d4e5f00004")
        .await
        .unwrap()
        .unwrap();
    let cost = resource.estimated_monthly_cost.unwrap();
    assert!((cost - 30.368).abs() < 1e-6, "got {cost}");
}

#[tokio::test]
async fn test_gp3_volume_monthly_cost() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    mock_runner(&pool)
        .process_workspace(&workspace.id)
        .await
        .unwrap();

    let resource = ResourceRepo::new(pool)
        .get(&workspace.id, "vol-0a1b2c3d4e5f00001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resource.estimated_monthly_cost, Some(8.0));
}

#[tokio::test]
async fn test_gp2_orphan_recommendation() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    mock_runner(&pool)
        .process_workspace(&workspace.id)
        .await
        .unwrap();

    let orphan = RecommendationRepo::new(pool)
        .get_by_key(&workspace.id, "vol-0a1b2c3d4e5f00002", "EBS_ORPHAN")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphan.estimated_monthly_savings, 50.0);
    assert_eq!(orphan.confidence.as_str(), "high");
}

#[tokio::test]
async fn test_s3_lifecycle_savings_formula() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    mock_runner(&pool)
        .process_workspace(&workspace.id)
        .await
        .unwrap();

    let lifecycle = RecommendationRepo::new(pool)
        .get_by_key(&workspace.id, "company-logs-archive", "S3_LIFECYCLE")
        .await
        .unwrap()
        .unwrap();
    let expected = round2((1.2e12 / BYTES_PER_GB) * (0.023 - 0.004) * 0.6);
    assert_eq!(lifecycle.estimated_monthly_savings, expected);
}

#[tokio::test]
async fn test_dismissed_recommendation_survives_rerun() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    let runner = mock_runner(&pool);
    let recommendations = RecommendationRepo::new(pool.clone());

    runner.process_workspace(&workspace.id).await.unwrap();
    let first = recommendations
        .get_by_key(&workspace.id, "vol-0a1b2c3d4e5f00002", "EBS_ORPHAN")
        .await
        .unwrap()
        .unwrap();
    recommendations
        .set_status(&first.id, "dismissed")
        .await
        .unwrap();

    runner.process_workspace(&workspace.id).await.unwrap();
    let second = recommendations
        .get_by_key(&workspace.id, "vol-0a1b2c3d4e5f00002", "EBS_ORPHAN")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, RecommendationStatus::Dismissed);
    assert!(second.updated_at >= first.updated_at);
    assert!(second.description.contains("unattached"));
}

#[tokio::test]
async fn test_unobserved_resource_is_soft_deleted() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    let resources = ResourceRepo::new(pool.clone());

    // A resource last seen two hours ago, gone from the current account
    resources
        .upsert(
            &workspace.id,
            &ResourceRecord::new("i-gone", "EC2").with_state("running"),
            Utc::now() - Duration::hours(2),
        )
        .await
        .unwrap();

    mock_runner(&pool)
        .process_workspace(&workspace.id)
        .await
        .unwrap();

    let stale = resources
        .get(&workspace.id, "i-gone")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stale.state.as_deref(), Some(STATE_NOT_FOUND));

    // Observed resources keep their real state
    let fresh = resources
        .get(&workspace.id, "i-0a1b2c3d4e5f00001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.state.as_deref(), Some("running"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    let runner = mock_runner(&pool);

    runner.process_workspace(&workspace.id).await.unwrap();
    let resources = ResourceRepo::new(pool.clone());
    let recommendations = RecommendationRepo::new(pool.clone());

    let shape = |resources: &[finops_core::model::Resource]| {
        resources
            .iter()
            .map(|r| {
                (
                    r.resource_id.clone(),
                    r.service.clone(),
                    r.state.clone(),
                    r.estimated_monthly_cost.map(|c| (c * 100.0).round() as i64),
                )
            })
            .collect::<Vec<_>>()
    };
    let rec_shape = |recs: &[finops_core::model::Recommendation]| {
        recs.iter()
            .map(|r| {
                (
                    r.rec_type,
                    r.resource_id.clone(),
                    (r.estimated_monthly_savings * 100.0).round() as i64,
                    r.confidence,
                    r.status,
                )
            })
            .collect::<Vec<_>>()
    };

    let resources_first = shape(&resources.list_for_workspace(&workspace.id).await.unwrap());
    let recs_first = rec_shape(
        &recommendations
            .list_for_workspace(&workspace.id)
            .await
            .unwrap(),
    );

    runner.process_workspace(&workspace.id).await.unwrap();

    let resources_second = shape(&resources.list_for_workspace(&workspace.id).await.unwrap());
    let recs_second = rec_shape(
        &recommendations
            .list_for_workspace(&workspace.id)
            .await
            .unwrap(),
    );

    assert_eq!(resources_first, resources_second);
    assert_eq!(recs_first, recs_second);
}

#[tokio::test]
async fn test_missing_workspace_writes_no_job_run() {
    let pool = DbPool::in_memory().await.unwrap();
    let runner = mock_runner(&pool);

    runner.process_workspace("no-such-workspace").await.unwrap();

    let latest = JobRunRepo::new(pool)
        .latest("no-such-workspace")
        .await
        .unwrap();
    assert!(latest.is_none());
}

struct FailingFactory;

#[async_trait]
impl ClientFactory for FailingFactory {
    async fn connect(&self, workspace: &Workspace) -> Result<WorkspaceCloud, CloudError> {
        Err(CloudError::AssumeRole {
            role_arn: workspace.role_arn.clone(),
            message: "AccessDenied: not authorized to perform sts:AssumeRole".to_string(),
        })
    }
}

#[tokio::test]
async fn test_credential_failure_fails_the_job() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    let runner = JobRunner::new(pool.clone(), Arc::new(FailingFactory));

    runner.process_workspace(&workspace.id).await.unwrap();

    let run = JobRunRepo::new(pool.clone())
        .latest(&workspace.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, JobStatus::Failed);
    let message = run.error_message.unwrap();
    assert!(message.contains("AccessDenied"), "got '{message}'");
    assert!(run.completed_at.is_some());

    // Failed jobs leave the workspace status alone
    let workspace = WorkspaceRepo::new(pool)
        .get(&workspace.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(workspace.status, WorkspaceStatus::Pending);
}

#[tokio::test]
async fn test_overlapping_ticks_run_exactly_once() {
    let pool = DbPool::in_memory().await.unwrap();
    let workspace = seeded_workspace(&pool).await;
    let runner = Arc::new(mock_runner(&pool));
    let scheduler = Scheduler::new(pool.clone(), runner, "*/1 * * * *").unwrap();

    let (first, second) = tokio::join!(scheduler.tick(), scheduler.tick());
    assert!(first ^ second, "exactly one tick should proceed");

    // The skipped tick touched nothing: a single completed run exists
    let run = JobRunRepo::new(pool.clone())
        .latest(&workspace.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, JobStatus::Completed);

    let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_runs")
        .fetch_one(pool.inner())
        .await
        .unwrap();
    assert_eq!(runs, 1);
}
