//! Repository layer
//!
//! One repository per aggregate. The two upserts are the engine's
//! idempotency anchors: resources are keyed (workspace_id, resource_id),
//! recommendations (workspace_id, resource_id, type), and a
//! recommendation's `status` column is never written by an update.

use crate::error::Result;
use crate::models::{JobRunRow, RecommendationRow, ResourceRow, WorkspaceRow};
use crate::pool::DbPool;
use chrono::{DateTime, Utc};
use finops_core::model::{
    JobRun, Recommendation, RecommendationDraft, Resource, ResourceRecord, Workspace,
    WorkspaceStatus, STATE_NOT_FOUND,
};
use uuid::Uuid;

fn json_text(value: &serde_json::Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Workspace repository
pub struct WorkspaceRepo {
    pool: DbPool,
}

impl WorkspaceRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a workspace
    pub async fn insert(&self, workspace: &Workspace) -> Result<()> {
        sqlx::query(
            "INSERT INTO workspaces (id, name, role_arn, aws_account_id, status, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.role_arn)
        .bind(&workspace.aws_account_id)
        .bind(workspace.status.as_str())
        .bind(&workspace.user_id)
        .bind(workspace.created_at)
        .bind(workspace.updated_at)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Get a workspace by id
    pub async fn get(&self, id: &str) -> Result<Option<Workspace>> {
        let row = sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(WorkspaceRow::into_workspace).transpose()
    }

    /// List every workspace, oldest first
    pub async fn list_all(&self) -> Result<Vec<Workspace>> {
        let rows = sqlx::query_as::<_, WorkspaceRow>(
            "SELECT * FROM workspaces ORDER BY created_at ASC",
        )
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(WorkspaceRow::into_workspace).collect()
    }

    /// Update the connection status
    pub async fn update_status(&self, id: &str, status: WorkspaceStatus) -> Result<()> {
        sqlx::query("UPDATE workspaces SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.inner())
            .await?;
        Ok(())
    }
}

/// Resource repository
pub struct ResourceRepo {
    pool: DbPool,
}

impl ResourceRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed on (workspace_id, resource_id)
    ///
    /// Inserts set every field with `last_seen_at = now`. Updates refresh
    /// the descriptive fields and `last_seen_at`, preserve `created_at`,
    /// and keep the stored cost when the record carries none.
    pub async fn upsert(
        &self,
        workspace_id: &str,
        record: &ResourceRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tags = if record.tags.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.tags).unwrap_or_default())
        };

        sqlx::query(
            "INSERT INTO resources (id, workspace_id, resource_id, arn, service, resource_type,
                                    name, tags, metadata, state, last_seen_at,
                                    estimated_monthly_cost, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (workspace_id, resource_id) DO UPDATE SET
                 arn = excluded.arn,
                 service = excluded.service,
                 resource_type = excluded.resource_type,
                 name = excluded.name,
                 tags = excluded.tags,
                 metadata = excluded.metadata,
                 state = excluded.state,
                 last_seen_at = excluded.last_seen_at,
                 estimated_monthly_cost =
                     COALESCE(excluded.estimated_monthly_cost, resources.estimated_monthly_cost),
                 updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(workspace_id)
        .bind(&record.resource_id)
        .bind(&record.arn)
        .bind(&record.service)
        .bind(&record.resource_type)
        .bind(&record.name)
        .bind(tags)
        .bind(json_text(&record.metadata))
        .bind(&record.state)
        .bind(now)
        .bind(record.estimated_monthly_cost)
        .bind(now)
        .bind(now)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Analysis-path upsert: refreshes cost, state and observation time
    ///
    /// The inventory collectors own the descriptive fields (tags, metadata,
    /// name); this narrower write lets the analysis path land its computed
    /// cost and fresher state without clobbering them. Missing rows are
    /// inserted with whatever the record carries.
    pub async fn upsert_observation(
        &self,
        workspace_id: &str,
        record: &ResourceRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tags = if record.tags.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.tags).unwrap_or_default())
        };

        sqlx::query(
            "INSERT INTO resources (id, workspace_id, resource_id, arn, service, resource_type,
                                    name, tags, metadata, state, last_seen_at,
                                    estimated_monthly_cost, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (workspace_id, resource_id) DO UPDATE SET
                 state = COALESCE(excluded.state, resources.state),
                 estimated_monthly_cost =
                     COALESCE(excluded.estimated_monthly_cost, resources.estimated_monthly_cost),
                 last_seen_at = excluded.last_seen_at,
                 updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(workspace_id)
        .bind(&record.resource_id)
        .bind(&record.arn)
        .bind(&record.service)
        .bind(&record.resource_type)
        .bind(&record.name)
        .bind(tags)
        .bind(json_text(&record.metadata))
        .bind(&record.state)
        .bind(now)
        .bind(record.estimated_monthly_cost)
        .bind(now)
        .bind(now)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Soft-delete every resource not seen since the cutoff
    ///
    /// Rows stay queryable; only `state` flips to `not-found`. Returns the
    /// number of rows swept.
    pub async fn mark_stale(&self, workspace_id: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE resources SET state = ?, updated_at = ?
             WHERE workspace_id = ? AND last_seen_at < ? AND state != ?",
        )
        .bind(STATE_NOT_FOUND)
        .bind(Utc::now())
        .bind(workspace_id)
        .bind(cutoff)
        .bind(STATE_NOT_FOUND)
        .execute(self.pool.inner())
        .await?;
        Ok(result.rows_affected())
    }

    /// Get one resource by its provider-native id
    pub async fn get(&self, workspace_id: &str, resource_id: &str) -> Result<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(
            "SELECT * FROM resources WHERE workspace_id = ? AND resource_id = ?",
        )
        .bind(workspace_id)
        .bind(resource_id)
        .fetch_optional(self.pool.inner())
        .await?;
        row.map(ResourceRow::into_resource).transpose()
    }

    /// List a workspace's resources, stable order
    pub async fn list_for_workspace(&self, workspace_id: &str) -> Result<Vec<Resource>> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            "SELECT * FROM resources WHERE workspace_id = ? ORDER BY service, resource_id",
        )
        .bind(workspace_id)
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(ResourceRow::into_resource).collect()
    }
}

/// Recommendation repository
pub struct RecommendationRepo {
    pool: DbPool,
}

impl RecommendationRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed on (workspace_id, resource_id, type)
    ///
    /// Inserts start at status `new`. Updates refresh description, savings,
    /// confidence and metadata; `status` belongs to the user and is never
    /// written here.
    pub async fn upsert(&self, workspace_id: &str, draft: &RecommendationDraft) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO recommendations (id, workspace_id, type, resource_id, description,
                                          estimated_monthly_savings, confidence, status,
                                          metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'new', ?, ?, ?)
             ON CONFLICT (workspace_id, resource_id, type) DO UPDATE SET
                 description = excluded.description,
                 estimated_monthly_savings = excluded.estimated_monthly_savings,
                 confidence = excluded.confidence,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(workspace_id)
        .bind(draft.rec_type.as_str())
        .bind(&draft.resource_id)
        .bind(&draft.description)
        .bind(draft.estimated_monthly_savings)
        .bind(draft.confidence.as_str())
        .bind(json_text(&draft.metadata))
        .bind(now)
        .bind(now)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Set the user-facing status
    pub async fn set_status(&self, id: &str, status: &str) -> Result<()> {
        sqlx::query("UPDATE recommendations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.inner())
            .await?;
        Ok(())
    }

    /// List a workspace's recommendations, largest savings first
    pub async fn list_for_workspace(&self, workspace_id: &str) -> Result<Vec<Recommendation>> {
        let rows = sqlx::query_as::<_, RecommendationRow>(
            "SELECT * FROM recommendations WHERE workspace_id = ?
             ORDER BY estimated_monthly_savings DESC, resource_id",
        )
        .bind(workspace_id)
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter()
            .map(RecommendationRow::into_recommendation)
            .collect()
    }

    /// Get one recommendation by its dedup key
    pub async fn get_by_key(
        &self,
        workspace_id: &str,
        resource_id: &str,
        rec_type: &str,
    ) -> Result<Option<Recommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(
            "SELECT * FROM recommendations WHERE workspace_id = ? AND resource_id = ? AND type = ?",
        )
        .bind(workspace_id)
        .bind(resource_id)
        .bind(rec_type)
        .fetch_optional(self.pool.inner())
        .await?;
        row.map(RecommendationRow::into_recommendation).transpose()
    }
}

/// Job run repository
pub struct JobRunRepo {
    pool: DbPool,
}

impl JobRunRepo {
    /// Create a new repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a run in status `running`, returning its id
    pub async fn start(&self, workspace_id: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO job_runs (id, workspace_id, status, recommendations_found, started_at)
             VALUES (?, ?, 'running', 0, ?)",
        )
        .bind(&id)
        .bind(workspace_id)
        .bind(Utc::now())
        .execute(self.pool.inner())
        .await?;
        Ok(id)
    }

    /// Close a run as completed
    pub async fn complete(&self, id: &str, recommendations_found: i64) -> Result<()> {
        sqlx::query(
            "UPDATE job_runs SET status = 'completed', recommendations_found = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(recommendations_found)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Close a run as failed, carrying the error verbatim
    pub async fn fail(&self, id: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE job_runs SET status = 'failed', error_message = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    /// Get a run by id
    pub async fn get(&self, id: &str) -> Result<Option<JobRun>> {
        let row = sqlx::query_as::<_, JobRunRow>("SELECT * FROM job_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(JobRunRow::into_job_run).transpose()
    }

    /// The most recent run for a workspace
    pub async fn latest(&self, workspace_id: &str) -> Result<Option<JobRun>> {
        let row = sqlx::query_as::<_, JobRunRow>(
            "SELECT * FROM job_runs WHERE workspace_id = ? ORDER BY started_at DESC LIMIT 1",
        )
        .bind(workspace_id)
        .fetch_optional(self.pool.inner())
        .await?;
        row.map(JobRunRow::into_job_run).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use finops_core::model::{Confidence, RecommendationStatus, RecommendationType};
    use serde_json::json;

    async fn seeded_pool() -> (DbPool, Workspace) {
        let pool = DbPool::in_memory().await.unwrap();
        let workspace = Workspace {
            id: "ws-1".to_string(),
            name: "acme-prod".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/finops".to_string(),
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
        (pool, workspace)
    }

    fn ec2_record(cost: Option<f64>) -> ResourceRecord {
        let mut record = ResourceRecord::new("i-123", "EC2")
            .with_type("t3.medium")
            .with_name("api-server")
            .with_state("running")
            .with_metadata(json!({ "availability_zone": "us-east-1a" }));
        if let Some(cost) = cost {
            record = record.with_cost(cost);
        }
        record
    }

    #[tokio::test]
    async fn test_resource_upsert_is_idempotent() {
        let (pool, workspace) = seeded_pool().await;
        let repo = ResourceRepo::new(pool);
        let now = Utc::now();

        repo.upsert(&workspace.id, &ec2_record(Some(30.37)), now)
            .await
            .unwrap();
        let first = repo.get(&workspace.id, "i-123").await.unwrap().unwrap();

        let later = now + Duration::minutes(5);
        repo.upsert(&workspace.id, &ec2_record(Some(30.37)), later)
            .await
            .unwrap();
        let second = repo.get(&workspace.id, "i-123").await.unwrap().unwrap();

        // Same row, refreshed observation
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_seen_at > first.last_seen_at);

        let all = repo.list_for_workspace(&workspace.id).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_resource_upsert_keeps_cost_when_absent() {
        let (pool, workspace) = seeded_pool().await;
        let repo = ResourceRepo::new(pool);
        let now = Utc::now();

        repo.upsert(&workspace.id, &ec2_record(Some(30.37)), now)
            .await
            .unwrap();
        repo.upsert(&workspace.id, &ec2_record(None), now)
            .await
            .unwrap();

        let resource = repo.get(&workspace.id, "i-123").await.unwrap().unwrap();
        assert_eq!(resource.estimated_monthly_cost, Some(30.37));

        repo.upsert(&workspace.id, &ec2_record(Some(31.0)), now)
            .await
            .unwrap();
        let resource = repo.get(&workspace.id, "i-123").await.unwrap().unwrap();
        assert_eq!(resource.estimated_monthly_cost, Some(31.0));
    }

    #[tokio::test]
    async fn test_observation_upsert_leaves_collector_fields_alone() {
        let (pool, workspace) = seeded_pool().await;
        let repo = ResourceRepo::new(pool);
        let now = Utc::now();

        // Inventory writes the rich record first
        repo.upsert(&workspace.id, &ec2_record(None), now)
            .await
            .unwrap();

        // Analysis lands cost and state only
        let observation = ResourceRecord::new("i-123", "EC2")
            .with_state("running")
            .with_cost(30.37);
        repo.upsert_observation(&workspace.id, &observation, now + Duration::minutes(1))
            .await
            .unwrap();

        let resource = repo.get(&workspace.id, "i-123").await.unwrap().unwrap();
        assert_eq!(resource.estimated_monthly_cost, Some(30.37));
        assert_eq!(resource.name.as_deref(), Some("api-server"));
        assert_eq!(
            resource.metadata["availability_zone"],
            serde_json::json!("us-east-1a")
        );
    }

    #[tokio::test]
    async fn test_stale_sweep_is_a_soft_delete() {
        let (pool, workspace) = seeded_pool().await;
        let repo = ResourceRepo::new(pool);
        let now = Utc::now();

        repo.upsert(&workspace.id, &ec2_record(None), now - Duration::hours(2))
            .await
            .unwrap();
        repo.upsert(
            &workspace.id,
            &ResourceRecord::new("vol-1", "EBS").with_state("in-use"),
            now,
        )
        .await
        .unwrap();

        let swept = repo
            .mark_stale(&workspace.id, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(swept, 1);

        let stale = repo.get(&workspace.id, "i-123").await.unwrap().unwrap();
        assert_eq!(stale.state.as_deref(), Some(STATE_NOT_FOUND));

        let fresh = repo.get(&workspace.id, "vol-1").await.unwrap().unwrap();
        assert_eq!(fresh.state.as_deref(), Some("in-use"));
    }

    fn orphan_draft(description: &str) -> RecommendationDraft {
        RecommendationDraft {
            rec_type: RecommendationType::EbsOrphan,
            resource_id: "vol-9".to_string(),
            description: description.to_string(),
            estimated_monthly_savings: 50.0,
            confidence: Confidence::High,
            metadata: json!({ "size_gib": 500 }),
        }
    }

    #[tokio::test]
    async fn test_recommendation_upsert_preserves_status() {
        let (pool, workspace) = seeded_pool().await;
        let repo = RecommendationRepo::new(pool);

        repo.upsert(&workspace.id, &orphan_draft("unattached for 10 days"))
            .await
            .unwrap();
        let first = repo
            .get_by_key(&workspace.id, "vol-9", "EBS_ORPHAN")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.status, RecommendationStatus::New);

        repo.set_status(&first.id, "dismissed").await.unwrap();

        repo.upsert(&workspace.id, &orphan_draft("unattached for 11 days"))
            .await
            .unwrap();
        let second = repo
            .get_by_key(&workspace.id, "vol-9", "EBS_ORPHAN")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.status, RecommendationStatus::Dismissed);
        assert_eq!(second.description, "unattached for 11 days");
    }

    #[tokio::test]
    async fn test_job_run_lifecycle() {
        let (pool, workspace) = seeded_pool().await;
        let repo = JobRunRepo::new(pool);

        let id = repo.start(&workspace.id).await.unwrap();
        let running = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(running.status, finops_core::model::JobStatus::Running);
        assert!(running.completed_at.is_none());

        repo.complete(&id, 7).await.unwrap();
        let completed = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(completed.status, finops_core::model::JobStatus::Completed);
        assert_eq!(completed.recommendations_found, 7);
        let finished = completed.completed_at.unwrap();
        assert!(completed.started_at <= finished);

        let latest = repo.latest(&workspace.id).await.unwrap().unwrap();
        assert_eq!(latest.id, id);
    }

    #[tokio::test]
    async fn test_failed_run_carries_message() {
        let (pool, workspace) = seeded_pool().await;
        let repo = JobRunRepo::new(pool);

        let id = repo.start(&workspace.id).await.unwrap();
        repo.fail(&id, "failed to assume role arn:aws:iam::1:role/x: AccessDenied")
            .await
            .unwrap();

        let failed = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(failed.status, finops_core::model::JobStatus::Failed);
        assert!(failed.error_message.unwrap().contains("AccessDenied"));
        assert!(failed.completed_at.is_some());
    }
}
