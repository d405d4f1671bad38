//! Database row models
//!
//! Thin `sqlx::FromRow` structs mirroring the schema, with conversions
//! into the domain types. JSON columns (tags, metadata) are TEXT.

use crate::error::{DbError, Result};
use chrono::{DateTime, Utc};
use finops_core::model::{JobRun, Recommendation, Resource, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Database row for the workspaces table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkspaceRow {
    /// Row id
    pub id: String,
    /// Display name
    pub name: String,
    /// Cross-account role
    pub role_arn: String,
    /// Target account
    pub aws_account_id: String,
    /// Connection status
    pub status: String,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceRow {
    /// Convert into the domain type
    pub fn into_workspace(self) -> Result<Workspace> {
        Ok(Workspace {
            status: self
                .status
                .parse()
                .map_err(|_| DbError::decode(format!("workspace status '{}'", self.status)))?,
            id: self.id,
            name: self.name,
            role_arn: self.role_arn,
            aws_account_id: self.aws_account_id,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for the resources table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceRow {
    /// Row id
    pub id: String,
    /// Owning workspace
    pub workspace_id: String,
    /// Provider-native id
    pub resource_id: String,
    /// ARN when known
    pub arn: Option<String>,
    /// Service tag
    pub service: String,
    /// Type descriptor
    pub resource_type: Option<String>,
    /// Human name
    pub name: Option<String>,
    /// Provider tags, JSON text
    pub tags: Option<String>,
    /// Free-form detail, JSON text
    pub metadata: Option<String>,
    /// Provider state string
    pub state: Option<String>,
    /// Last successful observation
    pub last_seen_at: DateTime<Utc>,
    /// Heuristic monthly cost estimate
    pub estimated_monthly_cost: Option<f64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceRow {
    /// Convert into the domain type
    pub fn into_resource(self) -> Result<Resource> {
        let tags: BTreeMap<String, String> = match &self.tags {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| DbError::decode(format!("resource tags: {e}")))?,
            None => BTreeMap::new(),
        };
        let metadata = match &self.metadata {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| DbError::decode(format!("resource metadata: {e}")))?,
            None => serde_json::Value::Null,
        };
        Ok(Resource {
            id: self.id,
            workspace_id: self.workspace_id,
            resource_id: self.resource_id,
            arn: self.arn,
            service: self.service,
            resource_type: self.resource_type,
            name: self.name,
            tags,
            state: self.state,
            estimated_monthly_cost: self.estimated_monthly_cost,
            metadata,
            last_seen_at: self.last_seen_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for the recommendations table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecommendationRow {
    /// Row id
    pub id: String,
    /// Owning workspace
    pub workspace_id: String,
    /// Category code
    #[sqlx(rename = "type")]
    pub rec_type: String,
    /// Offending resource
    pub resource_id: String,
    /// Human-readable finding
    pub description: String,
    /// Estimated monthly savings in USD
    pub estimated_monthly_savings: f64,
    /// Qualitative certainty
    pub confidence: String,
    /// User-facing lifecycle
    pub status: String,
    /// Free-form detail, JSON text
    pub metadata: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last refresh timestamp
    pub updated_at: DateTime<Utc>,
}

impl RecommendationRow {
    /// Convert into the domain type
    pub fn into_recommendation(self) -> Result<Recommendation> {
        let metadata = match &self.metadata {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| DbError::decode(format!("recommendation metadata: {e}")))?,
            None => serde_json::Value::Null,
        };
        Ok(Recommendation {
            rec_type: self
                .rec_type
                .parse()
                .map_err(|_| DbError::decode(format!("recommendation type '{}'", self.rec_type)))?,
            confidence: self
                .confidence
                .parse()
                .map_err(|_| DbError::decode(format!("confidence '{}'", self.confidence)))?,
            status: self
                .status
                .parse()
                .map_err(|_| DbError::decode(format!("recommendation status '{}'", self.status)))?,
            id: self.id,
            workspace_id: self.workspace_id,
            resource_id: self.resource_id,
            description: self.description,
            estimated_monthly_savings: self.estimated_monthly_savings,
            metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for the job_runs table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRunRow {
    /// Row id
    pub id: String,
    /// Owning workspace
    pub workspace_id: String,
    /// Lifecycle status
    pub status: String,
    /// Recommendation upserts performed
    pub recommendations_found: i64,
    /// Fatal error message
    pub error_message: Option<String>,
    /// When the run was opened
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRunRow {
    /// Convert into the domain type
    pub fn into_job_run(self) -> Result<JobRun> {
        Ok(JobRun {
            status: self
                .status
                .parse()
                .map_err(|_| DbError::decode(format!("job status '{}'", self.status)))?,
            id: self.id,
            workspace_id: self.workspace_id,
            recommendations_found: self.recommendations_found,
            error_message: self.error_message,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}
