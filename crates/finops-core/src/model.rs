//! Domain entities
//!
//! Workspaces, job runs, resources and recommendations as they exist in
//! the store, plus the transient shapes produced by the collection and
//! analysis stages (`ResourceRecord`, `RecommendationDraft`).

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Connection status of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    /// Created but never successfully scanned
    Pending,
    /// Last job run reached the account
    Connected,
    /// Connection test or role assumption failed
    Error,
}

impl WorkspaceStatus {
    /// Status as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkspaceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Error),
            other => Err(Error::UnknownCode(other.to_string())),
        }
    }
}

/// Tenant anchor: one AWS account reachable via a cross-account role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Opaque id
    pub id: String,
    /// Display name
    pub name: String,
    /// Role the cloud client assumes to reach the account
    pub role_arn: String,
    /// Target AWS account id
    pub aws_account_id: String,
    /// Connection status
    pub status: WorkspaceStatus,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Status of one engine attempt on one workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Started, not yet finished
    Running,
    /// Finished successfully
    Completed,
    /// Aborted with an error
    Failed,
}

impl JobStatus {
    /// Status as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::UnknownCode(other.to_string())),
        }
    }
}

/// One scheduler attempt on one workspace
///
/// Invariants: `Running` implies `completed_at` is `None`; `Completed` and
/// `Failed` imply `completed_at` is set and `started_at <= completed_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    /// Row id
    pub id: String,
    /// Workspace the run belongs to
    pub workspace_id: String,
    /// Lifecycle status
    pub status: JobStatus,
    /// Number of recommendation upserts performed by the run
    pub recommendations_found: i64,
    /// Fatal error message, set when status is `Failed`
    pub error_message: Option<String>,
    /// When the run was opened
    pub started_at: DateTime<Utc>,
    /// When the run finished, either way
    pub completed_at: Option<DateTime<Utc>>,
}

/// State written by the soft-delete sweep for resources no longer observed
pub const STATE_NOT_FOUND: &str = "not-found";

/// A cloud object observed in a workspace, as persisted
///
/// Identity is (workspace_id, resource_id). `last_seen_at` moves forward on
/// every successful observation; rows that stop being observed are
/// re-labelled [`STATE_NOT_FOUND`] rather than deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Row id
    pub id: String,
    /// Owning workspace
    pub workspace_id: String,
    /// Provider-native id (instance id, volume id, bucket name, ...)
    pub resource_id: String,
    /// ARN when the provider exposes one
    pub arn: Option<String>,
    /// Service tag (EC2, EBS, S3, RDS, Lambda, ELB, VPC, ...)
    pub service: String,
    /// Type descriptor within the service
    pub resource_type: Option<String>,
    /// Human name
    pub name: Option<String>,
    /// Provider tags
    pub tags: BTreeMap<String, String>,
    /// Provider state string
    pub state: Option<String>,
    /// Heuristic monthly cost estimate in USD
    pub estimated_monthly_cost: Option<f64>,
    /// Free-form per-service detail
    pub metadata: serde_json::Value,
    /// Last successful observation
    pub last_seen_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// A resource as emitted by one inventory collector, before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Provider-native id
    pub resource_id: String,
    /// ARN when available
    pub arn: Option<String>,
    /// Service tag
    pub service: String,
    /// Type descriptor within the service
    pub resource_type: Option<String>,
    /// Human name
    pub name: Option<String>,
    /// Provider tags
    pub tags: BTreeMap<String, String>,
    /// Provider state string
    pub state: Option<String>,
    /// Monthly cost estimate, filled by the cost model when computable
    pub estimated_monthly_cost: Option<f64>,
    /// Free-form per-service detail
    pub metadata: serde_json::Value,
}

impl ResourceRecord {
    /// Create a record with the required identity fields
    pub fn new(resource_id: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            arn: None,
            service: service.into(),
            resource_type: None,
            name: None,
            tags: BTreeMap::new(),
            state: None,
            estimated_monthly_cost: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the ARN
    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    /// Set the type descriptor
    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Set the human name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the provider state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set the provider tags
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the monthly cost estimate
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_monthly_cost = Some(cost);
        self
    }

    /// Set the metadata bag
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Category of a detected optimization opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationType {
    /// Running EC2 instance with sustained low CPU
    Ec2DownSize,
    /// EBS volume unattached for more than a week
    EbsOrphan,
    /// Standard-class S3 bucket without recent access
    S3Lifecycle,
    /// RDS instance with low CPU and few connections
    RdsDownSize,
    /// Lambda function with no invocations
    LambdaUnused,
    /// Lambda function over-provisioned on memory
    LambdaOversized,
    /// Load balancer without registered targets
    ElbNoTargets,
    /// Load balancer with targets but no traffic
    ElbNoTraffic,
    /// Elastic IP not associated with anything
    EipUnassociated,
    /// NAT gateway processing almost no data
    NatGwIdle,
}

impl RecommendationType {
    /// Type code as stored and exposed over the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec2DownSize => "EC2_DOWN_SIZE",
            Self::EbsOrphan => "EBS_ORPHAN",
            Self::S3Lifecycle => "S3_LIFECYCLE",
            Self::RdsDownSize => "RDS_DOWN_SIZE",
            Self::LambdaUnused => "LAMBDA_UNUSED",
            Self::LambdaOversized => "LAMBDA_OVERSIZED",
            Self::ElbNoTargets => "ELB_NO_TARGETS",
            Self::ElbNoTraffic => "ELB_NO_TRAFFIC",
            Self::EipUnassociated => "EIP_UNASSOCIATED",
            Self::NatGwIdle => "NAT_GW_IDLE",
        }
    }
}

impl std::fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecommendationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EC2_DOWN_SIZE" => Ok(Self::Ec2DownSize),
            "EBS_ORPHAN" => Ok(Self::EbsOrphan),
            "S3_LIFECYCLE" => Ok(Self::S3Lifecycle),
            "RDS_DOWN_SIZE" => Ok(Self::RdsDownSize),
            "LAMBDA_UNUSED" => Ok(Self::LambdaUnused),
            "LAMBDA_OVERSIZED" => Ok(Self::LambdaOversized),
            "ELB_NO_TARGETS" => Ok(Self::ElbNoTargets),
            "ELB_NO_TRAFFIC" => Ok(Self::ElbNoTraffic),
            "EIP_UNASSOCIATED" => Ok(Self::EipUnassociated),
            "NAT_GW_IDLE" => Ok(Self::NatGwIdle),
            other => Err(Error::UnknownCode(other.to_string())),
        }
    }
}

/// Qualitative certainty of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Weak signal
    Low,
    /// Clear signal with plausible counter-explanations
    Medium,
    /// Strong signal
    High,
}

impl Confidence {
    /// Level as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::UnknownCode(other.to_string())),
        }
    }
}

/// User-facing lifecycle of a recommendation
///
/// Set to `New` on first insert and owned by the user afterwards: reruns of
/// the engine refresh every descriptive field but never this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    /// Not yet looked at
    New,
    /// User accepted the finding
    Acknowledged,
    /// User rejected the finding
    Dismissed,
}

impl RecommendationStatus {
    /// Status as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Acknowledged => "acknowledged",
            Self::Dismissed => "dismissed",
        }
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "acknowledged" => Ok(Self::Acknowledged),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(Error::UnknownCode(other.to_string())),
        }
    }
}

/// A detected optimization opportunity, as persisted
///
/// Identity is (workspace_id, resource_id, type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Row id
    pub id: String,
    /// Owning workspace
    pub workspace_id: String,
    /// Category code
    pub rec_type: RecommendationType,
    /// Provider-native id of the offending resource
    pub resource_id: String,
    /// Human-readable finding, advisory only
    pub description: String,
    /// Estimated monthly savings in USD
    pub estimated_monthly_savings: f64,
    /// Qualitative certainty
    pub confidence: Confidence,
    /// User-facing lifecycle
    pub status: RecommendationStatus,
    /// Free-form per-heuristic detail
    pub metadata: serde_json::Value,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last refresh timestamp
    pub updated_at: DateTime<Utc>,
}

/// Analyzer output before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDraft {
    /// Category code
    pub rec_type: RecommendationType,
    /// Provider-native id of the offending resource
    pub resource_id: String,
    /// Human-readable finding
    pub description: String,
    /// Estimated monthly savings in USD, rounded to two decimals
    pub estimated_monthly_savings: f64,
    /// Qualitative certainty
    pub confidence: Confidence,
    /// Free-form per-heuristic detail
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            WorkspaceStatus::Pending,
            WorkspaceStatus::Connected,
            WorkspaceStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<WorkspaceStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<WorkspaceStatus>().is_err());
    }

    #[test]
    fn test_recommendation_type_codes() {
        assert_eq!(RecommendationType::Ec2DownSize.to_string(), "EC2_DOWN_SIZE");
        assert_eq!(
            "NAT_GW_IDLE".parse::<RecommendationType>().unwrap(),
            RecommendationType::NatGwIdle
        );
        assert!("EC2_UP_SIZE".parse::<RecommendationType>().is_err());
    }

    #[test]
    fn test_resource_record_builder() {
        let record = ResourceRecord::new("i-123", "EC2")
            .with_type("t3.medium")
            .with_name("api-server")
            .with_state("running")
            .with_cost(30.37);

        assert_eq!(record.resource_id, "i-123");
        assert_eq!(record.service, "EC2");
        assert_eq!(record.resource_type.as_deref(), Some("t3.medium"));
        assert_eq!(record.estimated_monthly_cost, Some(30.37));
        assert!(record.arn.is_none());
    }
}
