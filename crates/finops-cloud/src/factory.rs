//! Per-workspace construction of the cloud layer
//!
//! A workspace gets its own client and collector set on every job: the
//! credential cache inside them belongs to one tenant and is never shared.

use crate::client::CloudClient;
use crate::collect::{aws_collectors, Collect};
use crate::credentials::RoleCredentials;
use crate::error::Result;
use crate::live::AwsCloudClient;
use crate::mock::{mock_collectors, MockCloudClient};
use async_trait::async_trait;
use finops_core::model::Workspace;
use std::sync::Arc;

/// The cloud layer for one workspace: analysis client + inventory collectors
pub struct WorkspaceCloud {
    /// Capability set for the analysis path
    pub client: Arc<dyn CloudClient>,
    /// The sixteen inventory collectors
    pub collectors: Vec<Box<dyn Collect>>,
}

/// Builds the cloud layer for a workspace
///
/// A connect failure here means the account is unreachable (credential or
/// assume-role failure) and is fatal for the job.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build the client and collectors for one workspace
    async fn connect(&self, workspace: &Workspace) -> Result<WorkspaceCloud>;
}

/// Factory for real AWS accounts
pub struct LiveFactory {
    region: String,
}

impl LiveFactory {
    /// Create a factory targeting the given default region
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

#[async_trait]
impl ClientFactory for LiveFactory {
    async fn connect(&self, workspace: &Workspace) -> Result<WorkspaceCloud> {
        let credentials = RoleCredentials::new(&workspace.role_arn, &self.region);
        // Assume eagerly so a bad role fails the job up front
        let session = credentials.session().await?;
        Ok(WorkspaceCloud {
            client: Arc::new(AwsCloudClient::from_credentials(credentials)),
            collectors: aws_collectors(&session),
        })
    }
}

/// Factory serving the deterministic mock account
pub struct MockFactory {
    seed: u64,
}

impl MockFactory {
    /// Create a factory with a fixed seed
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn connect(&self, _workspace: &Workspace) -> Result<WorkspaceCloud> {
        Ok(WorkspaceCloud {
            client: Arc::new(MockCloudClient::new(self.seed)),
            collectors: mock_collectors(self.seed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use finops_core::model::WorkspaceStatus;

    fn workspace() -> Workspace {
        Workspace {
            id: "ws-1".to_string(),
            name: "test".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/finops".to_string(),
            aws_account_id: "123456789012".to_string(),
            status: WorkspaceStatus::Pending,
            user_id: "user-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mock_factory_connects() {
        let factory = MockFactory::new(42);
        let cloud = factory.connect(&workspace()).await.unwrap();
        assert_eq!(cloud.collectors.len(), 16);
        assert!(cloud.client.test_connection().await.is_ok());
    }
}
