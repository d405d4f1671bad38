//! Cross-account role assumption
//!
//! A workspace points at a customer account through a role ARN. The first
//! cloud call assumes that role through STS and caches the short-lived
//! credential set; later calls reuse it until shortly before expiry.
//! One `RoleCredentials` belongs to one workspace; it is never shared
//! across tenants.

use crate::error::{CloudError, Result};
use aws_config::{BehaviorVersion, Region};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::{Duration as StdDuration, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// STS session name used for all engine activity
pub const SESSION_NAME: &str = "finops-dashboard";

/// Requested session lifetime in seconds
pub const SESSION_DURATION_SECS: i32 = 3600;

/// Safety margin before the hard expiry at which we re-assume
const EXPIRY_MARGIN_SECS: i64 = 120;

#[derive(Debug, Clone)]
struct CachedCredentials {
    credentials: aws_credential_types::Credentials,
    expires_at: DateTime<Utc>,
}

/// Cached assume-role credentials for one workspace
#[derive(Debug, Clone)]
pub struct RoleCredentials {
    role_arn: String,
    region: String,
    cache: Arc<RwLock<Option<CachedCredentials>>>,
}

impl RoleCredentials {
    /// Create an empty cache for the given role and region
    pub fn new(role_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            region: region.into(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// The role this cache assumes
    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    /// Build a session from the cached credentials, assuming the role first
    /// when the cache is empty or about to expire
    pub async fn session(&self) -> Result<AwsSession> {
        if let Some(cached) = self.fresh_from_cache().await {
            return Ok(AwsSession::from_credentials(&self.region, cached).await);
        }

        // Check-and-set under the write lock so concurrent callers assume
        // at most once
        let mut slot = self.cache.write().await;
        if let Some(cached) = slot.as_ref().filter(|c| Self::is_fresh(c)) {
            let credentials = cached.credentials.clone();
            drop(slot);
            return Ok(AwsSession::from_credentials(&self.region, credentials).await);
        }

        info!(role_arn = %self.role_arn, "assuming cross-account role");
        let cached = self.assume_role().await?;
        let credentials = cached.credentials.clone();
        *slot = Some(cached);
        drop(slot);

        Ok(AwsSession::from_credentials(&self.region, credentials).await)
    }

    async fn fresh_from_cache(&self) -> Option<aws_credential_types::Credentials> {
        let slot = self.cache.read().await;
        slot.as_ref()
            .filter(|c| Self::is_fresh(c))
            .map(|c| c.credentials.clone())
    }

    fn is_fresh(cached: &CachedCredentials) -> bool {
        cached.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    async fn assume_role(&self) -> Result<CachedCredentials> {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .load()
            .await;
        let sts = aws_sdk_sts::Client::new(&base);

        let response = sts
            .assume_role()
            .role_arn(&self.role_arn)
            .role_session_name(SESSION_NAME)
            .duration_seconds(SESSION_DURATION_SECS)
            .send()
            .await
            .map_err(|e| CloudError::AssumeRole {
                role_arn: self.role_arn.clone(),
                message: flatten(e),
            })?;

        let sts_creds = response.credentials().ok_or_else(|| CloudError::AssumeRole {
            role_arn: self.role_arn.clone(),
            message: "AssumeRole returned no credentials".to_string(),
        })?;

        let expiry_secs = sts_creds.expiration().secs();
        let expires_at = DateTime::<Utc>::from_timestamp(expiry_secs, 0)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(SESSION_DURATION_SECS as i64));

        let credentials = aws_credential_types::Credentials::new(
            sts_creds.access_key_id(),
            sts_creds.secret_access_key(),
            Some(sts_creds.session_token().to_string()),
            Some(UNIX_EPOCH + StdDuration::from_secs(expiry_secs.max(0) as u64)),
            "finops-assume-role",
        );

        debug!(role_arn = %self.role_arn, %expires_at, "assume-role credentials cached");
        Ok(CachedCredentials {
            credentials,
            expires_at,
        })
    }
}

fn flatten<E: std::error::Error>(err: E) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A resolved SDK configuration for one workspace account
///
/// Service clients are cheap to construct from the shared config; each
/// collector grabs the one it needs.
#[derive(Debug, Clone)]
pub struct AwsSession {
    config: aws_config::SdkConfig,
}

impl AwsSession {
    /// Build a session from assumed-role credentials
    pub async fn from_credentials(
        region: &str,
        credentials: aws_credential_types::Credentials,
    ) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;
        Self { config }
    }

    /// EC2 client (also covers EBS, VPC and Elastic IPs)
    pub fn ec2(&self) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(&self.config)
    }

    /// CloudWatch client
    pub fn cloudwatch(&self) -> aws_sdk_cloudwatch::Client {
        aws_sdk_cloudwatch::Client::new(&self.config)
    }

    /// S3 client
    pub fn s3(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(&self.config)
    }

    /// RDS client
    pub fn rds(&self) -> aws_sdk_rds::Client {
        aws_sdk_rds::Client::new(&self.config)
    }

    /// Lambda client
    pub fn lambda(&self) -> aws_sdk_lambda::Client {
        aws_sdk_lambda::Client::new(&self.config)
    }

    /// ELBv2 client
    pub fn elbv2(&self) -> aws_sdk_elasticloadbalancingv2::Client {
        aws_sdk_elasticloadbalancingv2::Client::new(&self.config)
    }

    /// CloudFront client
    pub fn cloudfront(&self) -> aws_sdk_cloudfront::Client {
        aws_sdk_cloudfront::Client::new(&self.config)
    }

    /// Auto Scaling client
    pub fn autoscaling(&self) -> aws_sdk_autoscaling::Client {
        aws_sdk_autoscaling::Client::new(&self.config)
    }

    /// Elastic Beanstalk client
    pub fn elasticbeanstalk(&self) -> aws_sdk_elasticbeanstalk::Client {
        aws_sdk_elasticbeanstalk::Client::new(&self.config)
    }

    /// DynamoDB client
    pub fn dynamodb(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(&self.config)
    }

    /// SNS client
    pub fn sns(&self) -> aws_sdk_sns::Client {
        aws_sdk_sns::Client::new(&self.config)
    }

    /// SQS client
    pub fn sqs(&self) -> aws_sdk_sqs::Client {
        aws_sdk_sqs::Client::new(&self.config)
    }

    /// Route53 client
    pub fn route53(&self) -> aws_sdk_route53::Client {
        aws_sdk_route53::Client::new(&self.config)
    }

    /// IAM client
    pub fn iam(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(&self.config)
    }

    /// CloudFormation client
    pub fn cloudformation(&self) -> aws_sdk_cloudformation::Client {
        aws_sdk_cloudformation::Client::new(&self.config)
    }

    /// Cost Explorer client
    pub fn costexplorer(&self) -> aws_sdk_costexplorer::Client {
        aws_sdk_costexplorer::Client::new(&self.config)
    }

    /// STS client
    pub fn sts(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(&self.config)
    }
}
