//! The cloud capability set the analysis path runs against

use crate::error::Result;
use async_trait::async_trait;
use finops_core::inputs::{
    CostData, CpuMetrics, EbsVolume, Ec2Instance, ElasticIp, LambdaFunction, LoadBalancer,
    NatGateway, RdsInstance, S3Bucket,
};
use std::collections::HashMap;

/// Read-only view of one cloud account
///
/// Every operation paginates internally and returns the complete list or a
/// typed error; partial results are never returned from a single call.
/// Implementations: [`AwsCloudClient`](crate::live::AwsCloudClient) for the
/// real account, [`MockCloudClient`](crate::mock::MockCloudClient) for
/// seeded synthetic fixtures.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// List EC2 instances
    async fn list_ec2_instances(&self) -> Result<Vec<Ec2Instance>>;

    /// Fetch CPU metrics for the given instance ids over a 14-day window
    async fn get_ec2_cpu_metrics(&self, instance_ids: &[String])
        -> Result<HashMap<String, CpuMetrics>>;

    /// List EBS volumes
    async fn list_ebs_volumes(&self) -> Result<Vec<EbsVolume>>;

    /// List S3 buckets with usage signals
    async fn list_s3_buckets(&self) -> Result<Vec<S3Bucket>>;

    /// List RDS instances with utilization signals
    async fn list_rds_instances(&self) -> Result<Vec<RdsInstance>>;

    /// List Lambda functions with invocation signals
    async fn list_lambda_functions(&self) -> Result<Vec<LambdaFunction>>;

    /// List v2 load balancers with target and traffic signals
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>>;

    /// List NAT gateways with throughput signals
    async fn list_nat_gateways(&self) -> Result<Vec<NatGateway>>;

    /// List Elastic IP allocations
    async fn list_elastic_ips(&self) -> Result<Vec<ElasticIp>>;

    /// Fetch aggregated billing data for the account
    async fn get_cost_data(&self) -> Result<CostData>;

    /// Verify the account is reachable with the configured role
    async fn test_connection(&self) -> Result<()>;
}
