//! Analysis inputs
//!
//! The shapes returned by the cloud capability set and consumed by the
//! analyzers. These are intentionally narrower than the inventory
//! [`ResourceRecord`](crate::model::ResourceRecord): they carry exactly the
//! signals the heuristics look at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An EC2 instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ec2Instance {
    /// Instance id
    pub instance_id: String,
    /// Instance type (t3.medium, m5.large, ...)
    pub instance_type: String,
    /// Instance state (pending, running, stopped, terminated, ...)
    pub state: String,
    /// Value of the `Name` tag when present
    pub name: Option<String>,
    /// Launch time
    pub launch_time: Option<DateTime<Utc>>,
    /// Provider tags
    pub tags: BTreeMap<String, String>,
}

/// CPU utilization aggregated over the metrics window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    /// Average CPU percent over the window
    pub avg_cpu: f64,
    /// Maximum CPU percent over the window
    pub max_cpu: f64,
    /// Window length in days that actually had data
    pub period_days: u32,
}

/// An EBS volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbsVolume {
    /// Volume id
    pub volume_id: String,
    /// Volume type (gp2, gp3, io1, ...)
    pub volume_type: String,
    /// Provisioned size in GiB
    pub size_gib: i64,
    /// Volume state (creating, available, in-use, ...)
    pub state: String,
    /// Instance ids the volume is attached to
    pub attachments: Vec<String>,
    /// Creation time
    pub create_time: Option<DateTime<Utc>>,
}

/// An S3 bucket with usage signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Bucket {
    /// Bucket name
    pub name: String,
    /// Bucket region
    pub region: String,
    /// Total stored bytes
    pub size_bytes: f64,
    /// Number of objects
    pub object_count: i64,
    /// Dominant storage class (STANDARD, GLACIER, ...)
    pub storage_class: String,
    /// Days since the bucket was last accessed, when known
    pub last_accessed_days: Option<i64>,
}

/// An RDS instance with utilization signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RdsInstance {
    /// DB instance identifier
    pub instance_id: String,
    /// Instance class (db.t3.medium, db.r5.large, ...)
    pub instance_class: String,
    /// Engine (postgres, mysql, ...)
    pub engine: String,
    /// Instance status (creating, available, stopped, ...)
    pub status: String,
    /// Allocated storage in GiB
    pub allocated_storage_gib: i64,
    /// Average CPU percent over the metrics window
    pub avg_cpu: f64,
    /// Average concurrent connections over the metrics window
    pub avg_connections: f64,
}

/// A Lambda function with invocation signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaFunction {
    /// Function name
    pub function_name: String,
    /// Configured memory in MB
    pub memory_mb: i64,
    /// Configured timeout in seconds
    pub timeout_sec: i64,
    /// Runtime identifier when present
    pub runtime: Option<String>,
    /// Average invocations per day over the metrics window
    pub avg_invocations_per_day: f64,
    /// Average invocation duration in milliseconds
    pub avg_duration_ms: f64,
}

/// A v2 load balancer with target and traffic signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    /// Load balancer name
    pub name: String,
    /// Load balancer ARN
    pub arn: Option<String>,
    /// application or network
    pub lb_type: String,
    /// Provider state (provisioning, active, failed, ...)
    pub state: String,
    /// Healthy + unhealthy targets across all target groups
    pub total_target_count: i64,
    /// Average requests per day over the metrics window
    pub request_count_per_day: f64,
}

/// A NAT gateway with throughput signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatGateway {
    /// NAT gateway id
    pub nat_gateway_id: String,
    /// Gateway state (pending, available, deleted, ...)
    pub state: String,
    /// Average bytes processed per day over the metrics window
    pub bytes_processed_per_day: f64,
}

/// An Elastic IP allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticIp {
    /// Allocation id
    pub allocation_id: String,
    /// The public address
    pub public_ip: String,
    /// Association id; absent when the address is unattached
    pub association_id: Option<String>,
}

/// Aggregated billing data for the account
///
/// Both `total_monthly` and every `by_service` entry are monthly averages
/// over the queried window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostData {
    /// Average total spend per month in USD
    pub total_monthly: f64,
    /// Average spend per month by service name in USD
    pub by_service: BTreeMap<String, f64>,
}
