//! Pricing tables and cost estimation
//!
//! Baseline us-east-1 list prices, inlined so cost estimates work offline
//! and tests can pin exact values. The tables are versioned data: swapping
//! them does not change any calling code.
//!
//! Estimates are heuristic, not billing-accurate. Every function here is
//! deterministic and never returns a negative value.

use crate::inputs::{
    Ec2Instance, ElasticIp, LambdaFunction, LoadBalancer, RdsInstance, S3Bucket,
};

/// Billing hours per month
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Conservative multiplier applied to downsizing and transition savings
pub const SAVINGS_FACTOR: f64 = 0.6;

/// Hourly rate assumed for EC2 instance types missing from the table
pub const EC2_DEFAULT_HOURLY: f64 = 0.192;

/// Monthly per-GiB rate assumed for unknown EBS volume types
pub const EBS_DEFAULT_GIB_MONTH: f64 = 0.10;

/// S3 standard storage, USD per GB-month
pub const S3_STANDARD_GB_MONTH: f64 = 0.023;

/// S3 Glacier storage, USD per GB-month
pub const S3_GLACIER_GB_MONTH: f64 = 0.004;

/// Bytes per GB for storage math
pub const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// Hourly rate assumed for RDS instance classes missing from the table
pub const RDS_DEFAULT_HOURLY: f64 = 0.342;

/// Lambda compute, USD per GB-second
pub const LAMBDA_GB_SECOND: f64 = 0.0000166667;

/// Lambda free tier, GB-seconds per month
pub const LAMBDA_FREE_TIER_GB_SECONDS: f64 = 400_000.0;

/// NAT gateway fixed hourly rate
pub const NAT_HOURLY: f64 = 0.045;

/// NAT gateway data processing, USD per GB
pub const NAT_GB_PROCESSED: f64 = 0.045;

/// Elastic IP hourly rate, billed only while unassociated
pub const EIP_UNUSED_HOURLY: f64 = 0.005;

/// ALB/NLB hourly rate
pub const LB_HOURLY: f64 = 0.0225;

/// Hourly on-demand rate for an EC2 instance type
pub fn ec2_hourly_rate(instance_type: &str) -> f64 {
    match instance_type {
        "t3.micro" => 0.0104,
        "t3.small" => 0.0208,
        "t3.medium" => 0.0416,
        "t3.large" => 0.0832,
        "m5.large" => 0.096,
        "m5.xlarge" => 0.192,
        "m5.2xlarge" => 0.384,
        "c5.large" => 0.085,
        "c5.xlarge" => 0.17,
        "c5.2xlarge" => 0.34,
        "r5.large" => 0.126,
        "r5.xlarge" => 0.252,
        "r5.2xlarge" => 0.504,
        _ => EC2_DEFAULT_HOURLY,
    }
}

/// Monthly cost of an EC2 instance; zero unless it is running
pub fn ec2_monthly_cost(instance: &Ec2Instance) -> f64 {
    if instance.state != "running" {
        return 0.0;
    }
    ec2_hourly_rate(&instance.instance_type) * HOURS_PER_MONTH
}

/// Monthly per-GiB rate for an EBS volume type
pub fn ebs_gib_month_rate(volume_type: &str) -> f64 {
    match volume_type {
        "gp2" => 0.10,
        "gp3" => 0.08,
        "io1" | "io2" => 0.125,
        "st1" => 0.045,
        "sc1" => 0.015,
        _ => EBS_DEFAULT_GIB_MONTH,
    }
}

/// Monthly cost of an EBS volume; billed whether or not it is attached
pub fn ebs_monthly_cost(volume_type: &str, size_gib: i64) -> f64 {
    size_gib.max(0) as f64 * ebs_gib_month_rate(volume_type)
}

/// Monthly storage cost of an S3 bucket by dominant storage class
pub fn s3_monthly_cost(bucket: &S3Bucket) -> f64 {
    let rate = match bucket.storage_class.as_str() {
        "GLACIER" | "DEEP_ARCHIVE" => S3_GLACIER_GB_MONTH,
        _ => S3_STANDARD_GB_MONTH,
    };
    (bucket.size_bytes.max(0.0) / BYTES_PER_GB) * rate
}

/// Hourly on-demand rate for an RDS instance class
pub fn rds_hourly_rate(instance_class: &str) -> f64 {
    match instance_class {
        "db.t3.micro" => 0.017,
        "db.t3.small" => 0.034,
        "db.t3.medium" => 0.068,
        "db.t3.large" => 0.136,
        "db.m5.large" => 0.171,
        "db.m5.xlarge" => 0.342,
        "db.r5.large" => 0.24,
        "db.r5.xlarge" => 0.48,
        "db.r5.2xlarge" => 0.96,
        _ => RDS_DEFAULT_HOURLY,
    }
}

/// Monthly cost of an RDS instance; zero unless it is available
pub fn rds_monthly_cost(instance: &RdsInstance) -> f64 {
    if instance.status != "available" {
        return 0.0;
    }
    rds_hourly_rate(&instance.instance_class) * HOURS_PER_MONTH
}

/// Monthly GB-seconds consumed by a Lambda function at its observed rate
pub fn lambda_monthly_gb_seconds(function: &LambdaFunction) -> f64 {
    function.avg_invocations_per_day.max(0.0)
        * (function.avg_duration_ms.max(0.0) / 1000.0)
        * (function.memory_mb.max(0) as f64 / 1024.0)
        * 30.0
}

/// Monthly cost of a Lambda function after the free tier
pub fn lambda_monthly_cost(function: &LambdaFunction) -> f64 {
    let billable = (lambda_monthly_gb_seconds(function) - LAMBDA_FREE_TIER_GB_SECONDS).max(0.0);
    billable * LAMBDA_GB_SECOND
}

/// Monthly cost of a NAT gateway given its average daily data volume
pub fn nat_gateway_monthly_cost(daily_gb: f64) -> f64 {
    NAT_HOURLY * HOURS_PER_MONTH + daily_gb.max(0.0) * 30.0 * NAT_GB_PROCESSED
}

/// Monthly cost of an Elastic IP; zero while associated
pub fn elastic_ip_monthly_cost(eip: &ElasticIp) -> f64 {
    if eip.association_id.is_some() {
        return 0.0;
    }
    EIP_UNUSED_HOURLY * HOURS_PER_MONTH
}

/// Monthly base cost of an ALB or NLB
pub fn load_balancer_monthly_cost(_lb: &LoadBalancer) -> f64 {
    LB_HOURLY * HOURS_PER_MONTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn instance(instance_type: &str, state: &str) -> Ec2Instance {
        Ec2Instance {
            instance_id: "i-test".to_string(),
            instance_type: instance_type.to_string(),
            state: state.to_string(),
            name: None,
            launch_time: None,
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_ec2_running_t3_medium() {
        let cost = ec2_monthly_cost(&instance("t3.medium", "running"));
        assert!((cost - 30.368).abs() < 1e-9);
    }

    #[test]
    fn test_ec2_stopped_is_free() {
        assert_eq!(ec2_monthly_cost(&instance("t3.medium", "stopped")), 0.0);
    }

    #[test]
    fn test_ec2_unknown_type_uses_fallback() {
        let cost = ec2_monthly_cost(&instance("z9.mega", "running"));
        assert!((cost - EC2_DEFAULT_HOURLY * HOURS_PER_MONTH).abs() < 1e-9);
    }

    #[test]
    fn test_ebs_rates() {
        assert!((ebs_monthly_cost("gp3", 100) - 8.0).abs() < 1e-9);
        assert!((ebs_monthly_cost("gp2", 500) - 50.0).abs() < 1e-9);
        assert!((ebs_monthly_cost("io2", 10) - 1.25).abs() < 1e-9);
        assert!((ebs_monthly_cost("weird", 10) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_s3_standard_vs_glacier() {
        let mut bucket = S3Bucket {
            name: "b".to_string(),
            region: "us-east-1".to_string(),
            size_bytes: 10.0 * BYTES_PER_GB,
            object_count: 1,
            storage_class: "STANDARD".to_string(),
            last_accessed_days: None,
        };
        assert!((s3_monthly_cost(&bucket) - 0.23).abs() < 1e-9);

        bucket.storage_class = "GLACIER".to_string();
        assert!((s3_monthly_cost(&bucket) - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_rds_not_available_is_free() {
        let instance = RdsInstance {
            instance_id: "db-test".to_string(),
            instance_class: "db.m5.large".to_string(),
            engine: "postgres".to_string(),
            status: "stopped".to_string(),
            allocated_storage_gib: 100,
            avg_cpu: 50.0,
            avg_connections: 20.0,
        };
        assert_eq!(rds_monthly_cost(&instance), 0.0);
    }

    #[test]
    fn test_lambda_within_free_tier() {
        let function = LambdaFunction {
            function_name: "f".to_string(),
            memory_mb: 128,
            timeout_sec: 3,
            runtime: None,
            avg_invocations_per_day: 100.0,
            avg_duration_ms: 50.0,
        };
        // 100 * 0.05s * 0.125GB * 30 = 18.75 GB-s, far under the free tier
        assert_eq!(lambda_monthly_cost(&function), 0.0);
    }

    #[test]
    fn test_nat_gateway_cost() {
        let idle = nat_gateway_monthly_cost(0.0);
        assert!((idle - NAT_HOURLY * HOURS_PER_MONTH).abs() < 1e-9);

        let busy = nat_gateway_monthly_cost(10.0);
        assert!((busy - (NAT_HOURLY * HOURS_PER_MONTH + 13.5)).abs() < 1e-9);
    }

    #[test]
    fn test_eip_associated_is_free() {
        let associated = ElasticIp {
            allocation_id: "eipalloc-1".to_string(),
            public_ip: "1.2.3.4".to_string(),
            association_id: Some("eipassoc-1".to_string()),
        };
        assert_eq!(elastic_ip_monthly_cost(&associated), 0.0);

        let idle = ElasticIp {
            association_id: None,
            ..associated
        };
        assert!((elastic_ip_monthly_cost(&idle) - 3.65).abs() < 1e-9);
    }
}
