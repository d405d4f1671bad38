//! Waste heuristics
//!
//! Eight pure analyzers, one per detection rule family. Each takes a slice
//! of observed resources and returns recommendation drafts in input order.
//! None of them performs I/O or reads the clock; the EBS orphan rule takes
//! `now` as an argument so callers (and tests) control it.

use crate::inputs::{
    CpuMetrics, EbsVolume, Ec2Instance, ElasticIp, LambdaFunction, LoadBalancer, NatGateway,
    RdsInstance, S3Bucket,
};
use crate::model::{Confidence, RecommendationDraft, RecommendationType};
use crate::pricing;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;

/// Minimum metrics window before the EC2 downsize rule fires, in days
pub const EC2_MIN_PERIOD_DAYS: u32 = 14;

/// Days an EBS volume must sit unattached before it counts as orphaned
pub const EBS_ORPHAN_MIN_DAYS: i64 = 7;

/// Days without access before a standard S3 bucket is lifecycle-eligible
pub const S3_INACTIVE_MIN_DAYS: i64 = 90;

/// Floor below which an oversized-Lambda finding is not worth surfacing
pub const LAMBDA_OVERSIZED_MIN_SAVINGS: f64 = 0.50;

/// Round to two decimals, the precision recommendations are stored at
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Everything the analyzers look at for one workspace
#[derive(Debug, Clone, Default)]
pub struct AnalysisSnapshot {
    /// EC2 instances
    pub ec2_instances: Vec<Ec2Instance>,
    /// CPU metrics keyed by instance id
    pub cpu_metrics: HashMap<String, CpuMetrics>,
    /// EBS volumes
    pub ebs_volumes: Vec<EbsVolume>,
    /// S3 buckets
    pub s3_buckets: Vec<S3Bucket>,
    /// RDS instances
    pub rds_instances: Vec<RdsInstance>,
    /// Lambda functions
    pub lambda_functions: Vec<LambdaFunction>,
    /// Load balancers
    pub load_balancers: Vec<LoadBalancer>,
    /// NAT gateways
    pub nat_gateways: Vec<NatGateway>,
    /// Elastic IPs
    pub elastic_ips: Vec<ElasticIp>,
}

/// Run every analyzer over a snapshot, concatenating in rule order
pub fn analyze(snapshot: &AnalysisSnapshot, now: DateTime<Utc>) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    drafts.extend(analyze_ec2(&snapshot.ec2_instances, &snapshot.cpu_metrics));
    drafts.extend(analyze_ebs(&snapshot.ebs_volumes, now));
    drafts.extend(analyze_s3(&snapshot.s3_buckets));
    drafts.extend(analyze_rds(&snapshot.rds_instances));
    drafts.extend(analyze_lambda(&snapshot.lambda_functions));
    drafts.extend(analyze_elb(&snapshot.load_balancers));
    drafts.extend(analyze_eip(&snapshot.elastic_ips));
    drafts.extend(analyze_nat(&snapshot.nat_gateways));
    drafts
}

/// Running instances with a sustained low CPU average
pub fn analyze_ec2(
    instances: &[Ec2Instance],
    metrics: &HashMap<String, CpuMetrics>,
) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for instance in instances {
        if instance.state != "running" {
            continue;
        }
        let Some(cpu) = metrics.get(&instance.instance_id) else {
            continue;
        };
        if cpu.period_days < EC2_MIN_PERIOD_DAYS || cpu.avg_cpu >= 10.0 {
            continue;
        }

        let hourly = pricing::ec2_hourly_rate(&instance.instance_type);
        let savings = hourly * pricing::HOURS_PER_MONTH * 0.5 * pricing::SAVINGS_FACTOR;
        let confidence = if cpu.avg_cpu < 5.0 {
            Confidence::High
        } else {
            Confidence::Medium
        };
        let display = instance
            .name
            .as_deref()
            .unwrap_or(&instance.instance_id);

        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::Ec2DownSize,
            resource_id: instance.instance_id.clone(),
            description: format!(
                "EC2 instance {} ({}, {}) averaged {:.1}% CPU over the last {} days; \
                 move it to a smaller instance type",
                display, instance.instance_id, instance.instance_type, cpu.avg_cpu, cpu.period_days
            ),
            estimated_monthly_savings: round2(savings),
            confidence,
            metadata: json!({
                "instance_type": instance.instance_type,
                "avg_cpu": cpu.avg_cpu,
                "max_cpu": cpu.max_cpu,
                "period_days": cpu.period_days,
            }),
        });
    }
    drafts
}

/// Volumes sitting detached for more than a week
pub fn analyze_ebs(volumes: &[EbsVolume], now: DateTime<Utc>) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for volume in volumes {
        if volume.state != "available" || !volume.attachments.is_empty() {
            continue;
        }
        let Some(created) = volume.create_time else {
            continue;
        };
        let age = now.signed_duration_since(created);
        if age <= Duration::days(EBS_ORPHAN_MIN_DAYS) {
            continue;
        }

        let savings = pricing::ebs_monthly_cost(&volume.volume_type, volume.size_gib);
        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::EbsOrphan,
            resource_id: volume.volume_id.clone(),
            description: format!(
                "EBS volume {} ({} GiB {}) has been unattached for {} days; \
                 snapshot it and delete the volume",
                volume.volume_id,
                volume.size_gib,
                volume.volume_type,
                age.num_days()
            ),
            estimated_monthly_savings: round2(savings),
            confidence: Confidence::High,
            metadata: json!({
                "volume_type": volume.volume_type,
                "size_gib": volume.size_gib,
                "days_unattached": age.num_days(),
            }),
        });
    }
    drafts
}

/// Standard-class buckets nobody has touched in three months
pub fn analyze_s3(buckets: &[S3Bucket]) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for bucket in buckets {
        if bucket.storage_class != "STANDARD" {
            continue;
        }
        let Some(idle_days) = bucket.last_accessed_days else {
            continue;
        };
        if idle_days <= S3_INACTIVE_MIN_DAYS {
            continue;
        }

        let size_gb = bucket.size_bytes.max(0.0) / pricing::BYTES_PER_GB;
        let savings = size_gb
            * (pricing::S3_STANDARD_GB_MONTH - pricing::S3_GLACIER_GB_MONTH)
            * pricing::SAVINGS_FACTOR;
        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::S3Lifecycle,
            resource_id: bucket.name.clone(),
            description: format!(
                "S3 bucket {} ({:.1} GB STANDARD) has not been accessed for {} days; \
                 add a lifecycle rule transitioning objects to Glacier",
                bucket.name, size_gb, idle_days
            ),
            estimated_monthly_savings: round2(savings),
            confidence: Confidence::Medium,
            metadata: json!({
                "size_gb": size_gb,
                "last_accessed_days": idle_days,
                "storage_class": bucket.storage_class,
            }),
        });
    }
    drafts
}

/// Available RDS instances with low CPU and few connections
pub fn analyze_rds(instances: &[RdsInstance]) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for instance in instances {
        if instance.status != "available"
            || instance.avg_cpu >= 15.0
            || instance.avg_connections >= 10.0
        {
            continue;
        }

        let hourly = pricing::rds_hourly_rate(&instance.instance_class);
        let savings = hourly * pricing::HOURS_PER_MONTH * 0.5 * pricing::SAVINGS_FACTOR;
        let confidence = if instance.avg_cpu < 5.0 && instance.avg_connections < 3.0 {
            Confidence::High
        } else {
            Confidence::Medium
        };

        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::RdsDownSize,
            resource_id: instance.instance_id.clone(),
            description: format!(
                "RDS instance {} ({}, {}) averages {:.1}% CPU with {:.1} connections; \
                 move it to a smaller instance class",
                instance.instance_id,
                instance.instance_class,
                instance.engine,
                instance.avg_cpu,
                instance.avg_connections
            ),
            estimated_monthly_savings: round2(savings),
            confidence,
            metadata: json!({
                "instance_class": instance.instance_class,
                "engine": instance.engine,
                "avg_cpu": instance.avg_cpu,
                "avg_connections": instance.avg_connections,
            }),
        });
    }
    drafts
}

/// Functions that are never invoked, or carry far more memory than they use
pub fn analyze_lambda(functions: &[LambdaFunction]) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for function in functions {
        if function.avg_invocations_per_day == 0.0 {
            let memory_gb = function.memory_mb.max(0) as f64 / 1024.0;
            let savings = memory_gb
                * function.timeout_sec.max(0) as f64
                * 100.0
                * pricing::LAMBDA_GB_SECOND
                * 30.0;
            drafts.push(RecommendationDraft {
                rec_type: RecommendationType::LambdaUnused,
                resource_id: function.function_name.clone(),
                description: format!(
                    "Lambda function {} ({} MB) has had no invocations over the metrics \
                     window; delete it or archive its code",
                    function.function_name, function.memory_mb
                ),
                estimated_monthly_savings: round2(savings),
                confidence: Confidence::High,
                metadata: json!({
                    "memory_mb": function.memory_mb,
                    "timeout_sec": function.timeout_sec,
                }),
            });
            continue;
        }

        if function.memory_mb < 512 || function.avg_duration_ms >= 100.0 {
            continue;
        }
        let rightsized_mb = ((function.memory_mb as f64 / 3.0).ceil() as i64).max(128);
        let rightsized = LambdaFunction {
            memory_mb: rightsized_mb,
            ..function.clone()
        };
        let savings = (pricing::lambda_monthly_gb_seconds(function)
            - pricing::lambda_monthly_gb_seconds(&rightsized))
            * pricing::LAMBDA_GB_SECOND;
        if savings <= LAMBDA_OVERSIZED_MIN_SAVINGS {
            continue;
        }

        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::LambdaOversized,
            resource_id: function.function_name.clone(),
            description: format!(
                "Lambda function {} ({} MB) finishes in {:.0} ms on average; \
                 right-size its memory to {} MB",
                function.function_name, function.memory_mb, function.avg_duration_ms, rightsized_mb
            ),
            estimated_monthly_savings: round2(savings),
            confidence: Confidence::Medium,
            metadata: json!({
                "memory_mb": function.memory_mb,
                "rightsized_memory_mb": rightsized_mb,
                "avg_duration_ms": function.avg_duration_ms,
                "avg_invocations_per_day": function.avg_invocations_per_day,
            }),
        });
    }
    drafts
}

/// Active load balancers without targets, or with targets but no traffic
pub fn analyze_elb(load_balancers: &[LoadBalancer]) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for lb in load_balancers {
        if lb.state != "active" {
            continue;
        }
        let monthly = pricing::LB_HOURLY * pricing::HOURS_PER_MONTH;

        if lb.total_target_count == 0 {
            drafts.push(RecommendationDraft {
                rec_type: RecommendationType::ElbNoTargets,
                resource_id: lb.name.clone(),
                description: format!(
                    "Load balancer {} ({}) has no registered targets; delete it",
                    lb.name, lb.lb_type
                ),
                estimated_monthly_savings: round2(monthly),
                confidence: Confidence::High,
                metadata: json!({
                    "lb_type": lb.lb_type,
                    "state": lb.state,
                }),
            });
        } else if lb.request_count_per_day == 0.0 {
            drafts.push(RecommendationDraft {
                rec_type: RecommendationType::ElbNoTraffic,
                resource_id: lb.name.clone(),
                description: format!(
                    "Load balancer {} ({}) has {} targets but served no requests over \
                     the metrics window; check whether it is still needed",
                    lb.name, lb.lb_type, lb.total_target_count
                ),
                estimated_monthly_savings: round2(monthly),
                confidence: Confidence::Medium,
                metadata: json!({
                    "lb_type": lb.lb_type,
                    "total_target_count": lb.total_target_count,
                }),
            });
        }
    }
    drafts
}

/// Elastic IPs billed for sitting unassociated
pub fn analyze_eip(elastic_ips: &[ElasticIp]) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for eip in elastic_ips {
        if eip.association_id.is_some() {
            continue;
        }
        let savings = pricing::EIP_UNUSED_HOURLY * pricing::HOURS_PER_MONTH;
        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::EipUnassociated,
            resource_id: eip.allocation_id.clone(),
            description: format!(
                "Elastic IP {} ({}) is not associated with any resource; release it",
                eip.public_ip, eip.allocation_id
            ),
            estimated_monthly_savings: round2(savings),
            confidence: Confidence::High,
            metadata: json!({
                "public_ip": eip.public_ip,
            }),
        });
    }
    drafts
}

/// NAT gateways processing less than a GiB per day
pub fn analyze_nat(gateways: &[NatGateway]) -> Vec<RecommendationDraft> {
    let mut drafts = Vec::new();
    for gateway in gateways {
        if gateway.state != "available" {
            continue;
        }
        let daily_gb = gateway.bytes_processed_per_day.max(0.0) / pricing::BYTES_PER_GB;
        if daily_gb >= 1.0 {
            continue;
        }

        let savings = pricing::nat_gateway_monthly_cost(daily_gb);
        drafts.push(RecommendationDraft {
            rec_type: RecommendationType::NatGwIdle,
            resource_id: gateway.nat_gateway_id.clone(),
            description: format!(
                "NAT gateway {} processes {:.2} GB per day; delete it or share a \
                 gateway across subnets",
                gateway.nat_gateway_id, daily_gb
            ),
            estimated_monthly_savings: round2(savings),
            confidence: Confidence::Medium,
            metadata: json!({
                "gb_processed_per_day": daily_gb,
            }),
        });
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn running_instance(id: &str) -> Ec2Instance {
        Ec2Instance {
            instance_id: id.to_string(),
            instance_type: "t3.medium".to_string(),
            state: "running".to_string(),
            name: Some("api".to_string()),
            launch_time: None,
            tags: BTreeMap::new(),
        }
    }

    fn cpu(avg: f64, period_days: u32) -> CpuMetrics {
        CpuMetrics {
            avg_cpu: avg,
            max_cpu: avg * 2.0,
            period_days,
        }
    }

    #[test]
    fn test_ec2_short_window_is_skipped() {
        let instances = vec![running_instance("i-1")];
        let metrics = HashMap::from([("i-1".to_string(), cpu(2.0, 13))]);
        assert!(analyze_ec2(&instances, &metrics).is_empty());
    }

    #[test]
    fn test_ec2_confidence_boundaries() {
        let instances = vec![running_instance("i-1")];

        let metrics = HashMap::from([("i-1".to_string(), cpu(9.999, 14))]);
        let drafts = analyze_ec2(&instances, &metrics);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].confidence, Confidence::Medium);

        let metrics = HashMap::from([("i-1".to_string(), cpu(4.999, 14))]);
        let drafts = analyze_ec2(&instances, &metrics);
        assert_eq!(drafts[0].confidence, Confidence::High);

        // Savings: 0.0416 * 730 * 0.5 * 0.6 = 9.11 after rounding
        assert_eq!(drafts[0].estimated_monthly_savings, 9.11);
    }

    #[test]
    fn test_ec2_stopped_is_skipped() {
        let mut instance = running_instance("i-1");
        instance.state = "stopped".to_string();
        let metrics = HashMap::from([("i-1".to_string(), cpu(1.0, 30))]);
        assert!(analyze_ec2(&[instance], &metrics).is_empty());
    }

    fn detached_volume(id: &str, age_days: i64, now: DateTime<Utc>) -> EbsVolume {
        EbsVolume {
            volume_id: id.to_string(),
            volume_type: "gp2".to_string(),
            size_gib: 500,
            state: "available".to_string(),
            attachments: Vec::new(),
            create_time: Some(now - Duration::days(age_days)),
        }
    }

    #[test]
    fn test_ebs_orphan_boundary() {
        let now = Utc::now();
        assert!(analyze_ebs(&[detached_volume("vol-1", 7, now)], now).is_empty());

        let drafts = analyze_ebs(&[detached_volume("vol-1", 8, now)], now);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].estimated_monthly_savings, 50.0);
        assert_eq!(drafts[0].confidence, Confidence::High);
    }

    #[test]
    fn test_ebs_attached_is_skipped() {
        let now = Utc::now();
        let mut volume = detached_volume("vol-1", 30, now);
        volume.attachments.push("i-1".to_string());
        volume.state = "in-use".to_string();
        assert!(analyze_ebs(&[volume], now).is_empty());
    }

    #[test]
    fn test_s3_lifecycle_savings() {
        let bucket = S3Bucket {
            name: "company-logs-archive".to_string(),
            region: "us-east-1".to_string(),
            size_bytes: 1.2e12,
            object_count: 100_000,
            storage_class: "STANDARD".to_string(),
            last_accessed_days: Some(120),
        };
        let drafts = analyze_s3(&[bucket]);
        assert_eq!(drafts.len(), 1);

        let expected = round2((1.2e12 / pricing::BYTES_PER_GB) * (0.023 - 0.004) * 0.6);
        assert_eq!(drafts[0].estimated_monthly_savings, expected);
        assert_eq!(drafts[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_s3_glacier_is_skipped() {
        let bucket = S3Bucket {
            name: "cold".to_string(),
            region: "us-east-1".to_string(),
            size_bytes: 1.0e12,
            object_count: 10,
            storage_class: "GLACIER".to_string(),
            last_accessed_days: Some(365),
        };
        assert!(analyze_s3(&[bucket]).is_empty());
    }

    #[test]
    fn test_rds_confidence_split() {
        let base = RdsInstance {
            instance_id: "prod-db".to_string(),
            instance_class: "db.m5.large".to_string(),
            engine: "postgres".to_string(),
            status: "available".to_string(),
            allocated_storage_gib: 100,
            avg_cpu: 4.0,
            avg_connections: 2.0,
        };
        let drafts = analyze_rds(std::slice::from_ref(&base));
        assert_eq!(drafts[0].confidence, Confidence::High);

        let medium = RdsInstance {
            avg_cpu: 12.0,
            avg_connections: 8.0,
            ..base
        };
        let drafts = analyze_rds(&[medium]);
        assert_eq!(drafts[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_lambda_unused_zero_duration() {
        let function = LambdaFunction {
            function_name: "orphan-fn".to_string(),
            memory_mb: 256,
            timeout_sec: 30,
            runtime: Some("nodejs18.x".to_string()),
            avg_invocations_per_day: 0.0,
            avg_duration_ms: 0.0,
        };
        let drafts = analyze_lambda(&[function]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].rec_type, RecommendationType::LambdaUnused);
    }

    #[test]
    fn test_lambda_oversized_floor() {
        // Tiny workload: savings land under the floor and nothing is emitted
        let small = LambdaFunction {
            function_name: "small".to_string(),
            memory_mb: 512,
            timeout_sec: 10,
            runtime: None,
            avg_invocations_per_day: 10.0,
            avg_duration_ms: 50.0,
        };
        assert!(analyze_lambda(&[small]).is_empty());

        let busy = LambdaFunction {
            function_name: "busy".to_string(),
            memory_mb: 3072,
            timeout_sec: 10,
            runtime: None,
            avg_invocations_per_day: 50_000.0,
            avg_duration_ms: 40.0,
        };
        let drafts = analyze_lambda(&[busy]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].rec_type, RecommendationType::LambdaOversized);
        assert!(drafts[0].estimated_monthly_savings > LAMBDA_OVERSIZED_MIN_SAVINGS);
    }

    fn lb(name: &str, state: &str, targets: i64, requests: f64) -> LoadBalancer {
        LoadBalancer {
            name: name.to_string(),
            arn: None,
            lb_type: "application".to_string(),
            state: state.to_string(),
            total_target_count: targets,
            request_count_per_day: requests,
        }
    }

    #[test]
    fn test_elb_rules() {
        assert!(analyze_elb(&[lb("provisioning-lb", "provisioning", 0, 0.0)]).is_empty());

        let drafts = analyze_elb(&[lb("empty-lb", "active", 0, 0.0)]);
        assert_eq!(drafts[0].rec_type, RecommendationType::ElbNoTargets);
        assert_eq!(drafts[0].estimated_monthly_savings, round2(0.0225 * 730.0));

        let drafts = analyze_elb(&[lb("quiet-lb", "active", 3, 0.0)]);
        assert_eq!(drafts[0].rec_type, RecommendationType::ElbNoTraffic);
        assert_eq!(drafts[0].confidence, Confidence::Medium);

        assert!(analyze_elb(&[lb("busy-lb", "active", 3, 1000.0)]).is_empty());
    }

    #[test]
    fn test_eip_unassociated() {
        let idle = ElasticIp {
            allocation_id: "eipalloc-1".to_string(),
            public_ip: "54.1.2.3".to_string(),
            association_id: None,
        };
        let drafts = analyze_eip(&[idle]);
        assert_eq!(drafts[0].estimated_monthly_savings, 3.65);
        assert_eq!(drafts[0].confidence, Confidence::High);
    }

    #[test]
    fn test_nat_idle_threshold() {
        let idle = NatGateway {
            nat_gateway_id: "nat-1".to_string(),
            state: "available".to_string(),
            bytes_processed_per_day: 0.5 * pricing::BYTES_PER_GB,
        };
        let busy = NatGateway {
            nat_gateway_id: "nat-2".to_string(),
            state: "available".to_string(),
            bytes_processed_per_day: 5.0 * pricing::BYTES_PER_GB,
        };
        let drafts = analyze_nat(&[idle, busy]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].resource_id, "nat-1");
    }

    #[test]
    fn test_analyze_is_deterministic_and_duplicate_free() {
        let now = Utc::now();
        let snapshot = AnalysisSnapshot {
            ec2_instances: vec![running_instance("i-1")],
            cpu_metrics: HashMap::from([("i-1".to_string(), cpu(3.0, 20))]),
            ebs_volumes: vec![detached_volume("vol-1", 10, now)],
            elastic_ips: vec![ElasticIp {
                allocation_id: "eipalloc-1".to_string(),
                public_ip: "54.1.2.3".to_string(),
                association_id: None,
            }],
            ..Default::default()
        };

        let first = analyze(&snapshot, now);
        let second = analyze(&snapshot, now);
        assert_eq!(first, second);

        let mut keys: Vec<_> = first
            .iter()
            .map(|d| (d.rec_type, d.resource_id.clone()))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), first.len());

        for draft in &first {
            assert!(draft.estimated_monthly_savings >= 0.0);
            assert_eq!(
                draft.estimated_monthly_savings,
                round2(draft.estimated_monthly_savings)
            );
        }
    }
}
