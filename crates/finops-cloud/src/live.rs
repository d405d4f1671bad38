//! Live AWS implementation of the capability set
//!
//! All list operations paginate to exhaustion. Utilization metrics come
//! from CloudWatch over a fixed 14-day window collapsed into a single
//! aggregation bucket.

use crate::client::CloudClient;
use crate::credentials::{AwsSession, RoleCredentials};
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use aws_sdk_cloudwatch::types::{Dimension, Metric, MetricDataQuery, MetricStat};
use aws_sdk_costexplorer::types::{DateInterval, Granularity, GroupDefinition, GroupDefinitionType};
use chrono::{Duration, Utc};
use finops_core::inputs::{
    CostData, CpuMetrics, EbsVolume, Ec2Instance, ElasticIp, LambdaFunction, LoadBalancer,
    NatGateway, RdsInstance, S3Bucket,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Metrics window length
pub const METRIC_WINDOW_DAYS: i64 = 14;

/// One aggregation bucket spanning the whole window, in seconds
const METRIC_PERIOD_SECS: i32 = (METRIC_WINDOW_DAYS * 86_400) as i32;

/// GetMetricData accepts at most 500 queries per call
const METRIC_QUERY_CHUNK: usize = 500;

/// Months of billing history averaged by `get_cost_data`
const COST_LOOKBACK_DAYS: i64 = 90;

/// Live cloud client for one workspace account
#[derive(Debug, Clone)]
pub struct AwsCloudClient {
    credentials: RoleCredentials,
}

/// One CloudWatch statistic request, resolved through GetMetricData
struct StatQuery {
    id: String,
    namespace: &'static str,
    metric: &'static str,
    dim_name: &'static str,
    dim_value: String,
    stat: &'static str,
}

impl AwsCloudClient {
    /// Create a client that assumes the role on first use
    pub fn new(role_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            credentials: RoleCredentials::new(role_arn, region),
        }
    }

    /// Create a client sharing an existing credential cache
    pub fn from_credentials(credentials: RoleCredentials) -> Self {
        Self { credentials }
    }

    async fn session(&self) -> Result<AwsSession> {
        self.credentials.session().await
    }

    /// Resolve a batch of statistic queries into `query id -> value`
    async fn fetch_stats(
        &self,
        cloudwatch: &aws_sdk_cloudwatch::Client,
        queries: Vec<StatQuery>,
    ) -> Result<HashMap<String, f64>> {
        let now = Utc::now();
        let start = aws_sdk_cloudwatch::primitives::DateTime::from_secs(
            (now - Duration::days(METRIC_WINDOW_DAYS)).timestamp(),
        );
        let end = aws_sdk_cloudwatch::primitives::DateTime::from_secs(now.timestamp());

        let mut values = HashMap::new();
        for chunk in queries.chunks(METRIC_QUERY_CHUNK) {
            let data_queries: Vec<MetricDataQuery> = chunk
                .iter()
                .map(|q| {
                    MetricDataQuery::builder()
                        .id(&q.id)
                        .metric_stat(
                            MetricStat::builder()
                                .metric(
                                    Metric::builder()
                                        .namespace(q.namespace)
                                        .metric_name(q.metric)
                                        .dimensions(
                                            Dimension::builder()
                                                .name(q.dim_name)
                                                .value(&q.dim_value)
                                                .build(),
                                        )
                                        .build(),
                                )
                                .period(METRIC_PERIOD_SECS)
                                .stat(q.stat)
                                .build(),
                        )
                        .return_data(true)
                        .build()
                })
                .collect();

            let mut chunk_values = self
                .fetch_stats_pages(cloudwatch, data_queries, start, end)
                .await?;
            values.extend(chunk_values.drain());
        }

        Ok(values)
    }

    async fn fetch_stats_pages(
        &self,
        cloudwatch: &aws_sdk_cloudwatch::Client,
        data_queries: Vec<MetricDataQuery>,
        start: aws_sdk_cloudwatch::primitives::DateTime,
        end: aws_sdk_cloudwatch::primitives::DateTime,
    ) -> Result<HashMap<String, f64>> {
        let mut values = HashMap::new();
        let mut pages = cloudwatch
            .get_metric_data()
            .set_metric_data_queries(Some(data_queries))
            .start_time(start)
            .end_time(end)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("CloudWatch", e))?;
            for result in page.metric_data_results() {
                let Some(id) = result.id() else { continue };
                if let Some(value) = result.values().first() {
                    values.insert(id.to_string(), *value);
                }
            }
        }

        Ok(values)
    }
}

#[async_trait]
impl CloudClient for AwsCloudClient {
    async fn list_ec2_instances(&self) -> Result<Vec<Ec2Instance>> {
        let client = self.session().await?.ec2();
        let mut instances = Vec::new();
        let mut pages = client.describe_instances().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("EC2", e))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let Some(id) = instance.instance_id() else {
                        continue;
                    };
                    let tags: BTreeMap<String, String> = instance
                        .tags()
                        .iter()
                        .filter_map(|t| Some((t.key()?.to_string(), t.value()?.to_string())))
                        .collect();
                    instances.push(Ec2Instance {
                        instance_id: id.to_string(),
                        instance_type: instance
                            .instance_type()
                            .map(|t| t.as_str().to_string())
                            .unwrap_or_default(),
                        state: instance
                            .state()
                            .and_then(|s| s.name())
                            .map(|n| n.as_str().to_string())
                            .unwrap_or_default(),
                        name: tags.get("Name").cloned(),
                        launch_time: instance
                            .launch_time()
                            .and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), 0)),
                        tags,
                    });
                }
            }
        }

        Ok(instances)
    }

    async fn get_ec2_cpu_metrics(
        &self,
        instance_ids: &[String],
    ) -> Result<HashMap<String, CpuMetrics>> {
        if instance_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let cloudwatch = self.session().await?.cloudwatch();

        let mut queries = Vec::with_capacity(instance_ids.len() * 2);
        for (i, id) in instance_ids.iter().enumerate() {
            queries.push(StatQuery {
                id: format!("avg{i}"),
                namespace: "AWS/EC2",
                metric: "CPUUtilization",
                dim_name: "InstanceId",
                dim_value: id.clone(),
                stat: "Average",
            });
            queries.push(StatQuery {
                id: format!("max{i}"),
                namespace: "AWS/EC2",
                metric: "CPUUtilization",
                dim_name: "InstanceId",
                dim_value: id.clone(),
                stat: "Maximum",
            });
        }
        let values = self.fetch_stats(&cloudwatch, queries).await?;

        let mut metrics = HashMap::new();
        for (i, id) in instance_ids.iter().enumerate() {
            let Some(avg) = values.get(&format!("avg{i}")) else {
                debug!(instance = %id, "no CPU datapoints in window");
                continue;
            };
            metrics.insert(
                id.clone(),
                CpuMetrics {
                    avg_cpu: *avg,
                    max_cpu: values.get(&format!("max{i}")).copied().unwrap_or(*avg),
                    period_days: METRIC_WINDOW_DAYS as u32,
                },
            );
        }

        Ok(metrics)
    }

    async fn list_ebs_volumes(&self) -> Result<Vec<EbsVolume>> {
        let client = self.session().await?.ec2();
        let mut volumes = Vec::new();
        let mut pages = client.describe_volumes().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("EBS", e))?;
            for volume in page.volumes() {
                let Some(id) = volume.volume_id() else {
                    continue;
                };
                volumes.push(EbsVolume {
                    volume_id: id.to_string(),
                    volume_type: volume
                        .volume_type()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    size_gib: volume.size().unwrap_or(0) as i64,
                    state: volume
                        .state()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    attachments: volume
                        .attachments()
                        .iter()
                        .filter_map(|a| a.instance_id().map(str::to_string))
                        .collect(),
                    create_time: volume
                        .create_time()
                        .and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), 0)),
                });
            }
        }

        Ok(volumes)
    }

    async fn list_s3_buckets(&self) -> Result<Vec<S3Bucket>> {
        let session = self.session().await?;
        let client = session.s3();
        let output = client
            .list_buckets()
            .send()
            .await
            .map_err(|e| CloudError::api("S3", e))?;

        let now = Utc::now();
        let mut buckets = Vec::new();
        for bucket in output.buckets() {
            let Some(name) = bucket.name() else { continue };

            let region = match client.get_bucket_location().bucket(name).send().await {
                Ok(location) => location
                    .location_constraint()
                    .map(|c| c.as_str())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("us-east-1")
                    .to_string(),
                Err(err) => {
                    debug!(bucket = name, error = %err, "bucket location lookup failed");
                    "us-east-1".to_string()
                }
            };

            // Object enumeration is enrichment: a denied bucket still shows
            // up, with zeroed usage
            let mut size_bytes = 0.0;
            let mut object_count: i64 = 0;
            let mut storage_class = "STANDARD".to_string();
            let mut newest_modified = None;

            let mut pages = client.list_objects_v2().bucket(name).into_paginator().send();
            while let Some(page) = pages.next().await {
                match page {
                    Ok(page) => {
                        for object in page.contents() {
                            size_bytes += object.size().unwrap_or(0) as f64;
                            object_count += 1;
                            if object_count == 1 {
                                if let Some(class) = object.storage_class() {
                                    storage_class = class.as_str().to_string();
                                }
                            }
                            if let Some(modified) = object.last_modified() {
                                let secs = modified.secs();
                                newest_modified = Some(newest_modified.map_or(secs, |m: i64| m.max(secs)));
                            }
                        }
                    }
                    Err(err) => {
                        debug!(bucket = name, error = %err, "object listing failed, keeping bare bucket");
                        break;
                    }
                }
            }

            let last_accessed_days = newest_modified
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                .map(|modified| now.signed_duration_since(modified).num_days());

            buckets.push(S3Bucket {
                name: name.to_string(),
                region,
                size_bytes,
                object_count,
                storage_class,
                last_accessed_days,
            });
        }

        Ok(buckets)
    }

    async fn list_rds_instances(&self) -> Result<Vec<RdsInstance>> {
        let session = self.session().await?;
        let client = session.rds();

        struct Raw {
            id: String,
            class: String,
            engine: String,
            status: String,
            storage: i64,
        }

        let mut raw = Vec::new();
        let mut pages = client.describe_db_instances().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("RDS", e))?;
            for instance in page.db_instances() {
                let Some(id) = instance.db_instance_identifier() else {
                    continue;
                };
                raw.push(Raw {
                    id: id.to_string(),
                    class: instance.db_instance_class().unwrap_or_default().to_string(),
                    engine: instance.engine().unwrap_or_default().to_string(),
                    status: instance.db_instance_status().unwrap_or_default().to_string(),
                    storage: instance.allocated_storage().unwrap_or(0) as i64,
                });
            }
        }

        let mut queries = Vec::with_capacity(raw.len() * 2);
        for (i, instance) in raw.iter().enumerate() {
            queries.push(StatQuery {
                id: format!("cpu{i}"),
                namespace: "AWS/RDS",
                metric: "CPUUtilization",
                dim_name: "DBInstanceIdentifier",
                dim_value: instance.id.clone(),
                stat: "Average",
            });
            queries.push(StatQuery {
                id: format!("conn{i}"),
                namespace: "AWS/RDS",
                metric: "DatabaseConnections",
                dim_name: "DBInstanceIdentifier",
                dim_value: instance.id.clone(),
                stat: "Average",
            });
        }
        let cloudwatch = session.cloudwatch();
        let values = self.fetch_stats(&cloudwatch, queries).await?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(i, instance)| RdsInstance {
                instance_id: instance.id,
                instance_class: instance.class,
                engine: instance.engine,
                status: instance.status,
                allocated_storage_gib: instance.storage,
                avg_cpu: values.get(&format!("cpu{i}")).copied().unwrap_or(0.0),
                avg_connections: values.get(&format!("conn{i}")).copied().unwrap_or(0.0),
            })
            .collect())
    }

    async fn list_lambda_functions(&self) -> Result<Vec<LambdaFunction>> {
        let session = self.session().await?;
        let client = session.lambda();

        struct Raw {
            name: String,
            memory_mb: i64,
            timeout_sec: i64,
            runtime: Option<String>,
        }

        let mut raw = Vec::new();
        let mut pages = client.list_functions().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("Lambda", e))?;
            for function in page.functions() {
                let Some(name) = function.function_name() else {
                    continue;
                };
                raw.push(Raw {
                    name: name.to_string(),
                    memory_mb: function.memory_size().unwrap_or(128) as i64,
                    timeout_sec: function.timeout().unwrap_or(3) as i64,
                    runtime: function.runtime().map(|r| r.as_str().to_string()),
                });
            }
        }

        let mut queries = Vec::with_capacity(raw.len() * 2);
        for (i, function) in raw.iter().enumerate() {
            queries.push(StatQuery {
                id: format!("inv{i}"),
                namespace: "AWS/Lambda",
                metric: "Invocations",
                dim_name: "FunctionName",
                dim_value: function.name.clone(),
                stat: "Sum",
            });
            queries.push(StatQuery {
                id: format!("dur{i}"),
                namespace: "AWS/Lambda",
                metric: "Duration",
                dim_name: "FunctionName",
                dim_value: function.name.clone(),
                stat: "Average",
            });
        }
        let cloudwatch = session.cloudwatch();
        let values = self.fetch_stats(&cloudwatch, queries).await?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(i, function)| LambdaFunction {
                function_name: function.name,
                memory_mb: function.memory_mb,
                timeout_sec: function.timeout_sec,
                runtime: function.runtime,
                avg_invocations_per_day: values.get(&format!("inv{i}")).copied().unwrap_or(0.0)
                    / METRIC_WINDOW_DAYS as f64,
                avg_duration_ms: values.get(&format!("dur{i}")).copied().unwrap_or(0.0),
            })
            .collect())
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let session = self.session().await?;
        let client = session.elbv2();

        struct Raw {
            name: String,
            arn: String,
            lb_type: String,
            state: String,
        }

        let mut raw = Vec::new();
        let mut pages = client.describe_load_balancers().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("ELB", e))?;
            for lb in page.load_balancers() {
                let (Some(name), Some(arn)) = (lb.load_balancer_name(), lb.load_balancer_arn())
                else {
                    continue;
                };
                raw.push(Raw {
                    name: name.to_string(),
                    arn: arn.to_string(),
                    lb_type: lb.r#type().map(|t| t.as_str().to_string()).unwrap_or_default(),
                    state: lb
                        .state()
                        .and_then(|s| s.code())
                        .map(|c| c.as_str().to_string())
                        .unwrap_or_default(),
                });
            }
        }

        // Target counts: enrichment per load balancer, zero on failure
        let mut target_counts = Vec::with_capacity(raw.len());
        for lb in &raw {
            let mut total: i64 = 0;
            match client
                .describe_target_groups()
                .load_balancer_arn(&lb.arn)
                .send()
                .await
            {
                Ok(groups) => {
                    for group in groups.target_groups() {
                        let Some(group_arn) = group.target_group_arn() else {
                            continue;
                        };
                        match client
                            .describe_target_health()
                            .target_group_arn(group_arn)
                            .send()
                            .await
                        {
                            Ok(health) => {
                                total += health.target_health_descriptions().len() as i64;
                            }
                            Err(err) => {
                                debug!(lb = %lb.name, error = %err, "target health lookup failed");
                            }
                        }
                    }
                }
                Err(err) => {
                    debug!(lb = %lb.name, error = %err, "target group lookup failed");
                }
            }
            target_counts.push(total);
        }

        let mut queries = Vec::with_capacity(raw.len());
        for (i, lb) in raw.iter().enumerate() {
            // The CloudWatch dimension wants the arn suffix: app/name/id
            let dim_value = lb
                .arn
                .split_once(":loadbalancer/")
                .map(|(_, suffix)| suffix.to_string())
                .unwrap_or_else(|| lb.arn.clone());
            queries.push(StatQuery {
                id: format!("req{i}"),
                namespace: "AWS/ApplicationELB",
                metric: "RequestCount",
                dim_name: "LoadBalancer",
                dim_value,
                stat: "Sum",
            });
        }
        let cloudwatch = session.cloudwatch();
        let values = self.fetch_stats(&cloudwatch, queries).await?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(i, lb)| LoadBalancer {
                name: lb.name,
                arn: Some(lb.arn),
                lb_type: lb.lb_type,
                state: lb.state,
                total_target_count: target_counts[i],
                request_count_per_day: values.get(&format!("req{i}")).copied().unwrap_or(0.0)
                    / METRIC_WINDOW_DAYS as f64,
            })
            .collect())
    }

    async fn list_nat_gateways(&self) -> Result<Vec<NatGateway>> {
        let session = self.session().await?;
        let client = session.ec2();

        let mut raw = Vec::new();
        let mut pages = client.describe_nat_gateways().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("NAT", e))?;
            for gateway in page.nat_gateways() {
                let Some(id) = gateway.nat_gateway_id() else {
                    continue;
                };
                raw.push((
                    id.to_string(),
                    gateway
                        .state()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                ));
            }
        }

        let mut queries = Vec::with_capacity(raw.len());
        for (i, (id, _)) in raw.iter().enumerate() {
            queries.push(StatQuery {
                id: format!("bytes{i}"),
                namespace: "AWS/NATGateway",
                metric: "BytesOutToDestination",
                dim_name: "NatGatewayId",
                dim_value: id.clone(),
                stat: "Sum",
            });
        }
        let cloudwatch = session.cloudwatch();
        let values = self.fetch_stats(&cloudwatch, queries).await?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(i, (id, state))| NatGateway {
                nat_gateway_id: id,
                state,
                bytes_processed_per_day: values.get(&format!("bytes{i}")).copied().unwrap_or(0.0)
                    / METRIC_WINDOW_DAYS as f64,
            })
            .collect())
    }

    async fn list_elastic_ips(&self) -> Result<Vec<ElasticIp>> {
        let client = self.session().await?.ec2();
        let output = client
            .describe_addresses()
            .send()
            .await
            .map_err(|e| CloudError::api("EIP", e))?;

        Ok(output
            .addresses()
            .iter()
            .filter_map(|address| {
                Some(ElasticIp {
                    allocation_id: address.allocation_id()?.to_string(),
                    public_ip: address.public_ip().unwrap_or_default().to_string(),
                    association_id: address.association_id().map(str::to_string),
                })
            })
            .collect())
    }

    async fn get_cost_data(&self) -> Result<CostData> {
        let client = self.session().await?.costexplorer();
        let now = Utc::now();
        let period = DateInterval::builder()
            .start((now - Duration::days(COST_LOOKBACK_DAYS)).format("%Y-%m-%d").to_string())
            .end(now.format("%Y-%m-%d").to_string())
            .build()
            .map_err(|e| CloudError::api("CostExplorer", e))?;

        let output = client
            .get_cost_and_usage()
            .time_period(period)
            .granularity(Granularity::Monthly)
            .metrics("UnblendedCost")
            .group_by(
                GroupDefinition::builder()
                    .r#type(GroupDefinitionType::Dimension)
                    .key("SERVICE")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| CloudError::api("CostExplorer", e))?;

        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        let results = output.results_by_time();
        let months = results.len().max(1) as f64;
        for month in results {
            for group in month.groups() {
                let Some(service) = group.keys().first() else {
                    continue;
                };
                let amount = group
                    .metrics()
                    .and_then(|m| m.get("UnblendedCost"))
                    .and_then(|v| v.amount())
                    .and_then(|a| a.parse::<f64>().ok())
                    .unwrap_or(0.0);
                *sums.entry(service.clone()).or_insert(0.0) += amount;
            }
        }

        // Monthly averages on both levels; the total is the sum of the
        // per-service averages, not a multi-month sum
        let by_service: BTreeMap<String, f64> = sums
            .into_iter()
            .map(|(service, sum)| (service, sum / months))
            .collect();
        let total_monthly = by_service.values().sum();

        Ok(CostData {
            total_monthly,
            by_service,
        })
    }

    async fn test_connection(&self) -> Result<()> {
        let client = self.session().await?.sts();
        client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| CloudError::Connection(format!("{e}")))?;
        Ok(())
    }
}
