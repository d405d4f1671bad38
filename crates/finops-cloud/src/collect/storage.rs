//! Storage and database collectors: EBS, S3, RDS, DynamoDB

use super::Collect;
use crate::credentials::AwsSession;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use finops_core::model::ResourceRecord;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

fn to_utc(dt: &aws_sdk_ec2::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(dt.secs(), 0)
}

/// EBS volume inventory
pub struct EbsCollector {
    client: aws_sdk_ec2::Client,
}

impl EbsCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.ec2(),
        }
    }
}

#[async_trait]
impl Collect for EbsCollector {
    fn service(&self) -> &'static str {
        "EBS"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.describe_volumes().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("EBS", e))?;
            for volume in page.volumes() {
                let Some(id) = volume.volume_id() else {
                    continue;
                };
                let attachments: Vec<String> = volume
                    .attachments()
                    .iter()
                    .filter_map(|a| a.instance_id().map(str::to_string))
                    .collect();
                let tags: BTreeMap<String, String> = volume
                    .tags()
                    .iter()
                    .filter_map(|t| Some((t.key()?.to_string(), t.value()?.to_string())))
                    .collect();

                let mut record = ResourceRecord::new(id, "EBS").with_metadata(json!({
                    "size_gib": volume.size(),
                    "attachments": attachments,
                    "encrypted": volume.encrypted(),
                    "iops": volume.iops(),
                    "create_time": volume.create_time().and_then(to_utc),
                }));
                if let Some(volume_type) = volume.volume_type() {
                    record = record.with_type(volume_type.as_str());
                }
                if let Some(state) = volume.state() {
                    record = record.with_state(state.as_str());
                }
                if let Some(name) = tags.get("Name").cloned() {
                    record = record.with_name(name);
                }
                records.push(record.with_tags(tags));
            }
        }

        Ok(records)
    }
}

/// S3 bucket inventory
pub struct S3Collector {
    client: aws_sdk_s3::Client,
}

impl S3Collector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.s3(),
        }
    }

    /// Bucket region, falling back to us-east-1 when the lookup fails
    async fn bucket_region(&self, bucket: &str) -> String {
        match self.client.get_bucket_location().bucket(bucket).send().await {
            Ok(output) => output
                .location_constraint()
                .map(|c| c.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("us-east-1")
                .to_string(),
            Err(err) => {
                debug!(bucket, error = %err, "bucket location lookup failed, using default");
                "us-east-1".to_string()
            }
        }
    }
}

#[async_trait]
impl Collect for S3Collector {
    fn service(&self) -> &'static str {
        "S3"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| CloudError::api("S3", e))?;

        let mut records = Vec::new();
        for bucket in output.buckets() {
            let Some(name) = bucket.name() else {
                continue;
            };
            let region = self.bucket_region(name).await;
            records.push(
                ResourceRecord::new(name, "S3")
                    .with_type("bucket")
                    .with_name(name)
                    .with_state("available")
                    .with_metadata(json!({
                        "region": region,
                        "created": bucket.creation_date().and_then(to_utc),
                    })),
            );
        }

        Ok(records)
    }
}

/// RDS instance inventory
pub struct RdsCollector {
    client: aws_sdk_rds::Client,
}

impl RdsCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.rds(),
        }
    }
}

#[async_trait]
impl Collect for RdsCollector {
    fn service(&self) -> &'static str {
        "RDS"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.describe_db_instances().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("RDS", e))?;
            for instance in page.db_instances() {
                let Some(id) = instance.db_instance_identifier() else {
                    continue;
                };
                let mut record = ResourceRecord::new(id, "RDS")
                    .with_name(id)
                    .with_metadata(json!({
                        "engine": instance.engine(),
                        "engine_version": instance.engine_version(),
                        "allocated_storage_gib": instance.allocated_storage(),
                        "multi_az": instance.multi_az(),
                    }));
                if let Some(class) = instance.db_instance_class() {
                    record = record.with_type(class);
                }
                if let Some(status) = instance.db_instance_status() {
                    record = record.with_state(status);
                }
                if let Some(arn) = instance.db_instance_arn() {
                    record = record.with_arn(arn);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// DynamoDB table inventory
pub struct DynamoDbCollector {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoDbCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.dynamodb(),
        }
    }
}

#[async_trait]
impl Collect for DynamoDbCollector {
    fn service(&self) -> &'static str {
        "DynamoDB"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut names = Vec::new();
        let mut pages = self.client.list_tables().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("DynamoDB", e))?;
            names.extend(page.table_names().iter().cloned());
        }

        let mut records = Vec::new();
        for name in names {
            let mut record = ResourceRecord::new(&name, "DynamoDB")
                .with_type("table")
                .with_name(&name);

            // Table detail is enrichment; a failed describe keeps the record
            match self.client.describe_table().table_name(&name).send().await {
                Ok(output) => {
                    if let Some(table) = output.table() {
                        if let Some(status) = table.table_status() {
                            record = record.with_state(status.as_str());
                        }
                        if let Some(arn) = table.table_arn() {
                            record = record.with_arn(arn);
                        }
                        record = record.with_metadata(json!({
                            "item_count": table.item_count(),
                            "size_bytes": table.table_size_bytes(),
                        }));
                    }
                }
                Err(err) => {
                    debug!(table = %name, error = %err, "describe_table failed, keeping bare record");
                }
            }
            records.push(record);
        }

        Ok(records)
    }
}
