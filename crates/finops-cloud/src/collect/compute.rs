//! Compute-side collectors: EC2, Auto Scaling, Lambda, Elastic Beanstalk

use super::Collect;
use crate::credentials::AwsSession;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use finops_core::model::ResourceRecord;
use serde_json::json;
use std::collections::BTreeMap;

fn to_utc(dt: &aws_sdk_ec2::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(dt.secs(), 0)
}

/// EC2 instance inventory
pub struct Ec2Collector {
    client: aws_sdk_ec2::Client,
}

impl Ec2Collector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.ec2(),
        }
    }
}

#[async_trait]
impl Collect for Ec2Collector {
    fn service(&self) -> &'static str {
        "EC2"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.describe_instances().into_paginator().send();

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
                    let name = tags.get("Name").cloned();

                    let mut record = ResourceRecord::new(id, "EC2").with_metadata(json!({
                        "availability_zone": instance
                            .placement()
                            .and_then(|p| p.availability_zone()),
                        "launch_time": instance.launch_time().and_then(to_utc),
                        "private_ip": instance.private_ip_address(),
                        "public_ip": instance.public_ip_address(),
                    }));
                    if let Some(instance_type) = instance.instance_type() {
                        record = record.with_type(instance_type.as_str());
                    }
                    if let Some(state) = instance.state().and_then(|s| s.name()) {
                        record = record.with_state(state.as_str());
                    }
                    if let Some(name) = name {
                        record = record.with_name(name);
                    }
                    records.push(record.with_tags(tags));
                }
            }
        }

        Ok(records)
    }
}

/// Auto Scaling group inventory
pub struct AutoScalingCollector {
    client: aws_sdk_autoscaling::Client,
}

impl AutoScalingCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.autoscaling(),
        }
    }
}

#[async_trait]
impl Collect for AutoScalingCollector {
    fn service(&self) -> &'static str {
        "AutoScaling"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self
            .client
            .describe_auto_scaling_groups()
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("AutoScaling", e))?;
            for group in page.auto_scaling_groups() {
                let name = group.auto_scaling_group_name().to_string();
                let mut record = ResourceRecord::new(&name, "AutoScaling")
                    .with_type("auto-scaling-group")
                    .with_name(&name)
                    .with_state("active")
                    .with_metadata(json!({
                        "min_size": group.min_size(),
                        "max_size": group.max_size(),
                        "desired_capacity": group.desired_capacity(),
                        "instance_count": group.instances().len(),
                    }));
                if let Some(arn) = group.auto_scaling_group_arn() {
                    record = record.with_arn(arn);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// Lambda function inventory
pub struct LambdaCollector {
    client: aws_sdk_lambda::Client,
}

impl LambdaCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.lambda(),
        }
    }
}

#[async_trait]
impl Collect for LambdaCollector {
    fn service(&self) -> &'static str {
        "Lambda"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.list_functions().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("Lambda", e))?;
            for function in page.functions() {
                let Some(name) = function.function_name() else {
                    continue;
                };
                let mut record = ResourceRecord::new(name, "Lambda")
                    .with_type("function")
                    .with_name(name)
                    .with_state("active")
                    .with_metadata(json!({
                        "runtime": function.runtime().map(|r| r.as_str()),
                        "memory_mb": function.memory_size(),
                        "timeout_sec": function.timeout(),
                        "last_modified": function.last_modified(),
                    }));
                if let Some(arn) = function.function_arn() {
                    record = record.with_arn(arn);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// Elastic Beanstalk application and environment inventory
pub struct ElasticBeanstalkCollector {
    client: aws_sdk_elasticbeanstalk::Client,
}

impl ElasticBeanstalkCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.elasticbeanstalk(),
        }
    }
}

#[async_trait]
impl Collect for ElasticBeanstalkCollector {
    fn service(&self) -> &'static str {
        "ElasticBeanstalk"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        let applications = self
            .client
            .describe_applications()
            .send()
            .await
            .map_err(|e| CloudError::api("ElasticBeanstalk", e))?;
        for application in applications.applications() {
            let Some(name) = application.application_name() else {
                continue;
            };
            let mut record = ResourceRecord::new(name, "ElasticBeanstalk")
                .with_type("application")
                .with_name(name)
                .with_metadata(json!({
                    "description": application.description(),
                }));
            if let Some(arn) = application.application_arn() {
                record = record.with_arn(arn);
            }
            records.push(record);
        }

        let environments = self
            .client
            .describe_environments()
            .send()
            .await
            .map_err(|e| CloudError::api("ElasticBeanstalk", e))?;
        for environment in environments.environments() {
            let Some(name) = environment.environment_name() else {
                continue;
            };
            let mut record = ResourceRecord::new(name, "ElasticBeanstalk")
                .with_type("environment")
                .with_name(name)
                .with_metadata(json!({
                    "application": environment.application_name(),
                    "health": environment.health().map(|h| h.as_str()),
                }));
            if let Some(status) = environment.status() {
                record = record.with_state(status.as_str());
            }
            if let Some(arn) = environment.environment_arn() {
                record = record.with_arn(arn);
            }
            records.push(record);
        }

        Ok(records)
    }
}
