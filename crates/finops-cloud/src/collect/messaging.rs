//! Messaging collectors: SNS, SQS

use super::Collect;
use crate::credentials::AwsSession;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use aws_sdk_sqs::types::QueueAttributeName;
use finops_core::model::ResourceRecord;
use serde_json::json;
use tracing::debug;

/// SNS topic inventory
pub struct SnsCollector {
    client: aws_sdk_sns::Client,
}

impl SnsCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.sns(),
        }
    }
}

#[async_trait]
impl Collect for SnsCollector {
    fn service(&self) -> &'static str {
        "SNS"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.list_topics().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("SNS", e))?;
            for topic in page.topics() {
                let Some(arn) = topic.topic_arn() else {
                    continue;
                };
                let name = arn.rsplit(':').next().unwrap_or(arn);
                records.push(
                    ResourceRecord::new(arn, "SNS")
                        .with_type("topic")
                        .with_name(name)
                        .with_arn(arn)
                        .with_metadata(serde_json::Value::Null),
                );
            }
        }

        Ok(records)
    }
}

/// SQS queue inventory
pub struct SqsCollector {
    client: aws_sdk_sqs::Client,
}

impl SqsCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.sqs(),
        }
    }

    /// Queue attributes are enrichment; failures leave the metadata empty
    async fn queue_metadata(&self, url: &str) -> serde_json::Value {
        match self
            .client
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
        {
            Ok(output) => {
                let attributes = output.attributes();
                let messages = attributes
                    .and_then(|a| a.get(&QueueAttributeName::ApproximateNumberOfMessages))
                    .and_then(|v| v.parse::<i64>().ok());
                json!({ "approximate_number_of_messages": messages })
            }
            Err(err) => {
                debug!(queue = url, error = %err, "queue attribute lookup failed");
                serde_json::Value::Null
            }
        }
    }
}

#[async_trait]
impl Collect for SqsCollector {
    fn service(&self) -> &'static str {
        "SQS"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut urls = Vec::new();
        let mut pages = self.client.list_queues().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("SQS", e))?;
            urls.extend(page.queue_urls().iter().cloned());
        }

        let mut records = Vec::new();
        for url in urls {
            let name = url.rsplit('/').next().unwrap_or(&url).to_string();
            let metadata = self.queue_metadata(&url).await;
            records.push(
                ResourceRecord::new(&url, "SQS")
                    .with_type("queue")
                    .with_name(name)
                    .with_metadata(metadata),
            );
        }

        Ok(records)
    }
}
