//! Inventory collection
//!
//! Sixteen per-service collectors produce metadata-rich
//! [`ResourceRecord`]s for the inventory, independent of the narrower
//! analysis capability set. The dispatcher fans them out in batches of
//! four so one workspace never hits the provider with more than four
//! concurrent sweeps.

use crate::credentials::AwsSession;
use crate::error::Result;
use async_trait::async_trait;
use finops_core::model::ResourceRecord;
use tracing::{debug, warn};

mod compute;
mod governance;
mod messaging;
mod network;
mod storage;

pub use compute::{AutoScalingCollector, Ec2Collector, ElasticBeanstalkCollector, LambdaCollector};
pub use governance::{CloudFormationCollector, IamCollector};
pub use messaging::{SnsCollector, SqsCollector};
pub use network::{CloudFrontCollector, ElbCollector, Route53Collector, VpcCollector};
pub use storage::{DynamoDbCollector, EbsCollector, RdsCollector, S3Collector};

/// How many collectors run concurrently within one sweep
pub const COLLECTOR_BATCH_SIZE: usize = 4;

/// One per-service inventory collector
#[async_trait]
pub trait Collect: Send + Sync {
    /// Service tag the records carry, also used in error strings
    fn service(&self) -> &'static str;

    /// Enumerate the service, preserving upstream order
    async fn collect(&self) -> Result<Vec<ResourceRecord>>;
}

/// Result of a full collector sweep
///
/// The sweep always completes: failed collectors contribute an error
/// string instead of aborting the others.
#[derive(Debug, Default)]
pub struct CollectionOutcome {
    /// Records from every collector that succeeded, in dispatch order
    pub records: Vec<ResourceRecord>,
    /// `"<Service>: <message>"` per failed collector
    pub errors: Vec<String>,
}

/// Fan collectors out in batches of [`COLLECTOR_BATCH_SIZE`]
///
/// Each batch is awaited in full before the next starts; merged output
/// preserves dispatch order across batches and upstream order within a
/// collector.
pub async fn run_collectors(collectors: Vec<Box<dyn Collect>>) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    let mut pending = collectors.into_iter();

    loop {
        let batch: Vec<_> = pending.by_ref().take(COLLECTOR_BATCH_SIZE).collect();
        if batch.is_empty() {
            break;
        }

        let results = futures::future::join_all(batch.into_iter().map(|collector| async move {
            let service = collector.service();
            (service, collector.collect().await)
        }))
        .await;

        for (service, result) in results {
            match result {
                Ok(mut records) => {
                    debug!(service, count = records.len(), "collector finished");
                    outcome.records.append(&mut records);
                }
                Err(err) => {
                    warn!(service, error = %err, "collector failed");
                    // Api errors already carry the service prefix
                    let line = match err {
                        crate::error::CloudError::Api { message, .. } => {
                            format!("{service}: {message}")
                        }
                        other => format!("{service}: {other}"),
                    };
                    outcome.errors.push(line);
                }
            }
        }
    }

    outcome
}

/// Build the sixteen live collectors for one workspace session
pub fn aws_collectors(session: &AwsSession) -> Vec<Box<dyn Collect>> {
    vec![
        Box::new(Ec2Collector::new(session)),
        Box::new(EbsCollector::new(session)),
        Box::new(S3Collector::new(session)),
        Box::new(RdsCollector::new(session)),
        Box::new(LambdaCollector::new(session)),
        Box::new(ElbCollector::new(session)),
        Box::new(CloudFrontCollector::new(session)),
        Box::new(VpcCollector::new(session)),
        Box::new(AutoScalingCollector::new(session)),
        Box::new(ElasticBeanstalkCollector::new(session)),
        Box::new(DynamoDbCollector::new(session)),
        Box::new(SnsCollector::new(session)),
        Box::new(SqsCollector::new(session)),
        Box::new(Route53Collector::new(session)),
        Box::new(IamCollector::new(session)),
        Box::new(CloudFormationCollector::new(session)),
    ]
}

/// A collector serving canned records, used by mock mode and tests
#[derive(Debug, Clone)]
pub struct FixtureCollector {
    service: &'static str,
    records: Vec<ResourceRecord>,
    fail_with: Option<String>,
}

impl FixtureCollector {
    /// A collector that succeeds with the given records
    pub fn new(service: &'static str, records: Vec<ResourceRecord>) -> Self {
        Self {
            service,
            records,
            fail_with: None,
        }
    }

    /// A collector that always fails with the given message
    pub fn failing(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            records: Vec::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl Collect for FixtureCollector {
    fn service(&self) -> &'static str {
        self.service
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        match &self.fail_with {
            Some(message) => Err(crate::error::CloudError::Api {
                service: self.service,
                message: message.clone(),
            }),
            None => Ok(self.records.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, service: &str) -> ResourceRecord {
        ResourceRecord::new(id, service)
    }

    #[tokio::test]
    async fn test_sweep_merges_in_dispatch_order() {
        let collectors: Vec<Box<dyn Collect>> = vec![
            Box::new(FixtureCollector::new(
                "EC2",
                vec![record("i-1", "EC2"), record("i-2", "EC2")],
            )),
            Box::new(FixtureCollector::new("EBS", vec![record("vol-1", "EBS")])),
            Box::new(FixtureCollector::new("S3", vec![record("bkt-1", "S3")])),
        ];

        let outcome = run_collectors(collectors).await;
        assert!(outcome.errors.is_empty());
        let ids: Vec<_> = outcome
            .records
            .iter()
            .map(|r| r.resource_id.as_str())
            .collect();
        assert_eq!(ids, vec!["i-1", "i-2", "vol-1", "bkt-1"]);
    }

    #[tokio::test]
    async fn test_failed_collector_does_not_abort_sweep() {
        let collectors: Vec<Box<dyn Collect>> = vec![
            Box::new(FixtureCollector::new("EC2", vec![record("i-1", "EC2")])),
            Box::new(FixtureCollector::failing("IAM", "access denied")),
            Box::new(FixtureCollector::new("SQS", vec![record("q-1", "SQS")])),
        ];

        let outcome = run_collectors(collectors).await;
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.errors, vec!["IAM: access denied".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_spans_multiple_batches() {
        let collectors: Vec<Box<dyn Collect>> = (0..9)
            .map(|i| {
                Box::new(FixtureCollector::new(
                    "EC2",
                    vec![record(&format!("r-{i}"), "EC2")],
                )) as Box<dyn Collect>
            })
            .collect();

        let outcome = run_collectors(collectors).await;
        assert_eq!(outcome.records.len(), 9);
        // Dispatch order survives batching
        assert_eq!(outcome.records[0].resource_id, "r-0");
        assert_eq!(outcome.records[8].resource_id, "r-8");
    }
}
