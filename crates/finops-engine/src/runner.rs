//! Per-workspace job lifecycle
//!
//! One `process_workspace` call is one JobRun row: open it, run the
//! inventory sync (failures tolerated), run the analysis path (failures
//! fatal), persist recommendations, close the run either way.

use crate::error::Result;
use crate::sync::{self, SyncOutcome};
use chrono::Utc;
use finops_cloud::{ClientFactory, CloudClient};
use finops_core::analyzers::{self, AnalysisSnapshot};
use finops_core::model::{ResourceRecord, Workspace, WorkspaceStatus};
use finops_core::pricing;
use finops_db::{DbPool, JobRunRepo, RecommendationRepo, ResourceRepo, WorkspaceRepo};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the engine for one workspace at a time
pub struct JobRunner {
    workspaces: WorkspaceRepo,
    resources: ResourceRepo,
    recommendations: RecommendationRepo,
    job_runs: JobRunRepo,
    factory: Arc<dyn ClientFactory>,
}

impl JobRunner {
    /// Create a runner over the given pool and cloud factory
    pub fn new(pool: DbPool, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            workspaces: WorkspaceRepo::new(pool.clone()),
            resources: ResourceRepo::new(pool.clone()),
            recommendations: RecommendationRepo::new(pool.clone()),
            job_runs: JobRunRepo::new(pool),
            factory,
        }
    }

    /// Run one job for one workspace
    ///
    /// A missing workspace logs and returns without writing a JobRun.
    /// Job-level failures are recorded on the JobRun and do not surface as
    /// errors here; only persistence breakdowns around the run bookkeeping
    /// do.
    pub async fn process_workspace(&self, workspace_id: &str) -> Result<()> {
        let Some(workspace) = self.workspaces.get(workspace_id).await? else {
            warn!(target: "engine", workspace = workspace_id, "workspace not found, skipping");
            return Ok(());
        };

        let job_id = self.job_runs.start(&workspace.id).await?;
        info!(target: "engine", workspace = %workspace.id, job = %job_id, "job started");

        match self.run_job(&workspace).await {
            Ok(found) => {
                self.workspaces
                    .update_status(&workspace.id, WorkspaceStatus::Connected)
                    .await?;
                self.job_runs.complete(&job_id, found).await?;
                info!(
                    target: "engine",
                    workspace = %workspace.id,
                    job = %job_id,
                    recommendations = found,
                    "job completed"
                );
            }
            Err(err) => {
                let message = err.to_string();
                warn!(
                    target: "engine",
                    workspace = %workspace.id,
                    job = %job_id,
                    error = %message,
                    "job failed"
                );
                self.job_runs.fail(&job_id, &message).await?;
            }
        }

        Ok(())
    }

    /// Everything between opening and closing the JobRun
    async fn run_job(&self, workspace: &Workspace) -> Result<i64> {
        // A connect failure (credentials, role assumption) is fatal
        let cloud = self.factory.connect(workspace).await?;

        // Inventory sync is best-effort: a top-level failure is a warning
        match sync::sync_resources(&self.resources, workspace, cloud.collectors).await {
            Ok(SyncOutcome { .. }) => {}
            Err(err) => {
                warn!(
                    target: "engine",
                    workspace = %workspace.id,
                    error = %err,
                    "inventory sync failed, continuing with analysis"
                );
            }
        }

        // Analysis path: concurrent lists, then metrics, then analyzers
        let snapshot = fetch_snapshot(cloud.client.as_ref()).await?;
        let now = Utc::now();
        let drafts = analyzers::analyze(&snapshot, now);

        self.upsert_analysis_costs(workspace, &snapshot).await;

        let mut found = 0i64;
        for draft in &drafts {
            match self.recommendations.upsert(&workspace.id, draft).await {
                Ok(()) => found += 1,
                Err(err) => {
                    warn!(
                        target: "engine",
                        workspace = %workspace.id,
                        resource = %draft.resource_id,
                        rec_type = %draft.rec_type,
                        error = %err,
                        "recommendation upsert failed, skipping"
                    );
                }
            }
        }

        Ok(found)
    }

    /// Land per-resource monthly cost estimates from the analysis snapshot
    ///
    /// Narrow writes: cost, state and observation time only, so the
    /// inventory collectors stay the source of truth for metadata. Upsert
    /// failures are logged and skipped.
    async fn upsert_analysis_costs(&self, workspace: &Workspace, snapshot: &AnalysisSnapshot) {
        let now = Utc::now();
        let mut records: Vec<ResourceRecord> = Vec::new();

        for instance in &snapshot.ec2_instances {
            let mut record = ResourceRecord::new(&instance.instance_id, "EC2")
                .with_type(&instance.instance_type)
                .with_state(&instance.state)
                .with_cost(pricing::ec2_monthly_cost(instance));
            if let Some(name) = &instance.name {
                record = record.with_name(name);
            }
            records.push(record);
        }
        for volume in &snapshot.ebs_volumes {
            records.push(
                ResourceRecord::new(&volume.volume_id, "EBS")
                    .with_type(&volume.volume_type)
                    .with_state(&volume.state)
                    .with_cost(pricing::ebs_monthly_cost(&volume.volume_type, volume.size_gib)),
            );
        }
        for bucket in &snapshot.s3_buckets {
            records.push(
                ResourceRecord::new(&bucket.name, "S3")
                    .with_type("bucket")
                    .with_name(&bucket.name)
                    .with_state("available")
                    .with_cost(pricing::s3_monthly_cost(bucket)),
            );
        }
        for instance in &snapshot.rds_instances {
            records.push(
                ResourceRecord::new(&instance.instance_id, "RDS")
                    .with_type(&instance.instance_class)
                    .with_name(&instance.instance_id)
                    .with_state(&instance.status)
                    .with_cost(pricing::rds_monthly_cost(instance)),
            );
        }
        for function in &snapshot.lambda_functions {
            records.push(
                ResourceRecord::new(&function.function_name, "Lambda")
                    .with_type("function")
                    .with_name(&function.function_name)
                    .with_state("active")
                    .with_cost(pricing::lambda_monthly_cost(function)),
            );
        }
        for lb in &snapshot.load_balancers {
            records.push(
                ResourceRecord::new(&lb.name, "ELB")
                    .with_type(&lb.lb_type)
                    .with_name(&lb.name)
                    .with_state(&lb.state)
                    .with_cost(pricing::load_balancer_monthly_cost(lb)),
            );
        }
        for gateway in &snapshot.nat_gateways {
            let daily_gb = gateway.bytes_processed_per_day.max(0.0) / pricing::BYTES_PER_GB;
            records.push(
                ResourceRecord::new(&gateway.nat_gateway_id, "VPC")
                    .with_type("nat-gateway")
                    .with_state(&gateway.state)
                    .with_cost(pricing::nat_gateway_monthly_cost(daily_gb)),
            );
        }
        for eip in &snapshot.elastic_ips {
            records.push(
                ResourceRecord::new(&eip.allocation_id, "VPC")
                    .with_type("elastic-ip")
                    .with_name(&eip.public_ip)
                    .with_state(if eip.association_id.is_some() {
                        "associated"
                    } else {
                        "unassociated"
                    })
                    .with_cost(pricing::elastic_ip_monthly_cost(eip)),
            );
        }

        for record in &records {
            if let Err(err) = self
                .resources
                .upsert_observation(&workspace.id, record, now)
                .await
            {
                warn!(
                    target: "engine",
                    workspace = %workspace.id,
                    resource = %record.resource_id,
                    error = %err,
                    "cost upsert failed, skipping"
                );
            }
        }
    }
}

/// Launch the eight list calls concurrently, then fetch CPU metrics for
/// the discovered EC2 ids
async fn fetch_snapshot(client: &dyn CloudClient) -> Result<AnalysisSnapshot> {
    let (ec2, ebs, s3, rds, lambda, elb, nat, eip) = tokio::join!(
        client.list_ec2_instances(),
        client.list_ebs_volumes(),
        client.list_s3_buckets(),
        client.list_rds_instances(),
        client.list_lambda_functions(),
        client.list_load_balancers(),
        client.list_nat_gateways(),
        client.list_elastic_ips(),
    );

    let ec2_instances = ec2?;
    let instance_ids: Vec<String> = ec2_instances
        .iter()
        .map(|i| i.instance_id.clone())
        .collect();
    let cpu_metrics = client.get_ec2_cpu_metrics(&instance_ids).await?;

    Ok(AnalysisSnapshot {
        ec2_instances,
        cpu_metrics,
        ebs_volumes: ebs?,
        s3_buckets: s3?,
        rds_instances: rds?,
        lambda_functions: lambda?,
        load_balancers: elb?,
        nat_gateways: nat?,
        elastic_ips: eip?,
    })
}
