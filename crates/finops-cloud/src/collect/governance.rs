//! Account governance collectors: IAM, CloudFormation

use super::Collect;
use crate::credentials::AwsSession;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use aws_sdk_cloudformation::types::StackStatus;
use aws_sdk_iam::types::PolicyScopeType;
use finops_core::model::ResourceRecord;
use serde_json::json;

/// Upper bound on enumerated IAM roles; large accounts carry thousands
pub const IAM_ROLE_LIMIT: usize = 200;

/// IAM role, user and customer-managed-policy inventory
pub struct IamCollector {
    client: aws_sdk_iam::Client,
}

impl IamCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.iam(),
        }
    }
}

#[async_trait]
impl Collect for IamCollector {
    fn service(&self) -> &'static str {
        "IAM"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        let mut pages = self.client.list_roles().into_paginator().send();
        'roles: while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("IAM", e))?;
            for role in page.roles() {
                if records.len() >= IAM_ROLE_LIMIT {
                    break 'roles;
                }
                records.push(
                    ResourceRecord::new(role.role_name(), "IAM")
                        .with_type("role")
                        .with_name(role.role_name())
                        .with_arn(role.arn())
                        .with_metadata(json!({ "path": role.path() })),
                );
            }
        }

        let mut pages = self.client.list_users().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("IAM", e))?;
            for user in page.users() {
                records.push(
                    ResourceRecord::new(user.user_name(), "IAM")
                        .with_type("user")
                        .with_name(user.user_name())
                        .with_arn(user.arn())
                        .with_metadata(json!({ "path": user.path() })),
                );
            }
        }

        let mut pages = self
            .client
            .list_policies()
            .scope(PolicyScopeType::Local)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("IAM", e))?;
            for policy in page.policies() {
                let Some(name) = policy.policy_name() else {
                    continue;
                };
                let mut record = ResourceRecord::new(name, "IAM")
                    .with_type("policy")
                    .with_name(name)
                    .with_metadata(json!({
                        "attachment_count": policy.attachment_count(),
                    }));
                if let Some(arn) = policy.arn() {
                    record = record.with_arn(arn);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// CloudFormation stack inventory, deleted stacks excluded
pub struct CloudFormationCollector {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.cloudformation(),
        }
    }
}

#[async_trait]
impl Collect for CloudFormationCollector {
    fn service(&self) -> &'static str {
        "CloudFormation"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.describe_stacks().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("CloudFormation", e))?;
            for stack in page.stacks() {
                let status = stack.stack_status();
                if *status == StackStatus::DeleteComplete {
                    continue;
                }
                let name = stack.stack_name();
                let mut record = ResourceRecord::new(name, "CloudFormation")
                    .with_type("stack")
                    .with_name(name)
                    .with_state(status.as_str())
                    .with_metadata(json!({ "description": stack.description() }));
                if let Some(id) = stack.stack_id() {
                    record = record.with_arn(id);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}
