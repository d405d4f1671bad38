//! Network-side collectors: ELB, CloudFront, VPC, Route53

use super::Collect;
use crate::credentials::AwsSession;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use finops_core::model::ResourceRecord;
use serde_json::json;

/// Load balancer and target group inventory
pub struct ElbCollector {
    client: aws_sdk_elasticloadbalancingv2::Client,
}

impl ElbCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.elbv2(),
        }
    }
}

#[async_trait]
impl Collect for ElbCollector {
    fn service(&self) -> &'static str {
        "ELB"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        let mut pages = self.client.describe_load_balancers().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("ELB", e))?;
            for lb in page.load_balancers() {
                let Some(name) = lb.load_balancer_name() else {
                    continue;
                };
                let mut record = ResourceRecord::new(name, "ELB")
                    .with_name(name)
                    .with_metadata(json!({
                        "scheme": lb.scheme().map(|s| s.as_str()),
                        "vpc_id": lb.vpc_id(),
                        "dns_name": lb.dns_name(),
                    }));
                if let Some(lb_type) = lb.r#type() {
                    record = record.with_type(lb_type.as_str());
                }
                if let Some(code) = lb.state().and_then(|s| s.code()) {
                    record = record.with_state(code.as_str());
                }
                if let Some(arn) = lb.load_balancer_arn() {
                    record = record.with_arn(arn);
                }
                records.push(record);
            }
        }

        let mut pages = self.client.describe_target_groups().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("ELB", e))?;
            for group in page.target_groups() {
                let Some(name) = group.target_group_name() else {
                    continue;
                };
                let mut record = ResourceRecord::new(name, "ELB")
                    .with_type("target-group")
                    .with_name(name)
                    .with_metadata(json!({
                        "protocol": group.protocol().map(|p| p.as_str()),
                        "port": group.port(),
                        "vpc_id": group.vpc_id(),
                    }));
                if let Some(arn) = group.target_group_arn() {
                    record = record.with_arn(arn);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// CloudFront distribution inventory
pub struct CloudFrontCollector {
    client: aws_sdk_cloudfront::Client,
}

impl CloudFrontCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.cloudfront(),
        }
    }
}

#[async_trait]
impl Collect for CloudFrontCollector {
    fn service(&self) -> &'static str {
        "CloudFront"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.list_distributions().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("CloudFront", e))?;
            let Some(list) = page.distribution_list() else {
                continue;
            };
            for distribution in list.items() {
                records.push(
                    ResourceRecord::new(distribution.id(), "CloudFront")
                        .with_type("distribution")
                        .with_name(distribution.domain_name())
                        .with_state(distribution.status())
                        .with_arn(distribution.arn())
                        .with_metadata(json!({
                            "enabled": distribution.enabled(),
                            "comment": distribution.comment(),
                        })),
                );
            }
        }

        Ok(records)
    }
}

/// VPC-scoped inventory: vpcs, subnets, security groups, NAT gateways,
/// internet gateways and elastic IPs, all emitted under `service = "VPC"`
pub struct VpcCollector {
    client: aws_sdk_ec2::Client,
}

impl VpcCollector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.ec2(),
        }
    }
}

#[async_trait]
impl Collect for VpcCollector {
    fn service(&self) -> &'static str {
        "VPC"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();

        let mut pages = self.client.describe_vpcs().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("VPC", e))?;
            for vpc in page.vpcs() {
                let Some(id) = vpc.vpc_id() else { continue };
                let mut record = ResourceRecord::new(id, "VPC")
                    .with_type("vpc")
                    .with_metadata(json!({
                        "cidr_block": vpc.cidr_block(),
                        "is_default": vpc.is_default(),
                    }));
                if let Some(state) = vpc.state() {
                    record = record.with_state(state.as_str());
                }
                records.push(record);
            }
        }

        let mut pages = self.client.describe_subnets().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("VPC", e))?;
            for subnet in page.subnets() {
                let Some(id) = subnet.subnet_id() else { continue };
                let mut record = ResourceRecord::new(id, "VPC")
                    .with_type("subnet")
                    .with_metadata(json!({
                        "cidr_block": subnet.cidr_block(),
                        "availability_zone": subnet.availability_zone(),
                        "vpc_id": subnet.vpc_id(),
                    }));
                if let Some(state) = subnet.state() {
                    record = record.with_state(state.as_str());
                }
                records.push(record);
            }
        }

        let mut pages = self.client.describe_security_groups().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("VPC", e))?;
            for group in page.security_groups() {
                let Some(id) = group.group_id() else { continue };
                let mut record = ResourceRecord::new(id, "VPC")
                    .with_type("security-group")
                    .with_metadata(json!({
                        "description": group.description(),
                        "vpc_id": group.vpc_id(),
                    }));
                if let Some(name) = group.group_name() {
                    record = record.with_name(name);
                }
                records.push(record);
            }
        }

        let mut pages = self.client.describe_nat_gateways().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("VPC", e))?;
            for gateway in page.nat_gateways() {
                let Some(id) = gateway.nat_gateway_id() else { continue };
                let mut record = ResourceRecord::new(id, "VPC")
                    .with_type("nat-gateway")
                    .with_metadata(json!({
                        "vpc_id": gateway.vpc_id(),
                        "subnet_id": gateway.subnet_id(),
                    }));
                if let Some(state) = gateway.state() {
                    record = record.with_state(state.as_str());
                }
                records.push(record);
            }
        }

        let mut pages = self.client.describe_internet_gateways().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("VPC", e))?;
            for gateway in page.internet_gateways() {
                let Some(id) = gateway.internet_gateway_id() else { continue };
                let state = gateway
                    .attachments()
                    .first()
                    .and_then(|a| a.state())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| "detached".to_string());
                records.push(
                    ResourceRecord::new(id, "VPC")
                        .with_type("internet-gateway")
                        .with_state(state)
                        .with_metadata(serde_json::Value::Null),
                );
            }
        }

        let addresses = self
            .client
            .describe_addresses()
            .send()
            .await
            .map_err(|e| CloudError::api("VPC", e))?;
        for address in addresses.addresses() {
            let Some(id) = address.allocation_id() else {
                continue;
            };
            let associated = address.association_id().is_some();
            let mut record = ResourceRecord::new(id, "VPC")
                .with_type("elastic-ip")
                .with_state(if associated { "associated" } else { "unassociated" })
                .with_metadata(json!({
                    "public_ip": address.public_ip(),
                    "instance_id": address.instance_id(),
                }));
            if let Some(ip) = address.public_ip() {
                record = record.with_name(ip);
            }
            records.push(record);
        }

        Ok(records)
    }
}

/// Route53 hosted zone inventory
pub struct Route53Collector {
    client: aws_sdk_route53::Client,
}

impl Route53Collector {
    /// Create the collector from a workspace session
    pub fn new(session: &AwsSession) -> Self {
        Self {
            client: session.route53(),
        }
    }
}

#[async_trait]
impl Collect for Route53Collector {
    fn service(&self) -> &'static str {
        "Route53"
    }

    async fn collect(&self) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut pages = self.client.list_hosted_zones().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| CloudError::api("Route53", e))?;
            for zone in page.hosted_zones() {
                records.push(
                    ResourceRecord::new(zone.id(), "Route53")
                        .with_type("hosted-zone")
                        .with_name(zone.name())
                        .with_metadata(json!({
                            "record_count": zone.resource_record_set_count(),
                            "private": zone.config().map(|c| c.private_zone()),
                        })),
                );
            }
        }

        Ok(records)
    }
}
