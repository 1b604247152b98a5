//! AWS autoscaling group adapter.

use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use tracing::{debug, info, warn};

use crate::{
    AgentDescriptor, Cluster, ClusterError, ClusterSnapshot, GroupInstance, NodeId,
};

/// Production [`Cluster`] adapter over an AWS autoscaling group.
pub struct AsgCluster {
    asg: aws_sdk_autoscaling::Client,
    ec2: aws_sdk_ec2::Client,
    group_name: String,
}

impl AsgCluster {
    /// Build clients from the ambient AWS environment (region, credentials).
    pub async fn from_env(group_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(&config, group_name)
    }

    pub fn new(config: &aws_config::SdkConfig, group_name: impl Into<String>) -> Self {
        Self {
            asg: aws_sdk_autoscaling::Client::new(config),
            ec2: aws_sdk_ec2::Client::new(config),
            group_name: group_name.into(),
        }
    }

    async fn describe_group(
        &self,
    ) -> Result<aws_sdk_autoscaling::types::AutoScalingGroup, ClusterError> {
        let output = self
            .asg
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(&self.group_name)
            .send()
            .await
            .map_err(|e| ClusterError::Provider(DisplayErrorContext(e).to_string()))?;

        output
            .auto_scaling_groups()
            .first()
            .cloned()
            .ok_or_else(|| ClusterError::GroupNotFound(self.group_name.clone()))
    }
}

#[async_trait]
impl Cluster for AsgCluster {
    async fn snapshot(&self) -> Result<ClusterSnapshot, ClusterError> {
        let group = self.describe_group().await?;
        let instances = group
            .instances()
            .iter()
            .filter_map(|i| {
                let id = i.instance_id()?;
                Some(GroupInstance {
                    id: NodeId::from(id),
                    health_status: i.health_status().unwrap_or_default().to_string(),
                })
            })
            .collect();

        Ok(ClusterSnapshot {
            desired_capacity: group.desired_capacity().unwrap_or(0).max(0) as u32,
            instances,
        })
    }

    async fn describe(&self, ids: &[NodeId]) -> Result<Vec<AgentDescriptor>, ClusterError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let output = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(ids.iter().map(|id| id.to_string()).collect()))
            .send()
            .await
            .map_err(|e| ClusterError::Provider(DisplayErrorContext(e).to_string()))?;

        let mut agents = Vec::new();
        for reservation in output.reservations() {
            for instance in reservation.instances() {
                let Some(id) = instance.instance_id() else {
                    continue;
                };
                let Some(launch_time) = instance.launch_time() else {
                    continue;
                };
                agents.push(AgentDescriptor {
                    id: NodeId::from(id),
                    launch_time: UNIX_EPOCH + Duration::from_secs(launch_time.secs().max(0) as u64),
                });
            }
        }
        Ok(agents)
    }

    async fn add(&self, count: u32) -> Result<(), ClusterError> {
        let group = self.describe_group().await?;
        let current = group.desired_capacity().unwrap_or(0).max(0);
        let desired = current + count as i32;

        info!(
            old = current,
            new = desired,
            "updating desired capacity of agent autoscaling group"
        );
        self.asg
            .set_desired_capacity()
            .auto_scaling_group_name(&self.group_name)
            .desired_capacity(desired)
            .send()
            .await
            .map_err(|e| ClusterError::Provider(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }

    async fn destroy(&self, ids: &[NodeId]) -> Result<(), ClusterError> {
        if ids.is_empty() {
            return Ok(());
        }
        let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

        debug!(ids = ?id_strings, "detaching agent nodes from autoscaling group");
        self.asg
            .detach_instances()
            .auto_scaling_group_name(&self.group_name)
            .set_instance_ids(Some(id_strings.clone()))
            .should_decrement_desired_capacity(true)
            .send()
            .await
            .map_err(|e| ClusterError::Provider(DisplayErrorContext(e).to_string()))?;

        // Detachment already shrank the group; a termination failure must
        // surface without rolling that back.
        debug!(ids = ?id_strings, "terminating detached agent nodes");
        if let Err(e) = self
            .ec2
            .terminate_instances()
            .set_instance_ids(Some(id_strings))
            .send()
            .await
        {
            let message = DisplayErrorContext(e).to_string();
            warn!(error = %message, "instances detached but termination failed");
            return Err(ClusterError::Terminate(message));
        }
        Ok(())
    }
}
