//! Agent cluster port.
//!
//! The pool of build agents is backed by an externally managed elastic
//! compute group. This crate defines the [`Cluster`] port the planner and
//! engine consume, the snapshot types derived from the group, and two
//! adapters: [`asg::AsgCluster`] over the AWS autoscaling group and
//! [`mem::MemCluster`] for tests.

pub mod asg;
mod error;
pub mod mem;

use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use asg::AsgCluster;
pub use error::ClusterError;
pub use mem::MemCluster;

/// Health status string the provider reports for a serviceable instance.
///
/// Anything else (including a draining or terminating state) removes the
/// instance from the roster.
pub const HEALTHY: &str = "Healthy";

/// Stable, opaque identifier of an agent instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One instance as reported by the elastic group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInstance {
    pub id: NodeId,
    pub health_status: String,
}

/// Point-in-time view of the elastic group.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    /// The group's target instance count.
    pub desired_capacity: u32,
    pub instances: Vec<GroupInstance>,
}

impl ClusterSnapshot {
    /// True when the group's actual instance count matches its target.
    pub fn reconciled(&self) -> bool {
        self.instances.len() == self.desired_capacity as usize
    }

    /// Ids of instances the provider reports as healthy, in group order.
    pub fn healthy_ids(&self) -> Vec<NodeId> {
        self.instances
            .iter()
            .filter(|i| i.health_status == HEALTHY)
            .map(|i| i.id.clone())
            .collect()
    }
}

/// Provider detail for one agent instance.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub id: NodeId,
    pub launch_time: SystemTime,
}

/// Port over the elastic compute group backing the agent pool.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Inspect the group.
    async fn snapshot(&self) -> Result<ClusterSnapshot, ClusterError>;

    /// Describe the given instances. Unknown ids may be silently omitted
    /// from the result.
    async fn describe(&self, ids: &[NodeId]) -> Result<Vec<AgentDescriptor>, ClusterError>;

    /// Raise the group's desired capacity by `count`. The provider creates
    /// the instances asynchronously.
    async fn add(&self, count: u32) -> Result<(), ClusterError>;

    /// Detach the given instances from the group, decrementing desired
    /// capacity, then terminate them.
    async fn destroy(&self, ids: &[NodeId]) -> Result<(), ClusterError>;

    /// Ids of healthy agents, in group order.
    async fn list_healthy(&self) -> Result<Vec<NodeId>, ClusterError> {
        Ok(self.snapshot().await?.healthy_ids())
    }

    /// True while the group's instance count differs from its desired
    /// capacity, i.e. a previous scaling action has not yet materialized.
    async fn scaling_in_progress(&self) -> Result<bool, ClusterError> {
        Ok(!self.snapshot().await?.reconciled())
    }
}
