//! In-memory elastic group for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::{
    AgentDescriptor, Cluster, ClusterError, ClusterSnapshot, GroupInstance, NodeId, HEALTHY,
};

struct GroupState {
    desired_capacity: u32,
    instances: Vec<GroupInstance>,
    launch_times: HashMap<NodeId, SystemTime>,
    destroyed: Vec<NodeId>,
    spawned: u32,
}

/// An in-memory [`Cluster`] modeling desired capacity, roster, and launch
/// times.
///
/// `add` only raises desired capacity, like the real provider; call
/// [`MemCluster::reconcile`] to materialize the pending instances.
/// `destroy` removes instances and decrements desired capacity in one
/// step.
pub struct MemCluster {
    state: Mutex<GroupState>,
}

impl MemCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GroupState {
                desired_capacity: 0,
                instances: Vec::new(),
                launch_times: HashMap::new(),
                destroyed: Vec::new(),
                spawned: 0,
            }),
        }
    }

    /// A reconciled group of healthy agents with the given launch times.
    pub fn with_agents(agents: &[(&str, SystemTime)]) -> Self {
        let cluster = Self::new();
        for (id, launch_time) in agents {
            cluster.push_instance(id, HEALTHY, *launch_time);
        }
        cluster.set_desired_capacity(agents.len() as u32);
        cluster
    }

    /// Append an instance without touching desired capacity.
    pub fn push_instance(&self, id: &str, health_status: &str, launch_time: SystemTime) {
        let mut state = self.state.lock().unwrap();
        let id = NodeId::from(id);
        state.instances.push(GroupInstance {
            id: id.clone(),
            health_status: health_status.to_string(),
        });
        state.launch_times.insert(id, launch_time);
    }

    pub fn set_desired_capacity(&self, desired: u32) {
        self.state.lock().unwrap().desired_capacity = desired;
    }

    pub fn desired_capacity(&self) -> u32 {
        self.state.lock().unwrap().desired_capacity
    }

    pub fn instance_ids(&self) -> Vec<NodeId> {
        self.state
            .lock()
            .unwrap()
            .instances
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    /// Instances destroyed so far, in destruction order.
    pub fn destroyed(&self) -> Vec<NodeId> {
        self.state.lock().unwrap().destroyed.clone()
    }

    /// Materialize pending capacity: spawn healthy instances with the given
    /// launch time until the roster matches desired capacity.
    pub fn reconcile(&self, launch_time: SystemTime) {
        let mut state = self.state.lock().unwrap();
        while state.instances.len() < state.desired_capacity as usize {
            state.spawned += 1;
            let id = NodeId::from(format!("i-mem-{}", state.spawned));
            state.instances.push(GroupInstance {
                id: id.clone(),
                health_status: HEALTHY.to_string(),
            });
            state.launch_times.insert(id, launch_time);
        }
    }
}

impl Default for MemCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cluster for MemCluster {
    async fn snapshot(&self) -> Result<ClusterSnapshot, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(ClusterSnapshot {
            desired_capacity: state.desired_capacity,
            instances: state.instances.clone(),
        })
    }

    async fn describe(&self, ids: &[NodeId]) -> Result<Vec<AgentDescriptor>, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                state.launch_times.get(id).map(|launch_time| AgentDescriptor {
                    id: id.clone(),
                    launch_time: *launch_time,
                })
            })
            .collect())
    }

    async fn add(&self, count: u32) -> Result<(), ClusterError> {
        self.state.lock().unwrap().desired_capacity += count;
        Ok(())
    }

    async fn destroy(&self, ids: &[NodeId]) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        for id in ids {
            let Some(pos) = state.instances.iter().position(|i| &i.id == id) else {
                continue;
            };
            state.instances.remove(pos);
            state.launch_times.remove(id);
            state.desired_capacity = state.desired_capacity.saturating_sub(1);
            state.destroyed.push(id.clone());
        }
        Ok(())
    }
}
