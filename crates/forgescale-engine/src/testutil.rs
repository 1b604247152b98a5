//! Scripted port doubles for planner and engine tests.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;

use forgescale_cluster::{
    AgentDescriptor, Cluster, ClusterError, ClusterSnapshot, GroupInstance, NodeId, HEALTHY,
};
use forgescale_queue::{BuildQueue, QueueError, Stage};

/// One recorded port operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Snapshot,
    Describe(Vec<NodeId>),
    Add(u32),
    Destroy(Vec<NodeId>),
    Fetch,
    Pause,
    Resume,
}

/// Shared, ordered record of every port operation in one test.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

pub struct FakeQueue {
    journal: Journal,
    pub stages: Vec<Stage>,
    pub fail_fetch: bool,
    pub fail_pause: bool,
    pub fail_resume: bool,
}

impl FakeQueue {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            stages: Vec::new(),
            fail_fetch: false,
            fail_pause: false,
            fail_resume: false,
        }
    }

    pub fn stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }
}

#[async_trait]
impl BuildQueue for FakeQueue {
    async fn fetch(&self) -> Result<Vec<Stage>, QueueError> {
        self.journal.record(Call::Fetch);
        if self.fail_fetch {
            return Err(QueueError::Unavailable("scripted fetch failure".into()));
        }
        Ok(self.stages.clone())
    }

    async fn pause(&self) -> Result<(), QueueError> {
        self.journal.record(Call::Pause);
        if self.fail_pause {
            return Err(QueueError::Unavailable("scripted pause failure".into()));
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), QueueError> {
        self.journal.record(Call::Resume);
        if self.fail_resume {
            return Err(QueueError::Unavailable("scripted resume failure".into()));
        }
        Ok(())
    }
}

pub struct FakeCluster {
    journal: Journal,
    pub snapshot: ClusterSnapshot,
    pub descriptors: Vec<AgentDescriptor>,
    pub fail_snapshot: bool,
    pub fail_add: bool,
    pub fail_destroy: bool,
}

impl FakeCluster {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            snapshot: ClusterSnapshot {
                desired_capacity: 0,
                instances: Vec::new(),
            },
            descriptors: Vec::new(),
            fail_snapshot: false,
            fail_add: false,
            fail_destroy: false,
        }
    }

    /// A reconciled group of healthy instances.
    pub fn healthy_agents(mut self, ids: &[&str]) -> Self {
        self.snapshot = ClusterSnapshot {
            desired_capacity: ids.len() as u32,
            instances: ids
                .iter()
                .map(|id| GroupInstance {
                    id: NodeId::from(*id),
                    health_status: HEALTHY.to_string(),
                })
                .collect(),
        };
        self
    }

    pub fn descriptors(mut self, agents: &[(&str, SystemTime)]) -> Self {
        self.descriptors = agents
            .iter()
            .map(|(id, launch_time)| AgentDescriptor {
                id: NodeId::from(*id),
                launch_time: *launch_time,
            })
            .collect();
        self
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn snapshot(&self) -> Result<ClusterSnapshot, ClusterError> {
        self.journal.record(Call::Snapshot);
        if self.fail_snapshot {
            return Err(ClusterError::Unavailable("scripted snapshot failure".into()));
        }
        Ok(self.snapshot.clone())
    }

    async fn describe(&self, ids: &[NodeId]) -> Result<Vec<AgentDescriptor>, ClusterError> {
        self.journal.record(Call::Describe(ids.to_vec()));
        Ok(self
            .descriptors
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn add(&self, count: u32) -> Result<(), ClusterError> {
        self.journal.record(Call::Add(count));
        if self.fail_add {
            return Err(ClusterError::Unavailable("scripted add failure".into()));
        }
        Ok(())
    }

    async fn destroy(&self, ids: &[NodeId]) -> Result<(), ClusterError> {
        self.journal.record(Call::Destroy(ids.to_vec()));
        if self.fail_destroy {
            return Err(ClusterError::Unavailable("scripted destroy failure".into()));
        }
        Ok(())
    }
}
