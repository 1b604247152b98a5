//! The planner: a pure decision function over the two ports.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use forgescale_cluster::{Cluster, NodeId};
use forgescale_queue::{BuildQueue, Stage};

use crate::{Plan, PlanError};

/// Sizing rules the planner applies.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Builds one agent can run concurrently.
    pub max_builds: u32,
    /// Floor on the healthy agent count.
    pub min_count: u32,
    /// Minimum lifetime before an idle agent may be destroyed.
    pub min_retirement_age: Duration,
    /// Ignore pending stages older than this. `None` means no cap.
    pub pending_max_duration: Option<Duration>,
    /// Ignore running stages older than this. `None` means no cap.
    pub running_max_duration: Option<Duration>,
}

impl From<&forge_core::Config> for PlannerConfig {
    fn from(config: &forge_core::Config) -> Self {
        Self {
            max_builds: config.agent.max_builds,
            min_count: config.agent.min_count,
            min_retirement_age: config.agent.min_retirement_age,
            pending_max_duration: config.build.pending_max_duration,
            running_max_duration: config.build.running_max_duration,
        }
    }
}

/// Decides, once per tick, whether the agent pool must grow or shrink.
///
/// The planner holds no state between invocations; [`Planner::plan`] is a
/// function of the port responses, the sizing rules, and the caller's
/// `now`.
pub struct Planner {
    queue: Arc<dyn BuildQueue>,
    cluster: Arc<dyn Cluster>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(
        config: PlannerConfig,
        queue: Arc<dyn BuildQueue>,
        cluster: Arc<dyn Cluster>,
    ) -> Self {
        Self {
            queue,
            cluster,
            config,
        }
    }

    /// Produce the scaling plan for the current snapshot of the world.
    pub async fn plan(&self, now: SystemTime) -> Result<Plan, PlanError> {
        // Let the elastic group settle before acting again; deciding on an
        // unreconciled group would double-count the previous tick.
        if self.cluster.scaling_in_progress().await? {
            debug!("cluster has a scaling activity in progress");
            return Ok(Plan::Noop);
        }

        let healthy = self.cluster.list_healthy().await?;
        let agent_count = healthy.len() as u32;

        // The floor is restored before the queue is even consulted.
        if agent_count < self.config.min_count {
            let count = self.config.min_count - agent_count;
            info!(count, "agent pool is below its minimum size");
            return Ok(Plan::Upscale { count });
        }

        let stages = self.fresh_stages(self.queue.fetch().await?, now);
        let (pending, running) = count_builds(&stages);

        if pending > 0 {
            debug!(count = pending, "detected pending builds");
            let count = self.agents_required(pending)?;
            info!(count, "pending builds need more agents");
            return Ok(Plan::Upscale { count });
        }

        debug!("checking for under-utilized capacity");
        let required = self.agents_required(running)?;
        if agent_count == required {
            debug!("agent count matches demand");
            return Ok(Plan::Noop);
        }

        let busy = busy_agents(&stages);
        let idle = idle_agents(&healthy, &busy);
        if idle.is_empty() {
            debug!("no idle agents");
            return Ok(Plan::Noop);
        }
        debug!(busy = ?busy, idle = ?idle, "classified agents");

        let expendable = self.past_retirement(idle, now).await?;
        if expendable.is_empty() {
            // Freshly launched agents may simply not have been assigned
            // work yet.
            debug!("idle agents are not past retirement age");
            return Ok(Plan::Noop);
        }

        let nodes = self.keep_min_count(agent_count, expendable);
        if nodes.is_empty() {
            debug!("destroying agents would break the minimum pool size");
            return Ok(Plan::Noop);
        }

        info!(nodes = ?nodes, "recommending downscale");
        Ok(Plan::Downscale { nodes })
    }

    /// Drop stages that have sat in their state longer than the configured
    /// caps, so stuck builds cannot hold capacity hostage.
    fn fresh_stages(&self, stages: Vec<Stage>, now: SystemTime) -> Vec<Stage> {
        stages
            .into_iter()
            .filter(|s| !self.aged_pending(s, now) && !self.aged_running(s, now))
            .collect()
    }

    fn aged_pending(&self, stage: &Stage, now: SystemTime) -> bool {
        match self.config.pending_max_duration {
            Some(cap) => stage.is_pending() && age_since(stage.created, now) >= cap,
            None => false,
        }
    }

    fn aged_running(&self, stage: &Stage, now: SystemTime) -> bool {
        match self.config.running_max_duration {
            Some(cap) => stage.is_running() && age_since(stage.started, now) >= cap,
            None => false,
        }
    }

    /// Agents needed to run `build_count` builds.
    fn agents_required(&self, build_count: u32) -> Result<u32, PlanError> {
        if self.config.max_builds < 1 {
            return Err(PlanError::InvalidMaxBuilds(self.config.max_builds));
        }
        Ok(build_count.div_ceil(self.config.max_builds))
    }

    /// Keep the idle agents alive longer than the retirement age,
    /// preserving the order of `idle`. An id the provider didn't describe
    /// has no known launch time and is never expendable.
    async fn past_retirement(
        &self,
        idle: Vec<NodeId>,
        now: SystemTime,
    ) -> Result<Vec<NodeId>, PlanError> {
        let descriptors = self.cluster.describe(&idle).await?;
        let launch_times: HashMap<NodeId, SystemTime> = descriptors
            .into_iter()
            .map(|d| (d.id, d.launch_time))
            .collect();

        Ok(idle
            .into_iter()
            .filter(|id| match launch_times.get(id) {
                Some(launch_time) => match now.duration_since(*launch_time) {
                    Ok(age) => age > self.config.min_retirement_age,
                    Err(_) => false,
                },
                None => false,
            })
            .collect())
    }

    /// Trim the expendable set so destruction cannot take the pool below
    /// the floor. The front is discarded; for a stable roster order this
    /// keeps the choice of survivors deterministic.
    fn keep_min_count(&self, agent_count: u32, mut expendable: Vec<NodeId>) -> Vec<NodeId> {
        let destroy_count = expendable.len() as u32;
        let min_count = self.config.min_count;

        if agent_count < min_count || agent_count < destroy_count {
            return Vec::new();
        }
        if agent_count - destroy_count < min_count {
            let delta = min_count - (agent_count - destroy_count);
            expendable.drain(..delta as usize);
        }
        expendable
    }
}

fn count_builds(stages: &[Stage]) -> (u32, u32) {
    let pending = stages.iter().filter(|s| s.is_pending()).count() as u32;
    let running = stages.iter().filter(|s| s.is_running()).count() as u32;
    (pending, running)
}

/// Machines with at least one running build, first-seen order,
/// deduplicated.
fn busy_agents(stages: &[Stage]) -> Vec<NodeId> {
    let mut busy: Vec<NodeId> = Vec::new();
    for stage in stages.iter().filter(|s| s.is_running()) {
        let id = NodeId::from(stage.machine.as_str());
        if !busy.contains(&id) {
            busy.push(id);
        }
    }
    busy
}

/// Healthy agents running no builds, roster order preserved.
fn idle_agents(healthy: &[NodeId], busy: &[NodeId]) -> Vec<NodeId> {
    healthy
        .iter()
        .filter(|id| !busy.contains(*id))
        .cloned()
        .collect()
}

/// Age of an epoch-second timestamp, saturating at zero when upstream
/// clocks disagree.
fn age_since(epoch_secs: i64, now: SystemTime) -> Duration {
    let at = UNIX_EPOCH + Duration::from_secs(epoch_secs.max(0) as u64);
    now.duration_since(at).unwrap_or_default()
}
