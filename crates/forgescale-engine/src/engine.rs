//! The tick loop and actuator.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info};

use forge_core::Config;
use forgescale_cluster::{Cluster, NodeId};
use forgescale_queue::BuildQueue;

use crate::{EngineError, Plan, Planner, PlannerConfig};

/// Periodic driver: plans on a fixed cadence and actuates the result.
///
/// The probe interval is a delay between ticks, not a fixed-rate
/// schedule; a slow tick defers the next one.
pub struct Engine {
    planner: Planner,
    queue: Arc<dyn BuildQueue>,
    cluster: Arc<dyn Cluster>,
    probe_interval: Duration,
    dry: bool,
}

impl Engine {
    pub fn new(config: &Config, queue: Arc<dyn BuildQueue>, cluster: Arc<dyn Cluster>) -> Self {
        Self {
            planner: Planner::new(PlannerConfig::from(config), queue.clone(), cluster.clone()),
            queue,
            cluster,
            probe_interval: config.probe_interval,
            dry: config.dry,
        }
    }

    /// Run until the shutdown channel fires.
    ///
    /// Returns `Ok(())` on shutdown. The only error that escapes is the
    /// fatal resume failure; every other tick error is logged and retried
    /// on the next probe.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), EngineError> {
        info!(
            interval = ?self.probe_interval,
            dry = self.dry,
            "engine started"
        );
        loop {
            tokio::select! {
                _ = time::sleep(self.probe_interval) => {
                    if let Err(err) = self.tick().await {
                        if err.is_fatal() {
                            error!(error = %err, "fatal actuation failure");
                            return Err(err);
                        }
                        error!(error = %err, "tick failed, retrying on next probe");
                    }
                }
                _ = shutdown.changed() => {
                    info!("engine shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn tick(&self) -> Result<(), EngineError> {
        let plan = self.planner.plan(SystemTime::now()).await?;
        info!(plan = %plan, "computed scaling plan");

        if self.dry {
            if !plan.is_noop() {
                info!("dry mode is on, skipping actuation");
            }
            return Ok(());
        }

        match plan {
            Plan::Noop => Ok(()),
            Plan::Upscale { count } => self.upscale(count).await,
            Plan::Downscale { nodes } => self.downscale(&nodes).await,
        }
    }

    async fn upscale(&self, count: u32) -> Result<(), EngineError> {
        self.cluster
            .add(count)
            .await
            .map_err(|source| EngineError::Upscale { count, source })
    }

    /// Destroy idle agents with the upstream queue paused, so the set of
    /// idle agents cannot shift mid-destruction. Once the pause succeeded,
    /// the queue is resumed on every exit path; failing to resume is
    /// fatal, because builds stay stuck while the queue is paused.
    async fn downscale(&self, nodes: &[NodeId]) -> Result<(), EngineError> {
        info!("pausing build queue before destroying agents");
        self.queue.pause().await.map_err(EngineError::Pause)?;

        debug!(nodes = ?nodes, "destroying agent nodes");
        let destroyed = self.cluster.destroy(nodes).await;

        info!("resuming build queue");
        if let Err(err) = self.queue.resume().await {
            return Err(EngineError::Resume(err));
        }

        destroyed.map_err(EngineError::Destroy)
    }
}
