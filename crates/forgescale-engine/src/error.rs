//! Planner and engine error types.

use forgescale_cluster::ClusterError;
use forgescale_queue::QueueError;
use thiserror::Error;

/// Errors that abort one planning run. No partial plan is emitted; the
/// next tick retries from scratch.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("couldn't inspect agent cluster: {0}")]
    Cluster(#[from] ClusterError),

    #[error("couldn't fetch build queue: {0}")]
    Queue(#[from] QueueError),

    #[error("max builds per agent cannot be {0}")]
    InvalidMaxBuilds(u32),
}

/// Errors surfaced by the engine's tick loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to create scaling plan: {0}")]
    Plan(#[from] PlanError),

    #[error("failed to add {count} agents: {source}")]
    Upscale { count: u32, source: ClusterError },

    #[error("couldn't pause build queue while downscaling: {0}")]
    Pause(QueueError),

    #[error("failed to destroy agent nodes: {0}")]
    Destroy(ClusterError),

    #[error("failed to resume build queue: {0}")]
    Resume(QueueError),
}

impl EngineError {
    /// A resume failure leaves the upstream queue paused and every build
    /// stuck; the process must exit so operators restore the queue
    /// manually.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Resume(_))
    }
}
