//! Build queue port.
//!
//! The upstream build server owns the queue of build stages and assigns
//! them to agents. This crate models the slice of that queue the
//! autoscaler cares about and defines the [`BuildQueue`] port the planner
//! and engine consume. [`client::HttpQueue`] is the production adapter;
//! [`mem::MemQueue`] is the in-memory adapter tests wire in.

pub mod client;
mod error;
pub mod mem;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::HttpQueue;
pub use error::QueueError;
pub use mem::MemQueue;

/// State of a stage as reported by the build server.
///
/// Only `Pending` and `Running` are material to scaling; everything else
/// is carried for completeness and ignored by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Blocked,
    Declined,
    Error,
    Failure,
    Success,
    Killed,
    Skipped,
    #[serde(other)]
    Other,
}

/// A unit of queued work on the build server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Identifier of the agent the stage is assigned to, empty if
    /// unassigned.
    #[serde(default)]
    pub machine: String,
    pub status: StageStatus,
    /// Epoch second at which the stage entered the queue.
    #[serde(default)]
    pub created: i64,
    /// Epoch second at which the stage began running, 0 if it never did.
    #[serde(default)]
    pub started: i64,
}

impl Stage {
    pub fn pending(created: i64) -> Self {
        Self {
            machine: String::new(),
            status: StageStatus::Pending,
            created,
            started: 0,
        }
    }

    pub fn running(machine: impl Into<String>, started: i64) -> Self {
        Self {
            machine: machine.into(),
            status: StageStatus::Running,
            created: started,
            started,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StageStatus::Pending
    }

    /// True when the stage is genuinely running. A stage that claims the
    /// running state without a machine or a start time is treated as
    /// non-running.
    pub fn is_running(&self) -> bool {
        self.status == StageStatus::Running && !self.machine.is_empty() && self.started > 0
    }
}

/// Port over the upstream build queue.
///
/// `pause`/`resume` exist so the roster of idle agents cannot shift while
/// the engine is destroying them.
#[async_trait]
pub trait BuildQueue: Send + Sync {
    /// Current stages, in whatever order the upstream returns them.
    async fn fetch(&self) -> Result<Vec<Stage>, QueueError>;

    /// Stop the upstream from dispatching pending stages to agents.
    async fn pause(&self) -> Result<(), QueueError>;

    /// Reverse [`BuildQueue::pause`].
    async fn resume(&self) -> Result<(), QueueError>;
}
