//! The scaling decision record.

use std::fmt;

use forgescale_cluster::NodeId;
use serde::Serialize;

/// What the planner decided for one tick.
///
/// An `Upscale` always carries a count of at least one and a `Downscale`
/// always carries at least one node; the planner constructs them from
/// strictly positive inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Plan {
    Noop,
    Upscale { count: u32 },
    Downscale { nodes: Vec<NodeId> },
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        matches!(self, Plan::Noop)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Noop => write!(f, "action=noop"),
            Plan::Upscale { count } => write!(f, "action=upscale count={count}"),
            Plan::Downscale { nodes } => {
                let ids: Vec<&str> = nodes.iter().map(NodeId::as_str).collect();
                write!(f, "action=downscale nodes=[{}]", ids.join(", "))
            }
        }
    }
}
