//! Scaling decision core and tick loop.
//!
//! The [`Planner`] turns a snapshot of the build queue and the agent
//! roster into a [`Plan`]; the [`Engine`] runs the planner on a fixed
//! cadence and actuates the result against the cluster, pausing the
//! upstream queue around destructive actions.
//!
//! # Decision rules
//!
//! Evaluated in order, first hit wins, noop is the default:
//!
//! ```text
//! if a scaling activity is in progress:        noop
//! if healthy < min_count:                      upscale(min_count - healthy)
//! drop stages past their pending/running caps
//! if pending > 0:                              upscale(ceil(pending / max_builds))
//! if healthy == ceil(running / max_builds):    noop
//! idle       = healthy minus machines with running builds
//! expendable = idle older than min_retirement_age
//! trim expendable so the floor survives        (front first)
//! if expendable is empty:                      noop
//! else:                                        downscale(expendable)
//! ```

mod engine;
mod error;
mod plan;
mod planner;
#[cfg(test)]
mod testutil;

pub use engine::Engine;
pub use error::{EngineError, PlanError};
pub use plan::Plan;
pub use planner::{Planner, PlannerConfig};
