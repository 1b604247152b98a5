//! Cluster port error type.

use thiserror::Error;

/// Errors surfaced by a [`crate::Cluster`] implementation.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("autoscaling group {0} not found")]
    GroupNotFound(String),

    /// Instances were detached (desired capacity already decremented) but
    /// termination failed. The orphans converge via the provider.
    #[error("instance termination failed after detach: {0}")]
    Terminate(String),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}
