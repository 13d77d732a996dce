//! Health checking for the watched primary

mod checker;
mod status;

pub use checker::HealthChecker;
pub use status::HealthStatus;

use async_trait::async_trait;

use crate::config::NodeEndpoint;

/// Seam between the monitor loop and the real health checker
///
/// Never errors: every failure class collapses into a status.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, endpoint: &NodeEndpoint) -> HealthStatus;
}
