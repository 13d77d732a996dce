//! Standby promotion

mod controller;

pub use controller::{FailoverController, FailoverOutcome};

use async_trait::async_trait;

use crate::config::NodeEndpoint;

/// Seam between the monitor loop and the real failover controller
///
/// Never errors: every failure is folded into the outcome.
#[async_trait]
pub trait Promoter: Send + Sync {
    async fn promote(&self, endpoint: &NodeEndpoint) -> FailoverOutcome;
}
