//! Liveness probing for the watched primary
//!
//! Each check is self-contained: a fresh connection, one trivial
//! query, and an unconditional close. Every failure class (connect,
//! auth, query error, timeout) collapses into `HealthStatus::Dead`;
//! nothing propagates to the caller.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;

use crate::client::{ConnectionError, PgConnection};
use crate::config::{MonitorConfig, NodeEndpoint};

use super::status::HealthStatus;
use super::Probe;

/// Query proving the node serves reads, not merely that it accepts TCP
const LIVENESS_QUERY: &str = "SELECT 1";

/// Probes a node by connecting and running the liveness query
pub struct HealthChecker {
    connect_timeout: Duration,
    check_timeout: Duration,
}

impl HealthChecker {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            check_timeout: Duration::from_millis(config.check_timeout_ms),
        }
    }

    async fn probe(&self, endpoint: &NodeEndpoint) -> Result<(), ConnectionError> {
        let mut conn = PgConnection::connect(endpoint, self.connect_timeout).await?;
        let result = conn.simple_query(LIVENESS_QUERY).await;
        conn.close().await;
        result.map(|_| ())
    }
}

#[async_trait]
impl Probe for HealthChecker {
    async fn check(&self, endpoint: &NodeEndpoint) -> HealthStatus {
        let result = timeout(self.check_timeout, self.probe(endpoint)).await;

        match result {
            Ok(Ok(())) => HealthStatus::Alive,
            Ok(Err(e)) => {
                debug!(addr = %endpoint.addr(), error = %e, "Health check failed");
                HealthStatus::Dead
            }
            Err(_) => {
                debug!(addr = %endpoint.addr(), "Health check timed out");
                HealthStatus::Dead
            }
        }
    }
}
