//! One-shot promotion of the standby
//!
//! Promotion is an external side effect: pg_promote() changes the
//! standby's role and is not idempotent on the server side. Calling it
//! against an already-promoted node fails as an ordinary command
//! error, which the controller reports without escalating.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::client::PgConnection;
use crate::config::{MonitorConfig, NodeEndpoint};

use super::Promoter;

/// pg_promote() blocks until promotion completes or its own 60 second
/// wait expires, returning true on success
const PROMOTE_QUERY: &str = "SELECT pg_promote()";

/// Result of one promotion attempt, produced fresh per call
///
/// Nothing is persisted across ticks: a successful promotion on tick N
/// does not stop tick N+1 from attempting another one.
#[derive(Debug, Clone)]
pub struct FailoverOutcome {
    pub attempted: bool,
    pub succeeded: bool,
    pub reason: Option<String>,
}

impl FailoverOutcome {
    fn success() -> Self {
        Self {
            attempted: true,
            succeeded: true,
            reason: None,
        }
    }

    fn failed(reason: &str) -> Self {
        Self {
            attempted: true,
            succeeded: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Issues the promotion command against the standby
pub struct FailoverController {
    connect_timeout: Duration,
    promote_timeout: Duration,
}

impl FailoverController {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            promote_timeout: Duration::from_millis(config.promote_timeout_ms),
        }
    }
}

#[async_trait]
impl Promoter for FailoverController {
    async fn promote(&self, endpoint: &NodeEndpoint) -> FailoverOutcome {
        let addr = endpoint.addr();

        let mut conn = match PgConnection::connect(endpoint, self.connect_timeout).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(addr = %addr, error = %e, "Failover: could not connect to standby");
                return FailoverOutcome::failed("connect failed");
            }
        };

        let result = timeout(self.promote_timeout, conn.simple_query(PROMOTE_QUERY)).await;
        conn.close().await;

        match result {
            Ok(Ok(query_result)) if query_result.first_value() == Some("t") => {
                info!(addr = %addr, "Failover: standby promoted to primary");
                FailoverOutcome::success()
            }
            Ok(Ok(_)) => {
                warn!(addr = %addr, "Failover: promotion command returned false");
                FailoverOutcome::failed("command failed")
            }
            Ok(Err(e)) => {
                warn!(addr = %addr, error = %e, "Failover: could not promote standby");
                FailoverOutcome::failed("command failed")
            }
            Err(_) => {
                warn!(addr = %addr, "Failover: promotion command timed out");
                FailoverOutcome::failed("command failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testserver::{
        refused_addr, silent_addr, spawn_server, AuthMode, QueryScript,
    };
    use crate::config::{NodeConfig, NodeRole};

    fn endpoint_for(addr: std::net::SocketAddr) -> NodeEndpoint {
        NodeConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            user: "replica_user".to_string(),
            password: "replica_pass".to_string(),
            database: None,
        }
        .to_endpoint(NodeRole::Standby)
    }

    fn controller() -> FailoverController {
        FailoverController::new(&MonitorConfig::default())
    }

    #[tokio::test]
    async fn test_promote_success() {
        let addr = spawn_server(AuthMode::Trust, QueryScript::Row("t")).await;
        let outcome = controller().promote(&endpoint_for(addr)).await;
        assert!(outcome.attempted);
        assert!(outcome.succeeded);
        assert!(outcome.reason.is_none());
    }

    #[tokio::test]
    async fn test_promote_connect_failed() {
        let addr = refused_addr().await;
        let outcome = controller().promote(&endpoint_for(addr)).await;
        assert!(outcome.attempted);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.reason.as_deref(), Some("connect failed"));
    }

    #[tokio::test]
    async fn test_promote_unresponsive_standby_times_out() {
        // A standby that accepts TCP but never answers the startup
        // packet must not wedge the loop; the attempt fails within
        // the configured connect timeout
        let addr = silent_addr().await;
        let config = MonitorConfig {
            connect_timeout_ms: 100,
            ..MonitorConfig::default()
        };
        let outcome = FailoverController::new(&config)
            .promote(&endpoint_for(addr))
            .await;
        assert!(outcome.attempted);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.reason.as_deref(), Some("connect failed"));
    }

    #[tokio::test]
    async fn test_promote_returns_false() {
        // pg_promote() reports false when the wait expired before the
        // standby finished promotion
        let addr = spawn_server(AuthMode::Trust, QueryScript::Row("f")).await;
        let outcome = controller().promote(&endpoint_for(addr)).await;
        assert!(outcome.attempted);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.reason.as_deref(), Some("command failed"));
    }

    #[tokio::test]
    async fn test_promote_command_rejected() {
        // An already-promoted node rejects pg_promote() with an
        // ordinary error; the controller must not escalate
        let addr = spawn_server(AuthMode::Trust, QueryScript::Error).await;
        let outcome = controller().promote(&endpoint_for(addr)).await;
        assert!(outcome.attempted);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.reason.as_deref(), Some("command failed"));
    }
}
