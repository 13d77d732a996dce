//! The monitor loop
//!
//! One cooperative loop per watched primary: each tick reads the
//! current configuration, health-checks the primary, and triggers a
//! promotion when the check comes back non-alive. Cancellation is
//! polled only at the wait point between ticks; a check or promotion
//! already in flight always runs to completion.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{EndpointProvider, MonitorConfig};
use crate::failover::Promoter;
use crate::health::{HealthStatus, Probe};

/// Lifecycle phase of one monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    ShuttingDown,
    Terminated,
}

/// Mutable state owned exclusively by one loop
///
/// Never shared: the loop holds it for its lifetime and hands it back
/// when `run` returns.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub phase: Phase,
    pub last_status: HealthStatus,
    pub tick_count: u64,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            phase: Phase::Running,
            last_status: HealthStatus::Unknown,
            tick_count: 0,
        }
    }
}

/// Periodically verifies the primary and fails over to the standby
///
/// Promotion is level-triggered: while the primary stays dead, every
/// tick attempts another promotion. Promotion failures never change
/// loop behavior; the next tick repeats unconditionally.
pub struct MonitorLoop {
    provider: Arc<dyn EndpointProvider>,
    probe: Arc<dyn Probe>,
    promoter: Arc<dyn Promoter>,
    poll_interval: Duration,
    state: MonitorState,
}

impl MonitorLoop {
    pub fn new(
        provider: Arc<dyn EndpointProvider>,
        probe: Arc<dyn Probe>,
        promoter: Arc<dyn Promoter>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            provider,
            probe,
            promoter,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            state: MonitorState::new(),
        }
    }

    /// Run until the token is cancelled, then return the final state
    pub async fn run(mut self, shutdown: CancellationToken) -> MonitorState {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Primary monitor started");

        while self.state.phase == Phase::Running {
            if shutdown.is_cancelled() {
                self.state.phase = Phase::ShuttingDown;
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.state.phase = Phase::ShuttingDown;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.state.phase = Phase::Terminated;
        info!(ticks = self.state.tick_count, "Primary monitor shut down");
        self.state
    }

    /// Spawn the loop as a background task
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<MonitorState> {
        tokio::spawn(self.run(shutdown))
    }

    /// One iteration: config read, health check, zero-or-one promotion
    async fn tick(&mut self) {
        self.state.tick_count += 1;

        // Policy: a missing or unreadable primary config is treated as
        // a dead primary rather than kept as Unknown, matching the
        // check-failure path below. See DESIGN.md.
        let status = match self.provider.primary() {
            Ok(primary) => self.probe.check(&primary).await,
            Err(e) => {
                warn!(error = %e, "Primary endpoint unavailable, treating as dead");
                HealthStatus::Dead
            }
        };
        self.state.last_status = status;

        if status.is_alive() {
            debug!(tick = self.state.tick_count, "Primary is alive");
            return;
        }

        warn!(tick = self.state.tick_count, "Primary node is down, initiating failover");
        match self.provider.standby() {
            Ok(standby) => {
                let outcome = self.promoter.promote(&standby).await;
                debug!(
                    succeeded = outcome.succeeded,
                    reason = outcome.reason.as_deref().unwrap_or(""),
                    "Failover attempt finished"
                );
            }
            Err(e) => {
                warn!(error = %e, "Standby endpoint unavailable, cannot fail over");
            }
        }
    }
}
