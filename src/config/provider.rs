//! Endpoint providers with dynamic-reload semantics
//!
//! The monitor loop fetches endpoints through the `EndpointProvider`
//! trait on every tick, never caching across ticks. A value changed
//! externally between ticks is visible on the very next call.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::schema::{NodeConfig, NodeEndpoint, NodeRole};
use super::{load_config, ConfigError};

/// Source of the primary and standby connection descriptors
///
/// Implementations must be safe to call every tick with no caching.
/// Both lookups fail with `ConfigError` when the corresponding node
/// has never been configured; callers must not assume a value is
/// always available.
pub trait EndpointProvider: Send + Sync {
    /// Current primary endpoint
    fn primary(&self) -> Result<NodeEndpoint, ConfigError>;
    /// Current standby endpoint
    fn standby(&self) -> Result<NodeEndpoint, ConfigError>;
}

/// Provider that re-reads a TOML config file on every call
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl EndpointProvider for FileProvider {
    fn primary(&self) -> Result<NodeEndpoint, ConfigError> {
        let config = load_config(&self.path)?;
        config
            .primary
            .map(|n| n.to_endpoint(NodeRole::Primary))
            .ok_or(ConfigError::PrimaryNotSet)
    }

    fn standby(&self) -> Result<NodeEndpoint, ConfigError> {
        let config = load_config(&self.path)?;
        config
            .standby
            .map(|n| n.to_endpoint(NodeRole::Standby))
            .ok_or(ConfigError::StandbyNotSet)
    }
}

/// In-process provider backed by shared mutable state
///
/// Used when embedding the monitor and throughout the test suite.
/// Updates through `set_primary`/`set_standby` are visible to the loop
/// on its next tick, matching the file provider's reload contract.
#[derive(Default)]
pub struct SharedProvider {
    primary: RwLock<Option<NodeConfig>>,
    standby: RwLock<Option<NodeConfig>>,
}

impl SharedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_primary(&self, node: NodeConfig) {
        *self.primary.write() = Some(node);
    }

    pub fn clear_primary(&self) {
        *self.primary.write() = None;
    }

    pub fn set_standby(&self, node: NodeConfig) {
        *self.standby.write() = Some(node);
    }
}

impl EndpointProvider for SharedProvider {
    fn primary(&self) -> Result<NodeEndpoint, ConfigError> {
        self.primary
            .read()
            .as_ref()
            .map(|n| n.to_endpoint(NodeRole::Primary))
            .ok_or(ConfigError::PrimaryNotSet)
    }

    fn standby(&self) -> Result<NodeEndpoint, ConfigError> {
        self.standby
            .read()
            .as_ref()
            .map(|n| n.to_endpoint(NodeRole::Standby))
            .ok_or(ConfigError::StandbyNotSet)
    }
}
