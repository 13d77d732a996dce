use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Monitor loop settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Primary node being watched
    ///
    /// May be absent: the monitor treats a missing primary as a failed
    /// health check (see MonitorLoop).
    #[serde(default)]
    pub primary: Option<NodeConfig>,
    /// Standby node to promote when the primary goes down
    #[serde(default)]
    pub standby: Option<NodeConfig>,
}

// ============================================================================
// Monitor Configuration
// ============================================================================

/// Settings for the monitor loop and its outbound operations
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Interval between health checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout for establishing a connection (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Timeout for a whole health check, connect included (milliseconds)
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
    /// Timeout for the promotion command (milliseconds)
    ///
    /// pg_promote() itself waits up to 60 seconds for the standby to
    /// finish promotion, so this bound is deliberately generous.
    #[serde(default = "default_promote_timeout_ms")]
    pub promote_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_check_timeout_ms() -> u64 {
    3000
}

fn default_promote_timeout_ms() -> u64 {
    60000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            check_timeout_ms: default_check_timeout_ms(),
            promote_timeout_ms: default_promote_timeout_ms(),
        }
    }
}

// ============================================================================
// Node Configuration
// ============================================================================

/// Connection settings for a single PostgreSQL node
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Hostname or IP
    pub host: String,
    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL username
    pub user: String,
    /// PostgreSQL password
    #[serde(default)]
    pub password: String,
    /// Database to connect to (server defaults to the username)
    #[serde(default)]
    pub database: Option<String>,
}

fn default_port() -> u16 {
    5432
}

/// Role a node plays in the watched pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Primary,
    Standby,
}

/// Resolved connection descriptor for one node
///
/// Immutable once constructed; a fresh one is built from configuration
/// on every read, so a config change is visible on the very next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub role: NodeRole,
}

impl NodeEndpoint {
    /// Get the address string (host:port)
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl NodeConfig {
    /// Build an endpoint for this node with the given role
    pub fn to_endpoint(&self, role: NodeRole) -> NodeEndpoint {
        NodeEndpoint {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            role,
        }
    }
}
