/// Liveness of the watched primary as seen from one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Node is reachable and served the probe query
    Alive,
    /// Node is unreachable or rejected the probe
    Dead,
    /// Liveness could not be determined
    Unknown,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl HealthStatus {
    pub fn is_alive(&self) -> bool {
        *self == Self::Alive
    }
}
