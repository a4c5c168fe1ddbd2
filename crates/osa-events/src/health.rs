//! Health check types for the idempotency ledger.

use serde::{Deserialize, Serialize};

/// Coarse health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Store round trip succeeded and read back the expected value.
    Healthy,
    /// Store responded but the round trip misbehaved.
    Degraded,
    /// Store could not serve the probe at all.
    Unhealthy,
}

/// Outcome of a ledger health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerHealth {
    pub state: HealthState,
    /// Human-readable detail for dashboards and alerts.
    pub details: String,
    /// Probe round-trip latency.
    pub latency_ms: u64,
}

impl LedgerHealth {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}
