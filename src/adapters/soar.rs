//! Simulated SOAR action executor.
//!
//! Stands in for a real orchestration-and-response backend: every action is
//! acknowledged and logged, nothing touches infrastructure. Swap in a real
//! [`ActionExecutor`] implementation to wire actual firewalls/EDR/IdP calls.

use async_trait::async_trait;
use tracing::info;

use super::{ActionExecutor, AdapterError};

/// Executor that logs and acknowledges every action.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedSoar;

#[async_trait]
impl ActionExecutor for SimulatedSoar {
    async fn execute(&self, action: &str, target: &str) -> Result<String, AdapterError> {
        info!(%action, %target, "simulated SOAR executing action");
        Ok(format!("SUCCESS: Action '{action}' completed on '{target}'"))
    }
}
