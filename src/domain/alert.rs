//! The alert under investigation.
//!
//! Alerts arrive as loosely structured JSON from whatever source fed them
//! (SIEM export, webhook, a fixture file). The orchestrator treats them as
//! opaque and immutable: stages read individual fields through the accessors
//! below and never write back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An alert as received from the alert source.
///
/// Immutable once constructed; there is deliberately no mutable access to
/// the underlying JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alert(Value);

impl Alert {
    /// Wrap a raw JSON value as an alert.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON backing this alert.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The alert's `timestamp` field, if present and a string.
    pub fn timestamp(&self) -> Option<&str> {
        self.0.get("timestamp").and_then(Value::as_str)
    }

    /// The reporting agent's hostname (`agent.name`), if present.
    pub fn agent_hostname(&self) -> Option<&str> {
        self.0
            .get("agent")
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
    }

    /// The reporting agent's IP address (`agent.ip`), if present.
    pub fn agent_ip(&self) -> Option<&str> {
        self.0
            .get("agent")
            .and_then(|a| a.get("ip"))
            .and_then(Value::as_str)
    }
}

impl From<Value> for Alert {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
