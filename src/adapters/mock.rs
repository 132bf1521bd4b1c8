//! Scripted collaborators for tests and offline runs.
//!
//! Each mock implements one collaborator trait with configurable canned
//! results, per-value failure injection, and call counting. They back the
//! test suites and the CLI's `--offline` mode, where the network
//! collaborators are swapped out wholesale.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{Alert, AssetRecord, Investigation, IocBundle, IocKind, Severity, Verdict};

use super::{
    ActionExecutor, AdapterError, AssetInventory, Collaborators, DecisionEngine, IocExtractor,
    ReputationProvider,
};

fn scripted_failure() -> AdapterError {
    AdapterError::InvalidResponse("scripted failure".to_string())
}

/// Returns a fixed IOC bundle, or fails on demand.
#[derive(Default)]
pub struct MockIocExtractor {
    bundle: IocBundle,
    fail: bool,
    calls: AtomicUsize,
}

impl MockIocExtractor {
    pub fn returning(bundle: IocBundle) -> Self {
        Self {
            bundle,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IocExtractor for MockIocExtractor {
    async fn extract(&self, _alert: &Alert) -> Result<IocBundle, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(scripted_failure());
        }
        Ok(self.bundle.clone())
    }
}

/// Answers reputation lookups from a verdict table.
///
/// Values without a scripted verdict come back benign; values registered via
/// [`MockReputationProvider::failing_for`] error instead.
#[derive(Default)]
pub struct MockReputationProvider {
    verdicts: BTreeMap<String, String>,
    fail_for: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl MockReputationProvider {
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn with_verdict(mut self, value: impl Into<String>, verdict: impl Into<String>) -> Self {
        self.verdicts.insert(value.into(), verdict.into());
        self
    }

    pub fn failing_for(mut self, value: impl Into<String>) -> Self {
        self.fail_for.insert(value.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReputationProvider for MockReputationProvider {
    async fn lookup(&self, value: &str, _kind: IocKind) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || self.fail_for.contains(value) {
            return Err(scripted_failure());
        }
        Ok(self
            .verdicts
            .get(value)
            .cloned()
            .unwrap_or_else(|| "Benign (0 vendors flagged this IOC)".to_string()))
    }
}

/// In-memory asset table with the inventory matching rules: hostname first,
/// then IP, first match wins.
#[derive(Default)]
pub struct MockAssetInventory {
    records: Vec<AssetRecord>,
    fail: bool,
}

impl MockAssetInventory {
    pub fn with_record(mut self, record: AssetRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl AssetInventory for MockAssetInventory {
    async fn lookup(
        &self,
        hostname: Option<&str>,
        ip: Option<&str>,
    ) -> Result<Option<AssetRecord>, AdapterError> {
        if self.fail {
            return Err(scripted_failure());
        }

        if let Some(hostname) = hostname {
            if let Some(found) = self.records.iter().find(|r| r.hostname == hostname) {
                return Ok(Some(found.clone()));
            }
        }
        if let Some(ip) = ip {
            if let Some(found) = self.records.iter().find(|r| r.ip_address == ip) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }
}

/// Returns a fixed verdict, or fails on demand.
pub struct MockDecisionEngine {
    verdict: Verdict,
    fail: bool,
    calls: AtomicUsize,
}

impl Default for MockDecisionEngine {
    fn default() -> Self {
        Self {
            verdict: Verdict {
                analyst_summary: "No suspicious activity identified.".to_string(),
                attack_category: "Benign".to_string(),
                final_severity: Severity::Low,
                automated_actions: Vec::new(),
            },
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockDecisionEngine {
    pub fn returning(verdict: Verdict) -> Self {
        Self {
            verdict,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionEngine for MockDecisionEngine {
    async fn decide(&self, _snapshot: &Investigation) -> Result<Verdict, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(scripted_failure());
        }
        Ok(self.verdict.clone())
    }
}

/// Records every dispatched action; fails for registered targets.
#[derive(Default)]
pub struct MockActionExecutor {
    fail_targets: HashSet<String>,
    executed: Mutex<Vec<(String, String)>>,
}

impl MockActionExecutor {
    pub fn failing_for(mut self, target: impl Into<String>) -> Self {
        self.fail_targets.insert(target.into());
        self
    }

    /// Every `(action, target)` pair that reached the executor, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ActionExecutor for MockActionExecutor {
    async fn execute(&self, action: &str, target: &str) -> Result<String, AdapterError> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((action.to_string(), target.to_string()));

        if self.fail_targets.contains(target) {
            return Err(scripted_failure());
        }
        Ok(format!("Action '{action}' completed on '{target}'"))
    }
}

/// One configurable mock per collaborator slot.
#[derive(Default)]
pub struct MockSet {
    pub extractor: MockIocExtractor,
    pub reputation: MockReputationProvider,
    pub assets: MockAssetInventory,
    pub decision: MockDecisionEngine,
    pub executor: MockActionExecutor,
}

impl MockSet {
    /// Every collaborator errors on use; stages must degrade per policy.
    pub fn all_failing() -> Self {
        Self {
            extractor: MockIocExtractor::failing(),
            reputation: MockReputationProvider::failing(),
            assets: MockAssetInventory::failing(),
            decision: MockDecisionEngine::failing(),
            executor: MockActionExecutor::default(),
        }
    }
}

/// Bundle a mock set into the collaborator shape stages consume.
pub fn collaborators(set: MockSet) -> Collaborators {
    Collaborators {
        extractor: Arc::new(set.extractor),
        reputation: Arc::new(set.reputation),
        assets: Arc::new(set.assets),
        decision: Arc::new(set.decision),
        executor: Arc::new(set.executor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_asset_inventory_prefers_hostname_over_ip() {
        let by_ip = AssetRecord {
            hostname: "other-host".to_string(),
            ip_address: "10.0.0.1".to_string(),
            ..Default::default()
        };
        let by_name = AssetRecord {
            hostname: "h1".to_string(),
            ip_address: "10.9.9.9".to_string(),
            ..Default::default()
        };
        let inventory = MockAssetInventory::default()
            .with_record(by_ip)
            .with_record(by_name.clone());

        // IP matches the first row, hostname the second; hostname wins.
        let found = inventory.lookup(Some("h1"), Some("10.0.0.1")).await.unwrap();
        assert_eq!(found, Some(by_name));
    }

    #[tokio::test]
    async fn test_executor_records_calls_in_order() {
        let executor = MockActionExecutor::default();

        executor.execute("block_ip", "1.1.1.1").await.unwrap();
        executor.execute("disable_user", "jsmith").await.unwrap();

        assert_eq!(
            executor.executed(),
            vec![
                ("block_ip".to_string(), "1.1.1.1".to_string()),
                ("disable_user".to_string(), "jsmith".to_string()),
            ]
        );
    }
}
