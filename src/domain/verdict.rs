//! Typed stage results.
//!
//! Collaborators return loosely structured payloads (LLM JSON, reputation
//! API responses, CSV rows). These types are the validated forms the
//! orchestrator works with; validation happens at the collaborator boundary
//! and failures degrade to the documented fallbacks there, so nothing past
//! the boundary reasons about raw payloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Indicators of compromise extracted from an alert, by category.
///
/// All five categories are always present; a category with no findings is an
/// empty list, never null or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IocBundle {
    #[serde(default)]
    pub ip_addresses: Vec<String>,

    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default)]
    pub file_hashes: Vec<String>,

    #[serde(default)]
    pub user_accounts: Vec<String>,
}

impl IocBundle {
    /// True when every category is empty.
    pub fn is_empty(&self) -> bool {
        self.ip_addresses.is_empty()
            && self.urls.is_empty()
            && self.domains.is_empty()
            && self.file_hashes.is_empty()
            && self.user_accounts.is_empty()
    }

    /// Total number of indicators across all categories.
    pub fn len(&self) -> usize {
        self.ip_addresses.len()
            + self.urls.len()
            + self.domains.len()
            + self.file_hashes.len()
            + self.user_accounts.len()
    }
}

/// Kind of indicator a reputation provider can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IocKind {
    Ip,
    Domain,
    Url,
}

impl fmt::Display for IocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IocKind::Ip => "ip",
            IocKind::Domain => "domain",
            IocKind::Url => "url",
        };
        f.write_str(s)
    }
}

/// One row of the asset inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Inventory hostname.
    #[serde(default)]
    pub hostname: String,

    /// Inventory IP address.
    #[serde(default)]
    pub ip_address: String,

    /// Remaining inventory columns (owner, criticality, ...), kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Result of asset enrichment: either the matched inventory row or a
/// structured not-found marker echoing what was queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetContext {
    Matched { asset: AssetRecord },
    NotFound {
        hostname: Option<String>,
        ip: Option<String>,
    },
}

impl AssetContext {
    pub fn is_matched(&self) -> bool {
        matches!(self, AssetContext::Matched { .. })
    }
}

/// Final severity assigned by the decision stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    /// Fallback when no trustworthy decision could be obtained.
    #[serde(other)]
    Undetermined,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
            Severity::Undetermined => "Undetermined",
        };
        f.write_str(s)
    }
}

/// One remediation action requested by the decision stage.
///
/// Both fields default to empty so that a malformed entry in the decision
/// payload deserializes rather than poisoning the whole verdict; the
/// dispatcher skips entries that are not well formed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub target: String,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
        }
    }

    /// A request is well formed when both the action name and target are set.
    pub fn is_well_formed(&self) -> bool {
        !self.action.is_empty() && !self.target.is_empty()
    }
}

/// The decision stage's verdict over the full investigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub analyst_summary: String,
    pub attack_category: String,
    pub final_severity: Severity,

    #[serde(default)]
    pub automated_actions: Vec<ActionRequest>,
}

impl Verdict {
    /// Safe default used when the decision collaborator fails or returns a
    /// payload that does not validate. Never carries actions.
    pub fn fallback(reason: &str) -> Self {
        Self {
            analyst_summary: format!("Failed to obtain a valid decision: {reason}"),
            attack_category: "Unknown".to_string(),
            final_severity: Severity::Undetermined,
            automated_actions: Vec::new(),
        }
    }
}

/// How a single dispatched action ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Succeeded,
    Failed,
    /// Entry was missing its action or target and was never dispatched.
    SkippedMalformed,
}

/// Recorded outcome of one entry in the action list, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: String,
    pub target: String,
    pub status: DispatchStatus,
    pub detail: String,
}

impl ActionOutcome {
    pub fn succeeded(request: &ActionRequest, detail: impl Into<String>) -> Self {
        Self {
            action: request.action.clone(),
            target: request.target.clone(),
            status: DispatchStatus::Succeeded,
            detail: detail.into(),
        }
    }

    pub fn failed(request: &ActionRequest, error: impl Into<String>) -> Self {
        Self {
            action: request.action.clone(),
            target: request.target.clone(),
            status: DispatchStatus::Failed,
            detail: error.into(),
        }
    }

    pub fn skipped_malformed(request: &ActionRequest) -> Self {
        Self {
            action: request.action.clone(),
            target: request.target.clone(),
            status: DispatchStatus::SkippedMalformed,
            detail: "entry is missing its action or target".to_string(),
        }
    }
}
