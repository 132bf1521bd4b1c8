//! Collaborator interfaces for external systems.
//!
//! Every capability the pipeline needs from the outside world (LLM
//! extraction and decision making, reputation lookups, the asset inventory,
//! action execution) sits behind one of these narrow async traits. Stages
//! receive them bundled in [`Collaborators`] and degrade to their documented
//! fallbacks when a call fails; no collaborator error is ever fatal to an
//! investigation.

pub mod alert_source;
pub mod assets;
pub mod llm;
pub mod mock;
pub mod soar;
pub mod virustotal;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Alert, AssetRecord, Investigation, IocBundle, IocKind, Verdict};

// Re-export the production collaborators
pub use alert_source::JsonFileAlertSource;
pub use assets::CsvAssetInventory;
pub use llm::MistralClient;
pub use soar::SimulatedSoar;
pub use virustotal::VirusTotalClient;

/// Errors a collaborator call can surface.
///
/// The owning stage recovers from all of these; they exist so the stage can
/// log what happened and pick the right fallback.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts indicators of compromise from an alert.
#[async_trait]
pub trait IocExtractor: Send + Sync {
    async fn extract(&self, alert: &Alert) -> Result<IocBundle, AdapterError>;
}

/// Looks up the reputation of a single indicator.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    async fn lookup(&self, value: &str, kind: IocKind) -> Result<String, AdapterError>;
}

/// Finds the inventory record for a host, by hostname or IP.
#[async_trait]
pub trait AssetInventory: Send + Sync {
    /// Single best match: hostname first, then IP, first match wins.
    /// `Ok(None)` means the inventory was consulted and holds no match.
    async fn lookup(
        &self,
        hostname: Option<&str>,
        ip: Option<&str>,
    ) -> Result<Option<AssetRecord>, AdapterError>;
}

/// Decides on a verdict and remediation actions over the full record.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn decide(&self, snapshot: &Investigation) -> Result<Verdict, AdapterError>;
}

/// Carries out one remediation action against infrastructure.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Returns a human-readable confirmation on success.
    async fn execute(&self, action: &str, target: &str) -> Result<String, AdapterError>;
}

/// The full set of collaborators injected into stage execution.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn IocExtractor>,
    pub reputation: Arc<dyn ReputationProvider>,
    pub assets: Arc<dyn AssetInventory>,
    pub decision: Arc<dyn DecisionEngine>,
    pub executor: Arc<dyn ActionExecutor>,
}
