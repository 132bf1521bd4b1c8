//! The stage contract.
//!
//! Every pipeline stage implements the same four capabilities: a name, a
//! dependency check over the record, an execution step against the injected
//! collaborators, and a merge that writes exactly the field(s) the stage
//! owns. The orchestrator composes stages into batch or stepwise execution
//! without knowing anything stage-specific.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::Collaborators;
use crate::domain::{
    ActionOutcome, AssetContext, Investigation, IocBundle, RecordField, Verdict,
};

/// Names of the six pipeline stages, in no particular order.
///
/// The wire/CLI spelling is the snake_case form (`extract_iocs`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Validate,
    ExtractIocs,
    CheckReputation,
    EnrichAsset,
    Decide,
    Execute,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageName::Validate => "validate",
            StageName::ExtractIocs => "extract_iocs",
            StageName::CheckReputation => "check_reputation",
            StageName::EnrichAsset => "enrich_asset",
            StageName::Decide => "decide",
            StageName::Execute => "execute",
        };
        f.write_str(s)
    }
}

impl FromStr for StageName {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate" => Ok(StageName::Validate),
            "extract_iocs" => Ok(StageName::ExtractIocs),
            "check_reputation" => Ok(StageName::CheckReputation),
            "enrich_asset" => Ok(StageName::EnrichAsset),
            "decide" => Ok(StageName::Decide),
            "execute" => Ok(StageName::Execute),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Requested stage name does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stage '{0}'")]
pub struct UnknownStage(pub String);

/// A required record field has not been produced yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("required field '{0}' has not been produced yet")]
pub struct MissingField(pub RecordField);

/// Output of one stage execution.
///
/// One variant per stage; `merge` writes it into the record and stepwise
/// mode returns it to the caller as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutput {
    Validation(String),
    Iocs(IocBundle),
    Reputation(BTreeMap<String, String>),
    Asset(AssetContext),
    Verdict(Verdict),
    Executions(Vec<ActionOutcome>),
}

/// A single pipeline stage.
///
/// `execute` is pure with respect to the record: it reads prior fields and
/// the collaborators but never writes the record; all writing happens in
/// `merge`. Collaborator failures are recovered inside `execute` (each stage
/// documents its fallback), so execution itself cannot fail. Only an unmet
/// dependency can reject a request, and that is decided before execution.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique stage name used for stepwise dispatch and reporting.
    fn name(&self) -> StageName;

    /// Which record fields must already be populated.
    fn check_dependencies(&self, record: &Investigation) -> Result<(), MissingField>;

    /// Compute this stage's output from the record and collaborators.
    async fn execute(&self, record: &Investigation, collab: &Collaborators) -> StageOutput;

    /// Apply the output, writing exactly the field(s) this stage owns.
    fn merge(&self, record: &mut Investigation, output: StageOutput);
}
