//! The six pipeline stages.
//!
//! Each stage reads prior fields of the investigation record plus the
//! injected collaborators and produces exactly the field it owns. Every
//! collaborator failure degrades to the stage's documented fallback and is
//! logged; stages never abort the investigation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Weekday};
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapters::Collaborators;
use crate::domain::{AssetContext, Investigation, IocBundle, IocKind, RecordField, Verdict};

use super::dispatch::ActionDispatcher;
use super::stage::{MissingField, Stage, StageName, StageOutput};

const BUSINESS_HOURS_START: u32 = 9;
const BUSINESS_HOURS_END: u32 = 17; // exclusive: 09:00 through 16:59

/// Timestamp could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("alert has no timestamp field")]
    Missing,

    #[error("timestamp '{0}' is not a recognized ISO-8601 form")]
    Unparseable(String),
}

/// Parse an alert timestamp into its clock hour and weekday.
///
/// The timestamp is treated as already being in the business-hours reference
/// time zone: when the string carries an explicit offset, the clock fields
/// are used as written and never converted.
pub fn parse_alert_timestamp(raw: &str) -> Result<(u32, Weekday), TimestampError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok((dt.hour(), dt.weekday()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok((dt.hour(), dt.weekday()));
        }
    }
    Err(TimestampError::Unparseable(raw.to_string()))
}

/// Classify a clock hour and weekday against business hours (Mon-Fri,
/// 09:00-16:59).
pub fn classify_business_hours(hour: u32, weekday: Weekday) -> &'static str {
    let is_business_day = !matches!(weekday, Weekday::Sat | Weekday::Sun);

    if !is_business_day {
        "Weekend, Outside Business Hours"
    } else if (BUSINESS_HOURS_START..BUSINESS_HOURS_END).contains(&hour) {
        "Business Day, During Business Hours"
    } else {
        "Business Day, Outside Business Hours"
    }
}

/// Classifies the alert's timestamp against business hours.
///
/// A missing or unparseable timestamp produces a descriptive failure string;
/// it never blocks the rest of the pipeline.
pub struct ValidateStage;

#[async_trait]
impl Stage for ValidateStage {
    fn name(&self) -> StageName {
        StageName::Validate
    }

    fn check_dependencies(&self, _record: &Investigation) -> Result<(), MissingField> {
        // Only needs the alert itself, which every record carries.
        Ok(())
    }

    async fn execute(&self, record: &Investigation, _collab: &Collaborators) -> StageOutput {
        let validation = match record.alert().timestamp() {
            None => {
                debug!("alert carries no timestamp field");
                format!("Could not parse timestamp from alert: {}", TimestampError::Missing)
            }
            Some(raw) => match parse_alert_timestamp(raw) {
                Ok((hour, weekday)) => classify_business_hours(hour, weekday).to_string(),
                Err(e) => {
                    debug!(error = %e, "alert timestamp did not parse");
                    format!("Could not parse timestamp from alert: {e}")
                }
            },
        };

        StageOutput::Validation(validation)
    }

    fn merge(&self, record: &mut Investigation, output: StageOutput) {
        match output {
            StageOutput::Validation(v) => record.set_validation(v),
            other => unreachable!("validate cannot merge {other:?}"),
        }
    }
}

/// Extracts indicators of compromise from the alert via the extractor
/// collaborator.
///
/// Collaborator failure yields an all-empty bundle: every category present,
/// none null, never partial.
pub struct ExtractIocsStage;

#[async_trait]
impl Stage for ExtractIocsStage {
    fn name(&self) -> StageName {
        StageName::ExtractIocs
    }

    fn check_dependencies(&self, _record: &Investigation) -> Result<(), MissingField> {
        Ok(())
    }

    async fn execute(&self, record: &Investigation, collab: &Collaborators) -> StageOutput {
        let iocs = match collab.extractor.extract(record.alert()).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "IOC extraction failed, recording empty bundle");
                IocBundle::default()
            }
        };

        StageOutput::Iocs(iocs)
    }

    fn merge(&self, record: &mut Investigation, output: StageOutput) {
        match output {
            StageOutput::Iocs(iocs) => record.set_iocs(iocs),
            other => unreachable!("extract_iocs cannot merge {other:?}"),
        }
    }
}

/// Looks up the reputation of every extracted indicator the provider can
/// answer about.
///
/// IPs, domains, and URLs are looked up; file hashes and user accounts have
/// no reputation endpoint and are skipped. A failed lookup is recorded as a
/// failure verdict for that one indicator and the rest proceed.
pub struct CheckReputationStage;

#[async_trait]
impl Stage for CheckReputationStage {
    fn name(&self) -> StageName {
        StageName::CheckReputation
    }

    fn check_dependencies(&self, record: &Investigation) -> Result<(), MissingField> {
        if record.has(RecordField::ExtractedIocs) {
            Ok(())
        } else {
            Err(MissingField(RecordField::ExtractedIocs))
        }
    }

    async fn execute(&self, record: &Investigation, collab: &Collaborators) -> StageOutput {
        let mut reputation = BTreeMap::new();

        // Empty bundle (or absent, though the dependency check rules that
        // out) means an empty verdict map, not a skipped stage.
        let Some(iocs) = record.extracted_iocs.as_ref() else {
            return StageOutput::Reputation(reputation);
        };

        let lookups = [
            (IocKind::Ip, &iocs.ip_addresses),
            (IocKind::Domain, &iocs.domains),
            (IocKind::Url, &iocs.urls),
        ];

        for (kind, values) in lookups {
            for value in values {
                let verdict = match collab.reputation.lookup(value, kind).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(ioc = %value, %kind, error = %e, "reputation lookup failed");
                        format!("Reputation check failed: {e}")
                    }
                };
                reputation.insert(value.clone(), verdict);
            }
        }

        StageOutput::Reputation(reputation)
    }

    fn merge(&self, record: &mut Investigation, output: StageOutput) {
        match output {
            StageOutput::Reputation(reputation) => record.set_reputation(reputation),
            other => unreachable!("check_reputation cannot merge {other:?}"),
        }
    }
}

/// Finds the inventory record for the host the alert came from.
///
/// Hostname match wins over IP match; no match (or a failing inventory)
/// yields a structured not-found marker carrying the queried identifiers.
pub struct EnrichAssetStage;

#[async_trait]
impl Stage for EnrichAssetStage {
    fn name(&self) -> StageName {
        StageName::EnrichAsset
    }

    fn check_dependencies(&self, _record: &Investigation) -> Result<(), MissingField> {
        // Reads only the alert's host/IP fields; independent of the IOC stages.
        Ok(())
    }

    async fn execute(&self, record: &Investigation, collab: &Collaborators) -> StageOutput {
        let hostname = record.alert().agent_hostname();
        let ip = record.alert().agent_ip();

        let context = match collab.assets.lookup(hostname, ip).await {
            Ok(Some(asset)) => AssetContext::Matched { asset },
            Ok(None) => AssetContext::NotFound {
                hostname: hostname.map(str::to_string),
                ip: ip.map(str::to_string),
            },
            Err(e) => {
                warn!(error = %e, "asset inventory lookup failed");
                AssetContext::NotFound {
                    hostname: hostname.map(str::to_string),
                    ip: ip.map(str::to_string),
                }
            }
        };

        StageOutput::Asset(context)
    }

    fn merge(&self, record: &mut Investigation, output: StageOutput) {
        match output {
            StageOutput::Asset(context) => record.set_asset_context(context),
            other => unreachable!("enrich_asset cannot merge {other:?}"),
        }
    }
}

/// Sends the assembled record to the decision collaborator for a verdict.
///
/// A failing or unparseable decision degrades to the safe fallback verdict:
/// severity Undetermined, no actions. Actions are never fabricated.
pub struct DecideStage;

#[async_trait]
impl Stage for DecideStage {
    fn name(&self) -> StageName {
        StageName::Decide
    }

    fn check_dependencies(&self, record: &Investigation) -> Result<(), MissingField> {
        for field in [
            RecordField::AlertValidation,
            RecordField::ExtractedIocs,
            RecordField::IocReputation,
            RecordField::AssetContext,
        ] {
            if !record.has(field) {
                return Err(MissingField(field));
            }
        }
        Ok(())
    }

    async fn execute(&self, record: &Investigation, collab: &Collaborators) -> StageOutput {
        let verdict = match collab.decision.decide(record).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "decision collaborator failed, using fallback verdict");
                Verdict::fallback(&e.to_string())
            }
        };

        StageOutput::Verdict(verdict)
    }

    fn merge(&self, record: &mut Investigation, output: StageOutput) {
        match output {
            StageOutput::Verdict(verdict) => record.set_verdict(verdict),
            other => unreachable!("decide cannot merge {other:?}"),
        }
    }
}

/// Dispatches the decided actions through the action executor.
pub struct ExecuteStage;

#[async_trait]
impl Stage for ExecuteStage {
    fn name(&self) -> StageName {
        StageName::Execute
    }

    fn check_dependencies(&self, record: &Investigation) -> Result<(), MissingField> {
        if record.has(RecordField::FinalVerdict) {
            Ok(())
        } else {
            Err(MissingField(RecordField::FinalVerdict))
        }
    }

    async fn execute(&self, record: &Investigation, collab: &Collaborators) -> StageOutput {
        let actions = record
            .final_verdict
            .as_ref()
            .map(|v| v.automated_actions.as_slice())
            .unwrap_or(&[]);

        let dispatcher = ActionDispatcher::new(collab.executor.clone());
        let outcomes = dispatcher.dispatch(actions).await;

        StageOutput::Executions(outcomes)
    }

    fn merge(&self, record: &mut Investigation, output: StageOutput) {
        match output {
            StageOutput::Executions(outcomes) => record.set_executed_actions(outcomes),
            other => unreachable!("execute cannot merge {other:?}"),
        }
    }
}

/// The six stages in their fixed batch order.
pub struct StageRegistry {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(ValidateStage),
                Box::new(ExtractIocsStage),
                Box::new(CheckReputationStage),
                Box::new(EnrichAssetStage),
                Box::new(DecideStage),
                Box::new(ExecuteStage),
            ],
        }
    }

    /// Stages in declared batch order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Stage> {
        self.stages.iter().map(|s| s.as_ref())
    }

    /// Look up a stage for stepwise dispatch.
    pub fn get(&self, name: StageName) -> &dyn Stage {
        self.stages
            .iter()
            .map(|s| s.as_ref())
            .find(|s| s.name() == name)
            .unwrap_or_else(|| unreachable!("registry always holds all six stages"))
    }
}
