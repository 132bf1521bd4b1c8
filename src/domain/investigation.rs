//! The investigation record.
//!
//! One `Investigation` accumulates the results of all pipeline stages for a
//! single alert. Each stage-owned field has exactly one setter and exactly
//! one stage calls it; the original alert is set at creation and can never
//! be replaced.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::alert::Alert;
use super::verdict::{ActionOutcome, AssetContext, IocBundle, Verdict};

/// The unit of state for one investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    /// Unique identifier for this investigation.
    pub id: Uuid,

    /// The alert under investigation. Private: read via [`Investigation::alert`],
    /// no setter exists.
    original_alert: Alert,

    /// When the investigation was created.
    pub started_at: DateTime<Utc>,

    /// When a stage last merged a result.
    pub updated_at: DateTime<Utc>,

    /// Business-hours classification, owned by the validate stage.
    pub alert_validation: Option<String>,

    /// Extracted indicators, owned by the extract_iocs stage.
    pub extracted_iocs: Option<IocBundle>,

    /// Reputation verdict per indicator value, owned by check_reputation.
    pub ioc_reputation: Option<BTreeMap<String, String>>,

    /// Matched asset or not-found marker, owned by enrich_asset.
    pub asset_context: Option<AssetContext>,

    /// Decision over the assembled record, owned by decide.
    pub final_verdict: Option<Verdict>,

    /// Per-action dispatch outcomes, owned by execute.
    pub executed_actions: Option<Vec<ActionOutcome>>,
}

impl Investigation {
    /// Start a fresh investigation for an alert.
    pub fn new(alert: Alert) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            original_alert: alert,
            started_at: now,
            updated_at: now,
            alert_validation: None,
            extracted_iocs: None,
            ioc_reputation: None,
            asset_context: None,
            final_verdict: None,
            executed_actions: None,
        }
    }

    /// The alert this investigation was opened for.
    pub fn alert(&self) -> &Alert {
        &self.original_alert
    }

    /// Whether a stage-owned field has been produced yet.
    pub fn has(&self, field: RecordField) -> bool {
        match field {
            RecordField::AlertValidation => self.alert_validation.is_some(),
            RecordField::ExtractedIocs => self.extracted_iocs.is_some(),
            RecordField::IocReputation => self.ioc_reputation.is_some(),
            RecordField::AssetContext => self.asset_context.is_some(),
            RecordField::FinalVerdict => self.final_verdict.is_some(),
            RecordField::ExecutedActions => self.executed_actions.is_some(),
        }
    }

    pub fn set_validation(&mut self, validation: String) {
        self.alert_validation = Some(validation);
        self.touch();
    }

    pub fn set_iocs(&mut self, iocs: IocBundle) {
        self.extracted_iocs = Some(iocs);
        self.touch();
    }

    pub fn set_reputation(&mut self, reputation: BTreeMap<String, String>) {
        self.ioc_reputation = Some(reputation);
        self.touch();
    }

    pub fn set_asset_context(&mut self, context: AssetContext) {
        self.asset_context = Some(context);
        self.touch();
    }

    pub fn set_verdict(&mut self, verdict: Verdict) {
        self.final_verdict = Some(verdict);
        self.touch();
    }

    pub fn set_executed_actions(&mut self, outcomes: Vec<ActionOutcome>) {
        self.executed_actions = Some(outcomes);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Stage-owned fields of the record, used for dependency declarations and
/// precondition reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    AlertValidation,
    ExtractedIocs,
    IocReputation,
    AssetContext,
    FinalVerdict,
    ExecutedActions,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordField::AlertValidation => "alert_validation",
            RecordField::ExtractedIocs => "extracted_iocs",
            RecordField::IocReputation => "ioc_reputation",
            RecordField::AssetContext => "asset_context",
            RecordField::FinalVerdict => "final_verdict",
            RecordField::ExecutedActions => "executed_actions",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_alert() -> Alert {
        Alert::new(json!({
            "timestamp": "2024-03-11T10:15:00",
            "agent": {"name": "ws-042", "ip": "10.1.2.3"}
        }))
    }

    #[test]
    fn test_new_record_has_no_stage_fields() {
        let record = Investigation::new(sample_alert());

        for field in [
            RecordField::AlertValidation,
            RecordField::ExtractedIocs,
            RecordField::IocReputation,
            RecordField::AssetContext,
            RecordField::FinalVerdict,
            RecordField::ExecutedActions,
        ] {
            assert!(!record.has(field), "{field} should start absent");
        }
        assert_eq!(record.alert(), &sample_alert());
    }

    #[test]
    fn test_setters_write_only_their_field() {
        let mut record = Investigation::new(sample_alert());

        record.set_validation("Business Day, During Business Hours".to_string());

        assert!(record.has(RecordField::AlertValidation));
        assert!(!record.has(RecordField::ExtractedIocs));
        assert!(!record.has(RecordField::FinalVerdict));
        assert_eq!(record.alert(), &sample_alert());
    }

    #[test]
    fn test_rerun_overwrites_owned_field() {
        let mut record = Investigation::new(sample_alert());

        record.set_iocs(IocBundle {
            ip_addresses: vec!["1.2.3.4".to_string()],
            ..Default::default()
        });
        record.set_iocs(IocBundle::default());

        assert!(record.extracted_iocs.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut record = Investigation::new(sample_alert());
        record.set_validation("Weekend, Outside Business Hours".to_string());

        let json = serde_json::to_string(&record).unwrap();
        let parsed: Investigation = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, record);
    }
}
