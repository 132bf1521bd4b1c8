//! The investigation orchestrator.
//!
//! Drives the six stages over an investigation record in two modes: batch
//! (one alert in, fully populated record out) and stepwise (one named stage
//! at a time against a persisted session). Both modes share the same stage
//! contract: check dependencies, execute against the collaborators, merge
//! the output into the record.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::adapters::Collaborators;
use crate::domain::{Alert, Investigation};

use super::session::{SessionError, SessionStore};
use super::stage::{MissingField, Stage, StageName, StageOutput, UnknownStage};
use super::stages::StageRegistry;

/// Errors the orchestrator surfaces to its caller.
///
/// Collaborator failures are not among them: stages recover those internally
/// per their edge-case policies. Nothing here ever terminates the process.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A stage was requested before its dependency had run.
    #[error("stage '{stage}' cannot run: {missing}")]
    Precondition {
        stage: StageName,
        #[source]
        missing: MissingField,
    },

    #[error(transparent)]
    UnknownStage(#[from] UnknownStage),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Runs investigations, batch or stepwise.
pub struct Orchestrator {
    registry: StageRegistry,
    collaborators: Collaborators,
    sessions: Arc<dyn SessionStore>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            registry: StageRegistry::new(),
            collaborators,
            sessions,
        }
    }

    /// Run all six stages over a fresh record and return it.
    ///
    /// Stages run strictly sequentially in declared order, so every
    /// dependency is satisfied by the time it is checked; an upstream stage
    /// producing an empty (but present) result never blocks a later stage.
    #[instrument(skip(self, alert))]
    pub async fn run_all(&self, alert: Alert) -> Result<Investigation, OrchestratorError> {
        let mut record = Investigation::new(alert);
        info!(investigation = %record.id, "starting batch investigation");

        for stage in self.registry.iter() {
            self.apply_stage(stage, &mut record).await?;
        }

        info!(investigation = %record.id, "batch investigation complete");
        Ok(record)
    }

    /// Open a stepwise session for an alert and return its id.
    #[instrument(skip(self, alert))]
    pub async fn start_session(&self, alert: Alert) -> Result<Uuid, OrchestratorError> {
        let record = Investigation::new(alert);
        let id = self.sessions.create(record).await?;
        info!(session = %id, "investigation session started");
        Ok(id)
    }

    /// Run one named stage against a persisted session.
    ///
    /// An unmet dependency rejects the request and leaves the session
    /// untouched. A stage may be re-run; that overwrites only the field(s)
    /// it owns. Concurrent calls against the same session are serialized by
    /// the session store's per-id lock.
    #[instrument(skip(self), fields(session = %id, stage = %name))]
    pub async fn run_step(
        &self,
        id: Uuid,
        name: StageName,
    ) -> Result<StageOutput, OrchestratorError> {
        let _guard = self.sessions.lock(id).await;

        let mut record = self.sessions.get(id).await?;
        let stage = self.registry.get(name);

        let output = self.apply_stage(stage, &mut record).await?;
        self.sessions.put(id, record).await?;

        Ok(output)
    }

    /// Current record of a stepwise session.
    pub async fn session(&self, id: Uuid) -> Result<Investigation, OrchestratorError> {
        Ok(self.sessions.get(id).await?)
    }

    /// Ids of all stored sessions.
    pub async fn list_sessions(&self) -> Result<Vec<Uuid>, OrchestratorError> {
        Ok(self.sessions.list().await?)
    }

    /// Drop a stepwise session.
    pub async fn delete_session(&self, id: Uuid) -> Result<(), OrchestratorError> {
        Ok(self.sessions.delete(id).await?)
    }

    /// Check, execute, and merge one stage against the record.
    async fn apply_stage(
        &self,
        stage: &dyn Stage,
        record: &mut Investigation,
    ) -> Result<StageOutput, OrchestratorError> {
        stage
            .check_dependencies(record)
            .map_err(|missing| OrchestratorError::Precondition {
                stage: stage.name(),
                missing,
            })?;

        let start = Instant::now();
        let output = stage.execute(record, &self.collaborators).await;
        stage.merge(record, output.clone());

        debug!(
            stage = %stage.name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "stage merged"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{self, MockSet};
    use crate::core::session::MemorySessionStore;
    use crate::domain::{IocBundle, RecordField, Severity};
    use serde_json::json;

    fn orchestrator(set: MockSet) -> Orchestrator {
        Orchestrator::new(
            mock::collaborators(set),
            Arc::new(MemorySessionStore::new()),
        )
    }

    fn weekday_alert() -> Alert {
        Alert::new(json!({
            "timestamp": "2024-03-11T10:15:00",
            "agent": {"name": "ws-042", "ip": "10.1.2.3"}
        }))
    }

    #[tokio::test]
    async fn test_batch_populates_every_stage_field() {
        let orchestrator = orchestrator(MockSet::default());

        let record = orchestrator.run_all(weekday_alert()).await.unwrap();

        for field in [
            RecordField::AlertValidation,
            RecordField::ExtractedIocs,
            RecordField::IocReputation,
            RecordField::AssetContext,
            RecordField::FinalVerdict,
            RecordField::ExecutedActions,
        ] {
            assert!(record.has(field), "{field} missing after batch run");
        }
    }

    #[tokio::test]
    async fn test_batch_with_failing_collaborators_still_completes() {
        let orchestrator = orchestrator(MockSet::all_failing());

        let record = orchestrator.run_all(weekday_alert()).await.unwrap();

        assert!(record.extracted_iocs.as_ref().unwrap().is_empty());
        let verdict = record.final_verdict.as_ref().unwrap();
        assert_eq!(verdict.final_severity, Severity::Undetermined);
        assert!(verdict.automated_actions.is_empty());
        assert!(record.executed_actions.as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stepwise_precondition_rejected_without_mutation() {
        let orchestrator = orchestrator(MockSet::default());
        let id = orchestrator.start_session(weekday_alert()).await.unwrap();
        let before = orchestrator.session(id).await.unwrap();

        let err = orchestrator
            .run_step(id, StageName::CheckReputation)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Precondition {
                stage: StageName::CheckReputation,
                missing: MissingField(RecordField::ExtractedIocs),
            }
        ));
        assert_eq!(orchestrator.session(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_stepwise_stage_order_is_dependency_driven() {
        let orchestrator = orchestrator(MockSet::default());
        let id = orchestrator.start_session(weekday_alert()).await.unwrap();

        // enrich_asset has no dependency on the IOC stages.
        orchestrator.run_step(id, StageName::EnrichAsset).await.unwrap();
        orchestrator.run_step(id, StageName::Validate).await.unwrap();
        orchestrator.run_step(id, StageName::ExtractIocs).await.unwrap();
        orchestrator.run_step(id, StageName::CheckReputation).await.unwrap();
        orchestrator.run_step(id, StageName::Decide).await.unwrap();
        orchestrator.run_step(id, StageName::Execute).await.unwrap();

        let record = orchestrator.session(id).await.unwrap();
        assert!(record.has(RecordField::ExecutedActions));
    }

    #[tokio::test]
    async fn test_stepwise_rerun_overwrites_only_owned_field() {
        let set = MockSet {
            extractor: mock::MockIocExtractor::returning(IocBundle {
                ip_addresses: vec!["1.2.3.4".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let orchestrator = orchestrator(set);
        let id = orchestrator.start_session(weekday_alert()).await.unwrap();

        orchestrator.run_step(id, StageName::Validate).await.unwrap();
        orchestrator.run_step(id, StageName::ExtractIocs).await.unwrap();
        let first = orchestrator.session(id).await.unwrap();

        let rerun = orchestrator.run_step(id, StageName::Validate).await.unwrap();
        let second = orchestrator.session(id).await.unwrap();

        assert_eq!(
            rerun,
            StageOutput::Validation("Business Day, During Business Hours".to_string())
        );
        assert_eq!(second.alert_validation, first.alert_validation);
        assert_eq!(second.extracted_iocs, first.extracted_iocs);
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let orchestrator = orchestrator(MockSet::default());

        let err = orchestrator
            .run_step(Uuid::new_v4(), StageName::Validate)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Session(SessionError::NotFound(_))));
    }
}
