//! Stepwise Session Integration Tests
//!
//! Preconditions, idempotence, re-run semantics, and session isolation for
//! the stepwise execution mode, against both session store backings.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use inquest::adapters::mock::{
    self, MockActionExecutor, MockAssetInventory, MockDecisionEngine, MockIocExtractor,
    MockReputationProvider, MockSet,
};
use inquest::adapters::Collaborators;
use inquest::core::{
    FileSessionStore, MemorySessionStore, MissingField, Orchestrator, OrchestratorError,
    SessionError, SessionStore, StageName, StageOutput,
};
use inquest::domain::{Alert, IocBundle, RecordField};

fn weekday_alert() -> Alert {
    Alert::new(json!({
        "timestamp": "2024-03-11T10:15:00",
        "agent": {"name": "ws-042", "ip": "10.1.2.3"}
    }))
}

fn orchestrator_with_store(set: MockSet, store: Arc<dyn SessionStore>) -> Orchestrator {
    Orchestrator::new(mock::collaborators(set), store)
}

#[tokio::test]
async fn test_precondition_failure_leaves_persisted_record_unchanged() {
    let store = Arc::new(MemorySessionStore::new());
    let orchestrator = orchestrator_with_store(MockSet::default(), store.clone());

    let id = orchestrator.start_session(weekday_alert()).await.unwrap();
    let before = store.get(id).await.unwrap();

    let err = orchestrator
        .run_step(id, StageName::CheckReputation)
        .await
        .unwrap_err();

    match err {
        OrchestratorError::Precondition { stage, missing } => {
            assert_eq!(stage, StageName::CheckReputation);
            assert_eq!(missing, MissingField(RecordField::ExtractedIocs));
        }
        other => panic!("expected precondition error, got {other:?}"),
    }

    // Re-read from the store: nothing moved, not even bookkeeping.
    assert_eq!(store.get(id).await.unwrap(), before);
}

#[tokio::test]
async fn test_precondition_failure_on_file_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path().join("sessions")));
    let orchestrator = orchestrator_with_store(MockSet::default(), store.clone());

    let id = orchestrator.start_session(weekday_alert()).await.unwrap();
    let before = store.get(id).await.unwrap();

    assert!(orchestrator.run_step(id, StageName::Decide).await.is_err());
    assert_eq!(store.get(id).await.unwrap(), before);
}

#[tokio::test]
async fn test_validate_rerun_is_idempotent_on_the_record() {
    let store = Arc::new(MemorySessionStore::new());
    let orchestrator = orchestrator_with_store(MockSet::default(), store.clone());
    let id = orchestrator.start_session(weekday_alert()).await.unwrap();

    let first = orchestrator.run_step(id, StageName::Validate).await.unwrap();
    let after_first = store.get(id).await.unwrap();

    let second = orchestrator.run_step(id, StageName::Validate).await.unwrap();
    let after_second = store.get(id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        after_second.alert_validation, after_first.alert_validation,
        "re-run must produce the same validation value"
    );
    // No other field was touched by the re-run.
    assert_eq!(after_second.extracted_iocs, after_first.extracted_iocs);
    assert_eq!(after_second.ioc_reputation, after_first.ioc_reputation);
    assert_eq!(after_second.asset_context, after_first.asset_context);
    assert_eq!(after_second.final_verdict, after_first.final_verdict);
    assert_eq!(after_second.executed_actions, after_first.executed_actions);
}

#[tokio::test]
async fn test_rerun_is_not_idempotent_on_collaborator_side_effects() {
    // Re-running a stage overwrites its field but repeats external calls.
    let reputation = Arc::new(
        MockReputationProvider::default().with_verdict("203.0.113.9", "Benign"),
    );
    let collaborators = Collaborators {
        extractor: Arc::new(MockIocExtractor::returning(IocBundle {
            ip_addresses: vec!["203.0.113.9".to_string()],
            ..Default::default()
        })),
        reputation: reputation.clone(),
        assets: Arc::new(MockAssetInventory::default()),
        decision: Arc::new(MockDecisionEngine::default()),
        executor: Arc::new(MockActionExecutor::default()),
    };
    let orchestrator = Orchestrator::new(collaborators, Arc::new(MemorySessionStore::new()));
    let id = orchestrator.start_session(weekday_alert()).await.unwrap();

    orchestrator.run_step(id, StageName::ExtractIocs).await.unwrap();
    orchestrator.run_step(id, StageName::CheckReputation).await.unwrap();
    orchestrator.run_step(id, StageName::CheckReputation).await.unwrap();

    assert_eq!(reputation.calls(), 2);
}

#[tokio::test]
async fn test_enrich_asset_runs_independently_of_ioc_stages() {
    let orchestrator =
        orchestrator_with_store(MockSet::default(), Arc::new(MemorySessionStore::new()));
    let id = orchestrator.start_session(weekday_alert()).await.unwrap();

    let output = orchestrator.run_step(id, StageName::EnrichAsset).await.unwrap();

    assert!(matches!(output, StageOutput::Asset(_)));
    let record = orchestrator.session(id).await.unwrap();
    assert!(record.has(RecordField::AssetContext));
    assert!(!record.has(RecordField::ExtractedIocs));
}

#[tokio::test]
async fn test_step_output_matches_persisted_field() {
    let orchestrator =
        orchestrator_with_store(MockSet::default(), Arc::new(MemorySessionStore::new()));
    let id = orchestrator.start_session(weekday_alert()).await.unwrap();

    let output = orchestrator.run_step(id, StageName::Validate).await.unwrap();
    let record = orchestrator.session(id).await.unwrap();

    assert_eq!(
        output,
        StageOutput::Validation(record.alert_validation.clone().unwrap())
    );
}

#[tokio::test]
async fn test_full_stepwise_walkthrough_on_file_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path().join("sessions")));
    let orchestrator = orchestrator_with_store(MockSet::default(), store.clone());
    let id = orchestrator.start_session(weekday_alert()).await.unwrap();

    for stage in [
        StageName::Validate,
        StageName::ExtractIocs,
        StageName::CheckReputation,
        StageName::EnrichAsset,
        StageName::Decide,
        StageName::Execute,
    ] {
        orchestrator.run_step(id, stage).await.unwrap();
    }

    let record = store.get(id).await.unwrap();
    for field in [
        RecordField::AlertValidation,
        RecordField::ExtractedIocs,
        RecordField::IocReputation,
        RecordField::AssetContext,
        RecordField::FinalVerdict,
        RecordField::ExecutedActions,
    ] {
        assert!(record.has(field), "{field} missing after walkthrough");
    }
}

#[tokio::test]
async fn test_sessions_are_isolated_from_each_other() {
    let store = Arc::new(MemorySessionStore::new());
    let orchestrator = orchestrator_with_store(MockSet::default(), store.clone());

    let a = orchestrator.start_session(weekday_alert()).await.unwrap();
    let b = orchestrator
        .start_session(Alert::new(json!({"timestamp": "2024-03-16T02:00:00"})))
        .await
        .unwrap();

    orchestrator.run_step(a, StageName::Validate).await.unwrap();

    let record_a = store.get(a).await.unwrap();
    let record_b = store.get(b).await.unwrap();

    assert!(record_a.has(RecordField::AlertValidation));
    assert!(!record_b.has(RecordField::AlertValidation));
}

#[tokio::test]
async fn test_step_against_unknown_session_is_rejected() {
    let orchestrator =
        orchestrator_with_store(MockSet::default(), Arc::new(MemorySessionStore::new()));

    let err = orchestrator
        .run_step(Uuid::new_v4(), StageName::Validate)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Session(SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_ends_a_session() {
    let orchestrator =
        orchestrator_with_store(MockSet::default(), Arc::new(MemorySessionStore::new()));
    let id = orchestrator.start_session(weekday_alert()).await.unwrap();

    orchestrator.delete_session(id).await.unwrap();

    assert!(matches!(
        orchestrator.run_step(id, StageName::Validate).await.unwrap_err(),
        OrchestratorError::Session(SessionError::NotFound(_))
    ));
}
