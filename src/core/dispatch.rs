//! Action dispatch.
//!
//! Consumes the decision stage's action list and drives the external action
//! executor, one call per well-formed entry. Malformed entries are recorded
//! and skipped; a failing entry never aborts the rest of the batch. The
//! number of recorded outcomes always equals the number of input entries.

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::ActionExecutor;
use crate::domain::{ActionOutcome, ActionRequest};

/// Dispatches decided actions to the executor collaborator.
pub struct ActionDispatcher {
    executor: Arc<dyn ActionExecutor>,
}

impl ActionDispatcher {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }

    /// Execute every entry in input order, recording one outcome per entry.
    pub async fn dispatch(&self, actions: &[ActionRequest]) -> Vec<ActionOutcome> {
        if actions.is_empty() {
            info!("no automated actions were decided upon");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(actions.len());

        for request in actions {
            let outcome = if !request.is_well_formed() {
                warn!(
                    action = %request.action,
                    target = %request.target,
                    "skipping malformed action entry"
                );
                ActionOutcome::skipped_malformed(request)
            } else {
                match self.executor.execute(&request.action, &request.target).await {
                    Ok(detail) => ActionOutcome::succeeded(request, detail),
                    Err(e) => {
                        warn!(
                            action = %request.action,
                            target = %request.target,
                            error = %e,
                            "action execution failed"
                        );
                        ActionOutcome::failed(request, e.to_string())
                    }
                }
            };

            // One outcome event per action, in input order.
            info!(
                action = %outcome.action,
                target = %outcome.target,
                status = ?outcome.status,
                "action dispatched"
            );
            outcomes.push(outcome);
        }

        outcomes
    }
}
