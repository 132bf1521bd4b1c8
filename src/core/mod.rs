//! Orchestration logic: stage contract, the six stages, batch and stepwise
//! execution, session persistence, and action dispatch.

pub mod dispatch;
pub mod orchestrator;
pub mod session;
pub mod stage;
pub mod stages;

pub use dispatch::ActionDispatcher;
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use session::{FileSessionStore, MemorySessionStore, SessionError, SessionStore};
pub use stage::{MissingField, Stage, StageName, StageOutput, UnknownStage};
pub use stages::{classify_business_hours, parse_alert_timestamp, StageRegistry, TimestampError};
