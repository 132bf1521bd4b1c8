//! inquest - security-alert investigation orchestrator
//!
//! A Rust orchestrator that investigates one security alert at a time by
//! running it through a fixed pipeline of enrichment and decision stages,
//! accumulating results into a single investigation record, and dispatching
//! the decided remediation actions.
//!
//! # Architecture
//!
//! The system is built around a uniform stage contract:
//! - Six stages (validate, extract_iocs, check_reputation, enrich_asset,
//!   decide, execute), each owning exactly one field of the record
//! - Dependencies between stages are declared and checked, never implied
//! - External capabilities (LLM, reputation API, asset inventory, SOAR) sit
//!   behind narrow collaborator traits and their failures degrade to safe
//!   defaults instead of aborting the investigation
//!
//! # Modules
//!
//! - `adapters`: External collaborators (Mistral, VirusTotal, CSV inventory,
//!   simulated SOAR, mocks)
//! - `core`: Orchestration logic (stages, sessions, dispatch)
//! - `domain`: Data structures (Alert, Investigation, Verdict)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Analyze one alert end to end
//! inquest analyze --index 0
//!
//! # Stepwise investigation over a persisted session
//! inquest start
//! inquest step <session-id> validate
//! inquest step <session-id> extract_iocs
//! inquest show <session-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{Orchestrator, OrchestratorError, StageName, StageOutput};
pub use crate::domain::{Alert, Investigation, IocBundle, Severity, Verdict};
