//! Domain types for the inquest orchestrator.
//!
//! This module contains the core data structures:
//! - Alert: the immutable input under investigation
//! - Investigation: the record accumulated across pipeline stages
//! - Verdict and friends: typed stage results

pub mod alert;
pub mod investigation;
pub mod verdict;

// Re-export commonly used types
pub use alert::Alert;
pub use investigation::{Investigation, RecordField};
pub use verdict::{
    ActionOutcome, ActionRequest, AssetContext, AssetRecord, DispatchStatus, IocBundle, IocKind,
    Severity, Verdict,
};
