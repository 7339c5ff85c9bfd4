//! Job orchestration: drive one long-running operation (job parse,
//! single match, bulk match) from submission to a single settled result.
//!
//! Two sources can complete an operation: the HTTP response of the
//! triggering request and the terminal push event. Whichever arrives
//! first for the active operation settles it; the second is a no-op.
//! State is published on a `watch` channel for whatever renders it.

pub mod bulk;
pub mod error;
pub mod matching;
pub mod operation;
pub mod parse;
pub mod service;
mod subscription;
pub mod tracker;

pub use bulk::BulkMatchOrchestrator;
pub use error::OrchestratorError;
pub use matching::MatchOrchestrator;
pub use operation::{
    CorrelationKey, OperationEnvelope, OperationKind, OperationResult, OperationState,
    ProgressSnapshot,
};
pub use parse::JobParseOrchestrator;
pub use service::ScoringService;
pub use tracker::OperationTracker;
