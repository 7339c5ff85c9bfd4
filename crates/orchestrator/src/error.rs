use resumatch_core::error::CoreError;

/// Why a submission produced no result.
///
/// HTTP failures are not errors here: they settle the operation as
/// [`OperationResult::Failed`](crate::OperationResult::Failed).
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Not logged in")]
    NoSession,

    /// The service rejected the session token mid-operation.
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// The channel dropped this orchestrator's listeners (logout, user
    /// switch or disconnect). Build a new orchestrator.
    #[error("Event listeners were removed by a channel teardown")]
    Detached,

    /// A newer submission replaced this one before it settled.
    #[error("Operation superseded by a newer submission")]
    Superseded,
}
