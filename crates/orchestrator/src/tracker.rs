//! First-wins state machine for one operation kind.
//!
//! [`OperationTracker`] stores the [`OperationState`] in a
//! [`watch::Sender`], so every transition is an atomic check-and-set
//! (`send_if_modified`) whether it comes from an event listener running
//! on the channel task or from the submitting task, and renderers simply
//! subscribe.

use std::future::Future;
use std::sync::Arc;

use resumatch_api::ApiError;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::operation::{
    CorrelationKey, OperationEnvelope, OperationKind, OperationResult, OperationState,
    ProgressSnapshot,
};

pub struct OperationTracker<T> {
    state: Arc<watch::Sender<OperationState<T>>>,
}

impl<T> Clone for OperationTracker<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone> Default for OperationTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OperationTracker<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(OperationState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.state.subscribe()
    }

    /// Enter `Running` for a new operation, discarding the previous result
    /// and progress.
    pub fn start(&self, kind: OperationKind, key: CorrelationKey) -> OperationEnvelope {
        let envelope = OperationEnvelope::new(kind, key);
        self.state.send_replace(OperationState::Running {
            envelope: envelope.clone(),
            progress: None,
        });
        envelope
    }

    /// Replace the progress of the running operation.
    ///
    /// `next` sees the running envelope and the current snapshot and
    /// returns the new snapshot, or `None` to leave it unchanged. Nothing
    /// happens unless an operation is running.
    pub fn update_progress(
        &self,
        next: impl FnOnce(&OperationEnvelope, Option<&ProgressSnapshot>) -> Option<ProgressSnapshot>,
    ) -> bool {
        self.state.send_if_modified(|state| {
            let OperationState::Running { envelope, progress } = state else {
                return false;
            };
            match next(envelope, progress.as_ref()) {
                Some(snapshot) if progress.as_ref() != Some(&snapshot) => {
                    *progress = Some(snapshot);
                    true
                }
                _ => false,
            }
        })
    }

    /// Settle the running operation if `accept` claims it. Returns `false`
    /// when nothing is running, the running operation is another one, or
    /// it already settled.
    pub fn settle_if(
        &self,
        accept: impl FnOnce(&OperationEnvelope) -> bool,
        result: OperationResult<T>,
    ) -> bool {
        self.state.send_if_modified(|state| {
            let OperationState::Running { envelope, .. } = state else {
                return false;
            };
            if !accept(envelope) {
                return false;
            }
            let envelope = envelope.clone();
            tracing::info!(
                operation_id = %envelope.operation_id,
                kind = %envelope.kind,
                success = result.is_success(),
                "Operation settled",
            );
            *state = OperationState::Settled { envelope, result };
            true
        })
    }

    pub fn settle(&self, operation_id: Uuid, result: OperationResult<T>) -> bool {
        self.settle_if(|envelope| envelope.operation_id == operation_id, result)
    }

    /// The result of `operation_id`, once it has settled and is still the
    /// latest operation.
    pub fn result_of(&self, operation_id: Uuid) -> Option<OperationResult<T>> {
        match &*self.state.borrow() {
            OperationState::Settled { envelope, result } if envelope.operation_id == operation_id => {
                Some(result.clone())
            }
            _ => None,
        }
    }

    /// Back to `Idle`.
    pub fn reset(&self) {
        self.state.send_replace(OperationState::Idle);
    }

    /// Run one submission: enter `Running`, issue the request, settle with
    /// its outcome unless a terminal event got there first, and report the
    /// winning result.
    ///
    /// A failed request settles as [`OperationResult::Failed`]. A rejected
    /// session settles the same way but is reported as
    /// [`OrchestratorError::Unauthorized`].
    pub async fn run<F, Fut>(
        &self,
        kind: OperationKind,
        key: CorrelationKey,
        request: F,
    ) -> Result<OperationResult<T>, OrchestratorError>
    where
        F: FnOnce(Uuid) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let envelope = self.start(kind, key);
        let operation_id = envelope.operation_id;
        tracing::info!(%operation_id, %kind, "Operation started");

        let outcome = request(operation_id).await;
        let unauthorized = matches!(outcome, Err(ApiError::Unauthorized));
        let result = match outcome {
            Ok(value) => OperationResult::Succeeded(value),
            Err(e) => {
                tracing::warn!(%operation_id, %kind, error = %e, "Operation request failed");
                OperationResult::Failed(e.to_string())
            }
        };

        if !self.settle(operation_id, result) {
            tracing::debug!(%operation_id, "Response arrived after the operation settled");
        }
        if unauthorized {
            return Err(OrchestratorError::Unauthorized);
        }
        self.result_of(operation_id)
            .ok_or(OrchestratorError::Superseded)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn snapshot(current: u32) -> ProgressSnapshot {
        ProgressSnapshot {
            current,
            total: 2,
            label: format!("{current}.pdf"),
        }
    }

    #[test]
    fn settle_is_first_wins() {
        let tracker = OperationTracker::<u32>::new();
        let envelope = tracker.start(OperationKind::Match, CorrelationKey::Global);

        assert!(tracker.settle(envelope.operation_id, OperationResult::Succeeded(1)));
        assert!(!tracker.settle(envelope.operation_id, OperationResult::Failed("late".into())));
        assert_eq!(
            tracker.result_of(envelope.operation_id),
            Some(OperationResult::Succeeded(1))
        );
    }

    #[test]
    fn settling_another_operation_is_ignored() {
        let tracker = OperationTracker::<u32>::new();
        let first = tracker.start(OperationKind::Match, CorrelationKey::Global);
        let second = tracker.start(OperationKind::Match, CorrelationKey::Global);

        assert!(!tracker.settle(first.operation_id, OperationResult::Succeeded(1)));
        assert!(tracker.state().is_running());
        assert!(tracker.settle(second.operation_id, OperationResult::Succeeded(2)));
        assert_eq!(tracker.result_of(first.operation_id), None);
    }

    #[test]
    fn progress_only_while_running_and_cleared_on_settle() {
        let tracker = OperationTracker::<u32>::new();
        assert!(!tracker.update_progress(|_, _| Some(snapshot(1))));

        let envelope = tracker.start(OperationKind::BulkMatch, CorrelationKey::resumes(&[1, 2]));
        assert!(tracker.update_progress(|_, _| Some(snapshot(1))));
        // Same snapshot again is not a change.
        assert!(!tracker.update_progress(|_, _| Some(snapshot(1))));
        assert_eq!(tracker.state().progress(), Some(&snapshot(1)));

        tracker.settle(envelope.operation_id, OperationResult::Succeeded(0));
        assert_eq!(tracker.state().progress(), None);
        assert!(!tracker.update_progress(|_, _| Some(snapshot(2))));
    }

    #[test]
    fn start_clears_previous_result() {
        let tracker = OperationTracker::<u32>::new();
        let first = tracker.start(OperationKind::Match, CorrelationKey::Global);
        tracker.settle(first.operation_id, OperationResult::Succeeded(1));

        tracker.start(OperationKind::Match, CorrelationKey::Global);
        assert_matches!(tracker.state(), OperationState::Running { progress: None, .. });
    }

    #[tokio::test]
    async fn run_reports_request_failure_as_failed_result() {
        let tracker = OperationTracker::<u32>::new();
        let result = tracker
            .run(OperationKind::Match, CorrelationKey::Global, |_| async {
                Err(ApiError::Status {
                    status: 500,
                    message: "boom".into(),
                })
            })
            .await
            .unwrap();
        assert_matches!(result, OperationResult::Failed(message) if message.contains("boom"));
    }

    #[tokio::test]
    async fn run_keeps_the_result_that_settled_first() {
        let tracker = OperationTracker::<u32>::new();
        let events = tracker.clone();
        let result = tracker
            .run(OperationKind::Match, CorrelationKey::Global, |operation_id| async move {
                // The terminal event wins the race.
                events.settle(operation_id, OperationResult::Succeeded(7));
                Ok(8)
            })
            .await
            .unwrap();
        assert_eq!(result, OperationResult::Succeeded(7));
    }

    #[tokio::test]
    async fn run_reports_unauthorized() {
        let tracker = OperationTracker::<u32>::new();
        let err = tracker
            .run(OperationKind::Parse, CorrelationKey::Global, |_| async {
                Err(ApiError::Unauthorized)
            })
            .await
            .unwrap_err();
        assert_matches!(err, OrchestratorError::Unauthorized);
        assert_matches!(tracker.state().result(), Some(OperationResult::Failed(_)));
    }
}
