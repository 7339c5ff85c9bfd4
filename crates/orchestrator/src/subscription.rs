use std::sync::{Mutex, PoisonError};

use resumatch_api::SessionStore;
use resumatch_core::types::DbId;
use resumatch_events::{EventName, ListenerGuard, ServerEvent};

use crate::error::OrchestratorError;
use crate::operation::ProgressSnapshot;
use crate::tracker::OperationTracker;

/// An orchestrator's listener registrations and the user they were made
/// for.
///
/// Released on drop (view unmount) or explicitly once the session is
/// rejected. Once released, nothing registers again.
pub(crate) struct Subscription {
    guard: Mutex<Option<ListenerGuard>>,
    user_id: DbId,
}

impl Subscription {
    pub(crate) fn new(guard: ListenerGuard, user_id: DbId) -> Self {
        Self {
            guard: Mutex::new(Some(guard)),
            user_id,
        }
    }

    /// A submission needs live listeners and the session they were
    /// registered for.
    ///
    /// Listeners removed by a channel teardown are not registered again:
    /// the subscription is released and the submission refused.
    pub(crate) fn ensure_active(&self, sessions: &SessionStore) -> Result<(), OrchestratorError> {
        let attached = {
            let guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                None => return Err(OrchestratorError::NoSession),
                Some(guard) => guard.is_attached(),
            }
        };
        if !attached {
            tracing::warn!(user_id = self.user_id, "Listeners were torn down with the channel");
            self.release();
            return Err(OrchestratorError::Detached);
        }
        if sessions.user_id() == Some(self.user_id) {
            Ok(())
        } else {
            Err(OrchestratorError::NoSession)
        }
    }

    /// Pass `outcome` through, releasing the listeners if the session was
    /// rejected.
    pub(crate) fn check<T>(
        &self,
        outcome: Result<T, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        if matches!(outcome, Err(OrchestratorError::Unauthorized)) {
            self.release();
        }
        outcome
    }

    pub(crate) fn release(&self) {
        let guard = self
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(guard) = guard {
            tracing::debug!(
                user_id = self.user_id,
                listeners = guard.len(),
                "Releasing orchestrator listeners",
            );
        }
    }
}

/// Register the generic `progress_update` listener: a 0-100 percentage
/// for the running operation.
pub(crate) fn on_progress_update<T>(
    guard: &mut ListenerGuard,
    tracker: &OperationTracker<T>,
    user_id: DbId,
) where
    T: Clone + Send + Sync + 'static,
{
    let tracker = tracker.clone();
    guard.on(EventName::ProgressUpdate, move |event| {
        let ServerEvent::ProgressUpdate(data) = event else {
            return;
        };
        tracker.update_progress(|envelope, _| {
            envelope
                .accepts(&data.correlation, user_id, |_| true)
                .then(|| ProgressSnapshot {
                    current: u32::from(data.progress.min(100)),
                    total: 100,
                    label: if data.message.is_empty() {
                        data.step.clone()
                    } else {
                        data.message.clone()
                    },
                })
        });
    });
}
