//! Single résumé-to-job match orchestration.
//!
//! `match_finished` carries no job or résumé key, so without an echoed
//! `operation_id` it belongs to whatever match is running.

use std::sync::Arc;

use resumatch_api::SessionStore;
use resumatch_core::models::{JobSource, MatchResult, ResumeSource};
use resumatch_core::validation::MatchRequest;
use resumatch_events::{EventName, EventRouter, ListenerGuard, ServerEvent};
use tokio::sync::watch;

use crate::error::OrchestratorError;
use crate::operation::{CorrelationKey, OperationKind, OperationResult, OperationState};
use crate::service::ScoringService;
use crate::subscription::{on_progress_update, Subscription};
use crate::tracker::OperationTracker;

pub struct MatchOrchestrator {
    service: Arc<dyn ScoringService>,
    sessions: SessionStore,
    tracker: OperationTracker<MatchResult>,
    subscription: Subscription,
}

impl MatchOrchestrator {
    pub fn new(
        router: Arc<EventRouter>,
        service: Arc<dyn ScoringService>,
        sessions: SessionStore,
    ) -> Result<Self, OrchestratorError> {
        let user_id = sessions.user_id().ok_or(OrchestratorError::NoSession)?;
        let tracker = OperationTracker::new();
        let mut guard = ListenerGuard::new(router);

        on_progress_update(&mut guard, &tracker, user_id);

        let finished = tracker.clone();
        guard.on(EventName::MatchFinished, move |event| {
            let ServerEvent::MatchFinished(data) = event else {
                return;
            };
            let result = match (data.success, &data.match_result) {
                (true, Some(result)) => OperationResult::Succeeded(result.clone()),
                (true, None) => return,
                (false, _) => OperationResult::Failed(
                    data.message
                        .clone()
                        .unwrap_or_else(|| "Resume matching failed".to_string()),
                ),
            };
            finished.settle_if(
                |envelope| envelope.accepts(&data.correlation, user_id, |_| true),
                result,
            );
        });

        Ok(Self {
            service,
            sessions,
            tracker,
            subscription: Subscription::new(guard, user_id),
        })
    }

    /// Score one résumé against one job.
    pub async fn submit(
        &self,
        resume: ResumeSource,
        job: JobSource,
    ) -> Result<OperationResult<MatchResult>, OrchestratorError> {
        let request = MatchRequest::new(resume, job)?;
        self.subscription.ensure_active(&self.sessions)?;

        let service = Arc::clone(&self.service);
        let outcome = self
            .tracker
            .run(OperationKind::Match, CorrelationKey::Global, |operation_id| async move {
                service.match_resume(&request, operation_id).await
            })
            .await;
        self.subscription.check(outcome)
    }

    pub fn state(&self) -> OperationState<MatchResult> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<MatchResult>> {
        self.tracker.subscribe()
    }
}
