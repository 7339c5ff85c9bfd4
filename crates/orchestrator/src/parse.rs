//! Job-posting parse orchestration.
//!
//! Events are matched on the echoed `operation_id`, or else on the job
//! URL (`parse_started.job_url`, `parse_finished.job_data.url`). A failed
//! `parse_finished` carries no job data; it settles whatever parse is
//! running.

use std::sync::Arc;

use resumatch_api::SessionStore;
use resumatch_core::models::JobPosting;
use resumatch_core::validation::ParseJobRequest;
use resumatch_events::{EventName, EventRouter, ListenerGuard, ServerEvent};
use tokio::sync::watch;

use crate::error::OrchestratorError;
use crate::operation::{
    CorrelationKey, OperationKind, OperationResult, OperationState, ProgressSnapshot,
};
use crate::service::ScoringService;
use crate::subscription::{on_progress_update, Subscription};
use crate::tracker::OperationTracker;

fn is_url(key: &CorrelationKey, url: &str) -> bool {
    matches!(key, CorrelationKey::JobUrl(active) if active == url)
}

pub struct JobParseOrchestrator {
    service: Arc<dyn ScoringService>,
    sessions: SessionStore,
    tracker: OperationTracker<JobPosting>,
    subscription: Subscription,
}

impl JobParseOrchestrator {
    /// Register the parse listeners on `router`. Requires a session.
    pub fn new(
        router: Arc<EventRouter>,
        service: Arc<dyn ScoringService>,
        sessions: SessionStore,
    ) -> Result<Self, OrchestratorError> {
        let user_id = sessions.user_id().ok_or(OrchestratorError::NoSession)?;
        let tracker = OperationTracker::new();
        let mut guard = ListenerGuard::new(router);

        let started = tracker.clone();
        guard.on(EventName::ParseStarted, move |event| {
            let ServerEvent::ParseStarted(data) = event else {
                return;
            };
            started.update_progress(|envelope, current| {
                envelope
                    .accepts(&data.correlation, user_id, |key| is_url(key, &data.job_url))
                    .then(|| ProgressSnapshot {
                        current: current.map_or(0, |p| p.current),
                        total: 100,
                        label: data
                            .message
                            .clone()
                            .unwrap_or_else(|| "Parsing job posting".to_string()),
                    })
            });
        });

        on_progress_update(&mut guard, &tracker, user_id);

        let finished = tracker.clone();
        guard.on(EventName::ParseFinished, move |event| {
            let ServerEvent::ParseFinished(data) = event else {
                return;
            };
            let result = match (data.success, &data.job_data) {
                (true, Some(job)) => OperationResult::Succeeded(job.clone()),
                // Nothing to settle with; the response will carry the job.
                (true, None) => return,
                (false, _) => OperationResult::Failed(
                    data.message.clone().unwrap_or_else(|| "Job parsing failed".to_string()),
                ),
            };
            finished.settle_if(
                |envelope| {
                    envelope.accepts(&data.correlation, user_id, |key| match &data.job_data {
                        Some(job) => is_url(key, &job.url),
                        None => true,
                    })
                },
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

    /// Parse the job posting at `url`.
    ///
    /// An invalid URL is rejected without any request. Otherwise the
    /// result is whichever of the HTTP response and `parse_finished`
    /// arrived first.
    pub async fn submit(&self, url: &str) -> Result<OperationResult<JobPosting>, OrchestratorError> {
        let request = ParseJobRequest::new(url)?;
        self.subscription.ensure_active(&self.sessions)?;

        let key = CorrelationKey::JobUrl(request.url.clone());
        let service = Arc::clone(&self.service);
        let outcome = self
            .tracker
            .run(OperationKind::Parse, key, |operation_id| async move {
                service.parse_job(&request, operation_id).await
            })
            .await;
        self.subscription.check(outcome)
    }

    pub fn state(&self) -> OperationState<JobPosting> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<JobPosting>> {
        self.tracker.subscribe()
    }
}
