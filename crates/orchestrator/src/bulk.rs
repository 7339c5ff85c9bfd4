//! Bulk match orchestration: several résumés against one job, with a
//! `current` of `total` progress counter.
//!
//! Without an echoed `operation_id`, `bulk_match_finished` belongs to the
//! running bulk match only when its results cover exactly the submitted
//! résumé ids; a failure carries no results and is accepted as is.
//! `bulk_match_progress` names no résumé id, so it must match the
//! submitted count and, until something is shown, start at the first
//! résumé. A `current` lower than the one already shown is ignored.

use std::sync::Arc;

use resumatch_api::SessionStore;
use resumatch_core::models::{BulkMatchItem, JobSource};
use resumatch_core::types::DbId;
use resumatch_core::validation::BulkMatchRequest;
use resumatch_events::{EventName, EventRouter, ListenerGuard, ServerEvent};
use tokio::sync::watch;

use crate::error::OrchestratorError;
use crate::operation::{
    CorrelationKey, OperationKind, OperationResult, OperationState, ProgressSnapshot,
};
use crate::service::ScoringService;
use crate::subscription::Subscription;
use crate::tracker::OperationTracker;

pub struct BulkMatchOrchestrator {
    service: Arc<dyn ScoringService>,
    sessions: SessionStore,
    tracker: OperationTracker<Vec<BulkMatchItem>>,
    subscription: Subscription,
}

impl BulkMatchOrchestrator {
    pub fn new(
        router: Arc<EventRouter>,
        service: Arc<dyn ScoringService>,
        sessions: SessionStore,
    ) -> Result<Self, OrchestratorError> {
        let user_id = sessions.user_id().ok_or(OrchestratorError::NoSession)?;
        let tracker = OperationTracker::new();
        let mut guard = ListenerGuard::new(router);

        let progress = tracker.clone();
        guard.on(EventName::BulkMatchProgress, move |event| {
            let ServerEvent::BulkMatchProgress(data) = event else {
                return;
            };
            progress.update_progress(|envelope, shown| {
                let total = usize::try_from(data.total).unwrap_or(usize::MAX);
                let implicit = |key: &CorrelationKey| {
                    key.resume_count() == Some(total) && (shown.is_some() || data.current == 1)
                };
                if !envelope.accepts(&data.correlation, user_id, implicit) {
                    return None;
                }
                if shown.is_some_and(|p| data.current < p.current) {
                    tracing::debug!(
                        current = data.current,
                        total = data.total,
                        "Ignoring out-of-order bulk progress",
                    );
                    return None;
                }
                Some(ProgressSnapshot {
                    current: data.current,
                    total: data.total,
                    label: data.resume_name.clone(),
                })
            });
        });

        let finished = tracker.clone();
        guard.on(EventName::BulkMatchFinished, move |event| {
            let ServerEvent::BulkMatchFinished(data) = event else {
                return;
            };
            let result = if data.success {
                OperationResult::Succeeded(data.results.clone().unwrap_or_default())
            } else {
                OperationResult::Failed(
                    data.message
                        .clone()
                        .unwrap_or_else(|| "Bulk matching failed".to_string()),
                )
            };
            finished.settle_if(
                |envelope| {
                    envelope.accepts(&data.correlation, user_id, |key| match &data.results {
                        Some(results) => key.is_resume_set(results.iter().map(|r| r.resume_id)),
                        None => !data.success,
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

    /// Match every résumé in `resume_ids` against `job`.
    ///
    /// At least one résumé is required; duplicates are collapsed.
    pub async fn submit(
        &self,
        resume_ids: Vec<DbId>,
        job: JobSource,
    ) -> Result<OperationResult<Vec<BulkMatchItem>>, OrchestratorError> {
        let request = BulkMatchRequest::new(resume_ids, job)?;
        self.subscription.ensure_active(&self.sessions)?;

        let key = CorrelationKey::resumes(&request.resume_ids);
        let service = Arc::clone(&self.service);
        let outcome = self
            .tracker
            .run(OperationKind::BulkMatch, key, |operation_id| async move {
                service.bulk_match(&request, operation_id).await
            })
            .await;
        self.subscription.check(outcome)
    }

    pub fn state(&self) -> OperationState<Vec<BulkMatchItem>> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<Vec<BulkMatchItem>>> {
        self.tracker.subscribe()
    }
}
