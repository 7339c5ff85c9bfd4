//! Operation envelope, progress snapshot and orchestrator state.

use std::fmt;

use chrono::Utc;
use resumatch_core::types::{DbId, Timestamp};
use resumatch_events::messages::Correlation;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Parse,
    Match,
    BulkMatch,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Parse => "parse",
            OperationKind::Match => "match",
            OperationKind::BulkMatch => "bulk_match",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallback correlation for events that do not echo an `operation_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
    /// Job parse: the submitted URL.
    JobUrl(String),
    /// Single match: any event of the right kind belongs to the active
    /// operation.
    Global,
    /// Bulk match: the submitted résumé ids, sorted and deduplicated.
    Resumes(Vec<DbId>),
}

impl CorrelationKey {
    /// Bulk match key for `ids` in any order.
    pub fn resumes(ids: &[DbId]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        CorrelationKey::Resumes(ids)
    }

    /// Whether `ids`, in any order, are exactly the résumés of a bulk key.
    pub fn is_resume_set(&self, ids: impl IntoIterator<Item = DbId>) -> bool {
        let CorrelationKey::Resumes(expected) = self else {
            return false;
        };
        let mut actual: Vec<DbId> = ids.into_iter().collect();
        actual.sort_unstable();
        actual.dedup();
        *expected == actual
    }

    /// Number of résumés in a bulk key.
    pub fn resume_count(&self) -> Option<usize> {
        match self {
            CorrelationKey::Resumes(ids) => Some(ids.len()),
            _ => None,
        }
    }
}

/// Correlation context for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationEnvelope {
    /// Client-generated, sent with the triggering request.
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub key: CorrelationKey,
    pub started_at: Timestamp,
}

impl OperationEnvelope {
    pub fn new(kind: OperationKind, key: CorrelationKey) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            kind,
            key,
            started_at: Utc::now(),
        }
    }

    /// Whether an inbound event belongs to this operation.
    ///
    /// Events addressed to another user never match. An echoed
    /// `operation_id` decides on its own; without one, `implicit` checks
    /// the event against [`key`](Self::key).
    pub fn accepts(
        &self,
        correlation: &Correlation,
        session_user: DbId,
        implicit: impl FnOnce(&CorrelationKey) -> bool,
    ) -> bool {
        if correlation.user_id.is_some_and(|user| user != session_user) {
            return false;
        }
        match correlation.operation_id {
            Some(id) => id == self.operation_id,
            None => implicit(&self.key),
        }
    }
}

/// Final outcome of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Succeeded(T),
    Failed(String),
}

impl<T> OperationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Succeeded(_))
    }
}

/// Progress of a running operation. For single operations `total` is
/// 100 and `current` a percentage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub current: u32,
    pub total: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationState<T> {
    Idle,
    Running {
        envelope: OperationEnvelope,
        progress: Option<ProgressSnapshot>,
    },
    Settled {
        envelope: OperationEnvelope,
        result: OperationResult<T>,
    },
}

impl<T> OperationState<T> {
    pub fn envelope(&self) -> Option<&OperationEnvelope> {
        match self {
            OperationState::Idle => None,
            OperationState::Running { envelope, .. } | OperationState::Settled { envelope, .. } => {
                Some(envelope)
            }
        }
    }

    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        match self {
            OperationState::Running { progress, .. } => progress.as_ref(),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&OperationResult<T>> {
        match self {
            OperationState::Settled { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, OperationState::Running { .. })
    }
}
