//! Push event names and payload types.
//!
//! The server emits `(name, payload)` pairs into the user's room. This
//! module turns them into a strongly-typed [`ServerEvent`] enum.

use std::fmt;
use std::str::FromStr;

use resumatch_core::models::{BulkMatchItem, JobPosting, MatchResult};
use resumatch_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event names the channel recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ParseStarted,
    ParseFinished,
    MatchFinished,
    ProgressUpdate,
    BulkMatchProgress,
    BulkMatchFinished,
}

impl EventName {
    pub const ALL: [EventName; 6] = [
        EventName::ParseStarted,
        EventName::ParseFinished,
        EventName::MatchFinished,
        EventName::ProgressUpdate,
        EventName::BulkMatchProgress,
        EventName::BulkMatchFinished,
    ];

    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::ParseStarted => "parse_started",
            EventName::ParseFinished => "parse_finished",
            EventName::MatchFinished => "match_finished",
            EventName::ProgressUpdate => "progress_update",
            EventName::BulkMatchProgress => "bulk_match_progress",
            EventName::BulkMatchFinished => "bulk_match_finished",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = EventDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| EventDecodeError::UnknownEvent(s.to_string()))
    }
}

/// A push event with its typed payload.
///
/// Deserialized from an adjacently-tagged `{"event": .., "data": ..}`
/// envelope built by [`ServerEvent::from_parts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "parse_started")]
    ParseStarted(ParseStartedData),

    #[serde(rename = "parse_finished")]
    ParseFinished(ParseFinishedData),

    #[serde(rename = "match_finished")]
    MatchFinished(MatchFinishedData),

    /// Generic step progress (0-100) for single operations.
    #[serde(rename = "progress_update")]
    ProgressUpdate(ProgressUpdateData),

    #[serde(rename = "bulk_match_progress")]
    BulkMatchProgress(BulkMatchProgressData),

    #[serde(rename = "bulk_match_finished")]
    BulkMatchFinished(BulkMatchFinishedData),
}

/// Fields shared by every payload: the room owner and, when the server
/// echoes it, the client-generated operation id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(default)]
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub operation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseStartedData {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub job_url: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFinishedData {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub success: bool,
    #[serde(default)]
    pub job_data: Option<JobPosting>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFinishedData {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub success: bool,
    #[serde(default)]
    pub match_result: Option<MatchResult>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdateData {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub step: String,
    /// Completion percentage (0-100).
    pub progress: u8,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkMatchProgressData {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub current: u32,
    pub total: u32,
    pub resume_name: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkMatchFinishedData {
    #[serde(flatten)]
    pub correlation: Correlation,
    pub success: bool,
    #[serde(default)]
    pub results: Option<Vec<BulkMatchItem>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServerEvent {
    /// Build a typed event from a wire `(name, payload)` pair.
    pub fn from_parts(name: &str, data: serde_json::Value) -> Result<Self, EventDecodeError> {
        let event_name: EventName = name.parse()?;
        let envelope = serde_json::json!({ "event": name, "data": data });
        serde_json::from_value(envelope).map_err(|source| EventDecodeError::Payload {
            event: event_name,
            source,
        })
    }

    pub fn name(&self) -> EventName {
        match self {
            ServerEvent::ParseStarted(_) => EventName::ParseStarted,
            ServerEvent::ParseFinished(_) => EventName::ParseFinished,
            ServerEvent::MatchFinished(_) => EventName::MatchFinished,
            ServerEvent::ProgressUpdate(_) => EventName::ProgressUpdate,
            ServerEvent::BulkMatchProgress(_) => EventName::BulkMatchProgress,
            ServerEvent::BulkMatchFinished(_) => EventName::BulkMatchFinished,
        }
    }

    pub fn correlation(&self) -> &Correlation {
        match self {
            ServerEvent::ParseStarted(d) => &d.correlation,
            ServerEvent::ParseFinished(d) => &d.correlation,
            ServerEvent::MatchFinished(d) => &d.correlation,
            ServerEvent::ProgressUpdate(d) => &d.correlation,
            ServerEvent::BulkMatchProgress(d) => &d.correlation,
            ServerEvent::BulkMatchFinished(d) => &d.correlation,
        }
    }

    /// Whether this event ends an operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerEvent::ParseFinished(_)
                | ServerEvent::MatchFinished(_)
                | ServerEvent::BulkMatchFinished(_)
        )
    }
}

/// Errors turning a wire event into a [`ServerEvent`].
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    #[error("Malformed payload for {event}: {source}")]
    Payload {
        event: EventName,
        #[source]
        source: serde_json::Error,
    },
}
