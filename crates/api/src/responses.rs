//! Response envelopes of the scoring service.
//!
//! Every endpoint wraps its payload in a named field; these types exist
//! only to unwrap it.

use resumatch_core::models::{BulkMatchItem, JobPosting, MatchResult, Resume};
use resumatch_core::session::User;
use serde::Deserialize;

/// `POST /auth/login` and `POST /auth/signup`.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Endpoints that only acknowledge with a message.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Error body: `{"error": "...", "detail": "..."}`.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> String {
        match self.detail {
            Some(detail) if !detail.is_empty() => format!("{}: {}", self.error, detail),
            _ => self.error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResumeEnvelope {
    pub resume: Resume,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResumeList {
    pub resumes: Vec<Resume>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobEnvelope {
    pub job_posting: JobPosting,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobList {
    pub job_postings: Vec<JobPosting>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatchEnvelope {
    pub match_result: MatchResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatchHistory {
    pub match_results: Vec<MatchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkMatchResponse {
    #[serde(default)]
    pub results: Vec<BulkMatchItem>,
}
