//! Résumé, job-posting and match-result models as returned by the
//! scoring service.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// An uploaded résumé with its extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: DbId,
    pub user_id: DbId,
    pub filename: String,
    /// Extracted plain text; absent when extraction failed.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, with = "crate::types::lenient_timestamp")]
    pub created_at: Option<Timestamp>,
}

/// A job posting scraped from a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: DbId,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default, with = "crate::types::lenient_timestamp")]
    pub created_at: Option<Timestamp>,
}

/// Score and suggestions for one résumé against one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Absent for ad-hoc matches that were not persisted.
    #[serde(default)]
    pub id: Option<DbId>,
    #[serde(default)]
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub resume_id: Option<DbId>,
    #[serde(default)]
    pub job_posting_id: Option<DbId>,
    /// Overall match score, 0-100.
    pub score: i32,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, with = "crate::types::lenient_timestamp")]
    pub created_at: Option<Timestamp>,
}

/// One row of a bulk match: the résumé it was computed for plus its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkMatchItem {
    pub resume_id: DbId,
    pub resume_name: String,
    pub match_result: MatchResult,
}

/// Where the job side of a match comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSource {
    /// A job posting previously parsed and stored by the service.
    Posting(DbId),
    /// Free-form job description supplied by the user as a JSON object.
    Custom(serde_json::Map<String, serde_json::Value>),
}

/// Where the résumé side of a single match comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeSource {
    Stored(DbId),
    Text(String),
}
