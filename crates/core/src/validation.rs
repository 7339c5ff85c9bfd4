//! Client-side request validation.
//!
//! Everything here runs before a request is issued; a failure never
//! reaches the network.

use serde::Serialize;
use validator::Validate;

use crate::error::CoreError;
use crate::models::{JobSource, ResumeSource};
use crate::types::DbId;

/// Credentials for `login` and `signup`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "a valid email address is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters long"))]
    pub password: String,
}

/// Body of `POST /auth/reset-password`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct PasswordReset {
    #[validate(length(min = 1, message = "reset token is required"))]
    pub token: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters long"))]
    pub password: String,
}

/// Body of `POST /jobs/parse`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct ParseJobRequest {
    #[validate(url(message = "please enter a valid URL"))]
    pub url: String,
}

impl ParseJobRequest {
    /// Trim and validate a user-supplied job URL.
    ///
    /// Only absolute `http`/`https` URLs are accepted.
    pub fn new(url: &str) -> Result<Self, CoreError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CoreError::Validation("please enter a job URL".into()));
        }
        let request = Self { url: url.to_string() };
        request.validate()?;
        let scheme = url.split_once("://").map_or("", |(scheme, _)| scheme);
        if !(scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")) {
            return Err(CoreError::Validation(
                "job URL must use http or https".into(),
            ));
        }
        Ok(request)
    }
}

/// Parse user-entered custom job JSON.
///
/// The text must be a JSON object; anything else is rejected locally.
pub fn parse_custom_job(text: &str) -> Result<JobSource, CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation("please enter custom job data".into()));
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(JobSource::Custom(map)),
        Ok(other) => Err(CoreError::InvalidJobJson(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(CoreError::InvalidJobJson(e.to_string())),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// A validated single-match request.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub resume: ResumeSource,
    pub job: JobSource,
}

impl MatchRequest {
    pub fn new(resume: ResumeSource, job: JobSource) -> Result<Self, CoreError> {
        if let ResumeSource::Text(text) = &resume {
            if text.trim().is_empty() {
                return Err(CoreError::Validation("resume text is empty".into()));
            }
        }
        Ok(Self { resume, job })
    }
}

/// A validated bulk-match request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkMatchRequest {
    pub resume_ids: Vec<DbId>,
    pub job: JobSource,
}

impl BulkMatchRequest {
    /// Duplicated résumé ids are collapsed, keeping first-seen order.
    pub fn new(resume_ids: Vec<DbId>, job: JobSource) -> Result<Self, CoreError> {
        let mut unique = Vec::with_capacity(resume_ids.len());
        for id in resume_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            return Err(CoreError::Validation(
                "please select at least one resume".into(),
            ));
        }
        Ok(Self {
            resume_ids: unique,
            job,
        })
    }
}
