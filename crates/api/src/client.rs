//! HTTP client for the scoring service REST endpoints.

use std::path::Path;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use resumatch_core::error::CoreError;
use resumatch_core::models::{
    BulkMatchItem, JobPosting, JobSource, MatchResult, Resume, ResumeSource,
};
use resumatch_core::session::Session;
use resumatch_core::types::DbId;
use resumatch_core::validation::{
    BulkMatchRequest, Credentials, MatchRequest, ParseJobRequest, PasswordReset,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::responses::{
    AuthResponse, BulkMatchResponse, ErrorBody, JobEnvelope, JobList, MatchEnvelope,
    MatchHistory, MessageResponse, ResumeEnvelope, ResumeList,
};
use crate::session::SessionStore;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client bound to one service base URL and one [`SessionStore`].
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    sessions: SessionStore,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://host:5000/api`).
    pub fn new(
        base_url: &str,
        timeout: Duration,
        sessions: SessionStore,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, sessions))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, sessions: SessionStore) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    // ---- auth ----

    /// Create an account and start a session for it.
    pub async fn signup(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        self.authenticate("auth/signup", credentials).await
    }

    /// Log in and start a session. The session is persisted and published
    /// on the [`SessionStore`].
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        self.authenticate("auth/login", credentials).await
    }

    async fn authenticate(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> Result<Session, ApiError> {
        credentials.validate().map_err(CoreError::from)?;
        let response = self
            .client
            .post(self.url(path))
            .json(credentials)
            .send()
            .await?;
        let auth: AuthResponse = Self::parse_response(response).await?;

        let session = Session::new(auth.token, auth.user);
        self.sessions.login(session.clone()).await?;
        Ok(session)
    }

    /// End the session locally. The service keeps no server-side session.
    pub async fn logout(&self) -> Result<(), ApiError> {
        Ok(self.sessions.logout().await?)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<String, ApiError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(CoreError::Validation("email is required".into()).into());
        }
        let response = self
            .client
            .post(self.url("auth/request-password-reset"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        let ack: MessageResponse = Self::parse_response(response).await?;
        Ok(ack.message)
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<String, ApiError> {
        reset.validate().map_err(CoreError::from)?;
        let response = self
            .client
            .post(self.url("auth/reset-password"))
            .json(reset)
            .send()
            .await?;
        let ack: MessageResponse = Self::parse_response(response).await?;
        Ok(ack.message)
    }

    // ---- résumés ----

    /// Upload a résumé file as `multipart/form-data`.
    pub async fn upload_resume(&self, path: &Path) -> Result<Resume, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CoreError::Validation(format!("cannot read {}: {e}", path.display())))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume".to_string());

        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename));
        let response = self
            .authed(self.client.post(self.url("resumes")).multipart(form))
            .await?;
        let envelope: ResumeEnvelope = Self::parse_response(response).await?;
        Ok(envelope.resume)
    }

    pub async fn list_resumes(&self) -> Result<Vec<Resume>, ApiError> {
        let response = self.authed(self.client.get(self.url("resumes"))).await?;
        let list: ResumeList = Self::parse_response(response).await?;
        Ok(list.resumes)
    }

    pub async fn get_resume(&self, id: DbId) -> Result<Resume, ApiError> {
        let response = self
            .authed(self.client.get(self.url(&format!("resumes/{id}"))))
            .await?;
        let envelope: ResumeEnvelope = Self::parse_response(response).await?;
        Ok(envelope.resume)
    }

    pub async fn delete_resume(&self, id: DbId) -> Result<String, ApiError> {
        let response = self
            .authed(self.client.delete(self.url(&format!("resumes/{id}"))))
            .await?;
        let ack: MessageResponse = Self::parse_response(response).await?;
        Ok(ack.message)
    }

    // ---- jobs ----

    /// Trigger a job-posting parse. Progress and completion are also
    /// pushed on the channel, tagged with `operation_id`.
    pub async fn parse_job(
        &self,
        request: &ParseJobRequest,
        operation_id: Uuid,
    ) -> Result<JobPosting, ApiError> {
        let body = json!({ "url": request.url, "operationId": operation_id });
        let response = self
            .authed(self.client.post(self.url("jobs/parse")).json(&body))
            .await?;
        let envelope: JobEnvelope = Self::parse_response(response).await?;
        Ok(envelope.job_posting)
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobPosting>, ApiError> {
        let response = self.authed(self.client.get(self.url("jobs"))).await?;
        let list: JobList = Self::parse_response(response).await?;
        Ok(list.job_postings)
    }

    pub async fn get_job(&self, id: DbId) -> Result<JobPosting, ApiError> {
        let response = self
            .authed(self.client.get(self.url(&format!("jobs/{id}"))))
            .await?;
        let envelope: JobEnvelope = Self::parse_response(response).await?;
        Ok(envelope.job_posting)
    }

    pub async fn delete_job(&self, id: DbId) -> Result<String, ApiError> {
        let response = self
            .authed(self.client.delete(self.url(&format!("jobs/{id}"))))
            .await?;
        let ack: MessageResponse = Self::parse_response(response).await?;
        Ok(ack.message)
    }

    // ---- matching ----

    pub async fn match_resume(
        &self,
        request: &MatchRequest,
        operation_id: Uuid,
    ) -> Result<MatchResult, ApiError> {
        let body = match_body(request, operation_id);
        let response = self
            .authed(self.client.post(self.url("match")).json(&body))
            .await?;
        let envelope: MatchEnvelope = Self::parse_response(response).await?;
        Ok(envelope.match_result)
    }

    pub async fn bulk_match(
        &self,
        request: &BulkMatchRequest,
        operation_id: Uuid,
    ) -> Result<Vec<BulkMatchItem>, ApiError> {
        let body = bulk_match_body(request, operation_id);
        let response = self
            .authed(self.client.post(self.url("match/bulk")).json(&body))
            .await?;
        let bulk: BulkMatchResponse = Self::parse_response(response).await?;
        Ok(bulk.results)
    }

    pub async fn match_history(&self) -> Result<Vec<MatchResult>, ApiError> {
        let response = self.authed(self.client.get(self.url("match/history"))).await?;
        let history: MatchHistory = Self::parse_response(response).await?;
        Ok(history.match_results)
    }

    pub async fn get_match(&self, id: DbId) -> Result<MatchResult, ApiError> {
        let response = self
            .authed(self.client.get(self.url(&format!("match/{id}"))))
            .await?;
        let envelope: MatchEnvelope = Self::parse_response(response).await?;
        Ok(envelope.match_result)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Attach the bearer token and send. A `401` invalidates the session.
    async fn authed(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let session = self.sessions.current().ok_or(ApiError::NoSession)?;
        let response = request
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.sessions.invalidate().await;
            return Err(ApiError::Unauthorized);
        }
        Ok(response)
    }

    /// Ensure the response has a success status code. On failure the
    /// service's `{"error": ...}` body becomes the error message.
    async fn ensure_success(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(ErrorBody::into_message)
            .unwrap_or(body);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Self::decode_body(response).await
    }

    async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn insert_job(body: &mut Map<String, Value>, job: &JobSource) {
    match job {
        JobSource::Posting(id) => {
            body.insert("jobPostingId".into(), json!(id));
        }
        JobSource::Custom(data) => {
            body.insert("jobData".into(), Value::Object(data.clone()));
        }
    }
}

/// Body of `POST /match`.
pub fn match_body(request: &MatchRequest, operation_id: Uuid) -> Value {
    let mut body = Map::new();
    match &request.resume {
        ResumeSource::Stored(id) => {
            body.insert("resumeId".into(), json!(id));
        }
        ResumeSource::Text(text) => {
            body.insert("resumeText".into(), json!(text));
        }
    }
    insert_job(&mut body, &request.job);
    body.insert("operationId".into(), json!(operation_id));
    Value::Object(body)
}

/// Body of `POST /match/bulk`.
pub fn bulk_match_body(request: &BulkMatchRequest, operation_id: Uuid) -> Value {
    let mut body = Map::new();
    body.insert("resumeIds".into(), json!(request.resume_ids));
    insert_job(&mut body, &request.job);
    body.insert("operationId".into(), json!(operation_id));
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_body_uses_service_field_names() {
        let op = Uuid::new_v4();
        let request = MatchRequest::new(ResumeSource::Stored(4), JobSource::Posting(7)).unwrap();
        assert_eq!(
            match_body(&request, op),
            json!({"resumeId": 4, "jobPostingId": 7, "operationId": op.to_string()})
        );
    }

    #[test]
    fn custom_job_is_sent_as_job_data() {
        let op = Uuid::new_v4();
        let mut data = Map::new();
        data.insert("title".into(), json!("Engineer"));
        let request = MatchRequest::new(
            ResumeSource::Text("Rust, Tokio".into()),
            JobSource::Custom(data),
        )
        .unwrap();

        let body = match_body(&request, op);
        assert_eq!(body["resumeText"], "Rust, Tokio");
        assert_eq!(body["jobData"]["title"], "Engineer");
        assert!(body.get("jobPostingId").is_none());
    }

    #[test]
    fn bulk_body_lists_resume_ids() {
        let op = Uuid::new_v4();
        let request = BulkMatchRequest::new(vec![1, 2], JobSource::Posting(7)).unwrap();
        assert_eq!(
            bulk_match_body(&request, op),
            json!({"resumeIds": [1, 2], "jobPostingId": 7, "operationId": op.to_string()})
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = ApiClient::with_client(
            reqwest::Client::new(),
            "http://localhost:5000/api/",
            SessionStore::in_memory(),
        );
        assert_eq!(client.url("match/bulk"), "http://localhost:5000/api/match/bulk");
    }
}
