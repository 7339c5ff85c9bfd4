//! The triggering requests, behind a trait so orchestrators can be driven
//! by a scripted service in tests.

use async_trait::async_trait;
use resumatch_api::{ApiClient, ApiError};
use resumatch_core::models::{BulkMatchItem, JobPosting, MatchResult};
use resumatch_core::validation::{BulkMatchRequest, MatchRequest, ParseJobRequest};
use uuid::Uuid;

/// Long-running requests of the scoring service.
///
/// Implementations must invalidate the session before returning
/// [`ApiError::Unauthorized`], as [`ApiClient`] does.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn parse_job(
        &self,
        request: &ParseJobRequest,
        operation_id: Uuid,
    ) -> Result<JobPosting, ApiError>;

    async fn match_resume(
        &self,
        request: &MatchRequest,
        operation_id: Uuid,
    ) -> Result<MatchResult, ApiError>;

    async fn bulk_match(
        &self,
        request: &BulkMatchRequest,
        operation_id: Uuid,
    ) -> Result<Vec<BulkMatchItem>, ApiError>;
}

#[async_trait]
impl ScoringService for ApiClient {
    async fn parse_job(
        &self,
        request: &ParseJobRequest,
        operation_id: Uuid,
    ) -> Result<JobPosting, ApiError> {
        ApiClient::parse_job(self, request, operation_id).await
    }

    async fn match_resume(
        &self,
        request: &MatchRequest,
        operation_id: Uuid,
    ) -> Result<MatchResult, ApiError> {
        ApiClient::match_resume(self, request, operation_id).await
    }

    async fn bulk_match(
        &self,
        request: &BulkMatchRequest,
        operation_id: Uuid,
    ) -> Result<Vec<BulkMatchItem>, ApiError> {
        ApiClient::bulk_match(self, request, operation_id).await
    }
}
