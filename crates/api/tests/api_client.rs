//! Integration tests for [`ApiClient`] against a loopback HTTP stub.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use resumatch_api::{ApiClient, ApiError, CredentialStore, SessionStore};
use resumatch_core::models::JobSource;
use resumatch_core::session::{Session, User};
use resumatch_core::validation::{BulkMatchRequest, Credentials, ParseJobRequest};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Stub server
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Clone)]
struct Stub {
    responses: Arc<Mutex<VecDeque<(u16, Value)>>>,
    requests: mpsc::UnboundedSender<Recorded>,
}

async fn record(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let _ = stub.requests.send(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let next = stub.responses.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => (StatusCode::from_u16(status).unwrap(), Json(body)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "no canned response left"})),
        ),
    }
}

/// Answer every request with the next canned response, in order. Returns
/// the API base URL and the requests as they arrive.
async fn stub(responses: Vec<(u16, Value)>) -> (String, mpsc::UnboundedReceiver<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    let app = Router::new().fallback(record).with_state(Stub {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: tx,
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api"), rx)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session() -> Session {
    Session::new(
        "tok-5",
        User {
            id: 5,
            email: "ada@example.com".into(),
            created_at: None,
        },
    )
}

fn client(base_url: &str, sessions: SessionStore) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(5), sessions).unwrap()
}

async fn logged_in(base_url: &str) -> ApiClient {
    let sessions = SessionStore::in_memory();
    sessions.login(session()).await.unwrap();
    client(base_url, sessions)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_starts_and_persists_a_session() {
    let (base, mut requests) = stub(vec![(
        200,
        json!({
            "message": "Login successful",
            "token": "tok-5",
            "user": {"id": 5, "email": "ada@example.com", "created_at": "2024-05-01T10:00:00.123456"}
        }),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let api = client(&base, SessionStore::new(CredentialStore::new(&path)));

    let session = api
        .login(&Credentials {
            email: "ada@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();

    assert_eq!(session.user_id(), 5);
    assert_eq!(api.sessions().user_id(), Some(5));
    assert!(path.exists());

    let request = requests.recv().await.unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/auth/login");
    assert_eq!(request.authorization, None);
    assert_eq!(request.json()["email"], "ada@example.com");
}

#[tokio::test]
async fn rejected_login_is_a_status_error_not_an_invalidation() {
    let (base, _requests) = stub(vec![(401, json!({"error": "Invalid email or password"}))]).await;
    let api = client(&base, SessionStore::in_memory());

    let err = api
        .login(&Credentials {
            email: "ada@example.com".into(),
            password: "wrong-password".into(),
        })
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ApiError::Status { status: 401, message } if message == "Invalid email or password"
    );
}

#[tokio::test]
async fn invalid_credentials_never_reach_the_network() {
    let api = client("http://127.0.0.1:9/api", SessionStore::in_memory());
    let err = api
        .login(&Credentials {
            email: "not-an-email".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ApiError::Validation(_));
}

#[tokio::test]
async fn authenticated_requests_carry_the_bearer_token() {
    let (base, mut requests) = stub(vec![(
        200,
        json!({"resumes": [{"id": 1, "user_id": 5, "filename": "a.pdf", "text": "Rust"}]}),
    )])
    .await;
    let api = logged_in(&base).await;

    let resumes = api.list_resumes().await.unwrap();
    assert_eq!(resumes.len(), 1);
    assert_eq!(resumes[0].filename, "a.pdf");

    let request = requests.recv().await.unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/api/resumes");
    assert_eq!(request.authorization.as_deref(), Some("Bearer tok-5"));
}

#[tokio::test]
async fn unauthorized_response_clears_session_and_credentials() {
    let (base, _requests) = stub(vec![(401, json!({"error": "Token has expired"}))]).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let sessions = SessionStore::new(CredentialStore::new(&path));
    sessions.login(session()).await.unwrap();
    let mut changes = sessions.subscribe();
    let api = client(&base, sessions.clone());

    let err = api.list_jobs().await.unwrap_err();

    assert_matches!(err, ApiError::Unauthorized);
    assert!(!sessions.is_authenticated());
    assert!(!path.exists());
    assert_eq!(*changes.borrow_and_update(), None);
}

#[tokio::test]
async fn requests_without_session_fail_locally() {
    let api = client("http://127.0.0.1:9/api", SessionStore::in_memory());
    assert_matches!(api.match_history().await, Err(ApiError::NoSession));
}

#[tokio::test]
async fn service_error_body_becomes_the_message() {
    let (base, _requests) = stub(vec![(
        500,
        json!({"error": "Failed to parse job posting", "detail": "upstream timeout"}),
    )])
    .await;
    let api = logged_in(&base).await;
    let request = ParseJobRequest::new("https://jobs.example.com/1").unwrap();

    let err = api.parse_job(&request, Uuid::new_v4()).await.unwrap_err();

    assert_matches!(
        err,
        ApiError::Status { status: 500, message }
            if message == "Failed to parse job posting: upstream timeout"
    );
    assert!(api.sessions().is_authenticated());
}

#[tokio::test]
async fn bulk_match_sends_operation_id_and_unwraps_results() {
    let (base, mut requests) = stub(vec![(
        200,
        json!({
            "message": "Bulk matching completed for 2 resumes",
            "results": [
                {"resume_id": 1, "resume_name": "a.pdf", "match_result": {"score": 70}},
                {"resume_id": 2, "resume_name": "b.pdf", "match_result": {"score": 85}}
            ]
        }),
    )])
    .await;
    let api = logged_in(&base).await;
    let op = Uuid::new_v4();
    let request = BulkMatchRequest::new(vec![1, 2], JobSource::Posting(7)).unwrap();

    let results = api.bulk_match(&request, op).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].match_result.score, 85);

    let recorded = requests.recv().await.unwrap();
    assert_eq!(recorded.path, "/api/match/bulk");
    assert_eq!(
        recorded.json(),
        json!({"resumeIds": [1, 2], "jobPostingId": 7, "operationId": op.to_string()})
    );
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    let (base, _requests) = stub(vec![(200, json!({"unexpected": true}))]).await;
    let api = logged_in(&base).await;
    assert_matches!(api.get_match(3).await, Err(ApiError::Decode(_)));
}
