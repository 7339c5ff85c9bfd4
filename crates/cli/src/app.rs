//! Wires the session store, REST client, push channel and orchestrators
//! together and runs one [`Command`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use resumatch_api::{ApiClient, CredentialStore, SessionStore};
use resumatch_channel::{ChannelClient, WsConnector};
use resumatch_core::models::{JobSource, ResumeSource};
use resumatch_core::validation::{parse_custom_job, Credentials};
use resumatch_events::EventRouter;
use resumatch_orchestrator::{
    BulkMatchOrchestrator, JobParseOrchestrator, MatchOrchestrator, OperationResult,
    OperationState, OrchestratorError, ScoringService,
};
use tokio::sync::watch;

use crate::command::{Command, JobArg};
use crate::config::ClientConfig;
use crate::render;

pub struct App {
    sessions: SessionStore,
    api: ApiClient,
    channel: Arc<ChannelClient>,
}

impl App {
    /// Build the client stack and restore any stored session.
    pub async fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let sessions = SessionStore::new(CredentialStore::new(&config.credentials_path));
        if let Some(session) = sessions
            .restore()
            .await
            .context("Failed to read stored credentials")?
        {
            tracing::debug!(user_id = session.user_id(), "Restored session");
        }

        let api = ApiClient::new(&config.api_url, config.request_timeout, sessions.clone())?;
        let channel = Arc::new(ChannelClient::new(
            Arc::new(WsConnector::new(&config.channel_url)),
            Arc::new(EventRouter::new()),
            config.reconnect.clone(),
        ));

        Ok(Self {
            sessions,
            api,
            channel,
        })
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Signup { email, password } => {
                let session = self.api.signup(&Credentials { email, password }).await?;
                println!("Signed up as {}", session.user.email);
            }
            Command::Login { email, password } => {
                let session = self.api.login(&Credentials { email, password }).await?;
                println!("Logged in as {}", session.user.email);
            }
            Command::Logout => {
                self.api.logout().await?;
                println!("Logged out");
            }
            Command::Resumes => {
                for resume in self.api.list_resumes().await? {
                    println!("{}", render::resume(&resume));
                }
            }
            Command::Upload { path } => {
                let resume = self.api.upload_resume(&path).await?;
                println!("Uploaded {}", render::resume(&resume));
            }
            Command::Jobs => {
                for job in self.api.list_jobs().await? {
                    println!("{}", render::job_posting(&job));
                }
            }
            Command::History => {
                for result in self.api.match_history().await? {
                    println!("{}", render::history_entry(&result));
                }
            }
            Command::Parse { url } => {
                let job = self
                    .with_channel(|router, service| async move {
                        let orchestrator =
                            JobParseOrchestrator::new(router, service, self.sessions.clone())?;
                        track(orchestrator.subscribe(), orchestrator.submit(&url)).await
                    })
                    .await?;
                println!("{}", render::job_posting(&job));
            }
            Command::Match { resume_id, job } => {
                let job = load_job(job).await?;
                let result = self
                    .with_channel(|router, service| async move {
                        let orchestrator =
                            MatchOrchestrator::new(router, service, self.sessions.clone())?;
                        let submit = orchestrator.submit(ResumeSource::Stored(resume_id), job);
                        track(orchestrator.subscribe(), submit).await
                    })
                    .await?;
                println!("{}", render::match_result(&result));
            }
            Command::Bulk { job, resume_ids } => {
                let job = load_job(job).await?;
                let items = self
                    .with_channel(|router, service| async move {
                        let orchestrator =
                            BulkMatchOrchestrator::new(router, service, self.sessions.clone())?;
                        track(orchestrator.subscribe(), orchestrator.submit(resume_ids, job)).await
                    })
                    .await?;
                println!("{}", render::bulk_results(&items));
            }
        }
        Ok(())
    }

    /// Run `f` with the push channel open for the current session, then
    /// close it again.
    ///
    /// A channel that cannot be opened only costs progress updates: the
    /// HTTP response still settles the operation.
    async fn with_channel<F, Fut, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(Arc<EventRouter>, Arc<dyn ScoringService>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let session = self
            .sessions
            .current()
            .ok_or(OrchestratorError::NoSession)?;
        if let Err(e) = self.channel.connect(&session).await {
            tracing::warn!(error = %e, "Push channel unavailable, continuing without progress");
        }
        let follower = Arc::clone(&self.channel).follow_session(self.sessions.subscribe());

        let service: Arc<dyn ScoringService> = Arc::new(self.api.clone());
        let outcome = f(Arc::clone(self.channel.router()), service).await;

        follower.abort();
        self.channel.disconnect().await;
        outcome
    }
}

/// Await `submit` while printing progress from `states`.
async fn track<T>(
    states: watch::Receiver<OperationState<T>>,
    submit: impl Future<Output = Result<OperationResult<T>, OrchestratorError>>,
) -> anyhow::Result<T>
where
    T: Send + Sync + 'static,
{
    let progress = render::spawn_progress(states);
    let outcome = submit.await;
    progress.abort();

    match outcome? {
        OperationResult::Succeeded(value) => Ok(value),
        OperationResult::Failed(message) => anyhow::bail!(message),
    }
}

async fn load_job(job: JobArg) -> anyhow::Result<JobSource> {
    match job {
        JobArg::Posting(id) => Ok(JobSource::Posting(id)),
        JobArg::Custom(path) => read_custom_job(&path).await,
    }
}

async fn read_custom_job(path: &Path) -> anyhow::Result<JobSource> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_custom_job(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn custom_job_file_must_hold_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("job.json");
        tokio::fs::write(&good, r#"{"title":"Engineer","skills":["rust"]}"#)
            .await
            .unwrap();
        let job = load_job(JobArg::Custom(good)).await.unwrap();
        assert!(matches!(job, JobSource::Custom(map) if map["title"] == "Engineer"));

        let bad = dir.path().join("list.json");
        tokio::fs::write(&bad, "[1, 2]").await.unwrap();
        assert!(load_job(JobArg::Custom(bad)).await.is_err());

        let missing = dir.path().join("missing.json");
        assert!(load_job(JobArg::Custom(missing)).await.is_err());
    }

    #[tokio::test]
    async fn posting_ids_pass_through() {
        assert_eq!(
            load_job(JobArg::Posting(12)).await.unwrap(),
            JobSource::Posting(12)
        );
    }
}
