use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use dispatch::{
    ApiToken, CheckRun, DispatchRequest, GitRef, Job, JobId, RepositoryId, RunId, RunLinks,
    RunName, ServiceError, Workflow, WorkflowId, WorkflowRun, WorkflowService,
};

use crate::models::{
    ApiErrorBody, CheckRunsPage, DispatchBody, DispatchResponse, JobsPage, RunDto, RunsPage,
    WorkflowsPage,
};

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 800;

/// Errors raised while constructing a [`GithubClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("the API token contains characters not allowed in an HTTP header")]
    InvalidToken,

    #[error("failed to create the HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// [`WorkflowService`] over the GitHub REST API.
///
/// Each trait method issues its request(s) once; nothing is retried here.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubClient {
    /// Creates a client for `api_base` (e.g. `https://api.github.com` or a
    /// GitHub Enterprise `https://host/api/v3`) authenticated with `token`.
    pub fn new(api_base: &str, token: &ApiToken) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("workflow-dispatch/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose().trim()))
            .map_err(|_| ClientError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn repo_url(&self, repo: &RepositoryId, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base,
            repo.owner(),
            repo.name(),
            tail
        )
    }

    /// `commits/{ref}/check-runs`, with the ref as one percent-encoded
    /// segment so `refs/heads/main` does not split into three.
    fn check_runs_url(&self, repo: &RepositoryId, git_ref: &GitRef) -> Result<Url, ServiceError> {
        let invalid = |detail: String| ServiceError::Transport(format!("invalid API URL: {detail}"));
        let mut url = Url::parse(&self.repo_url(repo, "commits")).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid(self.api_base.clone()))?
            .push(git_ref.as_str())
            .push("check-runs");
        Ok(url)
    }

    /// Sends `request` and maps any non-success status onto [`ServiceError`].
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("{operation}: {e}")))?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "github api response");
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound {
                resource: operation.to_string(),
            });
        }

        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| truncate_for_error(&body, MAX_ERROR_BODY));
        Err(ServiceError::Http {
            status: status.as_u16(),
            message,
            retry_after,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(format!("{operation}: {e}")))
    }
}

#[async_trait]
impl WorkflowService for GithubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn list_workflows(&self, repo: &RepositoryId) -> Result<Vec<Workflow>, ServiceError> {
        let url = self.repo_url(repo, "actions/workflows");
        let mut page = 1_u32;
        let mut workflows = Vec::new();
        loop {
            let request = self
                .http
                .get(&url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())]);
            let chunk: WorkflowsPage = self.get_json("list workflows", request).await?;
            let chunk_len = chunk.workflows.len();
            workflows.extend(chunk.workflows.into_iter().map(Workflow::from));
            if chunk_len < PER_PAGE || workflows.len() >= chunk.total_count {
                break;
            }
            page = page.saturating_add(1);
        }
        debug!(count = workflows.len(), "listed workflows");
        Ok(workflows)
    }

    #[instrument(skip(self, request), fields(repo = %repo, workflow = %request.workflow))]
    async fn create_dispatch(
        &self,
        repo: &RepositoryId,
        request: &DispatchRequest,
    ) -> Result<Option<RunLinks>, ServiceError> {
        let url = self.repo_url(repo, &format!("actions/workflows/{}/dispatches", request.workflow));
        let body = DispatchBody {
            git_ref: request.git_ref.as_str(),
            inputs: &request.inputs,
            return_run_details: request.return_run_details,
        };
        let response = self
            .send("create workflow dispatch", self.http.post(&url).json(&body))
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(format!("create workflow dispatch: {e}")))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let details: DispatchResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Decode(format!("create workflow dispatch: {e}")))?;
        Ok(Some(details.into()))
    }

    #[instrument(skip(self), fields(repo = %repo, run_id = %run_id))]
    async fn get_run(
        &self,
        repo: &RepositoryId,
        run_id: RunId,
    ) -> Result<WorkflowRun, ServiceError> {
        let url = self.repo_url(repo, &format!("actions/runs/{run_id}"));
        let run: RunDto = self
            .get_json(&format!("workflow run {run_id}"), self.http.get(&url))
            .await?;
        Ok(run.into())
    }

    #[instrument(skip(self), fields(repo = %repo, workflow = %workflow))]
    async fn list_runs(
        &self,
        repo: &RepositoryId,
        workflow: &WorkflowId,
        event: &str,
    ) -> Result<Vec<WorkflowRun>, ServiceError> {
        let url = self.repo_url(repo, &format!("actions/workflows/{workflow}/runs"));
        let request = self
            .http
            .get(&url)
            .query(&[("event", event.to_string()), ("per_page", PER_PAGE.to_string())]);
        let page: RunsPage = self.get_json("list workflow runs", request).await?;
        Ok(page.workflow_runs.into_iter().map(WorkflowRun::from).collect())
    }

    #[instrument(skip(self), fields(repo = %repo, run_id = %run_id))]
    async fn list_jobs(&self, repo: &RepositoryId, run_id: RunId) -> Result<Vec<Job>, ServiceError> {
        let url = self.repo_url(repo, &format!("actions/runs/{run_id}/jobs"));
        let mut page = 1_u32;
        let mut jobs = Vec::new();
        loop {
            let request = self
                .http
                .get(&url)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())]);
            let chunk: JobsPage = self.get_json("list jobs for workflow run", request).await?;
            let chunk_len = chunk.jobs.len();
            jobs.extend(chunk.jobs.into_iter().map(Job::from));
            if chunk_len < PER_PAGE || jobs.len() >= chunk.total_count {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(jobs)
    }

    #[instrument(skip(self), fields(repo = %repo, job_id = %job_id))]
    async fn download_job_log(
        &self,
        repo: &RepositoryId,
        job_id: JobId,
    ) -> Result<String, ServiceError> {
        let url = self.repo_url(repo, &format!("actions/jobs/{job_id}/logs"));
        let operation = format!("logs of job {job_id}");
        self.send(&operation, self.http.get(&url))
            .await?
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("{operation}: {e}")))
    }

    #[instrument(skip(self), fields(repo = %repo, git_ref = %git_ref, check_name = %check_name))]
    async fn list_check_runs(
        &self,
        repo: &RepositoryId,
        git_ref: &GitRef,
        check_name: &RunName,
    ) -> Result<Vec<CheckRun>, ServiceError> {
        let url = self.check_runs_url(repo, git_ref)?;
        let request = self.http.get(url).query(&[
            ("check_name", check_name.as_str()),
            ("filter", "latest"),
        ]);
        let page: CheckRunsPage = self.get_json("list check runs for ref", request).await?;
        Ok(page.check_runs.into_iter().map(CheckRun::from).collect())
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_read_in_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        assert_eq!(truncate_for_error("short", 10), "short");
        assert_eq!(truncate_for_error("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let config = dispatch::Config::from_inputs(dispatch::ConfigInputs {
            token: Some("abc\ndef".into()),
            workflow: Some("ci.yml".into()),
            git_ref: Some("main".into()),
            repo: Some("octo/hello".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            GithubClient::new("https://api.github.com", &config.token),
            Err(ClientError::InvalidToken)
        ));
    }
}
