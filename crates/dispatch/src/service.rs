//! Port trait for the remote workflow-execution service.
//!
//! The `github` crate implements [`WorkflowService`] over the GitHub REST API;
//! tests use the in-memory fake in [`crate::testing`]. All pagination,
//! authentication, and HTTP status handling live in the implementation; the
//! domain only sees records and [`ServiceError`]s.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    CheckRun, GitRef, Job, JobId, RepositoryId, RunId, RunLinks, RunName, ServiceError, Workflow,
    WorkflowId, WorkflowRun,
};

/// Event filter used when listing runs created by a dispatch.
pub const DISPATCH_EVENT: &str = "workflow_dispatch";

/// A request to start a new run of a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub workflow: WorkflowId,
    pub git_ref: GitRef,
    pub inputs: Map<String, Value>,
    /// Ask the service to return the created run in its response. Older
    /// service versions reject the field, so it is opt-in.
    pub return_run_details: bool,
}

/// Typed façade over the remote workflow/run endpoints.
///
/// Every method is a single logical remote call; implementations must not
/// retry on their own. In particular `create_dispatch` is never retried,
/// because re-dispatching is not safe.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Lists every workflow in the repository, following pagination.
    async fn list_workflows(&self, repo: &RepositoryId) -> Result<Vec<Workflow>, ServiceError>;

    /// Starts a run. Returns the run's links when the service reports them
    /// in its acknowledgement, `None` otherwise.
    async fn create_dispatch(
        &self,
        repo: &RepositoryId,
        request: &DispatchRequest,
    ) -> Result<Option<RunLinks>, ServiceError>;

    /// Fetches a single run.
    async fn get_run(&self, repo: &RepositoryId, run_id: RunId)
        -> Result<WorkflowRun, ServiceError>;

    /// Lists recent runs of a workflow triggered by `event`, newest first.
    async fn list_runs(
        &self,
        repo: &RepositoryId,
        workflow: &WorkflowId,
        event: &str,
    ) -> Result<Vec<WorkflowRun>, ServiceError>;

    /// Lists every job of a run, following pagination.
    async fn list_jobs(&self, repo: &RepositoryId, run_id: RunId) -> Result<Vec<Job>, ServiceError>;

    /// Downloads the plain-text log of a job.
    async fn download_job_log(
        &self,
        repo: &RepositoryId,
        job_id: JobId,
    ) -> Result<String, ServiceError>;

    /// Lists the latest check runs named `check_name` on `git_ref`.
    async fn list_check_runs(
        &self,
        repo: &RepositoryId,
        git_ref: &GitRef,
        check_name: &RunName,
    ) -> Result<Vec<CheckRun>, ServiceError>;
}
