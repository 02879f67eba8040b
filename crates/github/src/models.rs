//! Wire shapes of the GitHub REST responses this adapter reads.
//!
//! Only the fields the domain needs are declared; everything else in the
//! payloads is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dispatch::{
    CheckRun, CheckRunId, Job, JobId, RunId, RunLinks, Timestamp, Workflow, WorkflowRun,
};

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowsPage {
    pub total_count: usize,
    pub workflows: Vec<WorkflowDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowDto {
    pub id: u64,
    pub name: String,
    pub path: String,
}

impl From<WorkflowDto> for Workflow {
    fn from(dto: WorkflowDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            path: dto.path,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunsPage {
    pub workflow_runs: Vec<RunDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunDto {
    pub id: u64,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Timestamp,
    pub url: String,
    pub html_url: String,
}

impl From<RunDto> for WorkflowRun {
    fn from(dto: RunDto) -> Self {
        Self {
            id: RunId::new(dto.id),
            status: dto.status,
            conclusion: dto.conclusion,
            created_at: dto.created_at,
            url: dto.url,
            html_url: dto.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobsPage {
    pub total_count: usize,
    pub jobs: Vec<JobDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobDto {
    pub id: u64,
    pub name: String,
}

impl From<JobDto> for Job {
    fn from(dto: JobDto) -> Self {
        Self {
            id: JobId::new(dto.id),
            name: dto.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckRunsPage {
    pub check_runs: Vec<CheckRunDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckRunDto {
    pub id: u64,
    pub name: String,
    pub html_url: Option<String>,
    pub started_at: Option<Timestamp>,
}

impl From<CheckRunDto> for CheckRun {
    fn from(dto: CheckRunDto) -> Self {
        Self {
            id: CheckRunId::new(dto.id),
            name: dto.name,
            html_url: dto.html_url,
            started_at: dto.started_at,
        }
    }
}

/// Body of `POST .../dispatches`.
#[derive(Debug, Serialize)]
pub(crate) struct DispatchBody<'a> {
    #[serde(rename = "ref")]
    pub git_ref: &'a str,
    pub inputs: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub return_run_details: bool,
}

/// Response of a dispatch made with `return_run_details`.
#[derive(Debug, Deserialize)]
pub(crate) struct DispatchResponse {
    pub workflow_run_id: u64,
    pub run_url: String,
    pub html_url: String,
}

impl From<DispatchResponse> for RunLinks {
    fn from(dto: DispatchResponse) -> Self {
        Self {
            run_id: RunId::new(dto.workflow_run_id),
            api_url: dto.run_url,
            html_url: dto.html_url,
        }
    }
}

/// Error body GitHub returns with 4xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}
