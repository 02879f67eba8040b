//! In-memory implementations of the port traits for testing.
//!
//! Available behind the `test-utils` feature flag (and always in this crate's
//! own tests). Responses are scripted up front; every call is counted so tests
//! can assert how often the remote service was hit.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    ActionHost, CheckRun, CheckRunId, Clock, DispatchError, DispatchRequest, GitRef, Job, JobId,
    OutputName, RepositoryId, RunId, RunLinks, RunName, ServiceError, Timestamp, Workflow,
    WorkflowId, WorkflowRun, WorkflowService,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pops the next scripted response, repeating the last one once the script
/// is down to a single entry.
fn next_scripted<T: Clone>(script: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut script = lock(script);
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

/// Builds a [`WorkflowRun`] with URLs derived from `id`.
pub fn workflow_run(
    id: u64,
    created_at: Timestamp,
    status: &str,
    conclusion: Option<&str>,
) -> WorkflowRun {
    WorkflowRun {
        id: RunId::new(id),
        status: Some(status.to_string()),
        conclusion: conclusion.map(str::to_string),
        created_at,
        url: format!("https://api.github.com/repos/octo/hello/actions/runs/{id}"),
        html_url: format!("https://github.com/octo/hello/actions/runs/{id}"),
    }
}

/// Builds a [`CheckRun`].
pub fn check_run(
    id: u64,
    name: &str,
    html_url: Option<&str>,
    started_at: Option<Timestamp>,
) -> CheckRun {
    CheckRun {
        id: CheckRunId::new(id),
        name: name.to_string(),
        html_url: html_url.map(str::to_string),
        started_at,
    }
}

// ---------------------------------------------------------------------------
// WorkflowService
// ---------------------------------------------------------------------------

/// Scripted [`WorkflowService`].
#[derive(Default)]
pub struct FakeWorkflowService {
    workflows: Vec<Workflow>,
    dispatch_result: Option<Result<Option<RunLinks>, ServiceError>>,
    run_listings: Mutex<VecDeque<Result<Vec<WorkflowRun>, ServiceError>>>,
    run_states: Mutex<VecDeque<Result<WorkflowRun, ServiceError>>>,
    check_runs: Vec<CheckRun>,
    jobs: Option<Result<Vec<Job>, ServiceError>>,
    job_logs: HashMap<JobId, Result<String, ServiceError>>,

    calls: Mutex<HashMap<&'static str, usize>>,
    dispatched: Mutex<Vec<DispatchRequest>>,
    listed_events: Mutex<Vec<String>>,
}

impl FakeWorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflows(mut self, workflows: Vec<Workflow>) -> Self {
        self.workflows = workflows;
        self
    }

    /// Outcome of `create_dispatch`. Defaults to `Ok(None)` (HTTP 204).
    pub fn with_dispatch_result(mut self, result: Result<Option<RunLinks>, ServiceError>) -> Self {
        self.dispatch_result = Some(result);
        self
    }

    /// Successive `list_runs` responses; the last one repeats.
    pub fn with_run_listings(self, listings: Vec<Result<Vec<WorkflowRun>, ServiceError>>) -> Self {
        *lock(&self.run_listings) = listings.into();
        self
    }

    /// Successive `get_run` responses; the last one repeats.
    pub fn with_run_states(self, states: Vec<Result<WorkflowRun, ServiceError>>) -> Self {
        *lock(&self.run_states) = states.into();
        self
    }

    pub fn with_check_runs(mut self, check_runs: Vec<CheckRun>) -> Self {
        self.check_runs = check_runs;
        self
    }

    pub fn with_jobs(mut self, jobs: Vec<Job>) -> Self {
        self.jobs = Some(Ok(jobs));
        self
    }

    pub fn with_jobs_error(mut self, error: ServiceError) -> Self {
        self.jobs = Some(Err(error));
        self
    }

    pub fn with_job_log(mut self, job: JobId, log: Result<String, ServiceError>) -> Self {
        self.job_logs.insert(job, log);
        self
    }

    /// Number of calls made to the named trait method.
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).get(method).copied().unwrap_or(0)
    }

    /// Every dispatch request received, in order.
    pub fn dispatched(&self) -> Vec<DispatchRequest> {
        lock(&self.dispatched).clone()
    }

    /// The `event` filter of every `list_runs` call, in order.
    pub fn listed_events(&self) -> Vec<String> {
        lock(&self.listed_events).clone()
    }

    fn record(&self, method: &'static str) {
        *lock(&self.calls).entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl WorkflowService for FakeWorkflowService {
    async fn list_workflows(&self, _repo: &RepositoryId) -> Result<Vec<Workflow>, ServiceError> {
        self.record("list_workflows");
        Ok(self.workflows.clone())
    }

    async fn create_dispatch(
        &self,
        _repo: &RepositoryId,
        request: &DispatchRequest,
    ) -> Result<Option<RunLinks>, ServiceError> {
        self.record("create_dispatch");
        lock(&self.dispatched).push(request.clone());
        self.dispatch_result.clone().unwrap_or(Ok(None))
    }

    async fn get_run(
        &self,
        _repo: &RepositoryId,
        run_id: RunId,
    ) -> Result<WorkflowRun, ServiceError> {
        self.record("get_run");
        next_scripted(&self.run_states).unwrap_or_else(|| {
            Err(ServiceError::NotFound {
                resource: format!("workflow run {run_id}"),
            })
        })
    }

    async fn list_runs(
        &self,
        _repo: &RepositoryId,
        _workflow: &WorkflowId,
        event: &str,
    ) -> Result<Vec<WorkflowRun>, ServiceError> {
        self.record("list_runs");
        lock(&self.listed_events).push(event.to_string());
        next_scripted(&self.run_listings).unwrap_or(Ok(Vec::new()))
    }

    async fn list_jobs(&self, _repo: &RepositoryId, _run_id: RunId) -> Result<Vec<Job>, ServiceError> {
        self.record("list_jobs");
        self.jobs.clone().unwrap_or(Ok(Vec::new()))
    }

    async fn download_job_log(
        &self,
        _repo: &RepositoryId,
        job_id: JobId,
    ) -> Result<String, ServiceError> {
        self.record("download_job_log");
        self.job_logs.get(&job_id).cloned().unwrap_or_else(|| {
            Err(ServiceError::NotFound {
                resource: format!("logs of job {job_id}"),
            })
        })
    }

    async fn list_check_runs(
        &self,
        _repo: &RepositoryId,
        _git_ref: &GitRef,
        check_name: &RunName,
    ) -> Result<Vec<CheckRun>, ServiceError> {
        self.record("list_check_runs");
        Ok(self
            .check_runs
            .iter()
            .filter(|c| c.name == check_name.as_str())
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// ActionHost
// ---------------------------------------------------------------------------

/// One call made to a [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Info(String),
    Warning(String),
    GroupStart(String),
    GroupEnd,
    Output(OutputName, String),
}

/// [`ActionHost`] that records every call.
#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.events).clone()
    }

    /// The last value written for `name`.
    pub fn output(&self, name: OutputName) -> Option<String> {
        lock(&self.events).iter().rev().find_map(|e| match e {
            HostEvent::Output(n, value) if *n == name => Some(value.clone()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                HostEvent::Warning(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                HostEvent::Info(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ActionHost for RecordingHost {
    fn info(&self, message: &str) {
        lock(&self.events).push(HostEvent::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        lock(&self.events).push(HostEvent::Warning(message.to_string()));
    }

    fn start_group(&self, title: &str) {
        lock(&self.events).push(HostEvent::GroupStart(title.to_string()));
    }

    fn end_group(&self) {
        lock(&self.events).push(HostEvent::GroupEnd);
    }

    fn set_output(&self, name: OutputName, value: &str) -> Result<(), DispatchError> {
        lock(&self.events).push(HostEvent::Output(name, value.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// [`Clock`] whose time only moves when something sleeps on it.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<usize>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward without a sleep.
    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }

    /// Number of completed sleeps.
    pub fn sleeps(&self) -> usize {
        *lock(&self.sleeps)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *lock(&self.now)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        *lock(&self.sleeps) += 1;
    }
}
