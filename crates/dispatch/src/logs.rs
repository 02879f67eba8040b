//! Exporting the logs of a dispatched run's jobs.
//!
//! Logs are fetched job by job and handed to a [`LogRenderer`]. A job whose
//! log cannot be downloaded (not available yet, expired, forbidden) is reported
//! to the renderer on its own and the remaining jobs are still processed.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::{
    ActionHost, DispatchError, Job, OutputName, RepositoryId, RunId, ServiceError, WorkflowService,
};

/// Receives the jobs of a run and, for each job, its log or the reason it
/// could not be fetched.
#[async_trait]
pub trait LogRenderer: Send + Sync {
    async fn job_list(&self, jobs: &[Job]) -> Result<(), DispatchError>;

    async fn job_logs(&self, job: &Job, logs: &str) -> Result<(), DispatchError>;

    async fn job_error(&self, job: &Job, error: &ServiceError) -> Result<(), DispatchError>;

    /// Called once after every job has been handled.
    async fn finish(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Per-job tally of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub exported: usize,
    pub failed: usize,
}

/// Lists the run's jobs and streams every job's log into `renderer`.
///
/// Listing the jobs failing is an error; a single job's download failing is
/// not.
#[instrument(skip(service, renderer), fields(repository = %repository, run_id = %run_id))]
pub async fn export_logs(
    service: &dyn WorkflowService,
    repository: &RepositoryId,
    run_id: RunId,
    renderer: &dyn LogRenderer,
) -> Result<ExportSummary, DispatchError> {
    let jobs = service.list_jobs(repository, run_id).await?;
    debug!(jobs = jobs.len(), "retrieving logs for jobs in workflow run");
    renderer.job_list(&jobs).await?;

    let mut summary = ExportSummary::default();
    for job in &jobs {
        match service.download_job_log(repository, job.id).await {
            Ok(logs) => {
                renderer.job_logs(job, &logs).await?;
                summary.exported += 1;
            }
            Err(error) => {
                debug!(job = %job.name, %error, "job log unavailable");
                renderer.job_error(job, &error).await?;
                summary.failed += 1;
            }
        }
    }

    renderer.finish().await?;
    Ok(summary)
}

/// Makes imported log text inert inside the host's log stream.
///
/// Every line is prefixed with `| `, so nothing can start a workflow command
/// at the beginning of a line, and `##[token]` markers are rewritten to
/// `##<token>`.
pub fn escape_imported_logs(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str("| ");
        out.push_str(&defang_markers(line));
    }
    out
}

fn defang_markers(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find("##[") {
        let after = &rest[start + 3..];
        match after.find(']') {
            Some(end) if end > 0 => {
                out.push_str(&rest[..start]);
                out.push_str("##<");
                out.push_str(&after[..end]);
                out.push('>');
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..start + 3]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Prints each job's escaped log in its own collapsible group.
pub struct PrintLogs<'a> {
    host: &'a dyn ActionHost,
}

impl<'a> PrintLogs<'a> {
    pub fn new(host: &'a dyn ActionHost) -> Self {
        Self { host }
    }
}

#[async_trait]
impl LogRenderer for PrintLogs<'_> {
    async fn job_list(&self, jobs: &[Job]) -> Result<(), DispatchError> {
        debug!(jobs = ?jobs.iter().map(|j| j.name.as_str()).collect::<Vec<_>>(), "printing job logs");
        Ok(())
    }

    async fn job_logs(&self, job: &Job, logs: &str) -> Result<(), DispatchError> {
        self.host.start_group(&format!("Logs of job '{}'", job.name));
        self.host.info(&escape_imported_logs(logs));
        self.host.end_group();
        Ok(())
    }

    async fn job_error(&self, job: &Job, error: &ServiceError) -> Result<(), DispatchError> {
        self.host.warning(&escape_imported_logs(&format!(
            "Could not fetch logs of job '{}': {error}",
            job.name
        )));
        Ok(())
    }
}

/// Collects every job's log lines into a JSON object published as the
/// `workflow-logs` output: `{ "<job>": { "logs": [..] } | { "error": ".." } }`.
pub struct OutputLogs<'a> {
    host: &'a dyn ActionHost,
    collected: Mutex<BTreeMap<String, Value>>,
}

impl<'a> OutputLogs<'a> {
    pub fn new(host: &'a dyn ActionHost) -> Self {
        Self {
            host,
            collected: Mutex::new(BTreeMap::new()),
        }
    }

    fn record(&self, job: &Job, entry: Value) {
        let mut collected = self
            .collected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        collected.insert(job.name.clone(), entry);
    }
}

#[async_trait]
impl LogRenderer for OutputLogs<'_> {
    async fn job_list(&self, _jobs: &[Job]) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn job_logs(&self, job: &Job, logs: &str) -> Result<(), DispatchError> {
        let lines: Vec<&str> = logs.lines().collect();
        self.record(job, json!({ "logs": lines }));
        Ok(())
    }

    async fn job_error(&self, job: &Job, error: &ServiceError) -> Result<(), DispatchError> {
        self.record(job, json!({ "error": error.to_string() }));
        Ok(())
    }

    async fn finish(&self) -> Result<(), DispatchError> {
        let document = {
            let collected = self
                .collected
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Value::Object(collected.clone().into_iter().collect())
        };
        self.host.set_output(OutputName::Logs, &document.to_string())
    }
}
