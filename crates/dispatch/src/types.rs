//! Shared value types for the workflow dispatch domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the remote run model: status and conclusion enumerations, the raw records
//! returned by the [`crate::WorkflowService`] port, and the domain snapshot the
//! poller works with.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{CheckRunId, DispatchError, JobId, RunId};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parses an RFC 3339 timestamp as reported by the GitHub API.
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Drops the sub-second part.
    ///
    /// Run creation times are only comparable with the trigger time at
    /// whole-second granularity.
    pub fn truncated_to_seconds(self) -> Self {
        Self(self.0.with_nanosecond(0).unwrap_or(self.0))
    }

    /// Returns a timestamp offset by `seconds` (negative values go back in time).
    pub fn offset_seconds(self, seconds: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Run status / conclusion
// ---------------------------------------------------------------------------

/// Lifecycle state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted but not yet picked up by a runner.
    Queued,
    /// At least one job is executing.
    InProgress,
    /// Terminal: the run has a conclusion.
    Completed,
}

impl RunStatus {
    /// Maps the status string reported by the API onto the closed enum.
    ///
    /// A missing status means the run has not been scheduled yet. GitHub's
    /// pre-execution states (`requested`, `waiting`, `pending`) are all
    /// reported as [`RunStatus::Queued`].
    pub fn from_api(value: Option<&str>) -> Result<Self, DispatchError> {
        let Some(raw) = value else {
            return Ok(Self::Queued);
        };
        match raw.to_ascii_lowercase().as_str() {
            "queued" | "requested" | "waiting" | "pending" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(DispatchError::UnrecognizedValue {
                kind: "run status",
                value: raw.to_string(),
            }),
        }
    }

    /// Returns `true` for [`RunStatus::Completed`].
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the lowercase API spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Terminal outcome classification of a completed run.
///
/// Only meaningful once [`RunStatus::Completed`] is observed; before that the
/// conclusion is reported as [`RunConclusion::Neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    Neutral,
    TimedOut,
    ActionRequired,
}

impl RunConclusion {
    /// Maps the conclusion string reported by the API onto the closed enum.
    ///
    /// `startup_failure` (a run that never got as far as starting a job) is
    /// folded into [`RunConclusion::Failure`].
    pub fn from_api(value: Option<&str>) -> Result<Self, DispatchError> {
        let Some(raw) = value else {
            return Ok(Self::Neutral);
        };
        match raw.to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" | "startup_failure" => Ok(Self::Failure),
            "cancelled" => Ok(Self::Cancelled),
            "skipped" => Ok(Self::Skipped),
            "neutral" => Ok(Self::Neutral),
            "timed_out" => Ok(Self::TimedOut),
            "action_required" => Ok(Self::ActionRequired),
            _ => Err(DispatchError::UnrecognizedValue {
                kind: "run conclusion",
                value: raw.to_string(),
            }),
        }
    }

    /// Returns `true` for conclusions that fail the invocation when the
    /// remote result is synchronised.
    pub fn is_failing(self) -> bool {
        matches!(self, Self::Failure | Self::Cancelled | Self::TimedOut)
    }

    /// Returns the lowercase API spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::Neutral => "neutral",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
        }
    }
}

impl std::fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Remote records (returned by the WorkflowService port)
// ---------------------------------------------------------------------------

/// A workflow definition as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Numeric workflow id.
    pub id: u64,
    /// Display name (the `name:` key of the workflow file).
    pub name: String,
    /// Repository-relative path, e.g. `.github/workflows/ci.yml`.
    pub path: String,
}

/// A workflow run as reported by the remote service.
///
/// Status and conclusion are kept as raw strings; the domain maps them through
/// [`RunStatus::from_api`] / [`RunConclusion::from_api`] so unknown values are
/// surfaced as errors instead of being dropped by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Timestamp,
    /// API URL of the run.
    pub url: String,
    /// Browser URL of the run.
    pub html_url: String,
}

/// A job belonging to a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
}

/// A check run reported against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub id: CheckRunId,
    pub name: String,
    pub html_url: Option<String>,
    pub started_at: Option<Timestamp>,
}

impl CheckRun {
    /// Returns the workflow run id encoded in the check run's browser URL
    /// (`.../actions/runs/<id>/job/<job>`), if present.
    pub fn workflow_run_id(&self) -> Option<RunId> {
        let url = self.html_url.as_deref()?;
        let (_, tail) = url.split_once("/actions/runs/")?;
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok().map(RunId::new)
    }
}

// ---------------------------------------------------------------------------
// Domain view of a run
// ---------------------------------------------------------------------------

/// Where a run can be found: its id plus API and browser URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLinks {
    pub run_id: RunId,
    pub api_url: String,
    pub html_url: String,
}

/// A point-in-time observation of a run, with status and conclusion mapped
/// onto the domain enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub links: RunLinks,
    pub status: RunStatus,
    pub conclusion: RunConclusion,
}

impl TryFrom<WorkflowRun> for RunSnapshot {
    type Error = DispatchError;

    fn try_from(run: WorkflowRun) -> Result<Self, Self::Error> {
        let status = RunStatus::from_api(run.status.as_deref())?;
        let conclusion = if status.is_terminal() {
            RunConclusion::from_api(run.conclusion.as_deref())?
        } else {
            RunConclusion::Neutral
        };
        Ok(Self {
            links: RunLinks {
                run_id: run.id,
                api_url: run.url,
                html_url: run.html_url,
            },
            status,
            conclusion,
        })
    }
}
