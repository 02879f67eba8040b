//! Error and retry-policy types for the workflow dispatch domain.
//!
//! [`ServiceError`] is what the [`crate::WorkflowService`] port reports: the
//! remote API failed, was unreachable, or answered with something unreadable.
//! [`DispatchError`] covers conditions that end the invocation itself.
//!
//! [`RetryPolicy`] is a cross-cutting concern: the poller only keeps waiting
//! through service errors that classify as retryable.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RepositoryId, RunConclusion, RunId, Timestamp, WorkflowId, WorkflowReference};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: transport failures, 5xx responses, rate limiting.
/// - `NonRetryable` errors: bad credentials, forbidden, validation failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Service (port) errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::WorkflowService`] implementation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("{resource} not found")]
    NotFound {
        /// Description of what was looked up, e.g. `"workflow run 42"`.
        resource: String,
    },

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        /// `message` field of the error body, or the raw body when absent.
        message: String,
        /// Parsed `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (DNS, TLS, connection reset, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Classifies this error for retry decisions.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport(_) => RetryPolicy::Retryable { after: None },
            Self::Http {
                status,
                retry_after,
                ..
            } if *status >= 500 || *status == 429 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }

    /// Returns `true` when a dispatch was rejected because the target workflow
    /// is disabled.
    ///
    /// GitHub answers such dispatches with a 4xx whose message mentions the
    /// disabled workflow; no other field distinguishes the case.
    pub fn is_disabled_workflow(&self) -> bool {
        match self {
            Self::Http { status, message, .. } if (400..500).contains(status) => {
                message.to_ascii_lowercase().contains("disabled workflow")
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation-level errors
// ---------------------------------------------------------------------------

/// Errors that end a dispatch invocation.
///
/// Every variant reaches the invocation boundary as a single failure message.
/// [`DispatchError::Timeout`] and [`DispatchError::RunFailed`] are kept apart
/// so "we stopped waiting" is never confused with "the run failed".
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The invocation configuration is invalid.
    ///
    /// Produced before any remote call is made.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// No workflow in the target repository matches the reference.
    #[error("Unable to find workflow '{reference}' in {repository}")]
    WorkflowNotFound {
        reference: WorkflowReference,
        repository: RepositoryId,
    },

    /// No run created at or after the trigger time could be found (yet).
    ///
    /// Transient right after dispatch; the poller keeps waiting through it.
    #[error("Run not found for workflow {workflow} (triggered at {since})")]
    RunNotFound {
        workflow: WorkflowId,
        since: Timestamp,
    },

    /// The dispatch request was rejected.
    #[error("Failed to dispatch workflow {workflow}: {source}")]
    Dispatch {
        workflow: WorkflowId,
        #[source]
        source: ServiceError,
    },

    /// The run did not complete within the configured timeout.
    ///
    /// The run itself is left running remotely.
    #[error(
        "Timed out after {}s waiting for workflow run {} to complete",
        .elapsed.as_secs(),
        describe_run(.run_id)
    )]
    Timeout {
        elapsed: Duration,
        /// `None` when the run could not even be identified before the timeout.
        run_id: Option<RunId>,
    },

    /// The run completed with a failing conclusion and status sync is enabled.
    #[error("{}", failure_message(.conclusion))]
    RunFailed { conclusion: RunConclusion },

    /// The API reported a status or conclusion outside the known set.
    #[error("Unrecognized {kind} '{value}'")]
    UnrecognizedValue { kind: &'static str, value: String },

    /// A step output could not be published to the host.
    #[error("Failed to write output '{name}': {message}")]
    Output { name: &'static str, message: String },

    /// A remote call failed outside of the polling loop.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl DispatchError {
    /// Returns `true` for errors the poller waits through instead of
    /// aborting: run-not-found, a 404 on the run, retryable service failures,
    /// and unrecognised status strings.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RunNotFound { .. } | Self::UnrecognizedValue { .. } => true,
            Self::Service(ServiceError::NotFound { .. }) => true,
            Self::Service(e) => matches!(e.retry_policy(), RetryPolicy::Retryable { .. }),
            _ => false,
        }
    }
}

fn failure_message(conclusion: &RunConclusion) -> &'static str {
    match conclusion {
        RunConclusion::Cancelled => "Workflow run was cancelled",
        RunConclusion::TimedOut => "Workflow run has failed due to timeout",
        _ => "Workflow run has failed",
    }
}

fn describe_run(run_id: &Option<RunId>) -> String {
    match run_id {
        Some(id) => id.to_string(),
        None => "(unresolved)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, message: &str) -> ServiceError {
        ServiceError::Http {
            status,
            message: message.to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        assert!(matches!(
            http(502, "bad gateway").retry_policy(),
            RetryPolicy::Retryable { .. }
        ));
        assert!(matches!(
            http(429, "slow down").retry_policy(),
            RetryPolicy::Retryable { .. }
        ));
        assert!(matches!(
            ServiceError::Transport("reset".into()).retry_policy(),
            RetryPolicy::Retryable { after: None }
        ));
        assert_eq!(http(401, "Bad credentials").retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn disabled_workflow_rejection_is_recognised() {
        let rejected = http(422, "Cannot trigger a 'workflow_dispatch' on a disabled workflow");
        assert!(rejected.is_disabled_workflow());

        assert!(!http(422, "Unexpected inputs provided").is_disabled_workflow());
        assert!(!http(500, "disabled workflow").is_disabled_workflow());
    }

    #[test]
    fn timeout_and_failure_messages_differ() {
        let timeout = DispatchError::Timeout {
            elapsed: Duration::from_secs(900),
            run_id: Some(RunId::new(5)),
        };
        assert_eq!(
            timeout.to_string(),
            "Timed out after 900s waiting for workflow run 5 to complete"
        );

        let failed = DispatchError::RunFailed {
            conclusion: RunConclusion::Cancelled,
        };
        assert_eq!(failed.to_string(), "Workflow run was cancelled");
    }

    #[test]
    fn transient_errors_are_classified() {
        let not_found = DispatchError::RunNotFound {
            workflow: WorkflowId::Numeric(1),
            since: Timestamp::now(),
        };
        assert!(not_found.is_transient());
        assert!(DispatchError::Service(http(503, "unavailable")).is_transient());
        assert!(!DispatchError::Service(http(401, "Bad credentials")).is_transient());
        assert!(!DispatchError::Configuration {
            message: "x".into()
        }
        .is_transient());
    }
}
