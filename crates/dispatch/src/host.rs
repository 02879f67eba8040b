//! Port trait for the hosting CI environment.
//!
//! The host is where user-facing output goes: annotations, collapsible log
//! groups, and step outputs. Diagnostics go through `tracing` instead.

use crate::DispatchError;

/// Step outputs produced by an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputName {
    WorkflowId,
    RunId,
    RunUrl,
    RunApiUrl,
    Conclusion,
    Logs,
}

impl OutputName {
    /// The output key as exposed to later workflow steps.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkflowId => "workflow-id",
            Self::RunId => "workflow-run-id",
            Self::RunUrl => "workflow-url",
            Self::RunApiUrl => "workflow-api-url",
            Self::Conclusion => "workflow-conclusion",
            Self::Logs => "workflow-logs",
        }
    }
}

impl std::fmt::Display for OutputName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for user-facing messages and step outputs.
pub trait ActionHost: Send + Sync {
    /// Plain informational line.
    fn info(&self, message: &str);

    /// Warning annotation. Does not fail the step.
    fn warning(&self, message: &str);

    /// Opens a collapsible log group.
    fn start_group(&self, title: &str);

    /// Closes the most recently opened group.
    fn end_group(&self);

    /// Publishes a step output.
    fn set_output(&self, name: OutputName, value: &str) -> Result<(), DispatchError>;
}
