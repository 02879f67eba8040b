//! Issuing the dispatch and recording when it happened.

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::{
    DispatchError, DispatchRequest, GitRef, RepositoryId, RunLinks, Timestamp, WorkflowId,
    WorkflowService,
};

/// The dispatch this invocation issued.
///
/// Only [`dispatch`] constructs it, so anything holding a trigger knows the
/// dispatch call has returned and `triggered_at` has been captured.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTrigger {
    workflow: WorkflowId,
    git_ref: GitRef,
    inputs: Map<String, Value>,
    triggered_at: Timestamp,
}

impl DispatchTrigger {
    pub fn workflow(&self) -> &WorkflowId {
        &self.workflow
    }

    pub fn git_ref(&self) -> &GitRef {
        &self.git_ref
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    /// When the dispatch was issued, truncated to whole seconds.
    pub fn triggered_at(&self) -> Timestamp {
        self.triggered_at
    }

    /// Builds a trigger with an explicit timestamp, for exercising the run
    /// resolver against fixed creation times.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn at(workflow: WorkflowId, git_ref: GitRef, triggered_at: Timestamp) -> Self {
        Self {
            workflow,
            git_ref,
            inputs: Map::new(),
            triggered_at: triggered_at.truncated_to_seconds(),
        }
    }
}

/// Result of a dispatch the service did not reject outright.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAcknowledgement {
    /// The run was requested. `run` is set when the service reported the
    /// created run directly, which makes run resolution unnecessary.
    Accepted {
        trigger: DispatchTrigger,
        run: Option<RunLinks>,
    },
    /// The workflow is disabled; nothing was started.
    WorkflowDisabled { workflow: WorkflowId, message: String },
}

/// Starts a run of `workflow` on `git_ref`.
///
/// `inputs` must already be validated. The trigger timestamp is taken just
/// before the request is sent. A rejection because the workflow is disabled
/// is reported as [`DispatchAcknowledgement::WorkflowDisabled`]; any other
/// failure is a [`DispatchError::Dispatch`]. The call is never retried.
#[instrument(skip(service, inputs), fields(repository = %repository, workflow = %workflow, git_ref = %git_ref))]
pub async fn dispatch(
    service: &dyn WorkflowService,
    repository: &RepositoryId,
    workflow: WorkflowId,
    git_ref: GitRef,
    inputs: Map<String, Value>,
    return_run_details: bool,
) -> Result<DispatchAcknowledgement, DispatchError> {
    let request = DispatchRequest {
        workflow,
        git_ref,
        inputs,
        return_run_details,
    };
    let rendered = Value::Object(request.inputs.clone());
    debug!(inputs = %rendered, "dispatching workflow");

    let triggered_at = Timestamp::now().truncated_to_seconds();
    let outcome = service.create_dispatch(repository, &request).await;

    let DispatchRequest {
        workflow,
        git_ref,
        inputs,
        ..
    } = request;

    match outcome {
        Ok(run) => {
            info!(%triggered_at, run_id = ?run.as_ref().map(|r| r.run_id), "workflow dispatched");
            Ok(DispatchAcknowledgement::Accepted {
                trigger: DispatchTrigger {
                    workflow,
                    git_ref,
                    inputs,
                    triggered_at,
                },
                run,
            })
        }
        Err(source) if source.is_disabled_workflow() => {
            warn!(error = %source, "dispatch rejected: workflow is disabled");
            Ok(DispatchAcknowledgement::WorkflowDisabled {
                workflow,
                message: source.to_string(),
            })
        }
        Err(source) => Err(DispatchError::Dispatch { workflow, source }),
    }
}
