//! Run resolution: works out which run belongs to this invocation's dispatch.
//!
//! The dispatch call does not (in general) return a run id, so the run has to
//! be picked out of what the service lists afterwards. Two strategies exist:
//!
//! - **Time window**: list dispatch-triggered runs of the workflow and take the
//!   earliest one created at or after the trigger timestamp. Two dispatches of
//!   the same workflow within the same second cannot be told apart; the
//!   service offers no correlation key to do better.
//! - **Named**: look up the latest check run carrying a caller-chosen name on
//!   the dispatched ref. Exact, provided the caller keeps names unique.
//!
//! Both strategies refuse anything that started before the trigger. An empty
//! result is [`DispatchError::RunNotFound`], which is expected for a while
//! after dispatching; retrying is up to the caller.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
    CheckRun, DispatchError, DispatchTrigger, Memo, RepositoryId, RunId, RunLookup, RunSnapshot,
    Timestamp, WorkflowRun, WorkflowService, DISPATCH_EVENT,
};

/// Resolves and caches the run id for one dispatch.
pub struct RunResolver {
    service: Arc<dyn WorkflowService>,
    repository: RepositoryId,
    trigger: DispatchTrigger,
    lookup: RunLookup,
    resolved: Memo<RunId>,
}

impl RunResolver {
    pub fn new(
        service: Arc<dyn WorkflowService>,
        repository: RepositoryId,
        trigger: DispatchTrigger,
        lookup: RunLookup,
    ) -> Self {
        Self {
            service,
            repository,
            trigger,
            lookup,
            resolved: Memo::Unresolved,
        }
    }

    /// Records a run id reported directly by the dispatch acknowledgement.
    /// Later [`resolve`](Self::resolve) calls return it without any lookup.
    pub fn seed(&mut self, run_id: RunId) {
        self.resolved.resolve(run_id);
    }

    /// The run id, if it has been resolved.
    pub fn resolved(&self) -> Option<RunId> {
        self.resolved.get().copied()
    }

    /// Returns the run id, performing the lookup only until it first succeeds.
    #[instrument(skip(self), fields(workflow = %self.trigger.workflow(), since = %self.trigger.triggered_at()))]
    pub async fn resolve(&mut self) -> Result<RunId, DispatchError> {
        if let Some(id) = self.resolved.get() {
            return Ok(*id);
        }

        let since = self.trigger.triggered_at();
        let found = match &self.lookup {
            RunLookup::TimeWindow => {
                let runs = self
                    .service
                    .list_runs(&self.repository, self.trigger.workflow(), DISPATCH_EVENT)
                    .await?;
                debug!(listed = runs.len(), "listed dispatch-triggered runs");
                select_run(&runs, since).map(|run| run.id)
            }
            RunLookup::Named(name) => {
                let checks = self
                    .service
                    .list_check_runs(&self.repository, self.trigger.git_ref(), name)
                    .await?;
                debug!(listed = checks.len(), run_name = %name, "listed check runs");
                select_check_run(&checks, since)
                    .map(|check| check.workflow_run_id().unwrap_or(RunId::new(check.id.as_u64())))
            }
        };

        let id = found.ok_or_else(|| DispatchError::RunNotFound {
            workflow: self.trigger.workflow().clone(),
            since,
        })?;
        debug!(run_id = %id, "run resolved");
        Ok(*self.resolved.resolve(id))
    }

    /// Resolves the run (if needed) and fetches its current state.
    pub async fn snapshot(&mut self) -> Result<RunSnapshot, DispatchError> {
        let run_id = self.resolve().await?;
        let run = self.service.get_run(&self.repository, run_id).await?;
        debug!(run_id = %run.id, status = ?run.status, conclusion = ?run.conclusion, "fetched run");
        RunSnapshot::try_from(run)
    }
}

/// Earliest run created (at whole-second precision) at or after `since`.
///
/// The service lists newest first, so among equal creation times the entry
/// furthest down the list wins.
fn select_run(runs: &[WorkflowRun], since: Timestamp) -> Option<&WorkflowRun> {
    runs.iter()
        .rev()
        .filter(|run| run.created_at.truncated_to_seconds() >= since)
        .min_by_key(|run| run.created_at.truncated_to_seconds())
}

/// First listed check run that did not start before `since`.
fn select_check_run(checks: &[CheckRun], since: Timestamp) -> Option<&CheckRun> {
    checks.iter().find(|check| {
        check
            .started_at
            .is_none_or(|started| started.truncated_to_seconds() >= since)
    })
}
