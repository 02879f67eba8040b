//! Workflow resolution: maps a [`WorkflowReference`] to a [`WorkflowId`].

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{DispatchError, Memo, RepositoryId, Workflow, WorkflowId, WorkflowReference, WorkflowService};

/// Resolves the configured workflow reference once and caches the result.
pub struct WorkflowResolver {
    service: Arc<dyn WorkflowService>,
    repository: RepositoryId,
    reference: WorkflowReference,
    resolved: Memo<WorkflowId>,
}

impl WorkflowResolver {
    pub fn new(
        service: Arc<dyn WorkflowService>,
        repository: RepositoryId,
        reference: WorkflowReference,
    ) -> Self {
        Self {
            service,
            repository,
            reference,
            resolved: Memo::Unresolved,
        }
    }

    /// Returns the workflow id, listing the repository's workflows on the
    /// first call only.
    ///
    /// File-name references (`*.yml` / `*.yaml`) are used verbatim without any
    /// remote call; the service accepts them wherever an id is expected.
    #[instrument(skip(self), fields(reference = %self.reference, repository = %self.repository))]
    pub async fn resolve(&mut self) -> Result<WorkflowId, DispatchError> {
        if let Some(id) = self.resolved.get() {
            return Ok(id.clone());
        }

        let id = if self.reference.is_file_name() {
            WorkflowId::File(self.reference.as_str().to_string())
        } else {
            let workflows = self.service.list_workflows(&self.repository).await?;
            debug!(count = workflows.len(), "listed workflows");
            let found = find_workflow(&workflows, &self.reference).ok_or_else(|| {
                DispatchError::WorkflowNotFound {
                    reference: self.reference.clone(),
                    repository: self.repository.clone(),
                }
            })?;
            WorkflowId::Numeric(found.id)
        };

        debug!(workflow_id = %id, "workflow resolved");
        Ok(self.resolved.resolve(id).clone())
    }
}

/// First workflow whose name, id, or path matches `reference`.
///
/// A path also matches when it ends in `/<reference>`; the separator keeps a
/// short name from matching the tail of an unrelated path.
fn find_workflow<'a>(workflows: &'a [Workflow], reference: &WorkflowReference) -> Option<&'a Workflow> {
    let r = reference.as_str();
    let suffix = format!("/{r}");
    workflows.iter().find(|wf| {
        wf.name == r || wf.id.to_string() == r || wf.path == r || wf.path.ends_with(&suffix)
    })
}
