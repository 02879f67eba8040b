use std::sync::Arc;

use tracing::{info, instrument, warn};

use dispatch::{
    discover_run_url, dispatch, export_logs, format_duration, settle_conclusion, ActionHost, Clock,
    CompletionPoller, Config, DispatchAcknowledgement, DispatchError, LogMode, OutputLogs,
    OutputName, PollOutcome, PrintLogs, RunConclusion, RunId, RunLinks, RunResolver, Verdict,
    WorkflowId, WorkflowResolver, WorkflowService,
};

/// What a finished invocation found out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    pub workflow_id: WorkflowId,
    /// Set once the dispatched run has been located.
    pub run: Option<RunLinks>,
    /// Set when the invocation waited for the run to complete.
    pub conclusion: Option<RunConclusion>,
    pub verdict: Verdict,
}

impl InvocationReport {
    fn escalate(&mut self, verdict: Verdict) {
        let replace = match (&self.verdict, &verdict) {
            (_, Verdict::Success) => false,
            (Verdict::Warning(_), Verdict::Notice(_)) => false,
            _ => true,
        };
        if replace {
            self.verdict = verdict;
        }
    }
}

/// One dispatch of one workflow, from workflow lookup to final outputs.
///
/// Outputs are published as soon as each value is known, so a run that is
/// found but never completes still reports its id and URLs.
pub struct Invocation<'a> {
    config: &'a Config,
    service: Arc<dyn WorkflowService>,
    host: &'a dyn ActionHost,
    clock: &'a dyn Clock,
}

impl<'a> Invocation<'a> {
    pub fn new(
        config: &'a Config,
        service: Arc<dyn WorkflowService>,
        host: &'a dyn ActionHost,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            service,
            host,
            clock,
        }
    }

    /// Runs the invocation.
    ///
    /// Success variants (including a disabled workflow) come back as a report;
    /// anything that should fail the step comes back as the error.
    #[instrument(
        skip_all,
        fields(repository = %self.config.repository, workflow = %self.config.workflow, git_ref = %self.config.git_ref)
    )]
    pub async fn run(&self) -> Result<InvocationReport, DispatchError> {
        let config = self.config;

        let mut workflows = WorkflowResolver::new(
            Arc::clone(&self.service),
            config.repository.clone(),
            config.workflow.clone(),
        );
        let workflow_id = workflows.resolve().await?;
        self.host.info(&format!("Workflow id is: {workflow_id}"));
        self.host
            .set_output(OutputName::WorkflowId, &workflow_id.to_string())?;

        let acknowledgement = dispatch(
            self.service.as_ref(),
            &config.repository,
            workflow_id.clone(),
            config.git_ref.clone(),
            config.inputs.clone(),
            config.return_run_details,
        )
        .await?;

        let mut report = InvocationReport {
            workflow_id,
            run: None,
            conclusion: None,
            verdict: Verdict::Success,
        };

        let (trigger, acknowledged) = match acknowledgement {
            DispatchAcknowledgement::Accepted { trigger, run } => (trigger, run),
            DispatchAcknowledgement::WorkflowDisabled { workflow, message } => {
                let warning = format!("Workflow {workflow} is disabled, nothing was dispatched ({message})");
                self.host.warning(&warning);
                report.escalate(Verdict::Warning(warning));
                return Ok(report);
            }
        };
        self.host.info(&format!(
            "Workflow dispatched on {} at {}",
            trigger.git_ref(),
            trigger.triggered_at()
        ));

        let mut runs = RunResolver::new(
            Arc::clone(&self.service),
            config.repository.clone(),
            trigger,
            config.run_lookup.clone(),
        );
        if let Some(links) = acknowledged {
            runs.seed(links.run_id);
            self.record_run(&mut report, links)?;
        }

        if let Some(settings) = config.url_discovery {
            if report.run.is_none() {
                match discover_run_url(self.clock, settings, &mut runs).await? {
                    Some(links) => self.record_run(&mut report, links)?,
                    None => {
                        let warning = format!(
                            "Could not find the workflow run URL within {}",
                            format_duration(settings.timeout)
                        );
                        self.host.warning(&warning);
                        report.escalate(Verdict::Warning(warning));
                    }
                }
            }
            if let Some(links) = &report.run {
                self.host
                    .info(&format!("Workflow run URL: {}", links.html_url));
            }
        }

        let Some(settings) = config.wait else {
            info!("not waiting for completion");
            return Ok(report);
        };

        match CompletionPoller::new(self.clock, settings)
            .wait(&mut runs)
            .await?
        {
            PollOutcome::TimedOut { state } => {
                match state.links {
                    Some(links) => self.record_run(&mut report, links)?,
                    None => self.record_run_id(&report, runs.resolved())?,
                }
                if let Some(run_id) = runs.resolved() {
                    self.export_run_logs(run_id).await;
                }
                Err(DispatchError::Timeout {
                    elapsed: state.elapsed,
                    run_id: runs.resolved(),
                })
            }
            PollOutcome::Completed {
                conclusion, links, ..
            } => {
                let run_id = links.run_id;
                self.record_run(&mut report, links)?;
                self.export_run_logs(run_id).await;

                self.host
                    .set_output(OutputName::Conclusion, conclusion.as_str())?;
                report.conclusion = Some(conclusion);

                let verdict = settle_conclusion(conclusion, config.sync_status)?;
                match &verdict {
                    Verdict::Success => {
                        self.host.info(&format!("Workflow run concluded with '{conclusion}'"))
                    }
                    Verdict::Notice(message) => self.host.info(message),
                    Verdict::Warning(message) => self.host.warning(message),
                }
                report.escalate(verdict);
                Ok(report)
            }
        }
    }

    /// Publishes the run outputs unless the same run was already published.
    fn record_run(
        &self,
        report: &mut InvocationReport,
        links: RunLinks,
    ) -> Result<(), DispatchError> {
        if report.run.as_ref() == Some(&links) {
            return Ok(());
        }
        info!(run_id = %links.run_id, url = %links.html_url, "workflow run located");
        self.host
            .set_output(OutputName::RunId, &links.run_id.to_string())?;
        self.host.set_output(OutputName::RunUrl, &links.html_url)?;
        self.host.set_output(OutputName::RunApiUrl, &links.api_url)?;
        report.run = Some(links);
        Ok(())
    }

    /// Publishes a bare run id when the run was identified but never fetched.
    fn record_run_id(
        &self,
        report: &InvocationReport,
        run_id: Option<RunId>,
    ) -> Result<(), DispatchError> {
        match (run_id, &report.run) {
            (Some(id), None) => self.host.set_output(OutputName::RunId, &id.to_string()),
            _ => Ok(()),
        }
    }

    /// Exports job logs per the configured mode, for finished and timed-out
    /// runs alike. Failures only warn: the outcome must still be reported.
    async fn export_run_logs(&self, run_id: RunId) {
        let service = self.service.as_ref();
        let repository = &self.config.repository;
        let exported = match self.config.log_mode {
            LogMode::Disabled => return,
            LogMode::Print => {
                export_logs(service, repository, run_id, &PrintLogs::new(self.host)).await
            }
            LogMode::Output => {
                export_logs(service, repository, run_id, &OutputLogs::new(self.host)).await
            }
        };
        match exported {
            Ok(summary) => info!(
                exported = summary.exported,
                failed = summary.failed,
                "exported job logs"
            ),
            Err(e) => {
                warn!(error = %e, "log export failed");
                self.host
                    .warning(&format!("Failed to export logs of workflow run {run_id}: {e}"));
            }
        }
    }
}
