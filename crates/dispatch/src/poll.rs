//! Completion polling and run-URL discovery.
//!
//! Both loops sleep on a fixed interval through the injected [`Clock`] and are
//! bounded twice over: by an elapsed-time guard and by a maximum number of
//! attempts derived from `timeout / interval`. Neither loop ever cancels the
//! remote run; giving up only stops this invocation from waiting.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::{
    Clock, DispatchError, PollSettings, RunConclusion, RunLinks, RunResolver, RunSnapshot,
    RunStatus,
};

/// Where the completion poller stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    #[default]
    Waiting,
    Completed,
    TimedOut,
}

/// What the poller has observed so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollState {
    pub phase: PollPhase,
    pub elapsed: Duration,
    pub attempts: u32,
    pub status: Option<RunStatus>,
    pub conclusion: Option<RunConclusion>,
    pub links: Option<RunLinks>,
}

impl PollState {
    fn observe(&mut self, snapshot: RunSnapshot) {
        self.status = Some(snapshot.status);
        self.conclusion = Some(snapshot.conclusion);
        self.links = Some(snapshot.links);
    }
}

/// Terminal result of [`CompletionPoller::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The run completed with `conclusion`.
    Completed {
        conclusion: RunConclusion,
        links: RunLinks,
        state: PollState,
    },
    /// The timeout elapsed first. The run is still going remotely.
    TimedOut { state: PollState },
}

/// Waits for a dispatched run to reach [`RunStatus::Completed`].
pub struct CompletionPoller<'a> {
    clock: &'a dyn Clock,
    settings: PollSettings,
}

impl<'a> CompletionPoller<'a> {
    pub fn new(clock: &'a dyn Clock, settings: PollSettings) -> Self {
        Self { clock, settings }
    }

    /// Polls until the run completes or the timeout elapses.
    ///
    /// Each attempt sleeps for the interval, then queries the run. Transient
    /// failures (run not listed yet, 404, 5xx, rate limiting, unknown status
    /// strings) are logged and the loop keeps waiting; the timeout clock is
    /// not reset. Any other failure ends the loop with that error.
    #[instrument(skip_all, fields(interval = ?self.settings.interval, timeout = ?self.settings.timeout))]
    pub async fn wait(&self, runs: &mut RunResolver) -> Result<PollOutcome, DispatchError> {
        let start = self.clock.now();
        let mut state = PollState::default();

        for attempt in 1..=max_attempts(self.settings) {
            self.clock.sleep(self.settings.interval).await;
            state.attempts = attempt;

            match runs.snapshot().await {
                Ok(snapshot) => state.observe(snapshot),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "run status not available, still waiting");
                }
                Err(e) => return Err(e),
            }

            state.elapsed = self.clock.now().saturating_sub(start);
            if state.elapsed > self.settings.timeout {
                break;
            }

            if let (Some(RunStatus::Completed), Some(links)) = (state.status, state.links.clone()) {
                state.phase = PollPhase::Completed;
                let conclusion = state.conclusion.unwrap_or(RunConclusion::Neutral);
                info!(%conclusion, elapsed = %format_duration(state.elapsed), "run completed");
                return Ok(PollOutcome::Completed {
                    conclusion,
                    links,
                    state,
                });
            }

            debug!(
                attempt,
                status = ?state.status,
                elapsed = %format_duration(state.elapsed),
                "run not completed yet"
            );
        }

        state.phase = PollPhase::TimedOut;
        state.elapsed = self.clock.now().saturating_sub(start);
        warn!(
            status = ?state.status,
            elapsed = %format_duration(state.elapsed),
            "gave up waiting for the run"
        );
        Ok(PollOutcome::TimedOut { state })
    }
}

/// Waits until the dispatched run can be looked up and returns its links.
///
/// The first attempt happens immediately; later ones after each interval.
/// Returns `Ok(None)` when the timeout elapses first. Only non-transient
/// failures are errors.
#[instrument(skip_all, fields(interval = ?settings.interval, timeout = ?settings.timeout))]
pub async fn discover_run_url(
    clock: &dyn Clock,
    settings: PollSettings,
    runs: &mut RunResolver,
) -> Result<Option<RunLinks>, DispatchError> {
    let start = clock.now();

    for attempt in 1..=max_attempts(settings) {
        match runs.snapshot().await {
            Ok(snapshot) => return Ok(Some(snapshot.links)),
            Err(e) if e.is_transient() => {
                debug!(attempt, error = %e, "run not visible yet");
            }
            Err(e) => return Err(e),
        }

        if clock.now().saturating_sub(start) > settings.timeout {
            break;
        }
        clock.sleep(settings.interval).await;
    }

    Ok(None)
}

/// How a successful invocation should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Success, with a line worth showing.
    Notice(String),
    /// Success, but something deserves attention.
    Warning(String),
}

/// Maps a completed run's conclusion onto the invocation's own outcome.
///
/// With `sync_status`, failing conclusions fail the invocation and the other
/// non-success conclusions are informational. Without it, completion alone
/// is success; a failing conclusion is only surfaced as a warning.
pub fn settle_conclusion(
    conclusion: RunConclusion,
    sync_status: bool,
) -> Result<Verdict, DispatchError> {
    match (conclusion, sync_status) {
        (RunConclusion::Success, _) => Ok(Verdict::Success),
        (c, true) if c.is_failing() => Err(DispatchError::RunFailed { conclusion: c }),
        (c, true) => Ok(Verdict::Notice(format!("Workflow run concluded with '{c}'"))),
        (c, false) if c.is_failing() => Ok(Verdict::Warning(format!(
            "Workflow run concluded with '{c}' (not propagated, sync-status is disabled)"
        ))),
        (_, false) => Ok(Verdict::Success),
    }
}

/// Renders a duration as `HHh MMm SSs`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}h {:02}m {:02}s",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

fn max_attempts(settings: PollSettings) -> u32 {
    let interval = settings.interval.as_millis().max(1);
    let rounds = settings.timeout.as_millis().div_ceil(interval);
    u32::try_from(rounds).unwrap_or(u32::MAX - 1) + 1
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{workflow_run, FakeWorkflowService, ManualClock};
    use crate::{
        DispatchTrigger, GitRef, RepositoryId, RunId, RunLookup, ServiceError, Timestamp,
        WorkflowId,
    };

    fn settings(interval: u64, timeout: u64) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
        }
    }

    fn seeded_resolver(service: &Arc<FakeWorkflowService>) -> RunResolver {
        let trigger = DispatchTrigger::at(
            WorkflowId::Numeric(1),
            GitRef::new("main").unwrap(),
            Timestamp::now(),
        );
        let mut resolver = RunResolver::new(
            service.clone(),
            RepositoryId::parse("octo/hello").unwrap(),
            trigger,
            RunLookup::TimeWindow,
        );
        resolver.seed(RunId::new(42));
        resolver
    }

    fn run(status: &str, conclusion: Option<&str>) -> Result<crate::WorkflowRun, ServiceError> {
        Ok(workflow_run(42, Timestamp::now(), status, conclusion))
    }

    #[tokio::test]
    async fn completes_exactly_when_completion_is_observed() {
        let service = Arc::new(FakeWorkflowService::new().with_run_states(vec![
            run("queued", None),
            run("in_progress", None),
            run("completed", Some("success")),
            run("completed", Some("failure")),
        ]));
        let clock = ManualClock::new();
        let mut resolver = seeded_resolver(&service);

        let outcome = CompletionPoller::new(&clock, settings(10, 600))
            .wait(&mut resolver)
            .await
            .unwrap();

        let PollOutcome::Completed {
            conclusion, state, ..
        } = outcome
        else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(conclusion, RunConclusion::Success);
        assert_eq!(state.phase, PollPhase::Completed);
        assert_eq!(state.attempts, 3);
        assert_eq!(service.calls("get_run"), 3);
        assert_eq!(clock.now(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn times_out_when_the_run_never_completes() {
        let service = Arc::new(
            FakeWorkflowService::new().with_run_states(vec![run("in_progress", None)]),
        );
        let clock = ManualClock::new();
        let mut resolver = seeded_resolver(&service);

        let outcome = CompletionPoller::new(&clock, settings(3, 10))
            .wait(&mut resolver)
            .await
            .unwrap();

        let PollOutcome::TimedOut { state } = outcome else {
            panic!("expected timeout, got {outcome:?}");
        };
        assert_eq!(state.phase, PollPhase::TimedOut);
        assert_eq!(state.status, Some(RunStatus::InProgress));
        assert_eq!(state.attempts, 4);
        assert!(state.elapsed > Duration::from_secs(10));
        assert_eq!(state.links.map(|l| l.run_id), Some(RunId::new(42)));
    }

    #[tokio::test]
    async fn timeout_wins_over_a_late_completion() {
        let service = Arc::new(FakeWorkflowService::new().with_run_states(vec![
            run("in_progress", None),
            run("completed", Some("success")),
        ]));
        let clock = ManualClock::new();
        let mut resolver = seeded_resolver(&service);

        let outcome = CompletionPoller::new(&clock, settings(6, 10))
            .wait(&mut resolver)
            .await
            .unwrap();

        assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn transient_failures_keep_the_loop_waiting() {
        let service = Arc::new(FakeWorkflowService::new().with_run_states(vec![
            Err(ServiceError::NotFound {
                resource: "workflow run 42".into(),
            }),
            Err(ServiceError::Http {
                status: 502,
                message: "bad gateway".into(),
                retry_after: None,
            }),
            run("mystery", None),
            run("completed", Some("cancelled")),
        ]));
        let clock = ManualClock::new();
        let mut resolver = seeded_resolver(&service);

        let outcome = CompletionPoller::new(&clock, settings(1, 60))
            .wait(&mut resolver)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            PollOutcome::Completed {
                conclusion: RunConclusion::Cancelled,
                ..
            }
        ));
        assert_eq!(service.calls("get_run"), 4);
    }

    #[tokio::test]
    async fn run_not_found_during_resolution_is_transient() {
        let service = Arc::new(
            FakeWorkflowService::new()
                .with_run_listings(vec![
                    Ok(vec![]),
                    Ok(vec![workflow_run(
                        42,
                        Timestamp::now().offset_seconds(5),
                        "queued",
                        None,
                    )]),
                ])
                .with_run_states(vec![run("completed", Some("success"))]),
        );
        let trigger = DispatchTrigger::at(
            WorkflowId::Numeric(1),
            GitRef::new("main").unwrap(),
            Timestamp::now(),
        );
        let mut resolver = RunResolver::new(
            service.clone(),
            RepositoryId::parse("octo/hello").unwrap(),
            trigger,
            RunLookup::TimeWindow,
        );
        let clock = ManualClock::new();

        let outcome = CompletionPoller::new(&clock, settings(5, 60))
            .wait(&mut resolver)
            .await
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Completed { .. }));
        assert_eq!(service.calls("list_runs"), 2);
        assert_eq!(resolver.resolved(), Some(RunId::new(42)));
    }

    #[tokio::test]
    async fn non_retryable_failures_abort_the_loop() {
        let service = Arc::new(FakeWorkflowService::new().with_run_states(vec![Err(
            ServiceError::Http {
                status: 401,
                message: "Bad credentials".into(),
                retry_after: None,
            },
        )]));
        let clock = ManualClock::new();
        let mut resolver = seeded_resolver(&service);

        let err = CompletionPoller::new(&clock, settings(5, 60))
            .wait(&mut resolver)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Service(ServiceError::Http { status: 401, .. })));
    }

    #[tokio::test]
    async fn url_discovery_tries_immediately_then_waits() {
        let service = Arc::new(FakeWorkflowService::new().with_run_states(vec![
            Err(ServiceError::NotFound {
                resource: "workflow run 42".into(),
            }),
            run("queued", None),
        ]));
        let clock = ManualClock::new();
        let mut resolver = seeded_resolver(&service);

        let links = discover_run_url(&clock, settings(2, 30), &mut resolver)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(links.run_id, RunId::new(42));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn url_discovery_gives_up_after_the_timeout() {
        let service = Arc::new(FakeWorkflowService::new().with_run_listings(vec![Ok(vec![])]));
        let trigger = DispatchTrigger::at(
            WorkflowId::Numeric(1),
            GitRef::new("main").unwrap(),
            Timestamp::now(),
        );
        let mut resolver = RunResolver::new(
            service.clone(),
            RepositoryId::parse("octo/hello").unwrap(),
            trigger,
            RunLookup::TimeWindow,
        );
        let clock = ManualClock::new();

        let links = discover_run_url(&clock, settings(4, 10), &mut resolver)
            .await
            .unwrap();

        assert_eq!(links, None);
        assert!(clock.now() > Duration::from_secs(10));
    }

    #[test]
    fn conclusions_settle_according_to_sync_status() {
        assert_eq!(
            settle_conclusion(RunConclusion::Success, true).unwrap(),
            Verdict::Success
        );
        for failing in [
            RunConclusion::Failure,
            RunConclusion::Cancelled,
            RunConclusion::TimedOut,
        ] {
            assert!(matches!(
                settle_conclusion(failing, true),
                Err(DispatchError::RunFailed { conclusion }) if conclusion == failing
            ));
            assert!(matches!(
                settle_conclusion(failing, false),
                Ok(Verdict::Warning(_))
            ));
        }
        for informational in [
            RunConclusion::Skipped,
            RunConclusion::Neutral,
            RunConclusion::ActionRequired,
        ] {
            assert!(matches!(
                settle_conclusion(informational, true),
                Ok(Verdict::Notice(_))
            ));
            assert_eq!(
                settle_conclusion(informational, false).unwrap(),
                Verdict::Success
            );
        }
    }

    #[test]
    fn durations_render_as_hours_minutes_seconds() {
        assert_eq!(format_duration(Duration::from_secs(3725)), "01h 02m 05s");
        assert_eq!(format_duration(Duration::ZERO), "00h 00m 00s");
    }

    #[test]
    fn attempts_are_bounded_by_timeout_over_interval() {
        assert_eq!(max_attempts(settings(3, 10)), 5);
        assert_eq!(max_attempts(settings(10, 600)), 61);
        assert_eq!(max_attempts(settings(0, 0)), 1);
    }
}
