//! workflow-dispatch entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: read the action's `INPUT_*` variables (or the
//!    matching `--flags`) plus the `GITHUB_*` context through clap, and
//!    validate them once into a [`dispatch::Config`].
//! 2. **Wire observability**: configure `tracing-subscriber` on stderr, text
//!    or JSON, filtered by `RUST_LOG` (or `debug` under `RUNNER_DEBUG=1`).
//!    Every span runs inside a root span carrying the [`InvocationId`].
//! 3. **Construct infrastructure**: the reqwest-backed [`GithubClient`], the
//!    workflow-command host, and the tokio clock, injected into
//!    [`runner::Invocation`].
//! 4. **Report**: a failure becomes a single `::error::` line and exit code 1.

mod host;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{debug, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use dispatch::{Config, ConfigInputs, InvocationId};
use github::GithubClient;
use runner::{Invocation, InvocationReport, TokioClock};

use crate::host::GithubActionsHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Trigger a GitHub Actions workflow and optionally wait for its run.
///
/// Every option can also be given as the `INPUT_<NAME>` variable GitHub
/// Actions sets for an action's inputs.
#[derive(Debug, Parser)]
#[command(name = "workflow-dispatch", version)]
struct Args {
    /// Token used to call the API.
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Workflow name, numeric id, or file name.
    #[arg(long, env = "INPUT_WORKFLOW")]
    workflow: Option<String>,

    /// Branch, tag, or commit SHA to run the workflow on.
    #[arg(long = "ref", env = "INPUT_REF")]
    git_ref: Option<String>,

    /// Target repository as `owner/name`.
    #[arg(long, env = "INPUT_REPO")]
    repo: Option<String>,

    /// Workflow inputs as a JSON or YAML mapping.
    #[arg(long, env = "INPUT_INPUTS")]
    inputs: Option<String>,

    /// Locate the run through the check run with this name.
    #[arg(long, env = "INPUT_RUN-NAME")]
    run_name: Option<String>,

    #[arg(long, env = "INPUT_WAIT-FOR-COMPLETION")]
    wait_for_completion: Option<String>,

    #[arg(long, env = "INPUT_WAIT-FOR-COMPLETION-TIMEOUT")]
    wait_for_completion_timeout: Option<String>,

    /// Whole seconds; overrides --wait-for-completion-timeout.
    #[arg(long, env = "INPUT_WAIT-TIMEOUT-SECONDS")]
    wait_timeout_seconds: Option<String>,

    #[arg(long, env = "INPUT_WAIT-FOR-COMPLETION-INTERVAL")]
    wait_for_completion_interval: Option<String>,

    /// Fail when the run concludes with failure, cancelled, or timed_out.
    #[arg(long, env = "INPUT_SYNC-STATUS")]
    sync_status: Option<String>,

    #[arg(long, env = "INPUT_DISPLAY-WORKFLOW-RUN-URL")]
    display_workflow_run_url: Option<String>,

    #[arg(long, env = "INPUT_DISPLAY-WORKFLOW-RUN-URL-INTERVAL")]
    display_workflow_run_url_interval: Option<String>,

    #[arg(long, env = "INPUT_DISPLAY-WORKFLOW-RUN-URL-TIMEOUT")]
    display_workflow_run_url_timeout: Option<String>,

    /// disabled, print, or output.
    #[arg(long, env = "INPUT_WORKFLOW-LOG-MODE")]
    workflow_log_mode: Option<String>,

    /// Ask the dispatch call to return the created run.
    #[arg(long, env = "INPUT_RETURN-RUN-DETAILS")]
    return_run_details: Option<String>,

    /// REST API base URL.
    #[arg(long, env = "INPUT_API-URL")]
    api_url: Option<String>,

    #[arg(long, env = "GITHUB_REF", hide = true)]
    github_ref: Option<String>,

    #[arg(long, env = "GITHUB_REPOSITORY", hide = true)]
    github_repository: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", hide = true)]
    github_api_url: Option<String>,

    /// File step outputs are appended to.
    #[arg(long, env = "GITHUB_OUTPUT", hide = true)]
    github_output: Option<PathBuf>,

    #[arg(long, env = "RUNNER_DEBUG", hide = true)]
    runner_debug: Option<String>,

    #[arg(long, value_enum, env = "WORKFLOW_DISPATCH_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn config_inputs(&self) -> ConfigInputs {
        ConfigInputs {
            token: self.token.clone(),
            workflow: self.workflow.clone(),
            git_ref: self.git_ref.clone(),
            repo: self.repo.clone(),
            inputs: self.inputs.clone(),
            run_name: self.run_name.clone(),
            wait_for_completion: self.wait_for_completion.clone(),
            wait_for_completion_timeout: self.wait_for_completion_timeout.clone(),
            wait_timeout_seconds: self.wait_timeout_seconds.clone(),
            wait_for_completion_interval: self.wait_for_completion_interval.clone(),
            sync_status: self.sync_status.clone(),
            display_workflow_run_url: self.display_workflow_run_url.clone(),
            display_workflow_run_url_interval: self.display_workflow_run_url_interval.clone(),
            display_workflow_run_url_timeout: self.display_workflow_run_url_timeout.clone(),
            workflow_log_mode: self.workflow_log_mode.clone(),
            return_run_details: self.return_run_details.clone(),
            api_url: self.api_url.clone(),
            context_ref: self.github_ref.clone(),
            context_repository: self.github_repository.clone(),
            context_api_url: self.github_api_url.clone(),
        }
    }

    fn debug_enabled(&self) -> bool {
        self.runner_debug.as_deref().map(str::trim) == Some("1")
    }
}

fn init_tracing(args: &Args) {
    let default_level = if args.debug_enabled() { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match args.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }
}

async fn run(args: &Args, host: &GithubActionsHost<std::io::Stdout>) -> anyhow::Result<InvocationReport> {
    let config = Config::from_inputs(args.config_inputs())?;
    debug!(?config, "configuration loaded");

    let client = GithubClient::new(&config.api_url, &config.token)?;
    let clock = TokioClock::new();
    let report = Invocation::new(&config, Arc::new(client), host, &clock)
        .run()
        .await?;
    Ok(report)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    let invocation_id = InvocationId::new_random();
    let span = info_span!("invocation", id = %invocation_id);
    let host = GithubActionsHost::stdout(args.github_output.clone());

    match run(&args, &host).instrument(span).await {
        Ok(report) => {
            debug!(?report, "invocation finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            host.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(flags: &[&str]) -> Args {
        let mut argv = vec!["workflow-dispatch"];
        argv.extend_from_slice(flags);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_onto_config_inputs() {
        let args = parse(&[
            "--token",
            "ghs_x",
            "--workflow",
            "deploy.yml",
            "--ref",
            "v2",
            "--repo",
            "octo/hello",
            "--inputs",
            "{\"a\": 1}",
            "--wait-for-completion",
            "true",
            "--wait-timeout-seconds",
            "120",
            "--workflow-log-mode",
            "print",
        ]);
        let inputs = args.config_inputs();

        assert_eq!(inputs.workflow.as_deref(), Some("deploy.yml"));
        assert_eq!(inputs.git_ref.as_deref(), Some("v2"));
        assert_eq!(inputs.wait_timeout_seconds.as_deref(), Some("120"));

        let config = Config::from_inputs(inputs).unwrap();
        assert_eq!(config.repository.to_string(), "octo/hello");
        assert_eq!(
            config.wait.map(|w| w.timeout),
            Some(std::time::Duration::from_secs(120))
        );
        assert_eq!(config.log_mode, dispatch::LogMode::Print);
    }

    #[test]
    fn log_format_accepts_json() {
        let args = parse(&["--log-format", "json"]);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn runner_debug_switches_on_debug_logging() {
        assert!(parse(&["--runner-debug", "1"]).debug_enabled());
        assert!(!parse(&["--runner-debug", "0"]).debug_enabled());
    }

    #[test]
    fn token_value_is_not_printed_by_debug_config() {
        let args = parse(&[
            "--token",
            "ghs_secret",
            "--workflow",
            "ci.yml",
            "--ref",
            "main",
            "--repo",
            "octo/hello",
        ]);
        let config = Config::from_inputs(args.config_inputs()).unwrap();
        assert!(!format!("{config:?}").contains("ghs_secret"));
    }
}
