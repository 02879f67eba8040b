//! Invocation configuration.
//!
//! The composition root collects raw option strings into [`ConfigInputs`]
//! (from `INPUT_*` variables, CLI flags, and the `GITHUB_*` context) and
//! calls [`Config::from_inputs`] exactly once. Every component then receives
//! the immutable [`Config`] by reference; nothing else reads the environment.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::{DispatchError, GitRef, RepositoryId, RunName, WorkflowReference};

/// Default REST API base when the host does not provide one.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(900);
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_URL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_URL_TIMEOUT: Duration = Duration::from_secs(600);

/// Raw, unvalidated option values. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct ConfigInputs {
    pub token: Option<String>,
    pub workflow: Option<String>,
    pub git_ref: Option<String>,
    pub repo: Option<String>,
    pub inputs: Option<String>,
    pub run_name: Option<String>,
    pub wait_for_completion: Option<String>,
    pub wait_for_completion_timeout: Option<String>,
    pub wait_timeout_seconds: Option<String>,
    pub wait_for_completion_interval: Option<String>,
    pub sync_status: Option<String>,
    pub display_workflow_run_url: Option<String>,
    pub display_workflow_run_url_interval: Option<String>,
    pub display_workflow_run_url_timeout: Option<String>,
    pub workflow_log_mode: Option<String>,
    pub return_run_details: Option<String>,
    pub api_url: Option<String>,

    /// Ref of the triggering context (`GITHUB_REF`).
    pub context_ref: Option<String>,
    /// Repository of the triggering context (`GITHUB_REPOSITORY`).
    pub context_repository: Option<String>,
    /// API base of the triggering context (`GITHUB_API_URL`).
    pub context_api_url: Option<String>,
}

/// API credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Returns the raw token for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// How the run created by the dispatch is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunLookup {
    /// Earliest dispatch-triggered run created at or after the trigger time.
    TimeWindow,
    /// Latest check run with this name on the dispatched ref.
    Named(RunName),
}

/// Interval/timeout pair for one of the polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// What to do with the logs of the dispatched run's jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Disabled,
    /// Print each job's log in a collapsible group.
    Print,
    /// Publish all logs as a JSON step output.
    Output,
}

impl LogMode {
    fn parse(raw: Option<&str>) -> Result<Self, DispatchError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("disabled") => Ok(Self::Disabled),
            Some("print") => Ok(Self::Print),
            Some("output") => Ok(Self::Output),
            Some(other) => Err(config_error(format!(
                "workflow-log-mode must be one of disabled, print, output (got '{other}')"
            ))),
        }
    }
}

/// Validated, immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: ApiToken,
    pub workflow: WorkflowReference,
    pub git_ref: GitRef,
    pub repository: RepositoryId,
    pub inputs: Map<String, Value>,
    pub run_lookup: RunLookup,
    /// `Some` when `wait-for-completion` is enabled.
    pub wait: Option<PollSettings>,
    /// `Some` when `display-workflow-run-url` is enabled.
    pub url_discovery: Option<PollSettings>,
    pub sync_status: bool,
    pub log_mode: LogMode,
    pub return_run_details: bool,
    pub api_url: String,
}

impl Config {
    /// Validates raw option values.
    ///
    /// Fails with [`DispatchError::Configuration`] on a missing required
    /// option, an unparsable `inputs` document, a bad boolean, or a duration
    /// with an unknown unit.
    pub fn from_inputs(raw: ConfigInputs) -> Result<Self, DispatchError> {
        let token = non_empty(raw.token.as_deref())
            .map(|t| ApiToken(t.to_string()))
            .ok_or_else(|| config_error("input 'token' is required"))?;
        let workflow = non_empty(raw.workflow.as_deref())
            .and_then(WorkflowReference::new)
            .ok_or_else(|| config_error("input 'workflow' is required"))?;

        let git_ref = non_empty(raw.git_ref.as_deref())
            .or(non_empty(raw.context_ref.as_deref()))
            .and_then(GitRef::new)
            .ok_or_else(|| config_error("input 'ref' is required outside of a GitHub context"))?;

        let repo_raw = non_empty(raw.repo.as_deref())
            .or(non_empty(raw.context_repository.as_deref()))
            .ok_or_else(|| config_error("input 'repo' is required outside of a GitHub context"))?;
        let repository = RepositoryId::parse(repo_raw)
            .ok_or_else(|| config_error(format!("repo must be 'owner/name' (got '{repo_raw}')")))?;

        let inputs = parse_inputs(raw.inputs.as_deref())?;

        let run_lookup = match non_empty(raw.run_name.as_deref()).and_then(RunName::new) {
            Some(name) => RunLookup::Named(name),
            None => RunLookup::TimeWindow,
        };

        let wait = if parse_bool("wait-for-completion", raw.wait_for_completion.as_deref())? {
            let timeout = match non_empty(raw.wait_timeout_seconds.as_deref()) {
                Some(secs) => secs.trim().parse().map(Duration::from_secs).map_err(|_| {
                    config_error(format!(
                        "wait-timeout-seconds must be a whole number (got '{secs}')"
                    ))
                })?,
                None => parse_duration_or(
                    raw.wait_for_completion_timeout.as_deref(),
                    DEFAULT_WAIT_TIMEOUT,
                )?,
            };
            Some(PollSettings {
                interval: parse_duration_or(
                    raw.wait_for_completion_interval.as_deref(),
                    DEFAULT_WAIT_INTERVAL,
                )?,
                timeout,
            })
        } else {
            None
        };

        let url_discovery = if parse_bool(
            "display-workflow-run-url",
            raw.display_workflow_run_url.as_deref(),
        )? {
            Some(PollSettings {
                interval: parse_duration_or(
                    raw.display_workflow_run_url_interval.as_deref(),
                    DEFAULT_URL_INTERVAL,
                )?,
                timeout: parse_duration_or(
                    raw.display_workflow_run_url_timeout.as_deref(),
                    DEFAULT_URL_TIMEOUT,
                )?,
            })
        } else {
            None
        };

        let api_url = non_empty(raw.api_url.as_deref())
            .or(non_empty(raw.context_api_url.as_deref()))
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            token,
            workflow,
            git_ref,
            repository,
            inputs,
            run_lookup,
            wait,
            url_discovery,
            sync_status: parse_bool("sync-status", raw.sync_status.as_deref())?,
            log_mode: LogMode::parse(non_empty(raw.workflow_log_mode.as_deref()))?,
            return_run_details: parse_bool(
                "return-run-details",
                raw.return_run_details.as_deref(),
            )?,
            api_url,
        })
    }
}

/// Decodes the `inputs` option into the map sent with the dispatch.
///
/// JSON is tried first, then YAML. Absent or empty input yields an empty map.
/// Anything that is not a mapping is rejected.
pub fn parse_inputs(raw: Option<&str>) -> Result<Map<String, Value>, DispatchError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(Map::new());
    };

    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(json_err) => {
            tracing::debug!(error = %json_err, "inputs are not valid JSON, trying YAML");
            serde_yaml::from_str::<Value>(raw).map_err(|yaml_err| {
                tracing::debug!(error = %yaml_err, "inputs are not valid YAML either");
                config_error(format!("inputs '{raw}' is neither valid JSON nor valid YAML"))
            })?
        }
    };

    match parsed {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(config_error(format!(
            "inputs must be a mapping of names to values (got {})",
            json_kind(&other)
        ))),
    }
}

/// Parses `<number><unit>` with unit `s`, `m`, or `h` (case-insensitive).
/// A bare integer is taken as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, DispatchError> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let Some(unit) = raw.chars().last() else {
        return Err(config_error("empty duration"));
    };
    let multiplier = match unit.to_ascii_lowercase() {
        's' => 1.0,
        'm' => 60.0,
        'h' => 3600.0,
        _ => return Err(config_error(format!("Unknown time unit '{unit}' in '{raw}'"))),
    };
    let number: f64 = raw[..raw.len() - unit.len_utf8()]
        .trim()
        .parse()
        .map_err(|_| config_error(format!("invalid duration '{raw}'")))?;
    if !number.is_finite() || number < 0.0 {
        return Err(config_error(format!("invalid duration '{raw}'")));
    }
    Duration::try_from_secs_f64(number * multiplier)
        .map_err(|_| config_error(format!("duration '{raw}' is out of range")))
}

fn parse_duration_or(raw: Option<&str>, default: Duration) -> Result<Duration, DispatchError> {
    non_empty(raw).map_or(Ok(default), parse_duration)
}

fn parse_bool(name: &str, raw: Option<&str>) -> Result<bool, DispatchError> {
    match non_empty(raw).map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(config_error(format!(
            "{name} must be 'true' or 'false' (got '{other}')"
        ))),
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn config_error(message: impl Into<String>) -> DispatchError {
    DispatchError::Configuration {
        message: message.into(),
    }
}
