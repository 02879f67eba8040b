//! Core domain for dispatching a GitHub Actions workflow and following the run
//! it starts.
//!
//! This crate contains the run model, the resolution and polling logic, and
//! the port traits the outside world is reached through. Infrastructure crates
//! implement the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`RunId`, `WorkflowId`, etc.) |
//! | [`types`] | Run status/conclusion model and remote records |
//! | [`errors`] | `DispatchError`, `ServiceError`, and retry policy |
//! | [`config`] | Validated invocation configuration |
//! | [`service`], [`host`], [`clock`] | Port traits |
//! | [`workflow`] | Workflow reference → id resolution |
//! | [`trigger`] | Issuing the dispatch |
//! | [`run`] | Identifying the run a dispatch created |
//! | [`poll`] | Completion polling and run-URL discovery |
//! | [`logs`] | Job log export |

pub mod clock;
pub mod config;
pub mod errors;
pub mod host;
pub mod identifiers;
pub mod logs;
pub mod memo;
pub mod poll;
pub mod run;
pub mod service;
pub mod trigger;
pub mod types;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use clock::Clock;
pub use config::{ApiToken, Config, ConfigInputs, LogMode, PollSettings, RunLookup};
pub use errors::{DispatchError, RetryPolicy, ServiceError};
pub use host::{ActionHost, OutputName};
pub use identifiers::{
    CheckRunId, GitRef, InvocationId, JobId, RepositoryId, RunId, RunName, WorkflowId,
    WorkflowReference,
};
pub use logs::{escape_imported_logs, export_logs, ExportSummary, LogRenderer, OutputLogs, PrintLogs};
pub use memo::Memo;
pub use poll::{
    discover_run_url, format_duration, settle_conclusion, CompletionPoller, PollOutcome,
    PollPhase, PollState, Verdict,
};
pub use run::RunResolver;
pub use service::{DispatchRequest, WorkflowService, DISPATCH_EVENT};
pub use trigger::{dispatch, DispatchAcknowledgement, DispatchTrigger};
pub use types::{
    CheckRun, Job, RunConclusion, RunLinks, RunSnapshot, RunStatus, Timestamp, Workflow,
    WorkflowRun,
};
pub use workflow::WorkflowResolver;
