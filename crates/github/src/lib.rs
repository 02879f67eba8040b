//! GitHub infrastructure adapter.
//!
//! Implements the [`dispatch::WorkflowService`] port over the GitHub REST API
//! using `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! All GitHub API details (headers, pagination, error bodies, `Retry-After`)
//! are handled here; the [`dispatch`] crate never sees them.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `list_workflows` | `GET /repos/{o}/{r}/actions/workflows` (paginated) |
//! | `create_dispatch` | `POST /repos/{o}/{r}/actions/workflows/{id}/dispatches` |
//! | `get_run` | `GET /repos/{o}/{r}/actions/runs/{run_id}` |
//! | `list_runs` | `GET /repos/{o}/{r}/actions/workflows/{id}/runs?event=workflow_dispatch` |
//! | `list_jobs` | `GET /repos/{o}/{r}/actions/runs/{run_id}/jobs` (paginated) |
//! | `download_job_log` | `GET /repos/{o}/{r}/actions/jobs/{job_id}/logs` |
//! | `list_check_runs` | `GET /repos/{o}/{r}/commits/{ref}/check-runs?check_name=..` |

mod client;
mod models;

pub use client::{ClientError, GithubClient};
