//! Invocation orchestrator.
//!
//! Sequences one dispatch from start to finish: workflow resolution, the
//! dispatch call, run resolution, optional run-URL discovery, optional
//! completion polling, log export, and step outputs.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between business logic
//! in the [`dispatch`] crate and the port implementations it is handed
//! (`WorkflowService`, `ActionHost`, `Clock`). It contains no domain rules of
//! its own and never reads the environment.

mod clock;
mod invocation;

pub use clock::TokioClock;
pub use invocation::{Invocation, InvocationReport};
