// src/engine/mod.rs

//! Orchestration engine.
//!
//! - `session.rs`: the state every task invocation shares.
//! - `runtime.rs`: running a task graph on a `JoinSet`, and running tasks in
//!   series for the watch loop.

pub mod runtime;
pub mod session;

pub use runtime::{RunReport, run_build, run_graph, run_series};
pub use session::{BuildSession, ProjectLayout};
