// src/incremental/mod.rs

//! Change tracking that lets tasks skip work between invocations.
//!
//! - `last_run.rs`: per-task timestamp of the last successful run.
//! - `freshness.rs`: source-vs-output comparison for copied/linked assets.
//! - `icon_cache.rs`: content-hash keyed cache of minified SVG icons.

pub mod freshness;
pub mod icon_cache;
pub mod last_run;

pub use freshness::needs_update;
pub use icon_cache::{IconCache, IconEntry};
pub use last_run::LastRunStore;
