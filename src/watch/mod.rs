// src/watch/mod.rs

//! File watching for `dev`.
//!
//! - `patterns.rs`: the watch table and its delete rules.
//! - `watcher.rs`: `notify` events turned into project-relative changes.
//! - `coordinator.rs`: debouncing, delete rules and series re-runs.

pub mod coordinator;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use coordinator::{BatchPlan, DEBOUNCE, WatchCoordinator};
pub use patterns::{DeleteRule, WatchRegistration, build_globset, registrations};
pub use watcher::{ChangeKind, FileChange, WatcherHandle, spawn_watcher};
