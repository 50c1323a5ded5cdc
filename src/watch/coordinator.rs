// src/watch/coordinator.rs

//! Turning filesystem changes into delete-rule side effects and task runs.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{BuildSession, run_series};
use crate::errors::Result;
use crate::fs::remove_output;
use crate::tasks::{TaskOutcome, TaskRunner};
use crate::types::TaskId;
use crate::watch::patterns::{DeleteRule, WatchRegistration};
use crate::watch::watcher::{ChangeKind, FileChange};

/// Events closer together than this are handled as one batch.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// What a batch of changes amounts to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Delete rules to apply, with the deleted project-relative path.
    pub deletes: Vec<(DeleteRule, String)>,
    /// Tasks to re-run, in series, deduplicated.
    pub tasks: Vec<TaskId>,
}

pub struct WatchCoordinator {
    session: Arc<BuildSession>,
    runner: Arc<dyn TaskRunner>,
    registrations: Vec<WatchRegistration>,
}

impl WatchCoordinator {
    pub fn new(session: Arc<BuildSession>, runner: Arc<dyn TaskRunner>, registrations: Vec<WatchRegistration>) -> Self {
        Self {
            session,
            runner,
            registrations,
        }
    }

    pub fn plan(&self, batch: &[FileChange]) -> BatchPlan {
        let mut plan = BatchPlan::default();
        let mut wanted = Vec::new();

        for change in batch {
            for reg in self.registrations.iter().filter(|r| r.matches(&change.path)) {
                let rerun = match change.kind {
                    ChangeKind::Upsert => true,
                    ChangeKind::Removed => {
                        if let Some(rule) = &reg.on_delete {
                            plan.deletes.push((rule.clone(), change.path.clone()));
                        }
                        reg.rebuilds_on_delete()
                    }
                };
                if rerun && !wanted.contains(&reg.task) {
                    wanted.push(reg.task);
                }
            }
        }

        // Registration order decides series order.
        plan.tasks = self
            .registrations
            .iter()
            .map(|r| r.task)
            .filter(|t| wanted.contains(t))
            .fold(Vec::new(), |mut acc, t| {
                if !acc.contains(&t) {
                    acc.push(t);
                }
                acc
            });
        plan
    }

    /// Apply one delete rule. Returns the removed output, if any.
    pub fn apply_delete(&self, rule: &DeleteRule, rel_path: &str) -> Result<Option<PathBuf>> {
        let source = self.session.root().join(rel_path);
        match rule {
            DeleteRule::RemoveOutput { source_base, kind } => {
                let base = self.session.root().join(source_base);
                let Ok(rel) = source.strip_prefix(&base) else {
                    return Ok(None);
                };
                let output = self.session.output_dir(*kind).join(rel);
                if remove_output(&output)? {
                    info!(?output, "removed output of deleted source");
                    Ok(Some(output))
                } else {
                    Ok(None)
                }
            }
            DeleteRule::EvictIcon => {
                self.session.icons()?.evict(&source);
                Ok(None)
            }
        }
    }

    /// Apply delete rules, then re-run the bound tasks one after another.
    pub async fn handle_batch(&self, batch: &[FileChange]) -> Vec<(TaskId, TaskOutcome)> {
        let plan = self.plan(batch);
        debug!(changes = batch.len(), ?plan, "handling change batch");

        for (rule, path) in &plan.deletes {
            if let Err(err) = self.apply_delete(rule, path) {
                warn!(path = %path, error = %err, "delete rule failed; skipped");
            }
        }

        let outcomes = run_series(&plan.tasks, &self.runner, &self.session).await;
        for (task, outcome) in &outcomes {
            if *outcome == TaskOutcome::Fatal {
                warn!(task = %task, "fatal error in watch-triggered run; still watching");
            }
        }
        outcomes
    }

    /// Consume changes until `shutdown` resolves or the channel closes.
    pub async fn run(self, mut changes: mpsc::UnboundedReceiver<FileChange>, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(registrations = self.registrations.len(), "watching for changes");

        loop {
            let first = tokio::select! {
                _ = &mut shutdown => break,
                change = changes.recv() => match change {
                    Some(c) => c,
                    None => break,
                },
            };

            let mut batch = vec![first];
            while let Ok(Some(next)) = tokio::time::timeout(DEBOUNCE, changes.recv()).await {
                if !batch.contains(&next) {
                    batch.push(next);
                }
            }
            self.handle_batch(&batch).await;
        }
        info!("watch loop stopped");
    }
}
