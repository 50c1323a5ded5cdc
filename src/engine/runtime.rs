// src/engine/runtime.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::dag::scheduler::{RunState, Scheduler};
use crate::dag::{TaskGraph, build_composition};
use crate::engine::BuildSession;
use crate::errors::Result;
use crate::tasks::{TaskOutcome, TaskRunner, spawn_guarded};
use crate::types::TaskId;

/// Final state of every task in one graph run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub states: BTreeMap<TaskId, RunState>,
}

impl RunReport {
    pub fn outcome(&self, task: TaskId) -> Option<TaskOutcome> {
        match self.states.get(&task) {
            Some(RunState::Done(outcome)) => Some(*outcome),
            _ => None,
        }
    }

    fn with_outcome(&self, wanted: TaskOutcome) -> Vec<TaskId> {
        self.states
            .iter()
            .filter(|(_, s)| **s == RunState::Done(wanted))
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn failed(&self) -> Vec<TaskId> {
        self.with_outcome(TaskOutcome::Failed)
    }

    pub fn skipped(&self) -> Vec<TaskId> {
        self.states
            .iter()
            .filter(|(_, s)| **s == RunState::Skipped)
            .map(|(t, _)| *t)
            .collect()
    }

    pub fn is_fatal(&self) -> bool {
        !self.with_outcome(TaskOutcome::Fatal).is_empty()
    }

    /// No task failed in any way.
    pub fn is_success(&self) -> bool {
        self.states
            .values()
            .all(|s| *s == RunState::Done(TaskOutcome::Success))
    }
}

/// Run every task of `graph`, starting each as soon as its dependencies are
/// done. Ready tasks share one `JoinSet`, so they interleave on the current
/// thread and finish in no particular order.
pub async fn run_graph(graph: TaskGraph, runner: Arc<dyn TaskRunner>, session: Arc<BuildSession>) -> RunReport {
    let mut scheduler = Scheduler::new(graph);
    let mut running: JoinSet<(TaskId, TaskOutcome)> = JoinSet::new();
    let mut ids: HashMap<Id, TaskId> = HashMap::new();

    let spawn = |set: &mut JoinSet<(TaskId, TaskOutcome)>, ids: &mut HashMap<Id, TaskId>, task: TaskId| {
        let runner = runner.clone();
        let session = session.clone();
        let handle = set.spawn(async move { (task, spawn_guarded(runner, session, task).await) });
        ids.insert(handle.id(), task);
    };

    for task in scheduler.start() {
        spawn(&mut running, &mut ids, task);
    }

    while let Some(joined) = running.join_next_with_id().await {
        let Some((task, outcome)) = settle(joined, &mut ids) else {
            continue;
        };
        for next in scheduler.handle_completion(task, outcome) {
            spawn(&mut running, &mut ids, next);
        }
        if scheduler.is_aborted() && !running.is_empty() {
            warn!(remaining = running.len(), "fatal error; waiting for running tasks to drain");
        }
    }

    let report = RunReport {
        states: scheduler.finish(),
    };
    info!(
        failed = report.failed().len(),
        skipped = report.skipped().len(),
        fatal = report.is_fatal(),
        "graph run finished"
    );
    report
}

/// Map a finished supervisor back to its task. A supervisor that died
/// (panicked or was cancelled) counts as a failure of the task it ran.
fn settle(
    joined: std::result::Result<(Id, (TaskId, TaskOutcome)), JoinError>,
    ids: &mut HashMap<Id, TaskId>,
) -> Option<(TaskId, TaskOutcome)> {
    match joined {
        Ok((id, done)) => {
            ids.remove(&id);
            Some(done)
        }
        Err(e) => {
            let task = ids.remove(&e.id());
            error!(task = ?task, error = %e, "task supervisor failed");
            task.map(|task| (task, TaskOutcome::Failed))
        }
    }
}

/// The `build` graph.
pub async fn run_build(runner: Arc<dyn TaskRunner>, session: Arc<BuildSession>) -> Result<RunReport> {
    let graph = TaskGraph::from_composition(&build_composition())?;
    Ok(run_graph(graph, runner, session).await)
}

/// Run `tasks` one after another, each finishing before the next starts.
pub async fn run_series(
    tasks: &[TaskId],
    runner: &Arc<dyn TaskRunner>,
    session: &Arc<BuildSession>,
) -> Vec<(TaskId, TaskOutcome)> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        let outcome = spawn_guarded(runner.clone(), session.clone(), *task).await;
        outcomes.push((*task, outcome));
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dead_supervisor_fails_its_task() {
        let mut set: JoinSet<(TaskId, TaskOutcome)> = JoinSet::new();
        let mut ids = HashMap::new();
        let handle = set.spawn(async {
            if std::hint::black_box(true) {
                panic!("supervisor died");
            }
            (TaskId::Css, TaskOutcome::Success)
        });
        ids.insert(handle.id(), TaskId::Css);

        let joined = set.join_next_with_id().await.unwrap();
        assert!(joined.is_err());
        assert_eq!(settle(joined, &mut ids), Some((TaskId::Css, TaskOutcome::Failed)));
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn finished_supervisor_reports_its_outcome() {
        let mut set: JoinSet<(TaskId, TaskOutcome)> = JoinSet::new();
        let mut ids = HashMap::new();
        let handle = set.spawn(async { (TaskId::Js, TaskOutcome::Success) });
        ids.insert(handle.id(), TaskId::Js);

        let joined = set.join_next_with_id().await.unwrap();
        assert_eq!(settle(joined, &mut ids), Some((TaskId::Js, TaskOutcome::Success)));
        assert!(ids.is_empty());
    }
}
