// src/dag/scheduler.rs

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::dag::graph::TaskGraph;
use crate::tasks::TaskOutcome;
use crate::types::TaskId;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on dependencies.
    Pending,
    Running,
    /// Finished, successfully or not. Isolated failures still release
    /// dependents.
    Done(TaskOutcome),
    /// Never started because a fatal error aborted the run.
    Skipped,
}

/// Drives one run of a [`TaskGraph`].
///
/// Tasks become ready once every dependency is `Done`. A fatal outcome stops
/// handing out new tasks; the caller keeps draining running ones and then
/// calls [`Scheduler::finish`].
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    states: BTreeMap<TaskId, RunState>,
    aborted: bool,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        let states = graph.tasks().map(|t| (t, RunState::Pending)).collect();
        Self {
            graph,
            states,
            aborted: false,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Tasks ready at the start of the run; marks them `Running`.
    pub fn start(&mut self) -> Vec<TaskId> {
        self.collect_ready()
    }

    /// Record a completion and return the tasks it released.
    pub fn handle_completion(&mut self, task: TaskId, outcome: TaskOutcome) -> Vec<TaskId> {
        let Some(state) = self.states.get_mut(&task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return Vec::new();
        };
        if *state != RunState::Running {
            warn!(task = %task, state = ?state, "completion for a task that is not running; ignoring");
            return Vec::new();
        }
        *state = RunState::Done(outcome);

        if outcome == TaskOutcome::Fatal {
            debug!(task = %task, "fatal outcome; no further tasks will be scheduled");
            self.aborted = true;
            return Vec::new();
        }
        if self.aborted {
            return Vec::new();
        }
        self.collect_ready()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn running(&self) -> usize {
        self.states.values().filter(|s| **s == RunState::Running).count()
    }

    /// True once nothing is running and nothing more can start.
    pub fn is_finished(&self) -> bool {
        self.running() == 0
            && (self.aborted || self.states.values().all(|s| matches!(s, RunState::Done(_))))
    }

    /// Mark tasks that never started as skipped and return final states.
    pub fn finish(mut self) -> BTreeMap<TaskId, RunState> {
        for state in self.states.values_mut() {
            if *state == RunState::Pending {
                *state = RunState::Skipped;
            }
        }
        self.states
    }

    pub fn state(&self, task: TaskId) -> Option<RunState> {
        self.states.get(&task).copied()
    }

    fn collect_ready(&mut self) -> Vec<TaskId> {
        let ready: Vec<TaskId> = self
            .graph
            .order()
            .iter()
            .copied()
            .filter(|t| self.states.get(t) == Some(&RunState::Pending))
            .filter(|t| {
                self.graph
                    .dependencies_of(*t)
                    .iter()
                    .all(|d| matches!(self.states.get(d), Some(RunState::Done(_))))
            })
            .collect();
        for task in &ready {
            self.states.insert(*task, RunState::Running);
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::build_composition;

    fn scheduler() -> Scheduler {
        Scheduler::new(TaskGraph::from_composition(&build_composition()).unwrap())
    }

    #[test]
    fn svg_waits_for_the_whole_fan_out() {
        let mut s = scheduler();
        let first = s.start();
        assert_eq!(first.len(), 9);
        assert!(!first.contains(&TaskId::Svg));

        for task in &first[..8] {
            assert!(s.handle_completion(*task, TaskOutcome::Success).is_empty());
        }
        assert_eq!(s.handle_completion(first[8], TaskOutcome::Success), vec![TaskId::Svg]);
        assert!(!s.is_finished());
        s.handle_completion(TaskId::Svg, TaskOutcome::Success);
        assert!(s.is_finished());
    }

    #[test]
    fn isolated_failure_does_not_block_svg() {
        let mut s = scheduler();
        let first = s.start();
        let mut released = Vec::new();
        for (i, task) in first.iter().enumerate() {
            let outcome = if i == 0 { TaskOutcome::Failed } else { TaskOutcome::Success };
            released.extend(s.handle_completion(*task, outcome));
        }
        assert_eq!(released, vec![TaskId::Svg]);
    }

    #[test]
    fn fatal_outcome_skips_the_rest() {
        let mut s = scheduler();
        let first = s.start();
        assert!(s.handle_completion(TaskId::Css, TaskOutcome::Fatal).is_empty());
        assert!(s.is_aborted());
        assert!(!s.is_finished());

        for task in first.iter().filter(|t| **t != TaskId::Css) {
            assert!(s.handle_completion(*task, TaskOutcome::Success).is_empty());
        }
        assert!(s.is_finished());
        let states = s.finish();
        assert_eq!(states[&TaskId::Svg], RunState::Skipped);
        assert_eq!(states[&TaskId::Css], RunState::Done(TaskOutcome::Fatal));
    }
}
