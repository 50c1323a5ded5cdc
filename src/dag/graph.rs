// src/dag/graph.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::Composition;
use crate::errors::{PipelineError, Result};
use crate::types::TaskId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    deps: Vec<TaskId>,
    dependents: Vec<TaskId>,
}

/// Validated, acyclic task graph keyed by task id.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, DagNode>,
    order: Vec<TaskId>,
}

impl TaskGraph {
    pub fn from_composition(comp: &Composition) -> Result<Self> {
        Self::from_edges(comp.tasks(), comp.edges())
    }

    /// Build from `(task, runs-after)` edges. Fails with
    /// [`PipelineError::GraphCycle`] when the edges loop.
    pub fn from_edges(tasks: impl IntoIterator<Item = TaskId>, edges: Vec<(TaskId, TaskId)>) -> Result<Self> {
        let mut nodes: BTreeMap<TaskId, DagNode> = BTreeMap::new();
        for task in tasks {
            nodes.entry(task).or_default();
        }
        for (task, dep) in &edges {
            nodes.entry(*dep).or_default();
            let node = nodes.entry(*task).or_default();
            if !node.deps.contains(dep) {
                node.deps.push(*dep);
            }
        }
        for (task, dep) in &edges {
            if let Some(node) = nodes.get_mut(dep) {
                if !node.dependents.contains(task) {
                    node.dependents.push(*task);
                }
            }
        }

        let order = topological_order(&nodes)?;
        Ok(Self { nodes, order })
    }

    pub fn tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dependencies_of(&self, task: TaskId) -> &[TaskId] {
        self.nodes.get(&task).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, task: TaskId) -> &[TaskId] {
        self.nodes
            .get(&task)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// A topological order (dependencies first).
    pub fn order(&self) -> &[TaskId] {
        &self.order
    }
}

fn topological_order(nodes: &BTreeMap<TaskId, DagNode>) -> Result<Vec<TaskId>> {
    let mut graph: DiGraph<TaskId, ()> = DiGraph::new();
    let index: BTreeMap<TaskId, NodeIndex> = nodes.keys().map(|t| (*t, graph.add_node(*t))).collect();

    for (task, node) in nodes {
        for dep in &node.deps {
            if let (Some(&from), Some(&to)) = (index.get(dep), index.get(task)) {
                graph.add_edge(from, to, ());
            }
        }
    }

    toposort(&graph, None)
        .map(|order| order.into_iter().map(|ix| graph[ix]).collect())
        .map_err(|cycle| PipelineError::GraphCycle(format!("task {} is part of a cycle", graph[cycle.node_id()])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::build_composition;

    #[test]
    fn build_graph_orders_svg_last() {
        let graph = TaskGraph::from_composition(&build_composition()).unwrap();
        assert_eq!(graph.order().last(), Some(&TaskId::Svg));
        assert_eq!(graph.dependencies_of(TaskId::Svg).len(), 9);
        assert_eq!(graph.dependents_of(TaskId::Css), &[TaskId::Svg]);
    }

    #[test]
    fn cycles_are_rejected() {
        let err = TaskGraph::from_edges([], vec![(TaskId::Css, TaskId::Js), (TaskId::Js, TaskId::Css)]).unwrap_err();
        assert!(matches!(err, PipelineError::GraphCycle(_)));
        assert!(err.is_fatal());
    }
}
