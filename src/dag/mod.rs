// src/dag/mod.rs

//! Task graph construction and scheduling.
//!
//! Graphs are written as nested [`Composition`]s (`series` / `parallel`),
//! lowered into a [`TaskGraph`] whose edges say "runs after", and driven by
//! a [`Scheduler`] that hands out ready tasks as others complete.

pub mod graph;
pub mod scheduler;

pub use graph::TaskGraph;
pub use scheduler::Scheduler;

use crate::types::TaskId;

/// A graph in the shape it is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    Task(TaskId),
    /// Each step starts after every task of the previous step finished.
    Series(Vec<Composition>),
    /// Steps run concurrently.
    Parallel(Vec<Composition>),
}

impl Composition {
    pub fn series(steps: impl IntoIterator<Item = Composition>) -> Self {
        Composition::Series(steps.into_iter().collect())
    }

    pub fn parallel(steps: impl IntoIterator<Item = Composition>) -> Self {
        Composition::Parallel(steps.into_iter().collect())
    }

    /// Every task mentioned, in declaration order.
    pub fn tasks(&self) -> Vec<TaskId> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<TaskId>) {
        match self {
            Composition::Task(t) => {
                if !out.contains(t) {
                    out.push(*t);
                }
            }
            Composition::Series(steps) | Composition::Parallel(steps) => {
                steps.iter().for_each(|s| s.collect(out));
            }
        }
    }

    /// `(task, runs-after)` pairs.
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        let mut edges = Vec::new();
        self.lower(&[], &mut edges);
        edges
    }

    /// Lower with `after` as the set every root of `self` must wait for.
    /// Returns the tasks that complete `self`.
    fn lower(&self, after: &[TaskId], edges: &mut Vec<(TaskId, TaskId)>) -> Vec<TaskId> {
        match self {
            Composition::Task(t) => {
                edges.extend(after.iter().map(|dep| (*t, *dep)));
                vec![*t]
            }
            Composition::Series(steps) => {
                let mut tail = after.to_vec();
                for step in steps {
                    let done = step.lower(&tail, edges);
                    if !done.is_empty() {
                        tail = done;
                    }
                }
                tail
            }
            Composition::Parallel(steps) => steps
                .iter()
                .flat_map(|step| step.lower(after, edges))
                .collect(),
        }
    }
}

/// `series(parallel(html, css, js, libs, mylibs, favicon, fonts, img, svg:icons), svg)`.
///
/// `svg` runs last so it picks up the sprite written by `svg:icons`.
pub fn build_composition() -> Composition {
    use TaskId::*;
    Composition::series([
        Composition::parallel(
            [Html, Css, Js, Libs, MyLibs, Favicon, Fonts, Img, SvgIcons].map(Composition::Task),
        ),
        Composition::Task(Svg),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_graph_puts_svg_after_everything() {
        let comp = build_composition();
        assert_eq!(comp.tasks().len(), 10);
        assert!(!comp.tasks().contains(&TaskId::HtmlTemplates));

        let edges = comp.edges();
        assert_eq!(edges.len(), 9);
        assert!(edges.iter().all(|(task, _)| *task == TaskId::Svg));
        assert!(edges.contains(&(TaskId::Svg, TaskId::SvgIcons)));
    }

    #[test]
    fn nested_series_chain_through() {
        use TaskId::*;
        let comp = Composition::series([
            Composition::Task(Html),
            Composition::parallel([Composition::Task(Css), Composition::Task(Js)]),
            Composition::Task(Svg),
        ]);
        let mut edges = comp.edges();
        edges.sort();
        assert_eq!(edges, vec![(Css, Html), (Js, Html), (Svg, Css), (Svg, Js)]);
    }
}
