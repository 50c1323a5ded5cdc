// src/tasks/mod.rs

//! Transform tasks.
//!
//! Each task selects its sources, narrows them with its incremental policy,
//! runs the pure stages from [`crate::transform`] in memory, and only then
//! commits every output through [`crate::fs::commit`]. A failing stage
//! therefore never leaves partial output behind.

use std::path::PathBuf;

use crate::engine::{BuildSession, ProjectLayout};
use crate::errors::{PipelineError, Result};
use crate::types::{AssetKind, IncrementalPolicy, TaskId};
use crate::watch::patterns::build_globset;

pub mod html;
pub mod icons;
pub mod libs;
pub mod runner;
pub mod scripts;
pub mod statics;
pub mod styles;

pub use runner::{PipelineRunner, TaskOutcome, TaskRunner, run_guarded, spawn_guarded};

/// Static description of a task, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    /// Input globs relative to the project directory.
    pub inputs: Vec<String>,
    /// Stage names, in order. Bracketed stages only run in production.
    pub chain: &'static [&'static str],
    /// Profile slot written to; `None` when the task writes into the source
    /// tree (`svg:icons`).
    pub output: Option<AssetKind>,
    pub policy: IncrementalPolicy,
}

impl TaskDescriptor {
    pub fn for_task(id: TaskId, layout: &ProjectLayout) -> Self {
        let src = |rel: &str| layout.source_glob(rel);
        let (inputs, chain, output, policy): (Vec<String>, &'static [&'static str], _, _) = match id {
            TaskId::Html => (
                vec![src("*.html")],
                &["file-include"],
                Some(AssetKind::Html),
                IncrementalPolicy::NewerThanLastRun,
            ),
            TaskId::HtmlTemplates => (
                vec![src("*.html")],
                &["file-include"],
                Some(AssetKind::Html),
                IncrementalPolicy::None,
            ),
            TaskId::Css => (
                vec![src("css/style.css")],
                &["import", "custom-properties", "nesting", "prefix", "mq-pack", "[minify]"],
                Some(AssetKind::Css),
                IncrementalPolicy::None,
            ),
            TaskId::Js => (
                vec![src("js/main.js")],
                &["module-bundle", "[minify]"],
                Some(AssetKind::Js),
                IncrementalPolicy::None,
            ),
            TaskId::Libs => {
                let pkg = layout.package_dir.to_string_lossy().replace('\\', "/");
                let manifest = if pkg.is_empty() || pkg == "." {
                    "package.json".to_string()
                } else {
                    format!("{}/package.json", pkg.trim_end_matches('/'))
                };
                (
                    vec![manifest],
                    &["main-files", "flatten"],
                    Some(AssetKind::Libs),
                    IncrementalPolicy::NewerThanOutput,
                )
            }
            TaskId::MyLibs => (
                vec![src("libs/**/*.*")],
                &["flatten"],
                Some(AssetKind::Libs),
                IncrementalPolicy::None,
            ),
            TaskId::Favicon => (
                vec![src("favicon.ico")],
                &["link|copy"],
                Some(AssetKind::Html),
                IncrementalPolicy::None,
            ),
            TaskId::Fonts => (
                vec![src("fonts/**/*.*")],
                &["link|copy"],
                Some(AssetKind::Fonts),
                IncrementalPolicy::NewerThanOutput,
            ),
            TaskId::Img => (
                vec![src("img/**/*.{jpg,png,gif}"), src("images/**/*.{jpg,png,gif}")],
                &["link|[imagemin]+copy"],
                Some(AssetKind::Img),
                IncrementalPolicy::NewerThanOutput,
            ),
            TaskId::Svg => (
                vec![src("img/svg/**/*.svg")],
                &["link|copy"],
                Some(AssetKind::Img),
                IncrementalPolicy::NewerThanOutput,
            ),
            TaskId::SvgIcons => (
                vec![src("img/svg/icons/*.svg")],
                &["svgmin", "remember", "symbols", "svgmin"],
                None,
                IncrementalPolicy::ContentHashRemember,
            ),
        };
        Self {
            id,
            inputs,
            chain,
            output,
            policy,
        }
    }

    /// Every task, in declaration order.
    pub fn all(layout: &ProjectLayout) -> Vec<Self> {
        TaskId::ALL
            .into_iter()
            .map(|id| Self::for_task(id, layout))
            .collect()
    }
}

/// What one task invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskId,
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Inputs left alone by the incremental policy.
    pub skipped: usize,
}

impl TaskReport {
    pub fn new(task: TaskId) -> Self {
        Self {
            task,
            written: Vec::new(),
            removed: Vec::new(),
            skipped: 0,
        }
    }
}

/// Every file matching the descriptor's input globs, sorted.
pub(crate) async fn collect_inputs(session: &BuildSession, descriptor: &TaskDescriptor) -> Result<Vec<PathBuf>> {
    let globs = build_globset(&descriptor.inputs)?;
    let root = session.root().to_path_buf();
    let base = session.layout().source_dir.clone();
    tokio::task::spawn_blocking(move || crate::fs::collect_sources(&root, &base, &globs))
        .await
        .map_err(|e| PipelineError::Other(e.into()))?
}

/// Output path of `source` when the tree below `base` is mirrored into
/// `out_dir`.
pub(crate) fn mirrored(source: &std::path::Path, base: &std::path::Path, out_dir: &std::path::Path) -> Option<PathBuf> {
    source.strip_prefix(base).ok().map(|rel| out_dir.join(rel))
}
