// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::engine::ProjectLayout;
use crate::errors::{PipelineError, Result};
use crate::types::{AssetKind, TaskId};

/// What to do synchronously when a watched source disappears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRule {
    /// Map the path relative to `source_base` (project-relative) onto the
    /// `kind` output directory and delete it.
    RemoveOutput { source_base: PathBuf, kind: AssetKind },
    /// Drop the icon's remember-cache entry. The sprite is not rebuilt.
    EvictIcon,
}

/// Compiled watch globs bound to one task.
#[derive(Clone)]
pub struct WatchRegistration {
    pub task: TaskId,
    pub patterns: Vec<String>,
    pub on_delete: Option<DeleteRule>,
    set: GlobSet,
}

impl fmt::Debug for WatchRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistration")
            .field("task", &self.task)
            .field("patterns", &self.patterns)
            .field("on_delete", &self.on_delete)
            .finish_non_exhaustive()
    }
}

impl WatchRegistration {
    pub fn new(task: TaskId, patterns: Vec<String>, on_delete: Option<DeleteRule>) -> Result<Self> {
        let set = build_globset(&patterns)?;
        Ok(Self {
            task,
            patterns,
            on_delete,
            set,
        })
    }

    /// `rel_path` is project-relative with forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }

    /// Whether a deletion re-runs the bound task after the delete rule.
    pub fn rebuilds_on_delete(&self) -> bool {
        self.on_delete != Some(DeleteRule::EvictIcon)
    }
}

/// Build a GlobSet from string patterns. `*` never crosses a `/`.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .map_err(|e| PipelineError::config(format!("invalid glob pattern {pat:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| PipelineError::config(format!("building glob set: {e}")))
}

/// The dev-mode watch table. `svg:icons` is listed before `svg` so a batch
/// touching both rebuilds the sprite before it is copied.
pub fn registrations(layout: &ProjectLayout) -> Result<Vec<WatchRegistration>> {
    let src = |rel: &str| layout.source_glob(rel);
    let remove = |base: &Path, kind| {
        Some(DeleteRule::RemoveOutput {
            source_base: base.to_path_buf(),
            kind,
        })
    };
    let source_dir = layout.source_dir.as_path();
    let fonts_dir = layout.source_dir.join("fonts");

    let table = vec![
        (TaskId::Html, vec![src("*.html")], remove(source_dir, AssetKind::Html)),
        (TaskId::HtmlTemplates, vec![src("templates/*.html")], None),
        (TaskId::Css, vec![src("css/**/*.css")], None),
        (TaskId::Js, vec![src("js/*.js"), src("js/modules/*.js")], None),
        (TaskId::Img, vec![src("**/*.{jpg,png,gif}")], remove(source_dir, AssetKind::Img)),
        (TaskId::SvgIcons, vec![src("img/svg/icons/*.svg")], Some(DeleteRule::EvictIcon)),
        (
            TaskId::Svg,
            vec![src("img/svg/*.svg"), src("img/svg/icons/*.svg")],
            remove(source_dir, AssetKind::Img),
        ),
        (TaskId::Fonts, vec![src("fonts/**/*.*")], remove(&fonts_dir, AssetKind::Fonts)),
    ];

    table
        .into_iter()
        .map(|(task, patterns, rule)| WatchRegistration::new(task, patterns, rule))
        .collect()
}
