// src/tasks/statics.rs

//! Static assets: `favicon`, `fonts`, `img` and `svg`.
//!
//! Development links every output to its absolute source so edits show up
//! without a rebuild; production writes real copies (images go through the
//! lossless optimizer first). Switching modes replaces one kind with the
//! other because freshness also compares the output's file type.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::engine::BuildSession;
use crate::errors::{IoPathExt, Result};
use crate::fs::{Output, commit};
use crate::incremental::needs_update;
use crate::tasks::{TaskDescriptor, TaskReport, collect_inputs, mirrored};
use crate::transform::image;
use crate::types::{AssetKind, IncrementalPolicy, TaskId};

/// Source base that output paths are made relative to.
fn mirror_base(task: TaskId, session: &BuildSession) -> PathBuf {
    match task {
        TaskId::Fonts => session.layout().source("fonts"),
        _ => session.root().join(&session.layout().source_dir),
    }
}

fn output_kind(task: TaskId) -> AssetKind {
    match task {
        TaskId::Favicon => AssetKind::Html,
        TaskId::Fonts => AssetKind::Fonts,
        _ => AssetKind::Img,
    }
}

pub async fn run(task: TaskId, session: &BuildSession) -> Result<TaskReport> {
    let descriptor = TaskDescriptor::for_task(task, session.layout());
    let mut report = TaskReport::new(task);

    let base = mirror_base(task, session);
    let out_dir = session.output_dir(output_kind(task));
    let link = session.mode().links_static_assets();
    let optimize = task == TaskId::Img && session.mode().minifies();

    let mut outputs = Vec::new();
    for source in collect_inputs(session, &descriptor).await? {
        let Some(dest) = mirrored(&source, &base, &out_dir) else {
            continue;
        };
        if descriptor.policy == IncrementalPolicy::NewerThanOutput && !needs_update(&source, &dest, link) {
            report.skipped += 1;
            continue;
        }
        outputs.push(plan_output(source, dest, link, optimize).await?);
    }

    report.written = commit(outputs).await?;
    debug!(task = %task, written = report.written.len(), skipped = report.skipped, link, "static assets synced");
    Ok(report)
}

async fn plan_output(source: PathBuf, dest: PathBuf, link: bool, optimize: bool) -> Result<Output> {
    if link {
        return Ok(Output::Link {
            target: absolute(&source),
            path: dest,
        });
    }
    if optimize {
        let bytes = tokio::fs::read(&source).await.at_path(&source)?;
        let contents = image::optimize(&source, &bytes)?;
        return Ok(Output::Bytes { path: dest, contents });
    }
    Ok(Output::Copy { from: source, path: dest })
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::types::BuildMode;
    use std::fs;

    fn session(root: &Path, mode: BuildMode) -> BuildSession {
        BuildSession::from_config(root, &ConfigFile::default(), mode).unwrap()
    }

    #[tokio::test]
    async fn fonts_are_mirrored_below_the_fonts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/fonts/roboto")).unwrap();
        fs::write(root.join("src/fonts/roboto/r.woff2"), b"font").unwrap();

        let report = run(TaskId::Fonts, &session(root, BuildMode::Production)).await.unwrap();
        assert_eq!(report.written, vec![root.join("build/fonts/roboto/r.woff2")]);

        let again = run(TaskId::Fonts, &session(root, BuildMode::Production)).await.unwrap();
        assert!(again.written.is_empty());
        assert_eq!(again.skipped, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn favicon_is_linked_in_development() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/favicon.ico"), b"ico").unwrap();

        run(TaskId::Favicon, &session(root, BuildMode::Development)).await.unwrap();
        let out = root.join("build/favicon.ico");
        assert!(fs::symlink_metadata(&out).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&out).unwrap(), b"ico");
    }

    #[tokio::test]
    async fn missing_favicon_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let report = run(TaskId::Favicon, &session(dir.path(), BuildMode::Production)).await.unwrap();
        assert!(report.written.is_empty());
    }

    #[tokio::test]
    async fn broken_image_fails_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/img")).unwrap();
        fs::write(root.join("src/img/bad.png"), b"not a png").unwrap();

        let err = run(TaskId::Img, &session(root, BuildMode::Production)).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(!root.join("build/img/bad.png").exists());
    }
}
