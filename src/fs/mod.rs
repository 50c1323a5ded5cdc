// src/fs/mod.rs

//! Filesystem plumbing shared by the transform tasks.
//!
//! Reads happen wherever a task needs them; writes go through [`commit`],
//! which applies a whole batch of outputs only after every transform in the
//! task has succeeded.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::GlobSet;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{IoPathExt, PipelineError, Result};

/// One pending write produced by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Write these bytes to `path`.
    Bytes { path: PathBuf, contents: Vec<u8> },
    /// Copy `from` to `path` as a regular file.
    Copy { from: PathBuf, path: PathBuf },
    /// Make `path` a symbolic link to `target` (absolute).
    Link { target: PathBuf, path: PathBuf },
}

impl Output {
    pub fn path(&self) -> &Path {
        match self {
            Output::Bytes { path, .. } | Output::Copy { path, .. } | Output::Link { path, .. } => {
                path
            }
        }
    }
}

/// Collect files under `project_root/base` whose project-relative path
/// matches `patterns`. A missing base directory yields no files.
pub fn collect_sources(project_root: &Path, base: &Path, patterns: &GlobSet) -> Result<Vec<PathBuf>> {
    let start = project_root.join(base);
    if !start.is_dir() {
        debug!(?start, "source base missing; no inputs");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&start).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| start.clone());
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            PipelineError::filesystem(path, io)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(project_root) {
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if patterns.is_match(&rel_str) {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Modification time, following symlinks.
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Write `contents` to `path` through a temp file in the same directory, so
/// readers never observe a half-written file and an existing symlink at
/// `path` is replaced rather than written through.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).at_path(parent)?;

    let mut tmp = NamedTempFile::new_in(parent).at_path(parent)?;
    tmp.write_all(contents).at_path(path)?;
    tmp.persist(path)
        .map_err(|e| PipelineError::filesystem(path, e.error))?;
    Ok(())
}

/// Replace whatever is at `path` with a symlink to `target`.
pub fn link(target: &Path, path: &Path) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).at_path(parent)?;
    if fs::symlink_metadata(path).is_ok() {
        fs::remove_file(path).at_path(path)?;
    }
    make_symlink(target, path).at_path(path)
}

#[cfg(unix)]
fn make_symlink(target: &Path, path: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn make_symlink(target: &Path, path: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, path)
}

/// Remove an output file. Returns `false` when nothing was there.
pub fn remove_output(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => {
            fs::remove_file(path).at_path(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PipelineError::filesystem(path, e)),
    }
}

/// Apply a batch of outputs on the blocking pool. Returns the written paths.
pub async fn commit(outputs: Vec<Output>) -> Result<Vec<PathBuf>> {
    if outputs.is_empty() {
        return Ok(Vec::new());
    }
    tokio::task::spawn_blocking(move || commit_blocking(&outputs))
        .await
        .map_err(|e| PipelineError::Other(e.into()))?
}

fn commit_blocking(outputs: &[Output]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(outputs.len());
    for output in outputs {
        match output {
            Output::Bytes { path, contents } => write_atomic(path, contents)?,
            Output::Copy { from, path } => {
                let bytes = fs::read(from).at_path(from)?;
                write_atomic(path, &bytes)?;
            }
            Output::Link { target, path } => link(target, path)?,
        }
        debug!(path = ?output.path(), "wrote output");
        written.push(output.path().to_path_buf());
    }
    Ok(written)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::patterns::build_globset;
    use tempfile::tempdir;

    #[test]
    fn collect_sources_respects_single_star() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/templates")).unwrap();
        fs::write(root.join("src/index.html"), "a").unwrap();
        fs::write(root.join("src/templates/header.html"), "b").unwrap();

        let set = build_globset(&["src/*.html".to_string()]).unwrap();
        let files = collect_sources(root, Path::new("src"), &set).unwrap();
        assert_eq!(files, vec![root.join("src/index.html")]);
    }

    #[test]
    fn missing_base_is_empty() {
        let dir = tempdir().unwrap();
        let set = build_globset(&["src/libs/**/*.*".to_string()]).unwrap();
        let files = collect_sources(dir.path(), Path::new("src/libs"), &set).unwrap();
        assert!(files.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_replaces_symlink_instead_of_following_it() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.png");
        let out = dir.path().join("out/src.png");
        fs::write(&src, b"original").unwrap();

        link(&src, &out).unwrap();
        assert!(fs::symlink_metadata(&out).unwrap().file_type().is_symlink());

        write_atomic(&out, b"copy").unwrap();
        assert!(fs::symlink_metadata(&out).unwrap().file_type().is_file());
        assert_eq!(fs::read(&src).unwrap(), b"original");
        assert_eq!(fs::read(&out).unwrap(), b"copy");
    }

    #[test]
    fn remove_output_reports_absence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.html");
        assert!(!remove_output(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_output(&path).unwrap());
        assert!(!path.exists());
    }
}
