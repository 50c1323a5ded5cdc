// src/transform/mod.rs

//! Pure transform stages.
//!
//! Each stage maps input text/bytes to output text/bytes and never writes to
//! disk. HTML includes and CSS `@import`s read through a [`SourceReader`] so
//! they can be exercised against in-memory sources; the script bundler
//! resolves against the real `node_modules` layout.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{IoPathExt, PipelineError, Result};

pub mod css;
pub mod image;
pub mod include;
pub mod js;
pub mod svg;

/// Read access to referenced source files.
pub trait SourceReader: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn is_file(&self, path: &Path) -> bool;
}

/// Reads straight from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskReader;

impl SourceReader for DiskReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).at_path(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory sources keyed by (lexically normalized) path.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.files
            .insert(normalize(path.as_ref()), contents.into());
        self
    }
}

impl SourceReader for MemoryReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            PipelineError::filesystem(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }
}

/// A pattern compiled on first use.
pub(crate) type StaticRegex = LazyLock<std::result::Result<Regex, regex::Error>>;

pub(crate) fn compiled(re: &'static StaticRegex, stage: &'static str) -> Result<&'static Regex> {
    re.as_ref()
        .map_err(|e| PipelineError::transform(stage, format!("bad built-in pattern: {e}")))
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Directory of `path`, or `.` for bare file names.
pub fn dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
