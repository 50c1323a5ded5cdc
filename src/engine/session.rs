// src/engine/session.rs

//! Session-scoped state shared by every task invocation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::{ConfigFile, TargetProfile};
use crate::errors::{PipelineError, Result};
use crate::incremental::{IconCache, LastRunStore};
use crate::serve::ReloadHub;
use crate::types::{AssetKind, BuildMode};

/// Where sources and outputs live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Project directory (holds `Assetpipe.toml`); absolute.
    pub root: PathBuf,
    /// Source tree relative to `root`, e.g. `src`.
    pub source_dir: PathBuf,
    /// Directory of `package.json`/`node_modules`, relative to `root`.
    pub package_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>, source_dir: impl Into<PathBuf>, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source_dir: source_dir.into(),
            package_dir: package_dir.into(),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, cfg: &ConfigFile) -> Self {
        let section = cfg.config_section();
        Self::new(root, &section.source_dir, &section.package_dir)
    }

    /// Absolute path of `rel` inside the source tree.
    pub fn source(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(&self.source_dir).join(rel)
    }

    /// Source-relative path rendered as a glob prefix, e.g. `src/img`.
    pub fn source_glob(&self, rel: &str) -> String {
        let base = self.source_dir.to_string_lossy().replace('\\', "/");
        let base = base.trim_end_matches('/');
        if base.is_empty() || base == "." {
            rel.to_string()
        } else {
            format!("{base}/{rel}")
        }
    }

    pub fn package_root(&self) -> PathBuf {
        self.root.join(&self.package_dir)
    }
}

/// Everything a task needs besides its own descriptor.
///
/// Constructed once per CLI invocation and shared (behind an `Arc`) by the
/// graph runtime and the watch coordinator.
#[derive(Debug)]
pub struct BuildSession {
    layout: ProjectLayout,
    profile: TargetProfile,
    mode: BuildMode,
    last_run: LastRunStore,
    icons: Mutex<IconCache>,
    reload: ReloadHub,
}

impl BuildSession {
    pub fn new(layout: ProjectLayout, profile: TargetProfile, mode: BuildMode) -> Self {
        Self {
            layout,
            profile,
            mode,
            last_run: LastRunStore::new(),
            icons: Mutex::new(IconCache::new()),
            reload: ReloadHub::new(),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, cfg: &ConfigFile, mode: BuildMode) -> Result<Self> {
        let profile = cfg.active_profile()?.clone();
        Ok(Self::new(ProjectLayout::from_config(root, cfg), profile, mode))
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Absolute output directory for an asset kind.
    pub fn output_dir(&self, kind: AssetKind) -> PathBuf {
        self.layout.root.join(self.profile.dir(kind))
    }

    pub fn output_root(&self) -> PathBuf {
        self.layout.root.join(self.profile.root())
    }

    pub fn last_run(&self) -> &LastRunStore {
        &self.last_run
    }

    /// Lock the icon cache. Never hold the guard across an `.await`.
    pub fn icons(&self) -> Result<MutexGuard<'_, IconCache>> {
        self.icons
            .lock()
            .map_err(|_| PipelineError::Other(anyhow::anyhow!("icon cache lock poisoned")))
    }

    pub fn reload(&self) -> &ReloadHub {
        &self.reload
    }
}
