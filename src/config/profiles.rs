// src/config/profiles.rs

//! Target profiles: where each asset kind lands for a given CMS layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{PipelineError, Result};
use crate::types::AssetKind;

/// `[profile.<name>]` section as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileConfig {
    /// Output root; every asset path must live under it. `clean` removes it.
    pub root: String,
    pub html: String,
    pub css: String,
    pub js: String,
    pub img: String,
    pub libs: String,
    pub fonts: String,
}

impl ProfileConfig {
    fn layout(root: &str, html: &str, css: &str, js: &str, img: &str, libs: &str, fonts: &str) -> Self {
        Self {
            root: root.to_string(),
            html: html.to_string(),
            css: css.to_string(),
            js: js.to_string(),
            img: img.to_string(),
            libs: libs.to_string(),
            fonts: fonts.to_string(),
        }
    }

    fn get(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Html => &self.html,
            AssetKind::Css => &self.css,
            AssetKind::Js => &self.js,
            AssetKind::Img => &self.img,
            AssetKind::Libs => &self.libs,
            AssetKind::Fonts => &self.fonts,
        }
    }
}

/// A validated output layout. Paths are relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProfile {
    name: String,
    root: PathBuf,
    dirs: BTreeMap<AssetKind, PathBuf>,
}

impl TargetProfile {
    pub fn from_config(name: &str, cfg: &ProfileConfig) -> Result<Self> {
        if cfg.root.trim().is_empty() {
            return Err(PipelineError::config(format!(
                "profile '{name}' has an empty root"
            )));
        }
        let root = PathBuf::from(cfg.root.trim());

        let mut dirs = BTreeMap::new();
        for kind in AssetKind::ALL {
            let raw = cfg.get(kind).trim();
            if raw.is_empty() {
                return Err(PipelineError::config(format!(
                    "profile '{name}' has an empty '{}' path",
                    kind.as_str()
                )));
            }
            let dir = PathBuf::from(raw);
            if !dir.starts_with(&root) {
                return Err(PipelineError::config(format!(
                    "profile '{name}': '{}' path {:?} is outside the output root {:?}",
                    kind.as_str(),
                    dir,
                    root
                )));
            }
            dirs.insert(kind, dir);
        }

        Ok(Self {
            name: name.to_string(),
            root,
            dirs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output directory for an asset kind, relative to the project directory.
    pub fn dir(&self, kind: AssetKind) -> &Path {
        // Every kind is inserted by `from_config`.
        self.dirs
            .get(&kind)
            .map(PathBuf::as_path)
            .unwrap_or(self.root.as_path())
    }
}

/// Named lookup over the built-in and user-defined profiles.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, TargetProfile>,
}

impl ProfileRegistry {
    /// The three layouts shipped with the tool.
    pub fn builtin_configs() -> BTreeMap<String, ProfileConfig> {
        let mut map = BTreeMap::new();
        map.insert(
            "modx".to_string(),
            ProfileConfig::layout(
                "build",
                "build/",
                "build/assets/css/",
                "build/assets/js/",
                "build/assets/",
                "build/assets/libs/",
                "build/assets/fonts/",
            ),
        );
        map.insert(
            "docs".to_string(),
            ProfileConfig::layout(
                "docs",
                "docs/",
                "docs/assets/css/",
                "docs/assets/js/",
                "docs/assets/",
                "docs/assets/libs/",
                "docs/assets/fonts/",
            ),
        );
        map.insert(
            "wordpress".to_string(),
            ProfileConfig::layout(
                "build",
                "build/",
                "build/css/",
                "build/js/",
                "build/",
                "build/libs/",
                "build/fonts/",
            ),
        );
        map
    }

    pub fn builtin() -> Self {
        Self::with_overrides(&BTreeMap::new())
            .unwrap_or_else(|_| Self {
                profiles: BTreeMap::new(),
            })
    }

    /// Built-ins merged with user profiles; a user profile with a built-in
    /// name replaces it.
    pub fn with_overrides(user: &BTreeMap<String, ProfileConfig>) -> Result<Self> {
        let mut configs = Self::builtin_configs();
        for (name, cfg) in user {
            configs.insert(name.clone(), cfg.clone());
        }

        let mut profiles = BTreeMap::new();
        for (name, cfg) in configs.iter() {
            profiles.insert(name.clone(), TargetProfile::from_config(name, cfg)?);
        }
        Ok(Self { profiles })
    }

    pub fn lookup(&self, name: &str) -> Result<&TargetProfile> {
        self.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            PipelineError::config(format!(
                "unknown target profile '{name}' (known: {})",
                known.join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
