// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::profiles::{ProfileConfig, ProfileRegistry, TargetProfile};
use crate::errors::Result;

/// Top-level configuration as read from `Assetpipe.toml`.
///
/// ```toml
/// [config]
/// profile = "wordpress"
/// source_dir = "src"
///
/// [profile.custom]
/// root = "out"
/// html = "out/"
/// css = "out/css/"
/// js = "out/js/"
/// img = "out/"
/// libs = "out/libs/"
/// fonts = "out/fonts/"
///
/// [serve]
/// proxy = "shopia-Semen.loc"
/// port = 3000
/// ```
///
/// Every section is optional; an empty file yields the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Extra or overriding target profiles, keyed by profile name.
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileConfig>,

    #[serde(default)]
    pub serve: ServeSection,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Name of the active target profile.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Source tree, relative to the project directory.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Directory holding `package.json` and `node_modules`.
    #[serde(default = "default_package_dir")]
    pub package_dir: String,
}

fn default_profile() -> String {
    "wordpress".to_string()
}

fn default_source_dir() -> String {
    "src".to_string()
}

fn default_package_dir() -> String {
    ".".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            source_dir: default_source_dir(),
            package_dir: default_package_dir(),
        }
    }
}

/// `[serve]` section: the development server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeSection {
    /// Upstream `host[:port]` to proxy. When absent the html output
    /// directory is served directly.
    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            proxy: None,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holders can rely on the active profile existing.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    serve: ServeSection,
    registry: ProfileRegistry,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        serve: ServeSection,
        registry: ProfileRegistry,
    ) -> Self {
        Self {
            config,
            serve,
            registry,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn serve(&self) -> &ServeSection {
        &self.serve
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Switch the active profile (e.g. from `--profile`), failing on unknown
    /// names.
    pub fn with_profile(mut self, name: &str) -> Result<Self> {
        self.registry.lookup(name)?;
        self.config.profile = name.to_string();
        Ok(self)
    }

    pub fn active_profile(&self) -> Result<&TargetProfile> {
        self.registry.lookup(&self.config.profile)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ConfigSection::default(),
            ServeSection::default(),
            ProfileRegistry::builtin(),
        )
    }
}
