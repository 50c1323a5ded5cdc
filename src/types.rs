// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Environment variable that selects the build mode.
pub const MODE_ENV_VAR: &str = "NODE_ENV";

/// Development or production, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Absent, empty or `"development"` means development; anything else is
    /// production.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            None => BuildMode::Development,
            Some(v) if v.is_empty() || v == "development" => BuildMode::Development,
            Some(_) => BuildMode::Production,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MODE_ENV_VAR).ok().as_deref())
    }

    pub fn is_development(self) -> bool {
        self == BuildMode::Development
    }

    pub fn emits_source_maps(self) -> bool {
        self.is_development()
    }

    pub fn minifies(self) -> bool {
        !self.is_development()
    }

    /// Static assets (images, fonts, svg, favicon) are symlinked to their
    /// sources in development instead of copied.
    pub fn links_static_assets(self) -> bool {
        self.is_development()
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => f.write_str("development"),
            BuildMode::Production => f.write_str("production"),
        }
    }
}

/// Logical output slots of a target profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Html,
    Css,
    Js,
    Img,
    Libs,
    Fonts,
}

impl AssetKind {
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Html,
        AssetKind::Css,
        AssetKind::Js,
        AssetKind::Img,
        AssetKind::Libs,
        AssetKind::Fonts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Html => "html",
            AssetKind::Css => "css",
            AssetKind::Js => "js",
            AssetKind::Img => "img",
            AssetKind::Libs => "libs",
            AssetKind::Fonts => "fonts",
        }
    }
}

/// How a task narrows its input set between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalPolicy {
    /// Every matching source, every time.
    None,
    /// Only sources modified after the task's last successful run.
    NewerThanLastRun,
    /// Only sources whose output is missing, stale or of the wrong kind.
    NewerThanOutput,
    /// Per-file content cache; the full remembered set is emitted.
    ContentHashRemember,
}

/// Every transform task the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum TaskId {
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "html:templates")]
    HtmlTemplates,
    #[serde(rename = "css")]
    Css,
    #[serde(rename = "js")]
    Js,
    #[serde(rename = "libs")]
    Libs,
    #[serde(rename = "mylibs")]
    MyLibs,
    #[serde(rename = "favicon")]
    Favicon,
    #[serde(rename = "fonts")]
    Fonts,
    #[serde(rename = "img")]
    Img,
    #[serde(rename = "svg")]
    Svg,
    #[serde(rename = "svg:icons")]
    SvgIcons,
}

impl TaskId {
    pub const ALL: [TaskId; 11] = [
        TaskId::Html,
        TaskId::HtmlTemplates,
        TaskId::Css,
        TaskId::Js,
        TaskId::Libs,
        TaskId::MyLibs,
        TaskId::Favicon,
        TaskId::Fonts,
        TaskId::Img,
        TaskId::Svg,
        TaskId::SvgIcons,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskId::Html => "html",
            TaskId::HtmlTemplates => "html:templates",
            TaskId::Css => "css",
            TaskId::Js => "js",
            TaskId::Libs => "libs",
            TaskId::MyLibs => "mylibs",
            TaskId::Favicon => "favicon",
            TaskId::Fonts => "fonts",
            TaskId::Img => "img",
            TaskId::Svg => "svg",
            TaskId::SvgIcons => "svg:icons",
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        TaskId::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown task: {s}"))
    }
}
