// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Three classes matter to the task graph:
//! - configuration problems (unknown profile, missing entry file) are fatal,
//! - transform failures are isolated to the task that raised them,
//! - filesystem failures are logged and the operation skipped.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transform error in {stage}: {message}")]
    TransformError { stage: &'static str, message: String },

    #[error("Filesystem error at {path:?}: {source}")]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in task graph: {0}")]
    GraphCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::ConfigError(msg.into())
    }

    pub fn transform(stage: &'static str, msg: impl Into<String>) -> Self {
        PipelineError::TransformError {
            stage,
            message: msg.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::FilesystemError {
            path: path.into(),
            source,
        }
    }

    /// Fatal errors abort the whole task graph; everything else is isolated
    /// to the task that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigError(_)
                | PipelineError::GraphCycle(_)
                | PipelineError::TomlError(_)
        )
    }
}

/// Attach the offending path to an `io::Error`.
pub trait IoPathExt<T> {
    fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoPathExt<T> for std::result::Result<T, std::io::Error> {
    fn at_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| PipelineError::filesystem(path, e))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_class_is_fatal() {
        assert!(PipelineError::config("unknown profile").is_fatal());
        assert!(PipelineError::GraphCycle("a -> a".into()).is_fatal());
        assert!(!PipelineError::transform("css", "bad import").is_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(!PipelineError::filesystem("build/x", io).is_fatal());
    }

    #[test]
    fn at_path_keeps_the_path() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        match res.at_path(Path::new("src/a.html")) {
            Err(PipelineError::FilesystemError { path, .. }) => {
                assert_eq!(path, PathBuf::from("src/a.html"))
            }
            other => panic!("expected FilesystemError, got {other:?}"),
        }
    }
}
