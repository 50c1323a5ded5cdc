// src/serve/hub.rs

//! Live-reload fan-out.
//!
//! Tasks publish a [`ReloadEvent`] after every successful write; each
//! connected browser holds a broadcast receiver through the SSE endpoint.
//! Publishing with nobody listening (plain `build`) is a no-op.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::types::TaskId;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Stylesheets can be swapped without a page reload.
    Css,
    Js,
    Html,
    Asset,
}

impl ReloadKind {
    pub fn for_task(task: TaskId) -> Self {
        match task {
            TaskId::Css => ReloadKind::Css,
            TaskId::Js => ReloadKind::Js,
            TaskId::Html | TaskId::HtmlTemplates => ReloadKind::Html,
            _ => ReloadKind::Asset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    pub kind: ReloadKind,
    /// Written paths, relative to the project directory.
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Announce that `task` wrote `written` (absolute paths under `root`).
    pub fn notify(&self, task: TaskId, root: &Path, written: &[PathBuf]) {
        if written.is_empty() {
            return;
        }
        let files = written
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        let event = ReloadEvent {
            kind: ReloadKind::for_task(task),
            files,
        };
        // Err only means no browser is connected.
        match self.tx.send(event) {
            Ok(n) => trace!(task = %task, clients = n, "reload event sent"),
            Err(_) => trace!(task = %task, "no reload clients"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_relative_paths() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        hub.notify(
            TaskId::Css,
            Path::new("/p"),
            &[PathBuf::from("/p/build/css/style.css")],
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ReloadKind::Css);
        assert_eq!(event.files, vec!["build/css/style.css".to_string()]);
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"kind":"css","files":["build/css/style.css"]}"#
        );
    }

    #[test]
    fn notify_without_clients_is_fine() {
        let hub = ReloadHub::new();
        hub.notify(TaskId::Img, Path::new("/p"), &[PathBuf::from("/p/build/a.png")]);
        assert_eq!(hub.client_count(), 0);
    }
}
