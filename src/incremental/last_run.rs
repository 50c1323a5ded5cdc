// src/incremental/last_run.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use tracing::debug;

use crate::fs::modified;
use crate::types::TaskId;

/// Session-scoped record of when each task last completed successfully.
///
/// The stored instant is the *start* of the successful invocation, so a file
/// edited while the task was running is still newer next time.
#[derive(Debug, Default)]
pub struct LastRunStore {
    runs: Mutex<HashMap<TaskId, SystemTime>>,
}

impl LastRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task: TaskId) -> Option<SystemTime> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task)
            .copied()
    }

    pub fn record(&self, task: TaskId, started: SystemTime) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.insert(task, started);
        debug!(task = %task, "recorded last successful run");
    }

    /// Keep the files modified strictly after the task's last run. Without a
    /// previous run every file is kept.
    pub fn filter_newer(&self, task: TaskId, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let Some(since) = self.get(task) else {
            return files;
        };
        files
            .into_iter()
            .filter(|path| modified(path).is_none_or(|m| m > since))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_run_keeps_everything() {
        let store = LastRunStore::new();
        let files = vec![PathBuf::from("/nonexistent/a.html")];
        assert_eq!(store.filter_newer(TaskId::Html, files.clone()), files);
    }

    #[test]
    fn files_older_than_last_run_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, "<p>hi</p>").unwrap();

        let store = LastRunStore::new();
        store.record(TaskId::Html, SystemTime::now() + Duration::from_secs(60));
        assert!(store.filter_newer(TaskId::Html, vec![path.clone()]).is_empty());

        // Other tasks are unaffected.
        assert_eq!(store.filter_newer(TaskId::HtmlTemplates, vec![path.clone()]), vec![path]);
    }

    #[test]
    fn records_survive_a_poisoned_lock() {
        let store = std::sync::Arc::new(LastRunStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.runs.lock().unwrap();
            panic!("poison the store");
        })
        .join();
        assert!(store.runs.is_poisoned());

        let at = SystemTime::now();
        store.record(TaskId::Html, at);
        assert_eq!(store.get(TaskId::Html), Some(at));
    }
}
