#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use assetpipe::engine::BuildSession;
use assetpipe::errors::{PipelineError, Result};
use assetpipe::tasks::{TaskReport, TaskRunner};
use assetpipe::types::TaskId;

/// How a scripted task misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    /// Transform error: isolated to the task.
    Fail,
    /// Configuration error: aborts the graph.
    Fatal,
    Panic,
    /// Succeed after sleeping, to hold the task open.
    Slow(Duration),
}

/// A runner that records what it was asked to run instead of touching disk.
#[derive(Debug, Default)]
pub struct FakeRunner {
    script: HashMap<TaskId, Scripted>,
    started: Mutex<Vec<TaskId>>,
    finished: Mutex<Vec<TaskId>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, task: TaskId, behaviour: Scripted) -> Self {
        self.script.insert(task, behaviour);
        self
    }

    /// Tasks in the order they started.
    pub fn started(&self) -> Vec<TaskId> {
        self.started.lock().expect("started lock").clone()
    }

    /// Tasks in the order they returned normally.
    pub fn finished(&self) -> Vec<TaskId> {
        self.finished.lock().expect("finished lock").clone()
    }
}

impl TaskRunner for FakeRunner {
    fn run<'a>(
        &'a self,
        task: TaskId,
        _session: &'a BuildSession,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
        Box::pin(async move {
            self.started.lock().expect("started lock").push(task);
            tokio::task::yield_now().await;

            let result = match self.script.get(&task).copied() {
                Some(Scripted::Fail) => Err(PipelineError::transform("fake", format!("{task} failed"))),
                Some(Scripted::Fatal) => Err(PipelineError::config(format!("{task} misconfigured"))),
                Some(Scripted::Panic) => panic!("{task} panicked"),
                Some(Scripted::Slow(d)) => {
                    tokio::time::sleep(d).await;
                    Ok(TaskReport::new(task))
                }
                None => Ok(TaskReport::new(task)),
            };
            self.finished.lock().expect("finished lock").push(task);
            result
        })
    }
}
