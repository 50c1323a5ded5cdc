// src/tasks/runner.rs

//! Dispatching task ids to their implementations.
//!
//! The graph runtime and the watch coordinator talk to a [`TaskRunner`]
//! instead of calling task modules directly, so tests can swap in a fake
//! runner that records invocations and fails on demand.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::BuildSession;
use crate::errors::Result;
use crate::tasks::{TaskReport, html, icons, libs, scripts, statics, styles};
use crate::types::TaskId;

/// How a guarded task invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Transform or filesystem failure (or a panic); isolated to this task.
    Failed,
    /// Configuration-class failure; the graph stops scheduling.
    Fatal,
}

/// Trait abstracting how a task is executed.
pub trait TaskRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        task: TaskId,
        session: &'a BuildSession,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>>;
}

/// The real pipeline: every task id maps to its module.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRunner;

impl TaskRunner for PipelineRunner {
    fn run<'a>(
        &'a self,
        task: TaskId,
        session: &'a BuildSession,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
        Box::pin(async move {
            match task {
                TaskId::Html | TaskId::HtmlTemplates => html::run(task, session).await,
                TaskId::Css => styles::run(session).await,
                TaskId::Js => scripts::run(session).await,
                TaskId::Libs => libs::run_libs(session).await,
                TaskId::MyLibs => libs::run_mylibs(session).await,
                TaskId::Favicon | TaskId::Fonts | TaskId::Img | TaskId::Svg => {
                    statics::run(task, session).await
                }
                TaskId::SvgIcons => icons::run(session).await,
            }
        })
    }
}

/// Run `task`, log how it went, and push a reload signal for what it wrote.
pub async fn run_guarded(runner: &dyn TaskRunner, session: &BuildSession, task: TaskId) -> TaskOutcome {
    debug!(task = %task, "starting task");
    match runner.run(task, session).await {
        Ok(report) => {
            info!(
                task = %task,
                written = report.written.len(),
                removed = report.removed.len(),
                skipped = report.skipped,
                "task finished"
            );
            let mut changed = report.written;
            changed.extend(report.removed);
            session.reload().notify(task, session.root(), &changed);
            TaskOutcome::Success
        }
        Err(err) if err.is_fatal() => {
            error!(task = %task, error = %err, "task failed with a fatal error");
            TaskOutcome::Fatal
        }
        Err(err) => {
            error!(task = %task, error = %err, "task failed");
            TaskOutcome::Failed
        }
    }
}

/// [`run_guarded`] on its own tokio task, so a panicking task is reported
/// as [`TaskOutcome::Failed`] instead of taking the caller down.
pub async fn spawn_guarded(runner: Arc<dyn TaskRunner>, session: Arc<BuildSession>, task: TaskId) -> TaskOutcome {
    let handle = tokio::spawn(async move { run_guarded(runner.as_ref(), &session, task).await });
    match handle.await {
        Ok(outcome) => outcome,
        Err(join_err) => {
            warn!(task = %task, error = %join_err, "task panicked or was cancelled");
            TaskOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::errors::PipelineError;
    use crate::types::BuildMode;

    struct Scripted;

    impl TaskRunner for Scripted {
        fn run<'a>(
            &'a self,
            task: TaskId,
            _session: &'a BuildSession,
        ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
            Box::pin(async move {
                match task {
                    TaskId::Css => Err(PipelineError::transform("import", "missing partial")),
                    TaskId::Js => Err(PipelineError::config("entry js/main.js missing")),
                    TaskId::Img => panic!("decoder exploded"),
                    _ => Ok(TaskReport::new(task)),
                }
            })
        }
    }

    fn session() -> Arc<BuildSession> {
        Arc::new(BuildSession::from_config("/p", &ConfigFile::default(), BuildMode::Development).unwrap())
    }

    #[tokio::test]
    async fn outcomes_follow_error_class() {
        let s = session();
        assert_eq!(run_guarded(&Scripted, &s, TaskId::Html).await, TaskOutcome::Success);
        assert_eq!(run_guarded(&Scripted, &s, TaskId::Css).await, TaskOutcome::Failed);
        assert_eq!(run_guarded(&Scripted, &s, TaskId::Js).await, TaskOutcome::Fatal);
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let outcome = spawn_guarded(Arc::new(Scripted), session(), TaskId::Img).await;
        assert_eq!(outcome, TaskOutcome::Failed);
    }
}
