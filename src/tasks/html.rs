// src/tasks/html.rs

//! `html` and `html:templates`: expand `@@include`s in top-level pages.
//!
//! `html` only rebuilds pages modified since its last successful run;
//! `html:templates` rebuilds every page (a changed partial can affect any of
//! them).

use std::time::SystemTime;

use tracing::debug;

use crate::engine::BuildSession;
use crate::errors::{IoPathExt, Result};
use crate::fs::{Output, commit};
use crate::tasks::{TaskDescriptor, TaskReport, collect_inputs};
use crate::transform::DiskReader;
use crate::transform::include::render_includes;
use crate::types::{AssetKind, IncrementalPolicy, TaskId};

pub async fn run(task: TaskId, session: &BuildSession) -> Result<TaskReport> {
    let started = SystemTime::now();
    let descriptor = TaskDescriptor::for_task(task, session.layout());
    let mut report = TaskReport::new(task);

    let all = collect_inputs(session, &descriptor).await?;
    let total = all.len();
    let selected = match descriptor.policy {
        IncrementalPolicy::NewerThanLastRun => session.last_run().filter_newer(task, all),
        _ => all,
    };
    report.skipped = total - selected.len();

    let out_dir = session.output_dir(AssetKind::Html);
    let mut outputs = Vec::with_capacity(selected.len());
    for page in &selected {
        let text = tokio::fs::read_to_string(page).await.at_path(page)?;
        let rendered = render_includes(&DiskReader, page, &text)?;
        let Some(name) = page.file_name() else { continue };
        outputs.push(Output::Bytes {
            path: out_dir.join(name),
            contents: rendered.into_bytes(),
        });
    }

    report.written = commit(outputs).await?;
    if descriptor.policy == IncrementalPolicy::NewerThanLastRun {
        session.last_run().record(task, started);
    }
    debug!(task = %task, written = report.written.len(), skipped = report.skipped, "pages rendered");
    Ok(report)
}
