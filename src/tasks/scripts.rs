// src/tasks/scripts.rs

//! `js`: bundle `js/main.js` into the profile's js directory.

use tracing::debug;

use crate::engine::BuildSession;
use crate::errors::{PipelineError, Result};
use crate::fs::{Output, commit, remove_output};
use crate::tasks::TaskReport;
use crate::transform::js::{JsOptions, bundle};
use crate::types::{AssetKind, TaskId};

pub const ENTRY: &str = "js/main.js";
const OUTPUT_NAME: &str = "main.js";

pub async fn run(session: &BuildSession) -> Result<TaskReport> {
    let mut report = TaskReport::new(TaskId::Js);
    let entry = session.layout().source(ENTRY);
    if !tokio::fs::try_exists(&entry).await.unwrap_or(false) {
        return Err(PipelineError::config(format!(
            "script entry {} does not exist",
            entry.display()
        )));
    }

    let mode = session.mode();
    let options = JsOptions {
        project_root: session.root().to_path_buf(),
        package_dir: session.layout().package_root(),
        eval_modules: mode.is_development(),
        minify: mode.minifies(),
    };
    let bundled = bundle(&entry, &options)?;
    debug!(modules = bundled.modules.len(), "script bundled");

    let out_dir = session.output_dir(AssetKind::Js);
    // Modules are evaluated with a sourceURL in development; no map file is
    // produced in either mode, so a leftover one is always stale.
    let map_path = out_dir.join(format!("{OUTPUT_NAME}.map"));
    if remove_output(&map_path)? {
        report.removed.push(map_path);
    }

    report.written = commit(vec![Output::Bytes {
        path: out_dir.join(OUTPUT_NAME),
        contents: bundled.code.into_bytes(),
    }])
    .await?;
    Ok(report)
}
