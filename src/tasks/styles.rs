// src/tasks/styles.rs

//! `css`: build `css/style.css` into the profile's css directory.

use tracing::debug;

use crate::engine::BuildSession;
use crate::errors::{IoPathExt, PipelineError, Result};
use crate::fs::{Output, commit, remove_output};
use crate::tasks::TaskReport;
use crate::transform::DiskReader;
use crate::transform::css::{CssOptions, build_stylesheet};
use crate::types::{AssetKind, TaskId};

pub const ENTRY: &str = "css/style.css";
const OUTPUT_NAME: &str = "style.css";
const MAP_NAME: &str = "style.css.map";

pub async fn run(session: &BuildSession) -> Result<TaskReport> {
    let mut report = TaskReport::new(TaskId::Css);
    let entry = session.layout().source(ENTRY);
    if !tokio::fs::try_exists(&entry).await.unwrap_or(false) {
        return Err(PipelineError::config(format!(
            "stylesheet entry {} does not exist",
            entry.display()
        )));
    }

    let source = tokio::fs::read_to_string(&entry).await.at_path(&entry)?;
    let mode = session.mode();
    let options = CssOptions {
        search_path: session.layout().source("css"),
        minify: mode.minifies(),
        source_map: mode.emits_source_maps(),
    };
    let built = build_stylesheet(&DiskReader, &entry, &source, &options, MAP_NAME)?;

    let out_dir = session.output_dir(AssetKind::Css);
    let mut outputs = vec![Output::Bytes {
        path: out_dir.join(OUTPUT_NAME),
        contents: built.code.into_bytes(),
    }];
    let map_path = out_dir.join(MAP_NAME);
    match built.map {
        Some(map) => outputs.push(Output::Bytes {
            path: map_path,
            contents: map.into_bytes(),
        }),
        None => {
            if remove_output(&map_path)? {
                report.removed.push(map_path);
            }
        }
    }

    report.written = commit(outputs).await?;
    debug!(written = report.written.len(), "stylesheet written");
    Ok(report)
}
