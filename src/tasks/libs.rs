// src/tasks/libs.rs

//! `libs` and `mylibs`: copy third-party files into the libs directory.
//!
//! `libs` takes the main file(s) of every `dependencies` entry in
//! `package.json`; `mylibs` takes everything under `libs/` in the source
//! tree. Both flatten paths down to their first directory:
//! `jquery/dist/jquery.js` lands as `jquery/jquery.js`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::BuildSession;
use crate::errors::{PipelineError, Result};
use crate::fs::{Output, commit};
use crate::incremental::needs_update;
use crate::tasks::{TaskDescriptor, TaskReport, collect_inputs};
use crate::types::{AssetKind, TaskId};

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    dependencies: BTreeMap<String, Value>,
    /// `overrides.<pkg>.main` picks the files to ship for a package.
    #[serde(default)]
    overrides: BTreeMap<String, Value>,
    #[serde(default)]
    main: Option<Value>,
}

pub async fn run_libs(session: &BuildSession) -> Result<TaskReport> {
    let mut report = TaskReport::new(TaskId::Libs);
    let package_root = session.layout().package_root();
    let manifest_path = package_root.join("package.json");

    let Some(manifest) = read_manifest(&manifest_path).await? else {
        debug!(path = ?manifest_path, "no package.json; nothing to copy");
        return Ok(report);
    };

    let node_modules = package_root.join("node_modules");
    let out_dir = session.output_dir(AssetKind::Libs);
    let mut outputs = Vec::new();

    for package in manifest.dependencies.keys() {
        for file in main_files(&manifest, package, &node_modules).await? {
            if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
                warn!(package = %package, file = ?file, "main file missing; skipped");
                continue;
            }
            let Some(rel) = file.strip_prefix(&node_modules).ok().map(flatten) else {
                continue;
            };
            let dest = out_dir.join(rel);
            if needs_update(&file, &dest, false) {
                outputs.push(Output::Copy { from: file, path: dest });
            } else {
                report.skipped += 1;
            }
        }
    }

    report.written = commit(outputs).await?;
    Ok(report)
}

pub async fn run_mylibs(session: &BuildSession) -> Result<TaskReport> {
    let mut report = TaskReport::new(TaskId::MyLibs);
    let descriptor = TaskDescriptor::for_task(TaskId::MyLibs, session.layout());
    let base = session.layout().source("libs");
    let out_dir = session.output_dir(AssetKind::Libs);

    let outputs = collect_inputs(session, &descriptor)
        .await?
        .into_iter()
        .filter_map(|file| {
            let rel = flatten(file.strip_prefix(&base).ok()?);
            Some(Output::Copy {
                path: out_dir.join(rel),
                from: file,
            })
        })
        .collect();

    report.written = commit(outputs).await?;
    Ok(report)
}

async fn read_manifest(path: &Path) -> Result<Option<Manifest>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
            PipelineError::transform("main-files", format!("{}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::filesystem(path, e)),
    }
}

/// Files to ship for `package`: the root manifest's override, else the
/// package's own `main`, else `index.js`.
async fn main_files(root: &Manifest, package: &str, node_modules: &Path) -> Result<Vec<PathBuf>> {
    let package_dir = node_modules.join(package);

    let from_override = root
        .overrides
        .get(package)
        .and_then(|o| o.get("main"))
        .map(main_entries);
    let entries = match from_override {
        Some(entries) => entries,
        None => {
            let own_path = package_dir.join("package.json");
            let own = read_manifest(&own_path).await?;
            own.and_then(|m| m.main)
                .as_ref()
                .map(main_entries)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| vec!["index.js".to_string()])
        }
    };

    Ok(entries.into_iter().map(|e| package_dir.join(e)).collect())
}

fn main_entries(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Keep the first directory of `rel` and the file name.
pub fn flatten(rel: &Path) -> PathBuf {
    let dirs: Vec<&std::ffi::OsStr> = rel
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect();
    let mut out = PathBuf::new();
    if let Some(first) = dirs.first() {
        out.push(first);
    }
    if let Some(name) = rel.file_name() {
        out.push(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_keeps_one_parent() {
        assert_eq!(flatten(Path::new("jquery/dist/jquery.js")), PathBuf::from("jquery/jquery.js"));
        assert_eq!(flatten(Path::new("slick/slick.css")), PathBuf::from("slick/slick.css"));
        assert_eq!(flatten(Path::new("plain.js")), PathBuf::from("plain.js"));
    }

    #[test]
    fn main_field_forms() {
        assert_eq!(main_entries(&Value::String("a.js".into())), vec!["a.js"]);
        assert_eq!(
            main_entries(&serde_json::json!(["a.js", "b.css"])),
            vec!["a.js", "b.css"]
        );
        assert!(main_entries(&serde_json::json!(3)).is_empty());
    }

    #[tokio::test]
    async fn override_wins_over_package_main() {
        let dir = tempfile::tempdir().unwrap();
        let nm = dir.path().join("node_modules");
        std::fs::create_dir_all(nm.join("swiper")).unwrap();
        std::fs::write(nm.join("swiper/package.json"), r#"{"main": "swiper.cjs"}"#).unwrap();

        let root: Manifest = serde_json::from_str(
            r#"{"dependencies": {"swiper": "^8"}, "overrides": {"swiper": {"main": ["swiper-bundle.min.js", "swiper-bundle.min.css"]}}}"#,
        )
        .unwrap();
        let files = main_files(&root, "swiper", &nm).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("swiper/swiper-bundle.min.js"));

        let plain = Manifest::default();
        let files = main_files(&plain, "swiper", &nm).await.unwrap();
        assert_eq!(files, vec![nm.join("swiper/swiper.cjs")]);

        let files = main_files(&plain, "missing", &nm).await.unwrap();
        assert_eq!(files, vec![nm.join("missing/index.js")]);
    }

    #[test]
    fn version_style_overrides_still_parse() {
        let m: Manifest = serde_json::from_str(r#"{"overrides": {"foo": "1.0.0"}}"#).unwrap();
        assert!(m.overrides.get("foo").and_then(|o| o.get("main")).is_none());
    }
}
