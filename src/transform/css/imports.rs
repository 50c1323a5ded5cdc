// src/transform/css/imports.rs

//! `@import` inlining.
//!
//! Local imports resolve against the importing file's directory first, then
//! against the search path; the `.css` extension may be omitted. A file is
//! inlined once per stylesheet, later imports of it become empty. Remote
//! imports (`http:`, `https:`, `//`) are kept and hoisted to the top.
//! Imports inside comments are left alone.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::errors::{PipelineError, Result};
use crate::transform::{SourceReader, StaticRegex, compiled, dir_of, normalize};

const STAGE: &str = "css-import";

/// Comments are matched too so their contents are skipped, never inlined.
static IMPORT_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(
        r#"(?s)/\*.*?\*/|@import\s+(?:url\(\s*["']?([^"')]+?)["']?\s*\)|["']([^"']+)["'])\s*([^;]*);"#,
    )
});

/// Inline every local `@import` reachable from `entry`.
pub fn inline_imports(
    reader: &dyn SourceReader,
    entry: &Path,
    source: &str,
    search_path: &Path,
) -> Result<String> {
    let mut seen = HashSet::new();
    seen.insert(normalize(entry));
    let mut remote = Vec::new();

    let body = inline(reader, entry, source, search_path, &mut seen, &mut remote)?;
    if remote.is_empty() {
        return Ok(body);
    }

    let mut out = remote.join("\n");
    out.push('\n');
    out.push_str(&body);
    Ok(out)
}

fn inline(
    reader: &dyn SourceReader,
    file: &Path,
    source: &str,
    search_path: &Path,
    seen: &mut HashSet<PathBuf>,
    remote: &mut Vec<String>,
) -> Result<String> {
    let re = compiled(&IMPORT_RE, STAGE)?;
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in re.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.as_str().starts_with("/*") {
            continue;
        }
        out.push_str(&source[last..whole.start()]);
        last = whole.end();

        let specifier = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        let media = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();

        if is_remote(specifier) {
            remote.push(whole.as_str().to_string());
            continue;
        }

        let target = resolve(reader, file, specifier, search_path).ok_or_else(|| {
            PipelineError::transform(
                STAGE,
                format!("cannot resolve @import {specifier:?} from {file:?}"),
            )
        })?;

        if !seen.insert(target.clone()) {
            trace!(?target, "skipping already inlined import");
            continue;
        }

        let imported = reader.read_to_string(&target)?;
        let content = inline(reader, &target, &imported, search_path, seen, remote)?;
        if media.is_empty() {
            out.push_str(&content);
        } else {
            out.push_str(&format!("@media {media} {{\n{content}\n}}"));
        }
    }

    out.push_str(&source[last..]);
    Ok(out)
}

fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("http://") || specifier.starts_with("https://") || specifier.starts_with("//")
}

fn resolve(reader: &dyn SourceReader, importer: &Path, specifier: &str, search_path: &Path) -> Option<PathBuf> {
    [dir_of(importer), search_path]
        .into_iter()
        .flat_map(|base| candidates(base, specifier))
        .find(|candidate| reader.is_file(candidate))
}

fn candidates(base: &Path, specifier: &str) -> Vec<PathBuf> {
    let direct = normalize(&base.join(specifier));
    if specifier.ends_with(".css") {
        vec![direct]
    } else {
        vec![direct, normalize(&base.join(format!("{specifier}.css")))]
    }
}
