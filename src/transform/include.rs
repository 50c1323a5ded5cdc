// src/transform/include.rs

//! `@@include` file inclusion for HTML pages.
//!
//! ```html
//! @@include('templates/header.html', {"title": "Home", "nav": {"active": "home"}})
//! <h1>@@title</h1>
//! ```
//!
//! Paths resolve relative to the including file. `@@name` and dotted
//! `@@nav.active` are substituted from the JSON context passed to the
//! include; names the context does not define are left as written.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::errors::{PipelineError, Result};
use crate::transform::{SourceReader, StaticRegex, compiled, dir_of, normalize};

const STAGE: &str = "file-include";

static INCLUDE_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(r#"@@include\(\s*["']([^"']+)["']\s*(?:,\s*(\{[\s\S]*?\})\s*)?\)"#)
});

static VAR_RE: StaticRegex =
    LazyLock::new(|| Regex::new(r"@@([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)"));

/// Expand every `@@include` in `source`, which was read from `path`.
pub fn render_includes(reader: &dyn SourceReader, path: &Path, source: &str) -> Result<String> {
    let mut stack = vec![normalize(path)];
    render(reader, path, source, &Map::new(), &mut stack)
}

fn render(
    reader: &dyn SourceReader,
    path: &Path,
    source: &str,
    context: &Map<String, Value>,
    stack: &mut Vec<PathBuf>,
) -> Result<String> {
    let substituted = substitute_vars(source, context)?;

    let mut out = String::with_capacity(substituted.len());
    let mut last = 0;
    for caps in compiled(&INCLUDE_RE, STAGE)?.captures_iter(&substituted) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&substituted[last..whole.start()]);
        out.push_str(&expand_one(reader, path, &caps, context, stack)?);
        last = whole.end();
    }
    out.push_str(&substituted[last..]);
    Ok(out)
}

fn expand_one(
    reader: &dyn SourceReader,
    including: &Path,
    caps: &Captures<'_>,
    context: &Map<String, Value>,
    stack: &mut Vec<PathBuf>,
) -> Result<String> {
    let rel = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let target = normalize(&dir_of(including).join(rel));

    if stack.contains(&target) {
        let chain: Vec<String> = stack
            .iter()
            .chain(std::iter::once(&target))
            .map(|p| p.display().to_string())
            .collect();
        return Err(PipelineError::transform(
            STAGE,
            format!("include cycle: {}", chain.join(" -> ")),
        ));
    }

    let mut child_context = context.clone();
    if let Some(json) = caps.get(2) {
        match serde_json::from_str::<Value>(json.as_str()) {
            Ok(Value::Object(map)) => child_context.extend(map),
            Ok(_) => {
                return Err(PipelineError::transform(
                    STAGE,
                    format!("include context for {rel:?} in {including:?} is not an object"),
                ));
            }
            Err(e) => {
                return Err(PipelineError::transform(
                    STAGE,
                    format!("invalid include context for {rel:?} in {including:?}: {e}"),
                ));
            }
        }
    }

    if !reader.is_file(&target) {
        return Err(PipelineError::transform(
            STAGE,
            format!("{including:?} includes missing file {target:?}"),
        ));
    }
    let body = reader.read_to_string(&target)?;

    stack.push(target.clone());
    let rendered = render(reader, &target, &body, &child_context, stack);
    stack.pop();
    rendered
}

fn substitute_vars(source: &str, context: &Map<String, Value>) -> Result<String> {
    if context.is_empty() {
        return Ok(source.to_string());
    }
    let replaced = compiled(&VAR_RE, STAGE)?
        .replace_all(source, |caps: &Captures<'_>| {
            let name = &caps[1];
            if name == "include" {
                return caps[0].to_string();
            }
            match lookup(context, name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) => String::new(),
                Some(other) => other.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned();
    Ok(replaced)
}

fn lookup<'a>(context: &'a Map<String, Value>, dotted: &str) -> Option<&'a Value> {
    let mut parts = dotted.split('.');
    let mut current = context.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}
