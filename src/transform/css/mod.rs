// src/transform/css/mod.rs

//! Stylesheet pipeline.
//!
//! ```text
//! style.css -> @import inlining -> custom property fallbacks
//!           -> lightningcss parse -> (nested @media lowered to top level)
//!           -> media query packing
//!           -> vendor prefixes (browser targets)
//!           -> print (minified in production, source map in development)
//! ```
//!
//! Production runs lightningcss' full minifier, which also merges rules and
//! collapses shorthands. Development only prefixes: each top-level rule is
//! processed on its own so the output keeps the authored rule structure.

use std::path::{Path, PathBuf};

use lightningcss::printer::PrinterOptions;
use lightningcss::rules::CssRuleList;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tracing::debug;

use crate::errors::{PipelineError, Result};
use crate::transform::SourceReader;

pub mod custom_props;
pub mod imports;
pub mod media;

const STAGE: &str = "css";

/// Knobs that differ between development and production.
#[derive(Debug, Clone)]
pub struct CssOptions {
    /// Directory searched for `@import`s not found next to the importer.
    pub search_path: PathBuf,
    pub minify: bool,
    pub source_map: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssOutput {
    pub code: String,
    /// JSON source map, when requested.
    pub map: Option<String>,
}

/// Browsers the prefixer and nesting lowering target. Versions are encoded
/// as `major << 16 | minor << 8 | patch`.
pub fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(80 << 16),
        edge: Some(80 << 16),
        firefox: Some(70 << 16),
        ie: Some(11 << 16),
        ios_saf: Some(12 << 16),
        safari: Some(12 << 16),
        ..Browsers::default()
    })
}

/// Run the full chain on the entry stylesheet `entry` with contents `source`.
///
/// `map_file_name` is the file name of the map written next to the output;
/// it is referenced from the trailing `sourceMappingURL` comment.
pub fn build_stylesheet(
    reader: &dyn SourceReader,
    entry: &Path,
    source: &str,
    options: &CssOptions,
    map_file_name: &str,
) -> Result<CssOutput> {
    let inlined = imports::inline_imports(reader, entry, source, &options.search_path)?;
    let with_fallbacks = custom_props::add_fallbacks(&inlined)?;

    let filename = entry.to_string_lossy().replace('\\', "/");
    let lowered = lower_nested_media(&with_fallbacks, &filename)?;
    let text = lowered.as_deref().unwrap_or(&with_fallbacks);
    let mut sheet = parse(text, &filename)?;

    media::pack_media_queries(&mut sheet.rules)?;
    apply_targets(&mut sheet, &filename, options.minify)?;

    let mut source_map = if options.source_map {
        let mut map = SourceMap::new("/");
        map.add_source(&filename);
        map.set_source_content(0, text)
            .map_err(|e| PipelineError::transform(STAGE, format!("source map: {e:?}")))?;
        Some(map)
    } else {
        None
    };

    let printed = sheet
        .to_css(PrinterOptions {
            minify: options.minify,
            source_map: source_map.as_mut(),
            targets: browser_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| PipelineError::transform(STAGE, format!("{filename}: {e}")))?;

    let mut code = printed.code;
    let map = match source_map.as_mut() {
        Some(map) => {
            let json = map
                .to_json(None)
                .map_err(|e| PipelineError::transform(STAGE, format!("source map: {e:?}")))?;
            code.push_str(&format!("\n/*# sourceMappingURL={map_file_name} */\n"));
            Some(json)
        }
        None => None,
    };

    debug!(entry = %filename, bytes = code.len(), "stylesheet built");
    Ok(CssOutput { code, map })
}

fn parse<'i>(text: &'i str, filename: &str) -> Result<StyleSheet<'i>> {
    StyleSheet::parse(
        text,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| PipelineError::transform(STAGE, format!("{filename}: {e}")))
}

/// Nested `@media` only reaches the top level when nesting is printed away.
/// Returns the lowered text when there is any, so packing sees every query.
fn lower_nested_media(source: &str, filename: &str) -> Result<Option<String>> {
    let sheet = parse(source, filename)?;
    if !media::has_nested_media(&sheet.rules) {
        return Ok(None);
    }
    let printed = sheet
        .to_css(PrinterOptions {
            targets: browser_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| PipelineError::transform(STAGE, format!("{filename}: {e}")))?;
    Ok(Some(printed.code))
}

fn target_options() -> MinifyOptions {
    MinifyOptions {
        targets: browser_targets(),
        ..MinifyOptions::default()
    }
}

/// Prefix for the browser targets; with `merge` the whole sheet is minified.
fn apply_targets(sheet: &mut StyleSheet<'_>, filename: &str, merge: bool) -> Result<()> {
    let failed = |e: lightningcss::error::Error<lightningcss::error::MinifyErrorKind>| {
        PipelineError::transform(STAGE, format!("{filename}: {e}"))
    };
    if merge {
        return sheet.minify(target_options()).map_err(failed);
    }

    let mut rules = Vec::with_capacity(sheet.rules.0.len());
    for rule in std::mem::take(&mut sheet.rules.0) {
        let mut single: StyleSheet<'_> = StyleSheet::new(
            sheet.sources.clone(),
            CssRuleList(vec![rule]),
            ParserOptions {
                filename: filename.to_string(),
                ..ParserOptions::default()
            },
        );
        single.minify(target_options()).map_err(failed)?;
        rules.extend(single.rules.0);
    }
    sheet.rules.0 = rules;
    Ok(())
}
