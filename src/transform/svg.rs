// src/transform/svg.rs

//! SVG minification and symbol sprite assembly.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{PipelineError, Result};
use crate::transform::{StaticRegex, compiled};

const STAGE: &str = "svg";

static PROLOG_RE: StaticRegex = LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>"));
static DOCTYPE_RE: StaticRegex = LazyLock::new(|| Regex::new(r"(?is)<!DOCTYPE[^>\[]*(\[.*?\])?\s*>"));
static COMMENT_RE: StaticRegex = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->"));
static DROPPED_ELEMENTS_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(r"(?s)<(title|desc|metadata)\b[^>]*?(?:/>|>.*?</(?:title|desc|metadata)\s*>)")
});
/// Elements from editor namespaces (Inkscape, Sodipodi, Sketch, Illustrator...).
static EDITOR_ELEMENTS_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(r"(?s)<(sodipodi|inkscape|sketch|i|x|a|graph|serif):[\w.-]+\b[^>]*?(?:/>|>.*?</(?:sodipodi|inkscape|sketch|i|x|a|graph|serif):[\w.-]+\s*>)")
});
static EDITOR_ATTRS_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(r#"\s+(?:xmlns:(?:sodipodi|inkscape|sketch|i|x|a|graph|serif)|(?:sodipodi|inkscape|sketch|i|x|a|graph|serif):[\w.-]+)\s*=\s*(?:"[^"]*"|'[^']*')"#)
});
static BETWEEN_TAGS_RE: StaticRegex = LazyLock::new(|| Regex::new(r">\s+<"));
static SVG_OPEN_RE: StaticRegex = LazyLock::new(|| Regex::new(r"(?s)<svg\b([^>]*)>"));
static SVG_CLOSE_RE: StaticRegex = LazyLock::new(|| Regex::new(r"</svg\s*>\s*$"));
static VIEWBOX_RE: StaticRegex =
    LazyLock::new(|| Regex::new(r#"\bviewBox\s*=\s*["']([^"']+)["']"#));
static WIDTH_RE: StaticRegex =
    LazyLock::new(|| Regex::new(r#"\swidth\s*=\s*["']([0-9.]+)(?:px)?["']"#));
static HEIGHT_RE: StaticRegex =
    LazyLock::new(|| Regex::new(r#"\sheight\s*=\s*["']([0-9.]+)(?:px)?["']"#));

/// Lossless-for-rendering cleanup of one SVG document.
pub fn minify_svg(source: &str) -> Result<String> {
    let mut text = source.to_string();
    for re in [
        &PROLOG_RE,
        &DOCTYPE_RE,
        &COMMENT_RE,
        &DROPPED_ELEMENTS_RE,
        &EDITOR_ELEMENTS_RE,
        &EDITOR_ATTRS_RE,
    ] {
        text = compiled(re, STAGE)?.replace_all(&text, "").into_owned();
    }
    text = compiled(&BETWEEN_TAGS_RE, STAGE)?
        .replace_all(&text, "><")
        .into_owned();
    let text = text.trim().to_string();

    if !compiled(&SVG_OPEN_RE, STAGE)?.is_match(&text) {
        return Err(PipelineError::transform(STAGE, "document has no <svg> root"));
    }
    Ok(text)
}

/// One icon going into the sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteIcon {
    /// Symbol id, the icon's file stem.
    pub id: String,
    /// Minified icon document.
    pub svg: String,
}

/// Assemble icons into a hidden `<svg>` of `<symbol>`s, ordered by id.
pub fn build_sprite(icons: &[SpriteIcon]) -> Result<String> {
    let mut sorted: Vec<&SpriteIcon> = icons.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" style="position:absolute;width:0;height:0">"#,
    );
    for icon in sorted {
        out.push_str(&symbol(icon)?);
    }
    out.push_str("</svg>");
    Ok(out)
}

fn symbol(icon: &SpriteIcon) -> Result<String> {
    let open_re = compiled(&SVG_OPEN_RE, STAGE)?;
    let caps = open_re.captures(&icon.svg).ok_or_else(|| {
        PipelineError::transform(STAGE, format!("icon {:?} has no <svg> root", icon.id))
    })?;
    let (Some(whole), Some(attrs)) = (caps.get(0), caps.get(1)) else {
        return Err(PipelineError::transform(STAGE, "malformed <svg> tag"));
    };
    let attrs = attrs.as_str().trim_end_matches('/');

    let view_box = match compiled(&VIEWBOX_RE, STAGE)?.captures(attrs) {
        Some(c) => Some(c[1].to_string()),
        None => {
            let w = compiled(&WIDTH_RE, STAGE)?.captures(attrs).map(|c| c[1].to_string());
            let h = compiled(&HEIGHT_RE, STAGE)?.captures(attrs).map(|c| c[1].to_string());
            w.zip(h).map(|(w, h)| format!("0 0 {w} {h}"))
        }
    };

    let self_closing = whole.as_str().ends_with("/>");
    let inner = if self_closing {
        ""
    } else {
        let rest = &icon.svg[whole.end()..];
        let close = compiled(&SVG_CLOSE_RE, STAGE)?.find(rest).ok_or_else(|| {
            PipelineError::transform(STAGE, format!("icon {:?} is not closed", icon.id))
        })?;
        &rest[..close.start()]
    };

    Ok(match view_box {
        Some(vb) => format!(r#"<symbol id="{}" viewBox="{vb}">{inner}</symbol>"#, icon.id),
        None => format!(r#"<symbol id="{}">{inner}</symbol>"#, icon.id),
    })
}
