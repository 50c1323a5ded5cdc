// src/transform/css/media.rs

//! Media query consolidation.
//!
//! Top-level `@media` blocks with the same query are merged into one and
//! moved after all other rules. Queries are ordered mobile-first: those
//! without a `min-width` keep their relative order and come first, the rest
//! follow by ascending `min-width`. `@media` nested in style rules has to be
//! lowered to the top level before packing (see [`has_nested_media`]).

use std::sync::LazyLock;

use lightningcss::printer::PrinterOptions;
use lightningcss::rules::media::MediaRule;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::traits::ToCss;
use regex::Regex;

use crate::errors::{PipelineError, Result};
use crate::transform::{StaticRegex, compiled};

const STAGE: &str = "mq-pack";

static MIN_WIDTH_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(r"(?:min-width\s*:\s*|width\s*>=?\s*)([0-9]*\.?[0-9]+)(px|em|rem)?")
});

/// Merge and reorder the top-level media rules of `rules` in place.
pub fn pack_media_queries(rules: &mut CssRuleList<'_>) -> Result<()> {
    let mut plain = Vec::with_capacity(rules.0.len());
    let mut groups: Vec<(String, MediaRule<'_>)> = Vec::new();

    for rule in std::mem::take(&mut rules.0) {
        match rule {
            CssRule::Media(media) => {
                let key = media
                    .query
                    .to_css_string(PrinterOptions::default())
                    .map_err(|e| PipelineError::transform(STAGE, e.to_string()))?;
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, existing)) => existing.rules.0.extend(media.rules.0),
                    None => groups.push((key, media)),
                }
            }
            other => plain.push(other),
        }
    }

    let mut keyed = Vec::with_capacity(groups.len());
    for (key, media) in groups {
        keyed.push((min_width_px(&key)?, media));
    }
    // Stable: equal keys and queries without min-width keep source order.
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(y),
    });

    plain.extend(keyed.into_iter().map(|(_, media)| CssRule::Media(media)));
    rules.0 = plain;
    Ok(())
}

/// Whether any style rule, at any depth, contains an `@media` rule.
pub fn has_nested_media(rules: &CssRuleList<'_>) -> bool {
    rules.0.iter().any(|rule| match rule {
        CssRule::Style(style) => {
            style.rules.0.iter().any(|r| matches!(r, CssRule::Media(_))) || has_nested_media(&style.rules)
        }
        CssRule::Media(media) => has_nested_media(&media.rules),
        _ => false,
    })
}

/// `min-width` of a serialized query in pixels (em/rem count as 16px).
pub fn min_width_px(query: &str) -> Result<Option<f64>> {
    let re = compiled(&MIN_WIDTH_RE, STAGE)?;
    let Some(caps) = re.captures(query) else {
        return Ok(None);
    };
    let value: f64 = caps[1]
        .parse()
        .map_err(|e| PipelineError::transform(STAGE, format!("bad width in {query:?}: {e}")))?;
    let scale = match caps.get(2).map(|m| m.as_str()) {
        Some("em") | Some("rem") => 16.0,
        _ => 1.0,
    };
    Ok(Some(value * scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightningcss::stylesheet::{ParserOptions, StyleSheet};

    #[test]
    fn min_width_forms() {
        assert_eq!(min_width_px("(min-width: 768px)").unwrap(), Some(768.0));
        assert_eq!(min_width_px("screen and (width >= 48em)").unwrap(), Some(768.0));
        assert_eq!(min_width_px("print").unwrap(), None);
    }

    #[test]
    fn detects_media_nested_in_style_rules() {
        let flat = StyleSheet::parse(
            ".a { color: red }\n@media (min-width: 768px) { .a { color: blue } }",
            ParserOptions::default(),
        )
        .unwrap();
        assert!(!has_nested_media(&flat.rules));

        let nested = StyleSheet::parse(
            "@media print { .a { color: red; @media (min-width: 768px) { color: blue } } }",
            ParserOptions::default(),
        )
        .unwrap();
        assert!(has_nested_media(&nested.rules));
    }

    #[test]
    fn identical_queries_merge_and_sort_mobile_first() {
        let css = "@media (min-width: 1024px) { .a { color: red } }\n\
                   .b { color: blue }\n\
                   @media (min-width: 768px) { .c { color: green } }\n\
                   @media (min-width: 1024px) { .d { color: black } }";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();
        pack_media_queries(&mut sheet.rules).unwrap();

        assert_eq!(sheet.rules.0.len(), 3);
        assert!(matches!(sheet.rules.0[0], CssRule::Style(_)));

        let out = sheet.to_css(PrinterOptions::default()).unwrap().code;
        let small = out.find(".c").unwrap();
        let large = out.find(".a").unwrap();
        assert!(small < large);
        assert!(out.find(".d").unwrap() > large);
    }
}
