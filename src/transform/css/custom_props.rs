// src/transform/css/custom_props.rs

//! Static fallbacks for custom properties.
//!
//! Variables declared on `:root` are known at build time. Every ordinary
//! declaration whose `var()` references all resolve gets a literal copy
//! inserted in front of it, so browsers without custom property support
//! still see a value:
//!
//! ```css
//! :root { --brand: #c00 }
//! a { color: var(--brand) }          /* before */
//! a { color: #c00; color: var(--brand) }  /* after */
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::Result;
use crate::transform::{StaticRegex, compiled};

const STAGE: &str = "custom-properties";
const MAX_DEPTH: usize = 16;

static ROOT_BLOCK_RE: StaticRegex = LazyLock::new(|| Regex::new(r":root\s*\{([^}]*)\}"));

static ROOT_VAR_RE: StaticRegex =
    LazyLock::new(|| Regex::new(r"(--[A-Za-z0-9_-]+)\s*:\s*([^;]+?)\s*(?:;|$)"));

static DECL_RE: StaticRegex = LazyLock::new(|| {
    Regex::new(r"([A-Za-z-][A-Za-z0-9-]*)\s*:\s*([^;{}]*\bvar\([^;{}]*?)(\s*[;}])")
});

/// Insert literal fallbacks for `var()` usages that resolve from `:root`.
pub fn add_fallbacks(css: &str) -> Result<String> {
    let vars = root_variables(css)?;
    if vars.is_empty() {
        return Ok(css.to_string());
    }

    let decl_re = compiled(&DECL_RE, STAGE)?;
    let out = decl_re.replace_all(css, |caps: &Captures<'_>| {
        let whole = &caps[0];
        let prop = &caps[1];
        let value = &caps[2];
        let tail = &caps[3];

        let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
        if prop.starts_with("--") || !starts_declaration(css, start) {
            return whole.to_string();
        }

        match resolve(value, &vars, 0) {
            Some(resolved) if resolved != value => {
                format!("{prop}: {resolved}; {prop}: {value}{tail}")
            }
            _ => whole.to_string(),
        }
    });
    Ok(out.into_owned())
}

/// True when the text before `pos` ends a block opener or a previous
/// declaration, i.e. `pos` starts a declaration rather than a selector.
fn starts_declaration(css: &str, pos: usize) -> bool {
    matches!(
        css[..pos].trim_end().chars().last(),
        Some(';') | Some('{')
    )
}

fn root_variables(css: &str) -> Result<HashMap<String, String>> {
    let block_re = compiled(&ROOT_BLOCK_RE, STAGE)?;
    let var_re = compiled(&ROOT_VAR_RE, STAGE)?;

    let mut vars = HashMap::new();
    for block in block_re.captures_iter(css) {
        for decl in var_re.captures_iter(&block[1]) {
            vars.insert(decl[1].to_string(), decl[2].trim().to_string());
        }
    }
    Ok(vars)
}

/// Replace every `var(--x[, fallback])` in `value`. `None` when some
/// reference cannot be resolved.
fn resolve(value: &str, vars: &HashMap<String, String>, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find("var(") {
        out.push_str(&rest[..idx]);
        let args_start = idx + "var(".len();
        let close = matching_paren(&rest[args_start..])? + args_start;
        let args = &rest[args_start..close];

        let (name, fallback) = match args.split_once(',') {
            Some((n, f)) => (n.trim(), Some(f.trim())),
            None => (args.trim(), None),
        };

        let replacement = match vars.get(name) {
            Some(v) => resolve(v, vars, depth + 1)?,
            None => resolve(fallback?, vars, depth + 1)?,
        };
        out.push_str(&replacement);
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Byte offset of the `)` closing an already opened parenthesis.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_fallback_before_original() {
        let css = ":root { --brand: #c00; --gap: 8px }\na { color: var(--brand); margin: 0 var(--gap) }";
        let out = add_fallbacks(css).unwrap();
        assert!(out.contains("color: #c00; color: var(--brand);"));
        assert!(out.contains("margin: 0 8px; margin: 0 var(--gap) }"));
    }

    #[test]
    fn nested_variables_and_fallbacks_resolve() {
        let css = ":root { --base: 4px; --double: calc(var(--base) * 2) }\n.x { padding: var(--double); border: var(--unknown, 1px) solid }";
        let out = add_fallbacks(css).unwrap();
        assert!(out.contains("padding: calc(4px * 2); padding: var(--double);"));
        assert!(out.contains("border: 1px solid; border: var(--unknown, 1px) solid }"));
    }

    #[test]
    fn unresolvable_and_custom_declarations_are_untouched() {
        let css = ":root { --a: 1 }\n.x { --local: var(--a); width: var(--nope) }";
        let out = add_fallbacks(css).unwrap();
        assert!(out.contains("--local: var(--a);"));
        assert!(out.contains("width: var(--nope) }"));
        assert!(!out.contains("width: 1"));
    }

    #[test]
    fn selectors_with_colons_are_not_mistaken_for_declarations() {
        let css = ":root { --c: blue }\na:hover { color: var(--c) }";
        let out = add_fallbacks(css).unwrap();
        assert!(out.starts_with(":root { --c: blue }\na:hover { color: blue; color: var(--c) }"));
    }
}
