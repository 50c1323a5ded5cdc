// src/transform/js.rs

//! Script bundler.
//!
//! Starting from the entry file, every statically imported or `require`d
//! module is resolved with `oxc_resolver` (relative paths and `node_modules`
//! packages, honoring `exports` conditions and the `browser` field) and
//! parsed with `oxc_parser`. Its `import`/`export` statements and literal
//! `require("...")` calls are rewritten into calls on a small module
//! registry, and all modules are emitted into one IIFE:
//!
//! ```text
//! (function (modules) { ...registry... __require(0); })({
//!   0: function (module, exports, __require, require) { /* main.js */ },
//!   1: function (module, exports, __require, require) { /* modules/menu.js */ },
//! });
//! ```
//!
//! Modules without any `import`/`export` are treated as CommonJS and get
//! `module`/`exports` as-is. Imported bindings are snapshotted when the
//! importing module runs; exports are exposed through getters. A `require`
//! with a non-literal argument cannot be bundled and throws at runtime.
//! Modules a package's `browser` field maps to `false` become empty.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPatternKind, CallExpression, Declaration, ExportDefaultDeclarationKind,
    ImportDeclarationSpecifier, ModuleDeclaration, ModuleExportName, Program,
};
use oxc_ast_visit::{Visit, walk};
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_resolver::{ResolveError, ResolveOptions, Resolver};
use oxc_span::{GetSpan, SourceType};
use serde_json::Value;
use tracing::{debug, trace};

use crate::errors::{IoPathExt, PipelineError, Result};
use crate::transform::{dir_of, normalize};

const STAGE: &str = "js-bundle";

const RUNTIME_PRELUDE: &str = r#"(function (modules) {
  var cache = {};
  function __require(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var module = (cache[id] = { exports: {} });
    modules[id].call(module.exports, module, module.exports, __require, __require.missing);
    return module.exports;
  }
  __require.esm = function (exports) {
    Object.defineProperty(exports, "__esModule", { value: true });
  };
  __require.define = function (exports, name, get) {
    Object.defineProperty(exports, name, { enumerable: true, get: get });
  };
  __require.reexport = function (exports, from) {
    Object.keys(from).forEach(function (key) {
      if (key !== "default" && !Object.prototype.hasOwnProperty.call(exports, key)) {
        __require.define(exports, key, function () { return from[key]; });
      }
    });
  };
  __require.interop = function (m) {
    return m && m.__esModule ? m["default"] : m;
  };
  __require.missing = function (name) {
    throw new Error("Cannot find module '" + name + "' (not bundled)");
  };
  __require(0);
})({
"#;

#[derive(Debug, Clone)]
pub struct JsOptions {
    /// Project directory; `sourceURL`s are relative to it.
    pub project_root: PathBuf,
    /// Directory holding `node_modules`, searched after the usual walk up
    /// from the importing file.
    pub package_dir: PathBuf,
    /// Wrap each module in `eval` with a `sourceURL` (development).
    pub eval_modules: bool,
    /// Compress, mangle and re-print the bundle (production).
    pub minify: bool,
}

/// Result of bundling: the code plus every file that went into it.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub code: String,
    pub modules: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
enum Piece {
    Text(String),
    /// `__require(<id of the n-th dependency>)`
    Require(usize),
}

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    pieces: Vec<Piece>,
}

impl Edit {
    fn text(start: u32, end: u32, text: impl Into<String>) -> Self {
        Self {
            start: start as usize,
            end: end as usize,
            pieces: vec![Piece::Text(text.into())],
        }
    }
}

#[derive(Debug, Default)]
struct Analysis {
    is_esm: bool,
    specifiers: Vec<String>,
    edits: Vec<Edit>,
    /// `(exported name, expression)` pairs exposed as getters.
    getters: Vec<(String, String)>,
    temps: usize,
}

impl Analysis {
    fn dep(&mut self, specifier: &str) -> usize {
        self.specifiers.push(specifier.to_string());
        self.specifiers.len() - 1
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("__i{}", self.temps)
    }

    fn require_into(&mut self, start: u32, end: u32, var: &str, dep: usize) {
        self.edits.push(Edit {
            start: start as usize,
            end: end as usize,
            pieces: vec![
                Piece::Text(format!("var {var} = ")),
                Piece::Require(dep),
                Piece::Text(";".to_string()),
            ],
        });
    }
}

struct ModuleRecord {
    path: PathBuf,
    source: String,
    analysis: Analysis,
    deps: Vec<usize>,
}

/// Bundle `entry` and everything it imports.
pub fn bundle(entry: &Path, options: &JsOptions) -> Result<Bundle> {
    let entry = normalize(entry);
    let resolver = module_resolver(&options.package_dir);
    let mut records: Vec<ModuleRecord> = Vec::new();
    let mut ids: HashMap<PathBuf, usize> = HashMap::new();
    let mut ignored: HashSet<PathBuf> = HashSet::new();
    let mut queue = VecDeque::new();

    ids.insert(entry.clone(), 0);
    queue.push_back(entry);

    while let Some(path) = queue.pop_front() {
        let source = if ignored.contains(&path) {
            String::new()
        } else {
            fs::read_to_string(&path).at_path(&path)?
        };
        let analysis = analyze(&path, &source)?;

        let mut deps = Vec::with_capacity(analysis.specifiers.len());
        for specifier in &analysis.specifiers {
            let target = match resolver.resolve(dir_of(&path), specifier) {
                Ok(resolution) => normalize(resolution.path()),
                Err(ResolveError::Ignored(target)) => {
                    trace!(?target, "module disabled by browser field");
                    ignored.insert(normalize(&target));
                    normalize(&target)
                }
                Err(e) => {
                    return Err(PipelineError::transform(
                        STAGE,
                        format!("cannot resolve {specifier:?} imported from {path:?}: {e}"),
                    ));
                }
            };
            let next_id = ids.len();
            let id = *ids.entry(target.clone()).or_insert_with(|| {
                queue.push_back(target);
                next_id
            });
            deps.push(id);
        }

        records.push(ModuleRecord {
            path,
            source,
            analysis,
            deps,
        });
    }

    // Records were pushed in BFS order, which is id order.
    let mut code = String::from(RUNTIME_PRELUDE);
    for (id, record) in records.iter().enumerate() {
        let body = render_module(record);
        code.push_str(&format!("{id}: function (module, exports, __require, require) {{\n"));
        if options.eval_modules {
            let rel = record
                .path
                .strip_prefix(&options.project_root)
                .unwrap_or(&record.path)
                .to_string_lossy()
                .replace('\\', "/");
            let wrapped = format!("{body}\n//# sourceURL=assetpipe:///{rel}");
            let literal = serde_json::to_string(&wrapped)
                .map_err(|e| PipelineError::transform(STAGE, e.to_string()))?;
            code.push_str(&format!("eval({literal});\n"));
        } else {
            code.push_str(&body);
            code.push('\n');
        }
        code.push_str("},\n");
    }
    code.push_str("});\n");

    if options.minify {
        code = minify(&code)?;
    }

    debug!(modules = records.len(), bytes = code.len(), "bundle built");
    Ok(Bundle {
        code,
        modules: records.into_iter().map(|r| r.path).collect(),
    })
}

fn render_module(record: &ModuleRecord) -> String {
    let analysis = &record.analysis;
    let mut out = String::with_capacity(record.source.len() + 256);

    if analysis.is_esm {
        out.push_str("\"use strict\";\n__require.esm(exports);\n");
        for (name, expr) in &analysis.getters {
            out.push_str(&format!(
                "__require.define(exports, {}, function () {{ return {expr}; }});\n",
                json_str(name)
            ));
        }
    }

    let mut edits: Vec<&Edit> = analysis.edits.iter().collect();
    edits.sort_by_key(|e| (e.start, e.end));

    let mut last = 0;
    for edit in edits {
        out.push_str(&record.source[last..edit.start]);
        for piece in &edit.pieces {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Require(k) => out.push_str(&format!("__require({})", record.deps[*k])),
            }
        }
        last = edit.end;
    }
    out.push_str(&record.source[last..]);
    out
}

fn analyze(path: &Path, source: &str) -> Result<Analysis> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if ret.errors.is_empty() {
        let mut analysis = analyze_module(path, source, &ret.program)?;
        RequireCollector::collect(&ret.program, &mut analysis);
        return Ok(analysis);
    }

    // Plain scripts (e.g. CommonJS packages) may not parse as modules.
    let script = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if script.errors.is_empty() {
        let mut analysis = Analysis::default();
        RequireCollector::collect(&script.program, &mut analysis);
        return Ok(analysis);
    }
    let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
    Err(PipelineError::transform(
        STAGE,
        format!("{}: {}", path.display(), messages.join("; ")),
    ))
}

/// Rewrites `require("<literal>")` calls into registry lookups.
struct RequireCollector<'s> {
    analysis: &'s mut Analysis,
}

impl RequireCollector<'_> {
    fn collect(program: &Program<'_>, analysis: &mut Analysis) {
        RequireCollector { analysis }.visit_program(program);
    }
}

impl<'a> Visit<'a> for RequireCollector<'_> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(literal) = call.common_js_require() {
            let dep = self.analysis.dep(literal.value.as_str());
            self.analysis.edits.push(Edit {
                start: call.span.start as usize,
                end: call.span.end as usize,
                pieces: vec![Piece::Require(dep)],
            });
            return;
        }
        walk::walk_call_expression(self, call);
    }
}

fn analyze_module(path: &Path, source: &str, program: &Program<'_>) -> Result<Analysis> {
    let mut analysis = Analysis::default();
    for stmt in program.body.iter() {
        let Some(decl) = stmt.as_module_declaration() else {
            continue;
        };
        analysis.is_esm = true;

        match decl {
            ModuleDeclaration::ImportDeclaration(import) => {
                let dep = analysis.dep(import.source.value.as_str());
                let span = import.span;
                let specifiers = import.specifiers.as_ref().filter(|s| !s.is_empty());
                let Some(specifiers) = specifiers else {
                    analysis.edits.push(Edit {
                        start: span.start as usize,
                        end: span.end as usize,
                        pieces: vec![Piece::Require(dep), Piece::Text(";".to_string())],
                    });
                    continue;
                };

                let ns = analysis.temp();
                let mut pieces = vec![
                    Piece::Text(format!("var {ns} = ")),
                    Piece::Require(dep),
                    Piece::Text(";".to_string()),
                ];
                for specifier in specifiers {
                    let binding = match specifier {
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            format!(" var {} = __require.interop({ns});", s.local.name)
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            format!(" var {} = {ns};", s.local.name)
                        }
                        ImportDeclarationSpecifier::ImportSpecifier(s) => format!(
                            " var {} = {ns}[{}];",
                            s.local.name,
                            json_str(&export_name(&s.imported))
                        ),
                    };
                    pieces.push(Piece::Text(binding));
                }
                analysis.edits.push(Edit {
                    start: span.start as usize,
                    end: span.end as usize,
                    pieces,
                });
            }

            ModuleDeclaration::ExportNamedDeclaration(export) => {
                let span = export.span;
                if let Some(declaration) = &export.declaration {
                    analysis
                        .edits
                        .push(Edit::text(span.start, declaration.span().start, ""));
                    for name in declared_names(path, declaration)? {
                        analysis.getters.push((name.clone(), name));
                    }
                } else if let Some(src) = &export.source {
                    let dep = analysis.dep(src.value.as_str());
                    let tmp = analysis.temp();
                    analysis.require_into(span.start, span.end, &tmp, dep);
                    for specifier in &export.specifiers {
                        analysis.getters.push((
                            export_name(&specifier.exported),
                            format!("{tmp}[{}]", json_str(&export_name(&specifier.local))),
                        ));
                    }
                } else {
                    analysis.edits.push(Edit::text(span.start, span.end, ""));
                    for specifier in &export.specifiers {
                        analysis
                            .getters
                            .push((export_name(&specifier.exported), export_name(&specifier.local)));
                    }
                }
            }

            ModuleDeclaration::ExportDefaultDeclaration(export) => {
                let span = export.span;
                let inner_start = export.declaration.span().start;
                let named = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        f.id.as_ref().map(|id| id.name.to_string())
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.name.to_string())
                    }
                    _ => None,
                };
                match named {
                    Some(name) => {
                        analysis.edits.push(Edit::text(span.start, inner_start, ""));
                        analysis.getters.push(("default".to_string(), name));
                    }
                    None => {
                        analysis
                            .edits
                            .push(Edit::text(span.start, inner_start, "var __default = "));
                        if !source[..span.end as usize].trim_end().ends_with(';') {
                            analysis.edits.push(Edit::text(span.end, span.end, ";"));
                        }
                        analysis
                            .getters
                            .push(("default".to_string(), "__default".to_string()));
                    }
                }
            }

            ModuleDeclaration::ExportAllDeclaration(all) => {
                let dep = analysis.dep(all.source.value.as_str());
                let span = all.span;
                match &all.exported {
                    Some(name) => {
                        let tmp = analysis.temp();
                        analysis.require_into(span.start, span.end, &tmp, dep);
                        analysis.getters.push((export_name(name), tmp));
                    }
                    None => analysis.edits.push(Edit {
                        start: span.start as usize,
                        end: span.end as usize,
                        pieces: vec![
                            Piece::Text("__require.reexport(exports, ".to_string()),
                            Piece::Require(dep),
                            Piece::Text(");".to_string()),
                        ],
                    }),
                }
            }

            _ => {}
        }
    }
    Ok(analysis)
}

fn declared_names(path: &Path, declaration: &Declaration<'_>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    match declaration {
        Declaration::VariableDeclaration(var) => {
            for d in &var.declarations {
                match &d.id.kind {
                    BindingPatternKind::BindingIdentifier(id) => names.push(id.name.to_string()),
                    _ => {
                        return Err(PipelineError::transform(
                            STAGE,
                            format!(
                                "{}: destructuring in export declarations is not supported",
                                path.display()
                            ),
                        ));
                    }
                }
            }
        }
        Declaration::FunctionDeclaration(f) => {
            names.extend(f.id.as_ref().map(|id| id.name.to_string()));
        }
        Declaration::ClassDeclaration(c) => {
            names.extend(c.id.as_ref().map(|id| id.name.to_string()));
        }
        _ => {}
    }
    Ok(names)
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

fn json_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn minify(code: &str) -> Result<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
    if !ret.errors.is_empty() {
        let messages: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(PipelineError::transform(
            STAGE,
            format!("bundle does not re-parse: {}", messages.join("; ")),
        ));
    }
    let mut program = ret.program;
    let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);
    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

/// Browser-flavored node resolution: `exports` conditions, then the
/// `browser`/`module`/`main` fields, then `index` files.
fn module_resolver(package_dir: &Path) -> Resolver {
    let package_modules = package_dir.join("node_modules").to_string_lossy().into_owned();
    Resolver::new(ResolveOptions {
        condition_names: vec![
            "browser".into(),
            "import".into(),
            "module".into(),
            "require".into(),
            "default".into(),
        ],
        main_fields: vec!["browser".into(), "module".into(), "main".into()],
        alias_fields: vec![vec!["browser".into()]],
        extensions: vec![".js".into(), ".mjs".into(), ".cjs".into()],
        modules: vec!["node_modules".into(), package_modules],
        symlinks: false,
        ..ResolveOptions::default()
    })
}
