#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetpipe::config::ConfigFile;
use assetpipe::engine::BuildSession;
use assetpipe::types::BuildMode;
use tempfile::TempDir;

/// A throwaway project directory.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating temp project"),
        }
    }

    /// A small but complete site: pages with partials, a stylesheet with two
    /// imported partials, ES modules, images, fonts and icons. No
    /// `package.json` and no `src/libs`.
    pub fn sample_site() -> Self {
        Self::new()
            .with_file("src/index.html", "<html><body>@@include('templates/header.html', {\"title\": \"Home\"})<main>home</main></body></html>")
            .with_file("src/about.html", "<html><body>@@include('templates/header.html', {\"title\": \"About\"})</body></html>")
            .with_file("src/templates/header.html", "<header>@@title</header>")
            .with_file(
                "src/css/style.css",
                "@import 'base.css';\n@import 'layout';\n.card { backdrop-filter: blur(4px); }\n",
            )
            .with_file(
                "src/css/base.css",
                ":root { --gap: 8px; }\nbody { margin: 0; }\n@media (min-width: 768px) { body { padding: var(--gap); } }\n",
            )
            .with_file(
                "src/css/layout.css",
                ".row { display: flex; }\n@media (min-width: 768px) { .row { gap: 16px; } }\n@media (min-width: 480px) { .row { gap: 4px; } }\n",
            )
            .with_file("src/js/main.js", "import { greet } from './modules/greet.js';\ngreet('site');\n")
            .with_file("src/js/modules/greet.js", "export function greet(name) { console.log('hi ' + name); }\n")
            .with_bytes("src/img/logo.png", &tiny_png())
            .with_bytes("src/images/photos/team.png", &tiny_png())
            .with_file("src/img/svg/arrow.svg", r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 4 4"><path d="M0 0"/></svg>"#)
            .with_file(
                "src/img/svg/icons/cart.svg",
                r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><title>cart</title><path d="M1 1"/></svg>"#,
            )
            .with_file("src/img/svg/icons/user.svg", r#"<svg width="16" height="16"><circle r="3"/></svg>"#)
            .with_bytes("src/fonts/roboto/roboto.woff2", b"wOF2")
            .with_bytes("src/favicon.ico", b"\0\0\x01\0")
    }

    pub fn with_file(self, rel: &str, contents: &str) -> Self {
        self.write(rel, contents);
        self
    }

    pub fn with_bytes(self, rel: &str, contents: &[u8]) -> Self {
        self.write_bytes(rel, contents);
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        self.write_bytes(rel, contents.as_bytes());
    }

    pub fn write_bytes(&self, rel: &str, contents: &[u8]) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("creating fixture dir");
        }
        std::fs::write(&path, contents).expect("writing fixture file");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        std::fs::symlink_metadata(self.path(rel)).is_ok()
    }

    pub fn is_symlink(&self, rel: &str) -> bool {
        std::fs::symlink_metadata(self.path(rel))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.path(rel)).expect("removing fixture file");
    }

    /// Session on the default (`wordpress`) profile.
    pub fn session(&self, mode: BuildMode) -> Arc<BuildSession> {
        self.session_with(ConfigFile::default(), mode)
    }

    pub fn session_with(&self, cfg: ConfigFile, mode: BuildMode) -> Arc<BuildSession> {
        Arc::new(BuildSession::from_config(self.root(), &cfg, mode).expect("building session"))
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest PNG the image optimizer accepts, with a text chunk to strip.
pub fn tiny_png() -> Vec<u8> {
    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut c = (data.len() as u32).to_be_bytes().to_vec();
        c.extend_from_slice(kind);
        c.extend_from_slice(data);
        c.extend_from_slice(&[0, 0, 0, 0]);
        c
    }
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]));
    png.extend(chunk(b"tEXt", b"Software\0editor"));
    png.extend(chunk(b"IDAT", &[0x78, 0x9c, 0x63, 0, 0, 0, 2, 0, 1]));
    png.extend(chunk(b"IEND", &[]));
    png
}
