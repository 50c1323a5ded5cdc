// src/tasks/icons.rs

//! `svg:icons`: assemble `img/svg/icons/*.svg` into one symbol sprite.
//!
//! Icons are minified through the session's remember-cache, so unchanged
//! files are never re-minified, and the sprite is always built from the
//! whole remembered set. The sprite lands in the source tree
//! (`img/svg/svg-symbols.svg`) where the `svg` task picks it up.

use std::path::PathBuf;

use tracing::debug;

use crate::engine::BuildSession;
use crate::errors::{IoPathExt, Result};
use crate::fs::{Output, commit};
use crate::tasks::{TaskDescriptor, TaskReport, collect_inputs};
use crate::transform::svg::{SpriteIcon, build_sprite, minify_svg};
use crate::types::TaskId;

pub const SPRITE: &str = "img/svg/svg-symbols.svg";

pub fn sprite_path(session: &BuildSession) -> PathBuf {
    session.layout().source(SPRITE)
}

pub async fn run(session: &BuildSession) -> Result<TaskReport> {
    let descriptor = TaskDescriptor::for_task(TaskId::SvgIcons, session.layout());
    let mut report = TaskReport::new(TaskId::SvgIcons);

    let mut sources = Vec::new();
    for path in collect_inputs(session, &descriptor).await? {
        let bytes = tokio::fs::read(&path).await.at_path(&path)?;
        sources.push((path, bytes));
    }

    // The guard is dropped before the next await.
    let sprite = {
        let mut cache = session.icons()?;
        for (path, bytes) in &sources {
            let (_, hit) = cache.get_or_minify(path, bytes, minify_svg)?;
            if hit {
                report.skipped += 1;
            }
        }
        let icons: Vec<SpriteIcon> = cache
            .remembered()
            .filter_map(|(path, entry)| {
                let id = path.file_stem()?.to_string_lossy().into_owned();
                Some(SpriteIcon {
                    id,
                    svg: entry.minified.clone(),
                })
            })
            .collect();
        if icons.is_empty() {
            debug!("no icons remembered; sprite left alone");
            return Ok(report);
        }
        minify_svg(&build_sprite(&icons)?)?
    };

    let path = sprite_path(session);
    let current = tokio::fs::read_to_string(&path).await.ok();
    if current.as_deref() == Some(sprite.as_str()) {
        debug!(?path, "sprite unchanged");
        return Ok(report);
    }

    report.written = commit(vec![Output::Bytes {
        path,
        contents: sprite.into_bytes(),
    }])
    .await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::types::BuildMode;
    use std::fs;

    #[tokio::test]
    async fn sprite_is_rewritten_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let icons = root.join("src/img/svg/icons");
        fs::create_dir_all(&icons).unwrap();
        fs::write(icons.join("cart.svg"), r#"<svg viewBox="0 0 8 8"><!-- x --><path d="M0 0"/></svg>"#).unwrap();
        fs::write(icons.join("user.svg"), r#"<svg width="4" height="4"><circle r="1"/></svg>"#).unwrap();

        let session = BuildSession::from_config(root, &ConfigFile::default(), BuildMode::Development).unwrap();
        let first = run(&session).await.unwrap();
        assert_eq!(first.written, vec![root.join(SPRITE)]);
        assert_eq!(first.skipped, 0);

        let sprite = fs::read_to_string(root.join(SPRITE)).unwrap();
        assert!(sprite.contains(r#"<symbol id="cart" viewBox="0 0 8 8"><path d="M0 0"/></symbol>"#));
        assert!(sprite.contains(r#"<symbol id="user" viewBox="0 0 4 4">"#));

        let second = run(&session).await.unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.skipped, 2);
    }

    #[tokio::test]
    async fn invalid_icon_fails_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let icons = dir.path().join("src/img/svg/icons");
        fs::create_dir_all(&icons).unwrap();
        fs::write(icons.join("bad.svg"), "<html/>").unwrap();

        let session = BuildSession::from_config(dir.path(), &ConfigFile::default(), BuildMode::Development).unwrap();
        assert!(run(&session).await.is_err());
        assert!(!dir.path().join(SPRITE).exists());
    }
}
