// src/watch/path_utils.rs

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to canonicalized paths when the prefixes differ (symlinked
/// temp dirs on macOS). A deleted file cannot be canonicalized, so its
/// parent is used instead.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_str(Path::new("/p"), Path::new("/p/src/a.html")),
            Some("src/a.html".to_string())
        );
    }

    #[test]
    fn deleted_file_under_non_canonical_root_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("src")).unwrap();
        let root = base.join("src/..");
        let gone = base.join("src/gone.png");
        assert_eq!(relative_str(&root, &gone), Some("src/gone.png".to_string()));
    }
}
