// src/incremental/freshness.rs

use std::fs;
use std::path::Path;

use crate::fs::modified;

/// Whether `dest` must be (re)produced from `src`.
///
/// True when the output is missing, when it is a symlink but a copy is
/// expected (or a regular file but a link is expected), or when the source
/// is newer.
pub fn needs_update(src: &Path, dest: &Path, expect_link: bool) -> bool {
    let Ok(meta) = fs::symlink_metadata(dest) else {
        return true;
    };

    let is_link = meta.file_type().is_symlink();
    if is_link != expect_link {
        return true;
    }

    if is_link {
        // A link always reflects its target; only a dangling one is stale.
        return fs::metadata(dest).is_err();
    }

    match (modified(src), meta.modified().ok()) {
        (Some(src_time), Some(dest_time)) => src_time > dest_time,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn missing_output_needs_update() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        fs::write(&src, b"png").unwrap();
        assert!(needs_update(&src, &dir.path().join("out.png"), false));
    }

    #[test]
    fn newer_output_is_fresh_in_production() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        let dest = dir.path().join("b.png");
        fs::write(&src, b"png").unwrap();
        fs::write(&dest, b"png").unwrap();

        let older = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(older)
            .unwrap();

        assert!(!needs_update(&src, &dest, false));
    }

    #[cfg(unix)]
    #[test]
    fn link_is_stale_in_production_and_copy_is_stale_in_development() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        let linked = dir.path().join("linked.png");
        let copied = dir.path().join("copied.png");
        fs::write(&src, b"png").unwrap();
        std::os::unix::fs::symlink(&src, &linked).unwrap();
        fs::write(&copied, b"png").unwrap();

        assert!(needs_update(&src, &linked, false));
        assert!(!needs_update(&src, &linked, true));
        assert!(needs_update(&src, &copied, true));
    }
}
