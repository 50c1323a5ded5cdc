// src/incremental/icon_cache.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;

/// Cached minified form of one icon source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconEntry {
    pub hash: String,
    pub minified: String,
}

/// Remember-cache for `svg:icons`.
///
/// Keyed by absolute source path. An entry is reused while the blake3 hash
/// of the source bytes is unchanged; the whole remembered set feeds sprite
/// assembly on every run.
#[derive(Debug, Default)]
pub struct IconCache {
    entries: BTreeMap<PathBuf, IconEntry>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_hash(contents: &[u8]) -> String {
        blake3::hash(contents).to_hex().to_string()
    }

    /// Return the cached minified content for `path` if `contents` hashes to
    /// the remembered value, else run `minify` and remember the result.
    ///
    /// The boolean is `true` on a cache hit.
    pub fn get_or_minify<F>(&mut self, path: &Path, contents: &[u8], minify: F) -> Result<(String, bool)>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let hash = Self::content_hash(contents);
        if let Some(entry) = self.entries.get(path) {
            if entry.hash == hash {
                return Ok((entry.minified.clone(), true));
            }
        }

        debug!(?path, "icon cache miss");
        let text = String::from_utf8_lossy(contents);
        let minified = minify(&text)?;
        self.entries.insert(
            path.to_path_buf(),
            IconEntry {
                hash,
                minified: minified.clone(),
            },
        );
        Ok((minified, false))
    }

    /// Drop the entry for a deleted source. Returns whether one existed.
    pub fn evict(&mut self, path: &Path) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            debug!(?path, "evicted icon cache entry");
        }
        removed
    }

    pub fn get(&self, path: &Path) -> Option<&IconEntry> {
        self.entries.get(path)
    }

    /// Every remembered icon, ordered by path.
    pub fn remembered(&self) -> impl Iterator<Item = (&Path, &IconEntry)> {
        self.entries.iter().map(|(p, e)| (p.as_path(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn unchanged_content_is_served_from_cache() {
        let mut cache = IconCache::new();
        let calls = Cell::new(0);
        let minify = |s: &str| {
            calls.set(calls.get() + 1);
            Ok(s.trim().to_string())
        };

        let path = Path::new("/p/src/img/svg/icons/cart.svg");
        let (first, hit) = cache.get_or_minify(path, b" <svg/> ", minify).unwrap();
        assert!(!hit);
        let (second, hit) = cache.get_or_minify(path, b" <svg/> ", minify).unwrap();
        assert!(hit);
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        let (_, hit) = cache.get_or_minify(path, b"<svg></svg>", minify).unwrap();
        assert!(!hit);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn eviction_forgets_the_icon() {
        let mut cache = IconCache::new();
        let path = Path::new("/p/a.svg");
        cache
            .get_or_minify(path, b"<svg/>", |s| Ok(s.to_string()))
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.evict(path));
        assert!(!cache.evict(path));
        assert!(cache.is_empty());
    }
}
