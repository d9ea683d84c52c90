//! Composes hard defaults, every discovered `.gitignore`, and the user's
//! `excludedPaths` globs into one `ignores(path) -> bool` predicate.
//!
//! Grounded on `trontheim-diff-gitignore-filter/src/filter.rs`'s
//! `GitignoreBuilder`-based construction, extended to walk the whole tree for
//! `.gitignore` files (its single-file `Filter` only reads the root one) and
//! to layer `excludedPaths` with `globset` on top.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;

use crate::error::{DryError, Result};

/// A single path predicate built from defaults, `.gitignore` files, and
/// `excludedPaths`. Paths passed to [`IgnoreMatcher::is_ignored`] must already
/// be normalized repo-relative POSIX (no leading `./`).
pub struct IgnoreMatcher {
    gitignore: Gitignore,
    excluded: GlobSet,
}

impl IgnoreMatcher {
    /// Walks `root` looking for `.gitignore` files and compiles them
    /// alongside the hard defaults (`.git/**`, `.dry/**`) and
    /// `excluded_paths`.
    pub fn build(root: &Path, excluded_paths: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        builder.add_line(None, ".git/**").map_err(|e| DryError::ConfigInvalid {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;
        builder.add_line(None, ".dry/**").map_err(|e| DryError::ConfigInvalid {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;

        for entry in WalkBuilder::new(root).hidden(false).git_ignore(false).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_name() == ".gitignore" {
                if let Some(err) = builder.add(entry.path()) {
                    return Err(DryError::ConfigInvalid {
                        path: entry.path().to_path_buf(),
                        detail: err.to_string(),
                    });
                }
            }
        }

        let gitignore = builder.build().map_err(|e| DryError::ConfigInvalid {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;

        let mut excluded_builder = GlobSetBuilder::new();
        for pattern in excluded_paths {
            let glob = Glob::new(pattern).map_err(|e| DryError::ConfigInvalid {
                path: root.to_path_buf(),
                detail: format!("invalid excludedPaths glob {pattern:?}: {e}"),
            })?;
            excluded_builder.add(glob);
        }
        let excluded = excluded_builder.build().map_err(|e| DryError::ConfigInvalid {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;

        Ok(IgnoreMatcher { gitignore, excluded })
    }

    /// `rel_path` must be a normalized, repo-relative POSIX path without a
    /// leading `./`. `is_dir` affects gitignore directory-rule matching.
    pub fn is_ignored(&self, rel_path: &str, is_dir: bool) -> bool {
        if self.excluded.is_match(rel_path) {
            return true;
        }
        matches!(
            self.gitignore.matched(rel_path, is_dir),
            ignore::Match::Ignore(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn hard_defaults_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::build(dir.path(), &[]).unwrap();
        assert!(matcher.is_ignored(".git/HEAD", false));
        assert!(matcher.is_ignored(".dry/index.db", false));
    }

    #[test]
    fn nested_gitignore_is_scoped_to_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/.gitignore"), "foo\n").unwrap();
        let matcher = IgnoreMatcher::build(dir.path(), &[]).unwrap();
        assert!(matcher.is_ignored("a/b/foo", false));
        assert!(!matcher.is_ignored("foo", false));
        assert!(!matcher.is_ignored("a/foo", false));
    }

    #[test]
    fn negation_overrides_earlier_ignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n!keep.log\n").unwrap();
        let matcher = IgnoreMatcher::build(dir.path(), &[]).unwrap();
        assert!(matcher.is_ignored("debug.log", false));
        assert!(!matcher.is_ignored("keep.log", false));
    }

    #[test]
    fn excluded_paths_glob_applies() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::build(dir.path(), &["**/test/**".to_string()]).unwrap();
        assert!(matcher.is_ignored("src/test/Foo.java", false));
        assert!(!matcher.is_ignored("src/main/Foo.java", false));
    }
}
