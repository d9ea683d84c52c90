//! Enumerates supported files under a repo root using the ignore matcher,
//! and computes MD5 checksums over file content.
//!
//! Grounded on `codescope-server/src/scan.rs::walk_files_parallel` (ignore
//! crate `WalkBuilder` + `rayon::build_parallel().run(...)`), simplified to
//! the extension-claim + ignore-matcher predicate the duplication engine
//! needs instead of codescope's category/description bookkeeping.

use std::path::Path;
use std::sync::Mutex;

use ignore::WalkBuilder;

use crate::error::{DryError, Result};
use crate::extractor::ExtractorRegistry;
use crate::ignore_matcher::IgnoreMatcher;

/// Walks `root`, returning repo-relative POSIX paths of every file whose
/// extension some registered extractor claims and that the ignore matcher
/// does not exclude.
pub fn scan_files(root: &Path, matcher: &IgnoreMatcher, registry: &ExtractorRegistry) -> Result<Vec<String>> {
    if !root.exists() {
        return Err(DryError::PathNotFound { path: root.to_path_buf() });
    }

    let results: Mutex<Vec<String>> = Mutex::new(Vec::new());

    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .threads(rayon::current_num_threads().min(12))
        .build_parallel()
        .run(|| {
            Box::new(|entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => return ignore::WalkState::Continue,
                };
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    return ignore::WalkState::Continue;
                }

                let abs_path = entry.path();
                let rel_path = match abs_path.strip_prefix(root) {
                    Ok(p) => p.to_string_lossy().replace('\\', "/"),
                    Err(_) => return ignore::WalkState::Continue,
                };

                if matcher.is_ignored(&rel_path, false) {
                    return ignore::WalkState::Continue;
                }
                if !registry.supports(&rel_path) {
                    return ignore::WalkState::Continue;
                }

                results.lock().expect("scan results mutex poisoned").push(rel_path);
                ignore::WalkState::Continue
            })
        });

    Ok(results.into_inner().expect("scan results mutex poisoned"))
}

/// MD5 hex digest of a file's UTF-8 content.
pub fn checksum(abs_path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(abs_path).map_err(|e| DryError::io(abs_path.to_path_buf(), e))?;
    Ok(checksum_str(&content))
}

pub fn checksum_str(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::java::JavaExtractor;
    use std::fs;

    #[test]
    fn scans_only_supported_extensions_and_respects_ignores() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Foo.java"), "class Foo {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();

        let matcher = IgnoreMatcher::build(dir.path(), &[]).unwrap();
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(JavaExtractor::new().unwrap()));

        let files = scan_files(dir.path(), &matcher, &registry).unwrap();
        assert_eq!(files, vec!["Foo.java".to_string()]);
    }

    #[test]
    fn checksum_is_stable_for_same_content() {
        let a = checksum_str("hello world");
        let b = checksum_str("hello world");
        assert_eq!(a, b);
        assert_ne!(a, checksum_str("hello world!"));
    }
}
