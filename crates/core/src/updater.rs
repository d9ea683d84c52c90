//! Incremental updater: mtime-then-checksum diffing, strict write ordering,
//! and the three-phase init variant.
//!
//! Grounded on `codescope-server/src/scan.rs`'s incremental re-index pass
//! (mtime-gated checksum recompute, cache invalidation per touched path),
//! retargeted from its stub cache to this crate's unit store.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::{info, warn};

use crate::cache::DuplicationCache;
use crate::embedding::EmbeddingProvider;
use crate::error::{DryError, Result};
use crate::extractor::ExtractorRegistry;
use crate::ignore_matcher::IgnoreMatcher;
use crate::scanner;
use crate::store::IndexStore;
use crate::types::{DryConfig, FileRecord, UpdateSummary};

enum FileStatus {
    Added,
    Changed,
    Unchanged,
}

/// Drives the store to match the filesystem for one repository.
pub struct IncrementalUpdater<'a> {
    pub root: &'a Path,
    pub store: &'a IndexStore,
    pub registry: &'a ExtractorRegistry,
    pub embedder: &'a dyn EmbeddingProvider,
    pub cache: &'a DuplicationCache,
}

impl<'a> IncrementalUpdater<'a> {
    /// Runs one incremental pass: scan, diff, remove-then-save-then-embed,
    /// reconcile FileRecords, invalidate the cache. Returns immediately with
    /// all-unchanged counts if nothing moved.
    pub async fn update(&self, config: &DryConfig) -> Result<UpdateSummary> {
        let _guard = self.store.lock_for_write().await;

        let matcher = IgnoreMatcher::build(self.root, &config.excluded_paths)?;
        let current_paths = scanner::scan_files(self.root, &matcher, self.registry)?;
        let current_set: HashSet<&String> = current_paths.iter().collect();

        let tracked: Vec<FileRecord> = self.store.list_file_records()?;
        let tracked_by_path: HashMap<String, FileRecord> = tracked.into_iter().map(|r| (r.file_path.clone(), r)).collect();

        let mut added = Vec::new();
        let mut changed = Vec::new();
        let mut unchanged_count = 0usize;

        for path in &current_paths {
            match self.classify(path, tracked_by_path.get(path))? {
                FileStatus::Added => added.push(path.clone()),
                FileStatus::Changed => changed.push(path.clone()),
                FileStatus::Unchanged => unchanged_count += 1,
            }
        }

        let deleted: Vec<String> = tracked_by_path
            .keys()
            .filter(|path| !current_set.contains(path))
            .cloned()
            .collect();

        if added.is_empty() && changed.is_empty() && deleted.is_empty() {
            return Ok(UpdateSummary { added: 0, changed: 0, deleted: 0, unchanged: unchanged_count });
        }

        let stale: HashSet<String> = changed.iter().chain(deleted.iter()).cloned().collect();
        self.store.delete_units_by_files(&stale)?;

        let to_extract: Vec<&String> = added.iter().chain(changed.iter()).collect();
        for path in &to_extract {
            self.extract_and_embed(path, config).await?;
        }

        for path in &deleted {
            self.store.delete_file_record(path)?;
        }
        for path in to_extract {
            let abs = self.root.join(path);
            let checksum = scanner::checksum(&abs)?;
            let mtime = mtime_millis(&abs)?;
            self.store.save_file_record(&FileRecord { file_path: path.clone(), checksum, mtime })?;
        }

        for path in stale.iter() {
            self.cache.invalidate_file(path);
        }

        info!(added = added.len(), changed = changed.len(), deleted = deleted.len(), "index updated");
        Ok(UpdateSummary { added: added.len(), changed: changed.len(), deleted: deleted.len(), unchanged: unchanged_count })
    }

    /// The init entry point: extract-all, embed-all, record-files, then hand
    /// control back to the caller for `cleanupExcludedFiles`.
    pub async fn init(&self, config: &DryConfig) -> Result<UpdateSummary> {
        let _guard = self.store.lock_for_write().await;

        let matcher = IgnoreMatcher::build(self.root, &config.excluded_paths)?;
        let paths = scanner::scan_files(self.root, &matcher, self.registry)?;

        for path in &paths {
            self.extract_and_embed(path, config).await?;
        }
        for path in &paths {
            let abs = self.root.join(path);
            let checksum = scanner::checksum(&abs)?;
            let mtime = mtime_millis(&abs)?;
            self.store.save_file_record(&FileRecord { file_path: path.clone(), checksum, mtime })?;
        }

        Ok(UpdateSummary { added: paths.len(), changed: 0, deleted: 0, unchanged: 0 })
    }

    fn classify(&self, path: &str, tracked: Option<&FileRecord>) -> Result<FileStatus> {
        let Some(record) = tracked else {
            return Ok(FileStatus::Added);
        };
        let abs = self.root.join(path);
        let mtime = mtime_millis(&abs)?;
        if mtime == record.mtime {
            return Ok(FileStatus::Unchanged);
        }
        let checksum = scanner::checksum(&abs)?;
        if checksum == record.checksum {
            Ok(FileStatus::Unchanged)
        } else {
            Ok(FileStatus::Changed)
        }
    }

    /// A unit is persisted before its embedding is computed, then updated in
    /// place — per the "no partial commits mid-file" ordering rule.
    async fn extract_and_embed(&self, path: &str, config: &DryConfig) -> Result<()> {
        let abs = self.root.join(path);
        let source = std::fs::read_to_string(&abs).map_err(|e| DryError::io(abs.clone(), e))?;

        let units = match self.registry.extract(path, &source, config) {
            Ok(units) => units,
            Err(err) => {
                warn!(path, error = %err, "parse failure, file left untouched for retry");
                return Ok(());
            }
        };

        self.store.save_units(&units)?;

        for mut unit in units {
            let embedding = self.embedder.embed(&unit.code).await?;
            if embedding.is_some() {
                unit.embedding = embedding;
                self.store.save_unit(&unit)?;
            }
        }
        Ok(())
    }
}

fn mtime_millis(abs_path: &Path) -> Result<i64> {
    let meta = std::fs::metadata(abs_path).map_err(|e| DryError::io(abs_path.to_path_buf(), e))?;
    let modified = meta.modified().map_err(|e| DryError::io(abs_path.to_path_buf(), e))?;
    let millis = modified.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
    Ok(millis)
}
