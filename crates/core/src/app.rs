//! Application root: owns every collaborator the source kept as module-level
//! singletons (config cache, duplication cache) and wires them into the five
//! public operations.
//!
//! Nothing in `codescope-server` plays this role as such; its `AppState` is
//! the nearest analogue, a single struct threading a `RepoState` map and an
//! HTTP client through request handlers.

use std::path::{Path, PathBuf};

use crate::cache::DuplicationCache;
use crate::config::ConfigCache;
use crate::embedding::EmbeddingProvider;
use crate::engine;
use crate::error::Result;
use crate::exclusion;
use crate::extractor::java::JavaExtractor;
use crate::extractor::ExtractorRegistry;
use crate::report::{self, ApplyExclusionOutcome, Report};
use crate::store::IndexStore;
use crate::types::{DuplicateGroup, DuplicationScore, UpdateSummary};
use crate::updater::IncrementalUpdater;

/// Owns one repository's collaborators for the lifetime of the process.
/// Construct once per `repoRoot`; every public operation borrows `&self`.
pub struct DryScanApp {
    repo_root: PathBuf,
    config_cache: ConfigCache,
    store: IndexStore,
    registry: ExtractorRegistry,
    embedder: Box<dyn EmbeddingProvider>,
    cache: DuplicationCache,
}

impl DryScanApp {
    /// Opens (creating if absent) the store at `repo_root`, registers the
    /// reference Java extractor, and starts with an empty duplication cache.
    pub fn open(repo_root: impl AsRef<Path>, embedder: Box<dyn EmbeddingProvider>) -> Result<Self> {
        let repo_root = repo_root.as_ref().to_path_buf();
        let store = IndexStore::open(&repo_root)?;
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(JavaExtractor::new()?));

        Ok(DryScanApp {
            repo_root,
            config_cache: ConfigCache::new(),
            store,
            registry,
            embedder,
            cache: DuplicationCache::new(),
        })
    }

    fn updater(&self) -> IncrementalUpdater<'_> {
        IncrementalUpdater {
            root: &self.repo_root,
            store: &self.store,
            registry: &self.registry,
            embedder: self.embedder.as_ref(),
            cache: &self.cache,
        }
    }

    /// Three-phase extract-all → embed-all → record-files, followed by
    /// `cleanupExcludedFiles`.
    pub async fn init(&self) -> Result<UpdateSummary> {
        let config = self.config_cache.load(&self.repo_root)?;
        let summary = self.updater().init(&config).await?;
        exclusion::cleanup_excluded_files(&self.store, &config.excluded_paths)?;
        Ok(summary)
    }

    /// Incremental diff-and-reconcile pass, followed by `cleanupExcludedFiles`.
    pub async fn update_index(&self) -> Result<UpdateSummary> {
        let config = self.config_cache.load(&self.repo_root)?;
        let summary = self.updater().update(&config).await?;
        exclusion::cleanup_excluded_files(&self.store, &config.excluded_paths)?;
        Ok(summary)
    }

    /// Runs the duplicate engine over the current store and writes a report
    /// artifact.
    pub fn find_duplicates(&self) -> Result<(Vec<DuplicateGroup>, DuplicationScore)> {
        let config = self.config_cache.load(&self.repo_root)?;
        let units = self.store.list_units()?;
        let arena = engine::build_arena(units);

        let groups = engine::find_duplicates(&arena, &config, &self.cache, &self.registry);
        let score = engine::compute_score(&arena, &groups);
        Ok((groups, score))
    }

    /// `findDuplicates` plus persisting the result as a report artifact.
    pub fn find_duplicates_and_report(&self) -> Result<Report> {
        let config = self.config_cache.load(&self.repo_root)?;
        let (groups, score) = self.find_duplicates()?;
        report::generate(&self.repo_root, &config, groups, score)
    }

    pub fn apply_exclusion_from_latest_report(&self, short_id: &str) -> Result<ApplyExclusionOutcome> {
        report::apply_exclusion_from_latest_report(&self.repo_root, &self.config_cache, short_id)
    }

    pub fn clean_exclusions(&self) -> Result<exclusion::CleanExclusionsResult> {
        exclusion::clean_exclusions(&self.repo_root, &self.config_cache, &self.store, &self.registry)
    }
}
