//! Loads, validates, and caches `dryconfig.json`.
//!
//! Grounded on `doraemonkeys-sloc-guard`'s config loader: auto-create with
//! defaults, reject unknown keys via serde's `deny_unknown_fields`, keep a
//! lazily-populated cache keyed by repo root that `save` replaces atomically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{DryError, Result};
use crate::types::DryConfig;

const CONFIG_FILE_NAME: &str = "dryconfig.json";

/// Per-process cache of loaded configs, one per repo root. Grounded on
/// `codescope-server`'s `RepoState`-per-path caching pattern in `types.rs`.
pub struct ConfigCache {
    entries: Mutex<HashMap<PathBuf, DryConfig>>,
}

impl Default for ConfigCache {
    fn default() -> Self {
        ConfigCache { entries: Mutex::new(HashMap::new()) }
    }
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached config for `repo_root`, loading (and creating with
    /// defaults if absent) on first access.
    pub fn load(&self, repo_root: &Path) -> Result<DryConfig> {
        let mut entries = self.entries.lock().expect("config cache mutex poisoned");
        if let Some(cfg) = entries.get(repo_root) {
            return Ok(cfg.clone());
        }
        let cfg = load_or_create(repo_root)?;
        entries.insert(repo_root.to_path_buf(), cfg.clone());
        Ok(cfg)
    }

    /// Persists `cfg` to disk and replaces the cached snapshot.
    pub fn save(&self, repo_root: &Path, cfg: &DryConfig) -> Result<()> {
        write_config(repo_root, cfg)?;
        let mut entries = self.entries.lock().expect("config cache mutex poisoned");
        entries.insert(repo_root.to_path_buf(), cfg.clone());
        Ok(())
    }

    /// Drops any cached entry for `repo_root`, forcing the next `load` to
    /// re-read the file from disk.
    pub fn invalidate(&self, repo_root: &Path) {
        self.entries.lock().expect("config cache mutex poisoned").remove(repo_root);
    }
}

fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_FILE_NAME)
}

fn load_or_create(repo_root: &Path) -> Result<DryConfig> {
    let path = config_path(repo_root);
    if !path.exists() {
        if !repo_root.exists() {
            return Err(DryError::PathNotFound { path: repo_root.to_path_buf() });
        }
        let cfg = DryConfig::default();
        write_config(repo_root, &cfg)?;
        return Ok(cfg);
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| DryError::io(path.clone(), e))?;
    parse_config(&raw, &path)
}

fn parse_config(raw: &str, path: &Path) -> Result<DryConfig> {
    let cfg: DryConfig = serde_json::from_str(raw).map_err(|e| DryError::ConfigInvalid {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    validate(&cfg, path)?;
    Ok(cfg)
}

fn validate(cfg: &DryConfig, path: &Path) -> Result<()> {
    if !(0.0..=1.0).contains(&cfg.threshold) {
        return Err(DryError::ConfigInvalid {
            path: path.to_path_buf(),
            detail: format!("threshold must be in [0,1], got {}", cfg.threshold),
        });
    }
    if cfg.embedding_source != "huggingface"
        && !cfg.embedding_source.starts_with("http://")
        && !cfg.embedding_source.starts_with("https://")
    {
        return Err(DryError::ConfigInvalid {
            path: path.to_path_buf(),
            detail: format!(
                "embeddingSource must be \"huggingface\" or an http(s) URL, got {:?}",
                cfg.embedding_source
            ),
        });
    }
    for pattern in &cfg.excluded_paths {
        if globset::Glob::new(pattern).is_err() {
            return Err(DryError::ConfigInvalid {
                path: path.to_path_buf(),
                detail: format!("invalid glob in excludedPaths: {pattern:?}"),
            });
        }
    }
    Ok(())
}

fn write_config(repo_root: &Path, cfg: &DryConfig) -> Result<()> {
    std::fs::create_dir_all(repo_root).map_err(|e| DryError::io(repo_root.to_path_buf(), e))?;
    let path = config_path(repo_root);
    let json = serde_json::to_string_pretty(cfg)?;
    std::fs::write(&path, json).map_err(|e| DryError::io(path, e))?;
    Ok(())
}
