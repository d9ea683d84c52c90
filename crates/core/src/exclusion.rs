//! Exclusion service: keeps the store free of units under `excludedPaths`,
//! and prunes `excludedPairs` entries that no longer name any pair the
//! current index could produce.
//!
//! Nothing in `codescope-server` models this directly; built on the same
//! `globset`/exact-match convention `pairing.rs` already establishes.

use std::collections::HashSet;
use std::path::Path;

use globset::{Glob, GlobSetBuilder};

use crate::error::Result;
use crate::extractor::ExtractorRegistry;
use crate::pairing;
use crate::store::IndexStore;
use crate::types::{IndexUnit, UnitKind};

/// Removes every unit and FileRecord whose path matches `excluded_paths`.
/// Run after init/update so the store never holds excluded data.
pub fn cleanup_excluded_files(store: &IndexStore, excluded_paths: &[String]) -> Result<usize> {
    let mut builder = GlobSetBuilder::new();
    for pattern in excluded_paths {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    let Ok(globset) = builder.build() else { return Ok(0) };

    let units = store.list_units()?;
    let doomed: HashSet<String> = units
        .iter()
        .map(|u| u.file_path.clone())
        .filter(|path| globset.is_match(path))
        .collect();
    if doomed.is_empty() {
        return Ok(0);
    }

    let removed = store.delete_units_by_files(&doomed)?;
    for path in &doomed {
        store.delete_file_record(path)?;
    }
    Ok(removed)
}

pub struct CleanExclusionsResult {
    pub kept: usize,
    pub removed: usize,
}

/// Every live pair key the current index could produce, per kind: all
/// distinct-label combinations among same-kind units, independent of
/// similarity threshold — exclusion patterns may predate a pair actually
/// crossing threshold.
///
/// A label shared by two or more units (e.g. two non-DTO classes in the same
/// file, both labeled by `file_path`) still yields a same-label self-pair —
/// `engine::find_duplicates` pairs units by index, not by deduped label, so
/// it can and does emit a group for exactly that pair.
fn live_pair_keys(units: &[IndexUnit], registry: &ExtractorRegistry) -> Vec<pairing::ParsedPairKey> {
    let mut counts_by_kind: std::collections::HashMap<UnitKind, std::collections::HashMap<String, usize>> = std::collections::HashMap::new();
    for unit in units {
        *counts_by_kind.entry(unit.kind).or_default().entry(registry.label(unit)).or_insert(0) += 1;
    }

    let mut keys = Vec::new();
    for (kind, counts) in counts_by_kind {
        let mut labels: Vec<&String> = counts.keys().collect();
        labels.sort();
        for i in 0..labels.len() {
            for j in (i + 1)..labels.len() {
                let key = pairing::pair_key(kind, labels[i], labels[j]);
                if let Some(parsed) = pairing::parse_pair_key(&key) {
                    keys.push(parsed);
                }
            }
            if counts[labels[i]] >= 2 {
                let key = pairing::pair_key(kind, labels[i], labels[i]);
                if let Some(parsed) = pairing::parse_pair_key(&key) {
                    keys.push(parsed);
                }
            }
        }
    }
    keys
}

/// Partitions `config.excluded_pairs` into those still matching at least one
/// live pair (kept) and the rest (removed), persisting the kept list.
pub fn clean_exclusions(repo_root: &Path, config_cache: &crate::config::ConfigCache, store: &IndexStore, registry: &ExtractorRegistry) -> Result<CleanExclusionsResult> {
    let mut config = config_cache.load(repo_root)?;
    let units = store.list_units()?;
    let live_keys = live_pair_keys(&units, registry);

    let mut kept_patterns = Vec::new();
    let mut removed = 0usize;

    for pattern_str in &config.excluded_pairs {
        let Some(pattern) = pairing::parse_pair_key(pattern_str) else {
            removed += 1;
            continue;
        };
        let still_live = live_keys.iter().any(|key| pairing::matches_pattern(key, &pattern));
        if still_live {
            kept_patterns.push(pattern_str.clone());
        } else {
            removed += 1;
        }
    }

    let kept = kept_patterns.len();
    config.excluded_pairs = kept_patterns;
    config_cache.save(repo_root, &config)?;

    Ok(CleanExclusionsResult { kept, removed })
}
