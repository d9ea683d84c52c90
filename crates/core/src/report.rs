//! Report service: bundles duplicates + score into a timestamped artifact,
//! and supports loading the latest one and applying an exclusion by its
//! short id.
//!
//! Nothing in `codescope-server` writes a report artifact like this; the
//! `chrono`+`uuid` combination used here for the timestamp and short id is
//! the same one several other manifests in this corpus reach for.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DryError, Result};
use crate::pairing;
use crate::types::{DryConfig, DuplicateGroup, DuplicationScore, Grade};

const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub version: u32,
    pub generated_at: String,
    pub threshold: f64,
    pub grade: Grade,
    pub score: DuplicationScore,
    pub duplicates: Vec<DuplicateGroup>,
}

fn reports_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".dry").join("reports")
}

/// Assigns a fresh `shortId` to every group, bundles with `score`, and
/// writes `.dry/reports/dupes-{safeTimestamp}.json`.
pub fn generate(repo_root: &Path, config: &DryConfig, mut duplicates: Vec<DuplicateGroup>, score: DuplicationScore) -> Result<Report> {
    for group in &mut duplicates {
        group.short_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    }

    let generated_at = Utc::now().to_rfc3339();
    let report = Report {
        version: REPORT_VERSION,
        generated_at: generated_at.clone(),
        threshold: config.threshold,
        grade: score.grade,
        score,
        duplicates,
    };

    let dir = reports_dir(repo_root);
    std::fs::create_dir_all(&dir).map_err(|e| DryError::io(dir.clone(), e))?;
    let safe_timestamp = generated_at.replace(':', "-").replace('.', "-");
    let path = dir.join(format!("dupes-{safe_timestamp}.json"));
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, json).map_err(|e| DryError::io(path, e))?;

    Ok(report)
}

/// Selects the report file with the greatest mtime in `.dry/reports/`.
pub fn load_latest(repo_root: &Path) -> Result<Report> {
    let dir = reports_dir(repo_root);
    let entries = std::fs::read_dir(&dir).map_err(|_| DryError::ReportMissing { dir: dir.clone() })?;

    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(modified) = meta.modified() else { continue };
        let is_newer = match &latest {
            Some((mtime, _)) => modified > *mtime,
            None => true,
        };
        if is_newer {
            latest = Some((modified, path));
        }
    }

    let (_, path) = latest.ok_or_else(|| DryError::ReportMissing { dir: dir.clone() })?;
    let raw = std::fs::read_to_string(&path).map_err(|e| DryError::io(path.clone(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

pub struct ApplyExclusionOutcome {
    pub exclusion: String,
    pub added: bool,
}

/// Reads the latest report, finds the group by `short_id`, appends its
/// `exclusionString` to `config.excluded_pairs` if absent, and persists.
pub fn apply_exclusion_from_latest_report(
    repo_root: &Path,
    config_cache: &crate::config::ConfigCache,
    short_id: &str,
) -> Result<ApplyExclusionOutcome> {
    let report = load_latest(repo_root)?;
    let group = report
        .duplicates
        .iter()
        .find(|g| g.short_id == short_id)
        .ok_or_else(|| DryError::ShortIdUnknown(short_id.to_string()))?;

    let exclusion = group.exclusion_string.clone();
    let mut config = config_cache.load(repo_root)?;

    let already_present = pairing::parse_pair_key(&exclusion).is_some_and(|candidate| {
        config
            .excluded_pairs
            .iter()
            .filter_map(|s| pairing::parse_pair_key(s))
            .any(|existing| pairing::matches_pattern(&candidate, &existing))
    });

    let added = !already_present;
    if added {
        config.excluded_pairs.push(exclusion.clone());
        config_cache.save(repo_root, &config)?;
    }

    Ok(ApplyExclusionOutcome { exclusion, added })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigCache;
    use crate::types::{DuplicateSide, UnitKind};

    fn group(id: &str, similarity: f64, exclusion: &str) -> DuplicateGroup {
        DuplicateGroup {
            id: id.to_string(),
            similarity,
            short_id: String::new(),
            exclusion_string: exclusion.to_string(),
            left: DuplicateSide {
                id: "left".to_string(),
                name: "add".to_string(),
                file_path: "Add.java".to_string(),
                start_line: 1,
                end_line: 3,
                code: "add(arity:2) { }".to_string(),
                kind: UnitKind::Function,
            },
            right: DuplicateSide {
                id: "right".to_string(),
                name: "sum".to_string(),
                file_path: "Sum.java".to_string(),
                start_line: 1,
                end_line: 3,
                code: "sum(arity:2) { }".to_string(),
                kind: UnitKind::Function,
            },
        }
    }

    #[test]
    fn generate_then_load_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = DryConfig::default();
        let score = DuplicationScore::compute(10, &[], |_| None);
        let report = generate(dir.path(), &config, vec![group("a::b", 0.9, "function|add(arity:2)|sum(arity:2)")], score).unwrap();
        assert_eq!(report.duplicates[0].short_id.len(), 8);

        let loaded = load_latest(dir.path()).unwrap();
        assert_eq!(loaded.duplicates[0].exclusion_string, "function|add(arity:2)|sum(arity:2)");
    }

    #[test]
    fn apply_exclusion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config_cache = ConfigCache::new();
        config_cache.load(dir.path()).unwrap();
        let config = DryConfig::default();
        let score = DuplicationScore::compute(10, &[], |_| None);
        let report = generate(dir.path(), &config, vec![group("a::b", 0.9, "function|add(arity:2)|sum(arity:2)")], score).unwrap();
        let short_id = report.duplicates[0].short_id.clone();

        let first = apply_exclusion_from_latest_report(dir.path(), &config_cache, &short_id).unwrap();
        assert!(first.added);
        let second = apply_exclusion_from_latest_report(dir.path(), &config_cache, &short_id).unwrap();
        assert!(!second.added);
    }

    #[test]
    fn unknown_short_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_cache = ConfigCache::new();
        config_cache.load(dir.path()).unwrap();
        let config = DryConfig::default();
        let score = DuplicationScore::compute(10, &[], |_| None);
        generate(dir.path(), &config, vec![group("a::b", 0.9, "function|add(arity:2)|sum(arity:2)")], score).unwrap();

        let err = apply_exclusion_from_latest_report(dir.path(), &config_cache, "nope").unwrap_err();
        assert_eq!(err.kind(), "ShortIdUnknown");
    }
}
