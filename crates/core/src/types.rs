//! Data model shared by every component: [`IndexUnit`], [`FileRecord`],
//! [`DryConfig`] and the report-facing [`DuplicateGroup`]/[`DuplicationScore`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitKind {
    Class,
    Function,
    Block,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Class => "class",
            UnitKind::Function => "function",
            UnitKind::Block => "block",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single indexed code fragment: a class, a function/method, or a block
/// nested inside one. `children` is populated only after the store
/// reconstructs the in-memory arena on load — it is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexUnit {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub code: String,
    pub kind: UnitKind,
    pub parent_id: Option<String>,
    pub embedding: Option<Vec<f32>>,
    #[serde(skip)]
    pub children: Vec<String>,
}

impl IndexUnit {
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }

    /// `"{kind}:{qualified_name}:{startLine}-{endLine}"`.
    pub fn make_id(kind: UnitKind, qualified_name: &str, start_line: u32, end_line: u32) -> String {
        format!("{kind}:{qualified_name}:{start_line}-{end_line}")
    }
}

/// A tracked source file: checksum and mtime drive the incremental diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_path: String,
    pub checksum: String,
    pub mtime: i64,
}

fn default_excluded_paths() -> Vec<String> {
    vec!["**/test/**".to_string()]
}

fn default_min_lines() -> u32 {
    3
}

fn default_min_block_lines() -> u32 {
    5
}

fn default_threshold() -> f64 {
    0.85
}

fn default_embedding_source() -> String {
    "huggingface".to_string()
}

fn default_context_length() -> usize {
    2048
}

/// `dryconfig.json`'s schema. Unknown top-level keys are rejected by
/// `deny_unknown_fields` — see [`crate::config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DryConfig {
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub excluded_pairs: Vec<String>,
    #[serde(default = "default_min_lines")]
    pub min_lines: u32,
    #[serde(default = "default_min_block_lines")]
    pub min_block_lines: u32,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_embedding_source")]
    pub embedding_source: String,
    #[serde(default = "default_context_length")]
    pub context_length: usize,
}

impl Default for DryConfig {
    fn default() -> Self {
        DryConfig {
            excluded_paths: default_excluded_paths(),
            excluded_pairs: Vec::new(),
            min_lines: default_min_lines(),
            min_block_lines: default_min_block_lines(),
            threshold: default_threshold(),
            embedding_source: default_embedding_source(),
            context_length: default_context_length(),
        }
    }
}

/// One side of an emitted duplicate pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSide {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub code: String,
    pub kind: UnitKind,
}

impl From<&IndexUnit> for DuplicateSide {
    fn from(u: &IndexUnit) -> Self {
        DuplicateSide {
            id: u.id.clone(),
            name: u.name.clone(),
            file_path: u.file_path.clone(),
            start_line: u.start_line,
            end_line: u.end_line,
            code: u.code.clone(),
            kind: u.kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub id: String,
    pub similarity: f64,
    pub short_id: String,
    pub exclusion_string: String,
    pub left: DuplicateSide,
    pub right: DuplicateSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl Grade {
    pub fn for_score(score: f64) -> Grade {
        if score < 5.0 {
            Grade::Excellent
        } else if score < 15.0 {
            Grade::Good
        } else if score < 30.0 {
            Grade::Fair
        } else if score < 50.0 {
            Grade::Poor
        } else {
            Grade::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent",
            Grade::Good => "Good",
            Grade::Fair => "Fair",
            Grade::Poor => "Poor",
            Grade::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicationScore {
    pub score: f64,
    pub grade: Grade,
    pub total_lines: u64,
    pub duplicate_lines: u64,
    pub duplicate_groups: usize,
}

impl DuplicationScore {
    pub fn compute(total_lines: u64, groups: &[DuplicateGroup], line_lookup: impl Fn(&str) -> Option<u32>) -> Self {
        let mut weighted = 0.0f64;
        for g in groups {
            let left_lines = line_lookup(&g.left.id).unwrap_or(g.left.end_line - g.left.start_line + 1) as f64;
            let right_lines = line_lookup(&g.right.id).unwrap_or(g.right.end_line - g.right.start_line + 1) as f64;
            weighted += g.similarity * (left_lines + right_lines) / 2.0;
        }
        let score = if total_lines == 0 || groups.is_empty() {
            0.0
        } else {
            100.0 * weighted / total_lines as f64
        };
        DuplicationScore {
            score,
            grade: Grade::for_score(score),
            total_lines,
            duplicate_lines: weighted.round() as u64,
            duplicate_groups: groups.len(),
        }
    }
}

/// Result of [`crate::updater::IncrementalUpdater::update`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub added: usize,
    pub changed: usize,
    pub deleted: usize,
    pub unchanged: usize,
}
