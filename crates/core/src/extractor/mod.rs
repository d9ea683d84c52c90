//! Polymorphic extractor capability: `supports`, `extract`, `label`.
//!
//! Modeled as a trait-object variant set per the "polymorphic extractors"
//! design note — registration is static, no dynamic plugin loading.
//! Grounded on `codescope-server/src/ast.rs`'s `classify_node`/`walk_node`
//! recursive-descent shape, retargeted from symbol-cataloguing to the
//! CLASS/FUNCTION/BLOCK unit extraction this crate needs.

pub mod java;

use crate::error::Result;
use crate::types::{DryConfig, IndexUnit};

/// Minimum BLOCK line count regardless of `config.min_block_lines`.
pub const BLOCK_MIN_LINES_CONSTANT: u32 = 5;

/// A language's extraction capability: which files it claims, how it turns
/// source text into [`IndexUnit`]s, and how it derives a unit's pairing
/// label.
pub trait LanguageExtractor: Send + Sync {
    /// Does this extractor claim `rel_path` (by extension)?
    fn supports(&self, rel_path: &str) -> bool;

    /// Parse `source` and yield the file's units, applying triviality and
    /// DTO skipping per `config`.
    fn extract(&self, rel_path: &str, source: &str, config: &DryConfig) -> Result<Vec<IndexUnit>>;

    /// Canonical pairing label for `unit` (§4.6/§4.2 labeling function).
    fn label(&self, unit: &IndexUnit) -> String;
}

/// Static set of registered extractors, consulted in registration order.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn LanguageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Box<dyn LanguageExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn supports(&self, rel_path: &str) -> bool {
        self.extractors.iter().any(|e| e.supports(rel_path))
    }

    fn find(&self, rel_path: &str) -> Option<&dyn LanguageExtractor> {
        self.extractors.iter().find(|e| e.supports(rel_path)).map(|b| b.as_ref())
    }

    pub fn extract(&self, rel_path: &str, source: &str, config: &DryConfig) -> Result<Vec<IndexUnit>> {
        match self.find(rel_path) {
            Some(extractor) => extractor.extract(rel_path, source, config),
            None => Ok(Vec::new()),
        }
    }

    pub fn label(&self, unit: &IndexUnit) -> String {
        match self.find(&unit.file_path) {
            Some(extractor) => extractor.label(unit),
            None => unit.id.clone(),
        }
    }
}

/// Parameter count parsed from the text preceding the first `{` in a
/// function unit's code, per the FUNCTION labeling rule: count commas in the
/// parenthesized parameter list, treating an empty list as arity 0.
pub fn parse_arity(code: &str) -> usize {
    let head = code.find('{').map(|i| &code[..i]).unwrap_or(code);
    let open = match head.find('(') {
        Some(i) => i,
        None => return 0,
    };
    let close = match head.rfind(')') {
        Some(i) if i > open => i,
        _ => return 0,
    };
    let params = head[open + 1..close].trim();
    if params.is_empty() {
        0
    } else {
        params.split(',').count()
    }
}

/// Getter/setter simple-name patterns that make a FUNCTION trivial.
pub fn is_trivial_accessor_name(name: &str) -> bool {
    is_getter_name(name) || is_setter_name(name)
}

fn is_getter_name(name: &str) -> bool {
    for prefix in ["get", "is"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return true;
            }
        }
    }
    false
}

fn is_setter_name(name: &str) -> bool {
    if let Some(rest) = name.strip_prefix("set") {
        return rest.starts_with(|c: char| c.is_ascii_uppercase());
    }
    false
}
