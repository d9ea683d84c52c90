//! Pair identity scheme: order-canonical keys for same-kind unit pairs, and
//! order-independent matching against user-supplied exclusion patterns.
//!
//! Pure functions, no I/O. Nothing in `codescope-server` models this
//! directly; the glob-vs-exact split follows the same `globset` convention
//! `ignore_matcher.rs` uses for CLASS paths.

use globset::Glob;

use crate::types::UnitKind;

/// `"{kind}|{a}|{b}"` with `a,b` lexicographically sorted. `kind` must match
/// between the two units — callers are expected to have already grouped by
/// kind.
pub fn pair_key(kind: UnitKind, label_a: &str, label_b: &str) -> String {
    let (a, b) = if label_a <= label_b { (label_a, label_b) } else { (label_b, label_a) };
    format!("{}|{a}|{b}", kind.as_str())
}

/// A parsed pair key, either an actual emitted key or a user-supplied
/// exclusion pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPairKey {
    pub kind: UnitKind,
    pub left: String,
    pub right: String,
}

/// Parses `"{kind}|{a}|{b}"`, returning `None` for malformed input (wrong
/// field count or unrecognized kind).
pub fn parse_pair_key(key: &str) -> Option<ParsedPairKey> {
    let mut parts = key.splitn(3, '|');
    let kind_str = parts.next()?;
    let left = parts.next()?;
    let right = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let kind = match kind_str {
        "class" => UnitKind::Class,
        "function" => UnitKind::Function,
        "block" => UnitKind::Block,
        _ => return None,
    };
    Some(ParsedPairKey { kind, left: left.to_string(), right: right.to_string() })
}

/// Does the actual pair key `actual` match the user-supplied `pattern`
/// (itself a pair key string, but with glob semantics on CLASS labels)?
/// Both orientations of `actual`'s two labels are tried.
pub fn matches_pattern(actual: &ParsedPairKey, pattern: &ParsedPairKey) -> bool {
    if actual.kind != pattern.kind {
        return false;
    }
    let direct = label_matches(actual.kind, &actual.left, &pattern.left) && label_matches(actual.kind, &actual.right, &pattern.right);
    let swapped = label_matches(actual.kind, &actual.left, &pattern.right) && label_matches(actual.kind, &actual.right, &pattern.left);
    direct || swapped
}

fn label_matches(kind: UnitKind, actual_label: &str, pattern_label: &str) -> bool {
    match kind {
        UnitKind::Class => match Glob::new(pattern_label) {
            Ok(glob) => glob.compile_matcher().is_match(actual_label),
            // An invalid glob in a FUNCTION/BLOCK-style literal is treated
            // as an exact-match pattern rather than a hard error here.
            Err(_) => actual_label == pattern_label,
        },
        UnitKind::Function | UnitKind::Block => actual_label == pattern_label,
    }
}
