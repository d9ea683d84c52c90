//! Duplicate engine: weighted similarity over same-kind unit pairs, pruning,
//! the duplication cache, exclusion filtering, and score computation.
//!
//! Pure computation over the in-memory unit arena — `rayon` fans out the
//! pairwise comparisons the way `codescope-server`'s heaviest computations
//! (`semantic.rs::encode_batch`, `build_ast_index`) are all rayon-parallel.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::cache::DuplicationCache;
use crate::embedding::cosine_similarity;
use crate::extractor::ExtractorRegistry;
use crate::pairing::{self, ParsedPairKey};
use crate::types::{DryConfig, DuplicateGroup, DuplicateSide, DuplicationScore, IndexUnit, UnitKind};

/// Default threshold offsets for CLASS/BLOCK relative to the configured
/// FUNCTION threshold. The reference defaults are equal (offset 0), but the
/// scheme is kept so a future defaults table with genuine spread needs no
/// engine change.
const CLASS_THRESHOLD_OFFSET: f64 = 0.0;
const BLOCK_THRESHOLD_OFFSET: f64 = 0.0;

pub fn threshold_for(kind: UnitKind, function_threshold: f64) -> f64 {
    let offset = match kind {
        UnitKind::Function => 0.0,
        UnitKind::Class => CLASS_THRESHOLD_OFFSET,
        UnitKind::Block => BLOCK_THRESHOLD_OFFSET,
    };
    (function_threshold + offset).clamp(0.0, 1.0)
}

pub type Arena = HashMap<String, IndexUnit>;

pub fn build_arena(units: Vec<IndexUnit>) -> Arena {
    units.into_iter().map(|u| (u.id.clone(), u)).collect()
}

fn find_ancestor<'a>(unit: &IndexUnit, kind: UnitKind, arena: &'a Arena) -> Option<&'a IndexUnit> {
    let mut current = unit.parent_id.as_ref().and_then(|id| arena.get(id));
    while let Some(node) = current {
        if node.kind == kind {
            return Some(node);
        }
        current = node.parent_id.as_ref().and_then(|id| arena.get(id));
    }
    None
}

/// Cosine of the two embeddings if both exist; otherwise the best
/// cross-product of the units' children's similarities (`0.0` if either
/// side has no children — an unreachable emission edge for any positive
/// threshold, per spec's own formal-edge note).
fn self_similarity(a: &IndexUnit, b: &IndexUnit, arena: &Arena) -> f64 {
    if let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) {
        return cosine_similarity(ea, eb);
    }
    let mut best = 0.0f64;
    for child_a_id in &a.children {
        let Some(child_a) = arena.get(child_a_id) else { continue };
        for child_b_id in &b.children {
            let Some(child_b) = arena.get(child_b_id) else { continue };
            if let (Some(ea), Some(eb)) = (&child_a.embedding, &child_b.embedding) {
                let sim = cosine_similarity(ea, eb);
                if sim > best {
                    best = sim;
                }
            }
        }
    }
    best
}

/// Weighted composition per kind, re-normalizing by the active weights' sum
/// whenever a parent-context term is unavailable on either side.
fn weighted_similarity(a: &IndexUnit, b: &IndexUnit, arena: &Arena) -> f64 {
    match a.kind {
        UnitKind::Class => self_similarity(a, b, arena),
        UnitKind::Function => {
            let self_sim = self_similarity(a, b, arena);
            let parent_a = find_ancestor(a, UnitKind::Class, arena);
            let parent_b = find_ancestor(b, UnitKind::Class, arena);
            match (parent_a, parent_b) {
                (Some(pa), Some(pb)) => {
                    let parent_sim = self_similarity(pa, pb, arena);
                    0.8 * self_sim + 0.2 * parent_sim
                }
                _ => self_sim,
            }
        }
        UnitKind::Block => {
            let self_sim = self_similarity(a, b, arena);
            let mut weighted_sum = 0.7 * self_sim;
            let mut total_weight = 0.7;

            let parent_fn_a = a.parent_id.as_ref().and_then(|id| arena.get(id));
            let parent_fn_b = b.parent_id.as_ref().and_then(|id| arena.get(id));
            if let (Some(pfa), Some(pfb)) = (parent_fn_a, parent_fn_b) {
                let sim = self_similarity(pfa, pfb, arena);
                weighted_sum += 0.2 * sim;
                total_weight += 0.2;
            }

            let parent_class_a = find_ancestor(a, UnitKind::Class, arena);
            let parent_class_b = find_ancestor(b, UnitKind::Class, arena);
            if let (Some(pca), Some(pcb)) = (parent_class_a, parent_class_b) {
                let sim = self_similarity(pca, pcb, arena);
                weighted_sum += 0.1 * sim;
                total_weight += 0.1;
            }

            weighted_sum / total_weight
        }
    }
}

/// One block lexically contains the other within the same file.
fn blocks_nested(a: &IndexUnit, b: &IndexUnit) -> bool {
    if a.file_path != b.file_path {
        return false;
    }
    let a_contains_b = a.start_line <= b.start_line && a.end_line >= b.end_line;
    let b_contains_a = b.start_line <= a.start_line && b.end_line >= a.end_line;
    a_contains_b || b_contains_a
}

fn orient<'a>(a: &'a IndexUnit, b: &'a IndexUnit) -> (&'a IndexUnit, &'a IndexUnit) {
    if a.id <= b.id {
        (a, b)
    } else {
        (b, a)
    }
}

/// Runs the duplicate scan over every same-kind pair in `arena`, consulting
/// and then populating `cache` with every emitted group's similarity, and
/// dropping pairs matched by `config.excluded_pairs`. Output is sorted by
/// descending similarity.
pub fn find_duplicates(arena: &Arena, config: &DryConfig, cache: &DuplicationCache, registry: &ExtractorRegistry) -> Vec<DuplicateGroup> {
    let excluded: Vec<ParsedPairKey> = config.excluded_pairs.iter().filter_map(|s| pairing::parse_pair_key(s)).collect();

    let mut by_kind: HashMap<UnitKind, Vec<&IndexUnit>> = HashMap::new();
    for unit in arena.values() {
        by_kind.entry(unit.kind).or_default().push(unit);
    }

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for (kind, units) in by_kind {
        let threshold = threshold_for(kind, config.threshold);
        let mut pairs = Vec::new();
        for i in 0..units.len() {
            for j in (i + 1)..units.len() {
                pairs.push((i, j));
            }
        }

        let kind_groups: Vec<(String, String, f64, DuplicateGroup)> = pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                let a = units[i];
                let b = units[j];

                if kind == UnitKind::Block && blocks_nested(a, b) {
                    return None;
                }

                let (left, right) = orient(a, b);
                let similarity = cache
                    .get(&left.id, &right.id, &left.file_path, &right.file_path)
                    .unwrap_or_else(|| weighted_similarity(left, right, arena));

                if similarity < threshold {
                    return None;
                }

                let label_left = registry.label(left);
                let label_right = registry.label(right);
                let exclusion_string = pairing::pair_key(kind, &label_left, &label_right);

                let group = DuplicateGroup {
                    id: format!("{}::{}", left.id, right.id),
                    similarity,
                    short_id: String::new(),
                    exclusion_string,
                    left: DuplicateSide::from(left),
                    right: DuplicateSide::from(right),
                };
                Some((left.id.clone(), right.id.clone(), similarity, group))
            })
            .collect();

        for (left_id, right_id, similarity, group) in kind_groups {
            let parsed = pairing::parse_pair_key(&group.exclusion_string);
            let is_excluded = parsed.is_some_and(|key| excluded.iter().any(|pattern| pairing::matches_pattern(&key, pattern)));
            if is_excluded {
                continue;
            }
            cache.put(&left_id, &right_id, &group.left.file_path, &group.right.file_path, similarity);
            groups.push(group);
        }
    }

    groups.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    groups
}

pub fn compute_score(arena: &Arena, groups: &[DuplicateGroup]) -> DuplicationScore {
    let total_lines: u64 = arena.values().map(|u| u.line_count() as u64).sum();
    DuplicationScore::compute(total_lines, groups, |id| arena.get(id).map(IndexUnit::line_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::java::JavaExtractor;

    fn unit(id: &str, name: &str, file_path: &str, kind: UnitKind, start: u32, end: u32, parent: Option<&str>, embedding: Option<Vec<f32>>) -> IndexUnit {
        IndexUnit {
            id: id.to_string(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            start_line: start,
            end_line: end,
            code: format!("{name}(arity:0) {{ }}"),
            kind,
            parent_id: parent.map(str::to_string),
            embedding,
            children: Vec::new(),
        }
    }

    fn registry() -> ExtractorRegistry {
        let mut r = ExtractorRegistry::new();
        r.register(Box::new(JavaExtractor::new().unwrap()));
        r
    }

    #[test]
    fn identical_function_embeddings_form_one_group() {
        let a = unit("function:add:1-3", "Add.add", "Add.java", UnitKind::Function, 1, 3, None, Some(vec![1.0, 0.0]));
        let b = unit("function:sum:1-3", "Sum.sum", "Sum.java", UnitKind::Function, 1, 3, None, Some(vec![1.0, 0.0]));
        let arena = build_arena(vec![a, b]);
        let cache = DuplicationCache::new();
        let reg = registry();
        let cfg = DryConfig { threshold: 0.7, ..DryConfig::default() };

        let groups = find_duplicates(&arena, &cfg, &cache, &reg);
        assert_eq!(groups.len(), 1);
        assert!((groups[0].similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nested_blocks_in_same_file_are_pruned() {
        let outer = unit("block:f:2-20", "block", "F.java", UnitKind::Block, 2, 20, Some("function:f:1-21"), Some(vec![1.0, 0.0]));
        let inner = unit("block:f:5-10", "block", "F.java", UnitKind::Block, 5, 10, Some("function:f:1-21"), Some(vec![1.0, 0.0]));
        let arena = build_arena(vec![outer, inner]);
        let cache = DuplicationCache::new();
        let reg = registry();
        let cfg = DryConfig { threshold: 0.1, ..DryConfig::default() };

        let groups = find_duplicates(&arena, &cfg, &cache, &reg);
        assert!(groups.is_empty());
    }

    #[test]
    fn score_is_zero_with_no_groups() {
        let arena = build_arena(vec![unit("a", "A", "A.java", UnitKind::Class, 1, 10, None, None)]);
        let score = compute_score(&arena, &[]);
        assert_eq!(score.score, 0.0);
        assert_eq!(score.grade.as_str(), "Excellent");
    }

    #[test]
    fn groups_sorted_descending_by_similarity() {
        let a = unit("function:a:1-3", "A.a", "A.java", UnitKind::Function, 1, 3, None, Some(vec![1.0, 0.0]));
        let b = unit("function:b:1-3", "B.b", "B.java", UnitKind::Function, 1, 3, None, Some(vec![0.9, 0.1]));
        let c = unit("function:c:1-3", "C.c", "C.java", UnitKind::Function, 1, 3, None, Some(vec![1.0, 0.0]));
        let arena = build_arena(vec![a, b, c]);
        let cache = DuplicationCache::new();
        let reg = registry();
        let cfg = DryConfig { threshold: 0.5, ..DryConfig::default() };

        let groups = find_duplicates(&arena, &cfg, &cache, &reg);
        for pair in groups.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }
}
