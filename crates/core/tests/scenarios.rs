//! End-to-end scenarios from the duplicate-engine design, one test per
//! literal case: identical functions, nested-block suppression, exclusion
//! cleanup, incremental re-index, DTO skipping, and the oversize-embedding
//! fallback to child blocks.

use std::fs;

use async_trait::async_trait;

use dryscan_core::cache::DuplicationCache;
use dryscan_core::config::ConfigCache;
use dryscan_core::embedding::EmbeddingProvider;
use dryscan_core::engine;
use dryscan_core::exclusion;
use dryscan_core::extractor::java::JavaExtractor;
use dryscan_core::extractor::ExtractorRegistry;
use dryscan_core::store::IndexStore;
use dryscan_core::types::{DryConfig, IndexUnit, UnitKind};
use dryscan_core::updater::IncrementalUpdater;
use dryscan_core::Result;

struct StubEmbedder;

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, _code: &str) -> Result<Option<Vec<f32>>> {
        Ok(Some(vec![1.0, 0.0]))
    }
}

fn registry() -> ExtractorRegistry {
    let mut r = ExtractorRegistry::new();
    r.register(Box::new(JavaExtractor::new().unwrap()));
    r
}

fn raw_unit(id: &str, name: &str, file_path: &str, kind: UnitKind, code: &str, start: u32, end: u32, parent_id: Option<&str>, embedding: Option<Vec<f32>>) -> IndexUnit {
    IndexUnit {
        id: id.to_string(),
        name: name.to_string(),
        file_path: file_path.to_string(),
        start_line: start,
        end_line: end,
        code: code.to_string(),
        kind,
        parent_id: parent_id.map(str::to_string),
        embedding,
        children: Vec::new(),
    }
}

/// Scenario 1: two identical functions, externally stubbed identical
/// embeddings, threshold 0.7 — exactly one FUNCTION group with
/// similarity 1.0 and the expected order-canonical exclusion string.
#[test]
fn two_identical_functions_form_one_group_with_canonical_exclusion_string() {
    let add = raw_unit("function:add:1-3", "add", "Calc.java", UnitKind::Function, "int add(int a, int b) { return a + b; }", 1, 3, None, Some(vec![1.0, 0.0]));
    let sum = raw_unit("function:sum:1-3", "sum", "Calc.java", UnitKind::Function, "int sum(int x, int y) { return x + y; }", 1, 3, None, Some(vec![1.0, 0.0]));

    let arena = engine::build_arena(vec![add, sum]);
    let cache = DuplicationCache::new();
    let registry = registry();
    let config = DryConfig { threshold: 0.7, ..DryConfig::default() };

    let groups = engine::find_duplicates(&arena, &config, &cache, &registry);
    assert_eq!(groups.len(), 1);
    assert!((groups[0].similarity - 1.0).abs() < 1e-9);
    assert_eq!(groups[0].exclusion_string, "function|add(arity:2)|sum(arity:2)");
}

/// Scenario 2: an outer block (2-20) containing an inner block (5-10) in
/// the same file and function, identical stub embeddings — zero BLOCK
/// groups for the pair.
#[test]
fn nested_block_in_same_function_is_suppressed() {
    let outer = raw_unit("block:f:2-20", "block", "F.java", UnitKind::Block, "{ }", 2, 20, Some("function:f:1-21"), Some(vec![1.0, 0.0]));
    let inner = raw_unit("block:f:5-10", "block", "F.java", UnitKind::Block, "{ }", 5, 10, Some("function:f:1-21"), Some(vec![1.0, 0.0]));

    let arena = engine::build_arena(vec![outer, inner]);
    let cache = DuplicationCache::new();
    let registry = registry();
    let config = DryConfig { threshold: 0.1, ..DryConfig::default() };

    let groups = engine::find_duplicates(&arena, &config, &cache, &registry);
    assert!(groups.is_empty());
}

/// Scenario 3: an excludedPairs entry naming functions that don't exist in
/// the (empty) index is dropped; cleanExclusions reports removed:1, kept:0,
/// and persists an empty list.
#[test]
fn exclusion_cleanup_drops_dead_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open(dir.path()).unwrap();
    let registry = registry();
    let config_cache = ConfigCache::new();

    let mut config = config_cache.load(dir.path()).unwrap();
    config.excluded_pairs = vec!["function|foo(arity:0)|bar(arity:0)".to_string()];
    config_cache.save(dir.path(), &config).unwrap();

    let result = exclusion::clean_exclusions(dir.path(), &config_cache, &store, &registry).unwrap();
    assert_eq!(result.removed, 1);
    assert_eq!(result.kept, 0);
    assert!(config_cache.load(dir.path()).unwrap().excluded_pairs.is_empty());
}

/// Scenario 4: init a single-file repo, then add a third function and
/// re-run updateIndex — expect added:0, changed:1, deleted:0, unchanged:0,
/// and a FileRecord whose checksum matches the modified file.
#[tokio::test]
async fn incremental_update_detects_a_changed_file() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("Calc.java");
    fs::write(
        &file_path,
        "class Calc {\n  int add(int a, int b) {\n    int r = a + b;\n    return r;\n  }\n}\n",
    )
    .unwrap();

    let store = IndexStore::open(dir.path()).unwrap();
    let registry = registry();
    let embedder = StubEmbedder;
    let cache = DuplicationCache::new();
    let updater = IncrementalUpdater { root: dir.path(), store: &store, registry: &registry, embedder: &embedder, cache: &cache };
    let config = DryConfig::default();

    updater.init(&config).await.unwrap();

    // Touch mtime forward and add a third function.
    std::thread::sleep(std::time::Duration::from_millis(10));
    fs::write(
        &file_path,
        "class Calc {\n  int add(int a, int b) {\n    int r = a + b;\n    return r;\n  }\n  int sub(int a, int b) {\n    int r = a - b;\n    return r;\n  }\n}\n",
    )
    .unwrap();

    let summary = updater.update(&config).await.unwrap();
    assert_eq!(summary.added, 0);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.unchanged, 0);

    let record = store.get_file_record("Calc.java").unwrap().unwrap();
    let expected_checksum = dryscan_core::scanner::checksum(&file_path).unwrap();
    assert_eq!(record.checksum, expected_checksum);
}

/// Scenario 5: a pure DTO class (only fields plus trivial getters/setters)
/// is skipped entirely — neither the CLASS nor its accessor methods appear.
#[test]
fn pure_dto_class_produces_no_units() {
    let registry = registry();
    let config = DryConfig::default();
    let source = "class Point {\n  private int x;\n  private int y;\n\n  public int getX() {\n    return x;\n  }\n\n  public void setX(int x) {\n    this.x = x;\n  }\n}\n";

    let units = registry.extract("Point.java", source, &config).unwrap();
    assert!(units.is_empty());
}

/// Scenario 6: a function with no embedding (oversize skip) falls back to
/// child-block similarity for the FUNCTION comparison, and the underlying
/// BLOCK pair is independently reported as its own group.
#[test]
fn oversize_function_falls_back_to_child_block_similarity() {
    let block_a = raw_unit("block:fa:2-10", "block", "A.java", UnitKind::Block, "{ }", 2, 10, Some("function:fa:1-11"), Some(vec![1.0, 0.0]));
    let block_b = raw_unit("block:fb:2-10", "block", "B.java", UnitKind::Block, "{ }", 2, 10, Some("function:fb:1-11"), Some(vec![1.0, 0.0]));
    let mut fn_a = raw_unit("function:fa:1-11", "fa", "A.java", UnitKind::Function, "void fa() { /* oversize */ }", 1, 11, None, None);
    let mut fn_b = raw_unit("function:fb:1-11", "fb", "B.java", UnitKind::Function, "void fb() { /* oversize */ }", 1, 11, None, None);
    fn_a.children.push(block_a.id.clone());
    fn_b.children.push(block_b.id.clone());

    let arena = engine::build_arena(vec![fn_a, fn_b, block_a, block_b]);
    let cache = DuplicationCache::new();
    let registry = registry();
    let config = DryConfig { threshold: 0.5, ..DryConfig::default() };

    let groups = engine::find_duplicates(&arena, &config, &cache, &registry);

    let function_group = groups.iter().find(|g| g.left.kind == UnitKind::Function);
    assert!(function_group.is_some(), "expected the FUNCTION pair to be reported via child-block fallback");
    assert!((function_group.unwrap().similarity - 1.0).abs() < 1e-9);

    let block_group = groups.iter().find(|g| g.left.kind == UnitKind::Block);
    assert!(block_group.is_some(), "expected the underlying BLOCK pair to also be reported");
}
