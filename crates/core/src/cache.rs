//! Process-scoped duplication cache: similarities keyed by unordered unit-id
//! pair, guarded by a file-membership index so invalidation is precise and
//! O(1) per path.
//!
//! Grounded on `codescope-server/src/types.rs`'s `RepoState` concurrency
//! primitive, a `dashmap`-backed per-repo cache, generalized here from
//! whole-repo stub caching to a pair-keyed similarity cache with reverse
//! file-membership tracking.

use dashmap::{DashMap, DashSet};

type PairKey = (String, String);

#[derive(Default)]
pub struct DuplicationCache {
    similarities: DashMap<PairKey, f64>,
    file_index: DashMap<String, DashSet<PairKey>>,
}

impl DuplicationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(left_id: &str, right_id: &str) -> PairKey {
        if left_id <= right_id {
            (left_id.to_string(), right_id.to_string())
        } else {
            (right_id.to_string(), left_id.to_string())
        }
    }

    /// Returns the cached similarity only if the file-membership index still
    /// records both `left_path` and `right_path` for this pair — a stale
    /// entry (one side's file since re-indexed) is treated as a miss.
    pub fn get(&self, left_id: &str, right_id: &str, left_path: &str, right_path: &str) -> Option<f64> {
        let key = Self::key(left_id, right_id);
        let left_valid = self.file_index.get(left_path).is_some_and(|set| set.contains(&key));
        let right_valid = self.file_index.get(right_path).is_some_and(|set| set.contains(&key));
        if !left_valid || !right_valid {
            return None;
        }
        self.similarities.get(&key).map(|v| *v)
    }

    pub fn put(&self, left_id: &str, right_id: &str, left_path: &str, right_path: &str, similarity: f64) {
        let key = Self::key(left_id, right_id);
        self.similarities.insert(key.clone(), similarity);
        self.file_index.entry(left_path.to_string()).or_default().insert(key.clone());
        self.file_index.entry(right_path.to_string()).or_default().insert(key);
    }

    /// Drops every cached similarity that involves `path`, on either side.
    pub fn invalidate_file(&self, path: &str) {
        if let Some((_, keys)) = self.file_index.remove(path) {
            for key in keys.iter() {
                self.similarities.remove(&*key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.similarities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.similarities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_after_put() {
        let cache = DuplicationCache::new();
        cache.put("a", "b", "A.java", "B.java", 0.9);
        assert_eq!(cache.get("a", "b", "A.java", "B.java"), Some(0.9));
        assert_eq!(cache.get("b", "a", "B.java", "A.java"), Some(0.9));
    }

    #[test]
    fn invalidation_is_precise_per_file() {
        let cache = DuplicationCache::new();
        cache.put("a", "b", "A.java", "B.java", 0.9);
        cache.put("a", "c", "A.java", "C.java", 0.5);

        cache.invalidate_file("B.java");

        assert_eq!(cache.get("a", "b", "A.java", "B.java"), None);
        assert_eq!(cache.get("a", "c", "A.java", "C.java"), Some(0.5));
    }

    #[test]
    fn miss_for_unknown_pair() {
        let cache = DuplicationCache::new();
        assert_eq!(cache.get("x", "y", "X.java", "Y.java"), None);
    }
}
