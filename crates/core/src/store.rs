//! Persistence layer: two `sled` trees (`units`, `files`), values serialized
//! with `bincode`. Parent/child relations are reconstructed into an
//! in-memory arena on load — no unit owns or is owned by another, per the
//! arena-by-id design note.
//!
//! `codescope-server` holds everything in-process and has no store of its
//! own, so this embedded-KV-store approach is adapted from the wider
//! ecosystem convention instead (`sled` appears in
//! `Rubentxu-code-context-graph`; `bincode` across several manifests).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tokio::sync::Mutex;

use crate::error::{DryError, Result};
use crate::types::{FileRecord, IndexUnit};

pub struct IndexStore {
    units: sled::Tree,
    files: sled::Tree,
    db: sled::Db,
    /// Serializes the update pipeline's writes per spec §5's "single write
    /// connection at a time" resource model. Reads never take this.
    write_lock: Mutex<()>,
}

impl IndexStore {
    /// Opens (creating if absent) `{repoRoot}/.dry/index.db`.
    pub fn open(repo_root: &Path) -> Result<Self> {
        let dry_dir = repo_root.join(".dry");
        std::fs::create_dir_all(&dry_dir).map_err(|e| DryError::io(dry_dir.clone(), e))?;
        let db_path = dry_dir.join("index.db");
        let db = sled::open(&db_path)?;
        let units = db.open_tree("units")?;
        let files = db.open_tree("files")?;
        Ok(IndexStore { units, files, db, write_lock: Mutex::new(()) })
    }

    pub async fn lock_for_write(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub fn save_units(&self, units: &[IndexUnit]) -> Result<()> {
        for unit in units {
            let bytes = bincode::serialize(unit)?;
            self.units.insert(unit.id.as_bytes(), bytes)?;
        }
        self.units.flush()?;
        Ok(())
    }

    pub fn save_unit(&self, unit: &IndexUnit) -> Result<()> {
        self.save_units(std::slice::from_ref(unit))
    }

    /// Fetches a single unit, with `children` populated from a scan of the
    /// rest of the tree (relation-aware load per spec §4.4).
    pub fn get_unit(&self, id: &str) -> Result<Option<IndexUnit>> {
        let Some(bytes) = self.units.get(id.as_bytes())? else {
            return Ok(None);
        };
        let mut unit: IndexUnit = bincode::deserialize(&bytes)?;
        unit.children = self.child_ids_of(&unit.id)?;
        Ok(Some(unit))
    }

    fn child_ids_of(&self, parent_id: &str) -> Result<Vec<String>> {
        let mut children = Vec::new();
        for item in self.units.iter() {
            let (_, bytes) = item?;
            let candidate: IndexUnit = bincode::deserialize(&bytes)?;
            if candidate.parent_id.as_deref() == Some(parent_id) {
                children.push(candidate.id);
            }
        }
        Ok(children)
    }

    /// Loads every unit, reconstructing the parent → children arena in one
    /// pass instead of the O(nΒ²) `get_unit` + `child_ids_of` combination.
    pub fn list_units(&self) -> Result<Vec<IndexUnit>> {
        let mut units: Vec<IndexUnit> = Vec::with_capacity(self.units.len());
        for item in self.units.iter() {
            let (_, bytes) = item?;
            units.push(bincode::deserialize(&bytes)?);
        }

        let mut children_map: HashMap<String, Vec<String>> = HashMap::new();
        for unit in &units {
            if let Some(parent_id) = &unit.parent_id {
                children_map.entry(parent_id.clone()).or_default().push(unit.id.clone());
            }
        }
        for unit in &mut units {
            if let Some(children) = children_map.remove(&unit.id) {
                unit.children = children;
            }
        }
        Ok(units)
    }

    pub fn count_units(&self) -> usize {
        self.units.len()
    }

    /// Removes every unit whose `file_path` is in `paths`. Returns the
    /// number of units removed.
    pub fn delete_units_by_files(&self, paths: &HashSet<String>) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut to_remove = Vec::new();
        for item in self.units.iter() {
            let (key, bytes) = item?;
            let unit: IndexUnit = bincode::deserialize(&bytes)?;
            if paths.contains(&unit.file_path) {
                to_remove.push(key.to_vec());
            }
        }
        let removed = to_remove.len();
        for key in to_remove {
            self.units.remove(key)?;
        }
        self.units.flush()?;
        Ok(removed)
    }

    pub fn save_file_record(&self, record: &FileRecord) -> Result<()> {
        let bytes = bincode::serialize(record)?;
        self.files.insert(record.file_path.as_bytes(), bytes)?;
        self.files.flush()?;
        Ok(())
    }

    pub fn get_file_record(&self, path: &str) -> Result<Option<FileRecord>> {
        match self.files.get(path.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_file_records(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::with_capacity(self.files.len());
        for item in self.files.iter() {
            let (_, bytes) = item?;
            records.push(bincode::deserialize(&bytes)?);
        }
        Ok(records)
    }

    pub fn delete_file_record(&self, path: &str) -> Result<()> {
        self.files.remove(path.as_bytes())?;
        self.files.flush()?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
