//! `doc_id -> title` label map, persisted separately from the backing store
//! with `bincode` — the same structured-value serializer used for every
//! other offline artefact in this stack.

use crate::error::EsaResult;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Default, Serialize, Deserialize)]
pub struct LabelMap {
    by_doc_id: AHashMap<u32, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: u32, title: String) {
        self.by_doc_id.insert(doc_id, title);
    }

    pub fn get(&self, doc_id: u32) -> Option<&str> {
        self.by_doc_id.get(&doc_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_doc_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_doc_id.is_empty()
    }

    /// Checkpoints the label map to disk. Called every 50 documents during
    /// ingest so a crash mid-build loses at most that much.
    pub fn save(&self, path: &Path) -> EsaResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> EsaResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let map = bincode::deserialize_from(reader)?;
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.bin");

        let mut labels = LabelMap::new();
        labels.insert(1, "Apple".to_string());
        labels.insert(2, "Banana".to_string());
        labels.save(&path).unwrap();

        let loaded = LabelMap::load(&path).unwrap();
        assert_eq!(loaded.get(1), Some("Apple"));
        assert_eq!(loaded.get(2), Some("Banana"));
        assert_eq!(loaded.get(3), None);
        assert_eq!(loaded.len(), 2);
    }
}
