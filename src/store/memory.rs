//! In-memory encounter store

use ahash::AHashMap;

use crate::core::error::Result;
use crate::core::types::{ChannelKey, Rank};
use crate::dungeon::biome::Terrain;
use crate::dungeon::encounter::Encounter;
use crate::store::index::Indices;
use crate::store::EncounterStore;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: AHashMap<ChannelKey, Encounter>,
    indices: Indices,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect(&self, keys: Vec<ChannelKey>) -> Vec<Encounter> {
        keys.iter()
            .filter_map(|k| self.records.get(k))
            .cloned()
            .collect()
    }
}

impl EncounterStore for MemoryStore {
    fn put(&mut self, encounter: &Encounter) -> Result<()> {
        self.indices.insert(encounter);
        self.records.insert(encounter.key(), encounter.clone());
        Ok(())
    }

    fn get(&self, key: &ChannelKey) -> Result<Option<Encounter>> {
        Ok(self.records.get(key).cloned())
    }

    fn delete(&mut self, key: &ChannelKey) -> Result<()> {
        self.records.remove(key);
        self.indices.remove(key);
        Ok(())
    }

    fn all(&self) -> Result<Vec<Encounter>> {
        let mut keys: Vec<ChannelKey> = self.records.keys().cloned().collect();
        keys.sort();
        Ok(self.collect(keys))
    }

    fn by_rank(&self, rank: Rank) -> Result<Vec<Encounter>> {
        Ok(self.collect(self.indices.by_rank(rank)))
    }

    fn by_kind(&self, kind: Terrain) -> Result<Vec<Encounter>> {
        Ok(self.collect(self.indices.by_kind(kind)))
    }

    fn active(&self) -> Result<Vec<Encounter>> {
        Ok(self.collect(self.indices.active()))
    }
}
