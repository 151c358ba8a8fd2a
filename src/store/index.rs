//! Secondary indices shared by the store implementations

use ahash::{AHashMap, AHashSet};

use crate::core::types::{ChannelKey, Rank};
use crate::dungeon::biome::Terrain;
use crate::dungeon::encounter::Encounter;

#[derive(Debug, Default, Clone)]
pub struct Indices {
    rank: AHashMap<Rank, AHashSet<ChannelKey>>,
    kind: AHashMap<Terrain, AHashSet<ChannelKey>>,
    active: AHashSet<ChannelKey>,
}

impl Indices {
    pub fn insert(&mut self, encounter: &Encounter) {
        let key = encounter.key();
        self.remove(&key);
        self.rank.entry(encounter.rank).or_default().insert(key.clone());
        self.kind.entry(encounter.kind).or_default().insert(key.clone());
        if !encounter.completed && !encounter.failed {
            self.active.insert(key);
        }
    }

    pub fn remove(&mut self, key: &ChannelKey) {
        for keys in self.rank.values_mut() {
            keys.remove(key);
        }
        for keys in self.kind.values_mut() {
            keys.remove(key);
        }
        self.active.remove(key);
    }

    pub fn by_rank(&self, rank: Rank) -> Vec<ChannelKey> {
        sorted(self.rank.get(&rank))
    }

    pub fn by_kind(&self, kind: Terrain) -> Vec<ChannelKey> {
        sorted(self.kind.get(&kind))
    }

    pub fn active(&self) -> Vec<ChannelKey> {
        sorted(Some(&self.active))
    }
}

fn sorted(keys: Option<&AHashSet<ChannelKey>>) -> Vec<ChannelKey> {
    let mut keys: Vec<ChannelKey> = keys.map(|k| k.iter().cloned().collect()).unwrap_or_default();
    keys.sort();
    keys
}
