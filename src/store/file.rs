//! Encounter store backed by a directory of JSON files
//!
//! One pretty-printed file per channel key. Records are loaded into an
//! in-memory index when the store opens; writes go to disk first.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::core::types::{ChannelKey, Rank};
use crate::dungeon::biome::Terrain;
use crate::dungeon::encounter::Encounter;
use crate::store::memory::MemoryStore;
use crate::store::EncounterStore;

const EXTENSION: &str = "json";

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    cache: MemoryStore,
}

impl JsonFileStore {
    /// Open (or create) a store rooted at `dir`
    ///
    /// Unreadable records are skipped with a warning.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut cache = MemoryStore::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read_record(&path) {
                Ok(encounter) => cache.put(&encounter)?,
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        tracing::info!("Opened encounter store at {} ({} records)", dir.display(), cache.len());
        Ok(Self { dir, cache })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_record(path: &Path) -> Result<Encounter> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn path_for(&self, key: &ChannelKey) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem(key), EXTENSION))
    }
}

/// Injective file stem for a channel key
///
/// ASCII letters, digits and `-` pass through; every other byte becomes
/// `_` followed by two hex digits, so `_` itself is escaped too.
fn file_stem(key: &ChannelKey) -> String {
    let mut stem = String::with_capacity(key.0.len());
    for byte in key.0.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

impl EncounterStore for JsonFileStore {
    fn put(&mut self, encounter: &Encounter) -> Result<()> {
        let path = self.path_for(&encounter.key());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(encounter)?)?;
        fs::rename(&tmp, &path)?;
        self.cache.put(encounter)
    }

    fn get(&self, key: &ChannelKey) -> Result<Option<Encounter>> {
        self.cache.get(key)
    }

    fn delete(&mut self, key: &ChannelKey) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.cache.delete(key)
    }

    fn all(&self) -> Result<Vec<Encounter>> {
        self.cache.all()
    }

    fn by_rank(&self, rank: Rank) -> Result<Vec<Encounter>> {
        self.cache.by_rank(rank)
    }

    fn by_kind(&self, kind: Terrain) -> Result<Vec<Encounter>> {
        self.cache.by_kind(kind)
    }

    fn active(&self) -> Result<Vec<Encounter>> {
        self.cache.active()
    }
}
