//! Keyed encounter persistence with secondary indices
//!
//! Stores are synchronous black boxes keyed by channel key. The engine only
//! writes through a [`PersistenceSink`], which never blocks it and never
//! retries; reads happen at startup to restore live encounters.

pub mod file;
pub mod index;
pub mod memory;
pub mod writer;

use crate::core::error::Result;
use crate::core::types::{ChannelKey, Rank};
use crate::dungeon::biome::Terrain;
use crate::dungeon::encounter::Encounter;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use writer::{spawn_store_worker, NullSink, PersistenceSink, StoreHandle};

pub trait EncounterStore {
    /// Insert or replace the record for the encounter's channel
    fn put(&mut self, encounter: &Encounter) -> Result<()>;
    fn get(&self, key: &ChannelKey) -> Result<Option<Encounter>>;
    /// Deleting a missing key is not an error
    fn delete(&mut self, key: &ChannelKey) -> Result<()>;
    fn all(&self) -> Result<Vec<Encounter>>;
    fn by_rank(&self, rank: Rank) -> Result<Vec<Encounter>>;
    fn by_kind(&self, kind: Terrain) -> Result<Vec<Encounter>>;
    /// Records neither completed nor failed
    fn active(&self) -> Result<Vec<Encounter>>;
}
