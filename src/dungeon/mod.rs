//! Dungeon model: biomes, encounters, spawning and mob population

pub mod biome;
pub mod encounter;
pub mod mobs;
pub mod spawn;

pub use biome::{BeastFamily, BeastKind, Biome, Terrain};
pub use encounter::{
    AttackState, Boss, Contribution, Encounter, EncounterState, HitResult, Mob, MobPopulation,
    Outcome, Participation, ShadowHealth,
};
pub use spawn::{SpawnController, SpawnRequest};
