//! Mob population growth
//!
//! Two-phase spawning: full batches while the population is below the
//! replenish threshold, then a small trickle until the target is reached.
//! A slower capacity monitor forces a tick when growth has stalled.

use rand::Rng;

use crate::combat::math::{roll_mob_cooldown, roll_mob_hp, roll_mob_stats};
use crate::core::config::DungeonConfig;
use crate::core::types::{Millis, Rank};
use crate::dungeon::biome::Biome;
use crate::dungeon::encounter::{Encounter, Mob, MobPopulation};

/// Result of one spawn tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnTick {
    pub spawned: u64,
    /// The population reached its target; the spawn task can stop for good
    pub filled: bool,
}

/// Spawn phase for the current fill level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPhase {
    BulkFill,
    Replenish,
}

pub fn spawn_phase(mobs: &MobPopulation, config: &DungeonConfig) -> SpawnPhase {
    let threshold = mobs.target_count as f64 * config.replenish_threshold;
    if (mobs.total as f64) < threshold {
        SpawnPhase::BulkFill
    } else {
        SpawnPhase::Replenish
    }
}

/// How many mobs the next tick may add, before the active cap
pub fn next_batch_size(mobs: &MobPopulation, config: &DungeonConfig) -> u64 {
    let wanted = match spawn_phase(mobs, config) {
        SpawnPhase::BulkFill => config.mob_spawn_batch as u64,
        SpawnPhase::Replenish => config.mob_spawn_trickle as u64,
    };
    wanted.min(mobs.capacity_left())
}

/// Roll one mob for an encounter of `encounter_rank` in `biome`
pub fn generate_mob(
    mobs: &mut MobPopulation,
    encounter_rank: Rank,
    biome: Biome,
    now: Millis,
    rng: &mut impl Rng,
) -> Mob {
    let rank = encounter_rank.offset(rng.gen_range(-1..=1));
    let stats = roll_mob_stats(rank, rng);
    let max_hp = roll_mob_hp(stats.vitality, rng);
    let attack_cooldown_ms = roll_mob_cooldown(rng);

    Mob {
        id: mobs.next_mob_id(),
        rank,
        beast: biome.pick_beast(rank, rng),
        stats,
        hp: max_hp,
        max_hp,
        attack_cooldown_ms,
        next_attack_at: now + attack_cooldown_ms,
    }
}

/// Add up to `count` mobs, bounded by the target and the active cap
///
/// Returns the number actually spawned.
pub fn spawn_mobs(
    encounter: &mut Encounter,
    count: u64,
    max_active: usize,
    now: Millis,
    rng: &mut impl Rng,
) -> u64 {
    let room = max_active.saturating_sub(encounter.mobs.active.len()) as u64;
    let count = count.min(encounter.mobs.capacity_left()).min(room);

    for _ in 0..count {
        let mob = generate_mob(&mut encounter.mobs, encounter.rank, encounter.biome, now, rng);
        encounter.mobs.push(mob);
    }

    if count > 0 {
        encounter.mobs.last_growth_at = now;
        encounter.mark_dirty();
    }
    count
}

/// One periodic spawn tick
pub fn spawn_tick(
    encounter: &mut Encounter,
    config: &DungeonConfig,
    now: Millis,
    rng: &mut impl Rng,
) -> SpawnTick {
    if encounter.is_terminal() || encounter.mobs.is_filled() {
        return SpawnTick {
            spawned: 0,
            filled: encounter.mobs.is_filled(),
        };
    }

    let batch = next_batch_size(&encounter.mobs, config);
    let spawned = spawn_mobs(encounter, batch, config.max_active_mobs, now, rng);

    tracing::debug!(
        "Spawned {} mobs in {} ({}/{})",
        spawned,
        encounter.key(),
        encounter.mobs.total,
        encounter.mobs.target_count
    );

    SpawnTick {
        spawned,
        filled: encounter.mobs.is_filled(),
    }
}

/// True when the population is under target and has not grown for the stall window
pub fn is_stalled(mobs: &MobPopulation, config: &DungeonConfig, now: Millis) -> bool {
    !mobs.is_filled() && now.saturating_sub(mobs.last_growth_at) >= config.stall_window_ms
}
