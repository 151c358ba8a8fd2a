//! Spawn decisions: whether a channel opens a dungeon, and what it contains

use ahash::AHashMap;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::army::allocator::expected_share;
use crate::combat::math::{boss_attack_cooldown, boss_base_hp, boss_stats};
use crate::core::config::DungeonConfig;
use crate::core::types::{BossId, ChannelInfo, ChannelKey, EncounterId, Millis, Rank};
use crate::dungeon::biome::Biome;
use crate::dungeon::encounter::{Boss, Encounter, EncounterState, MobPopulation, Participation};
use crate::dungeon::mobs::spawn_mobs;

// === POPULATION FORMULA ===

const BASE_MOB_COUNT: f64 = 2_000.0;
const MOBS_PER_RANK: f64 = 3_000.0;
const MIN_MOB_COUNT: f64 = 2_000.0;
const MAX_MOB_COUNT: f64 = 150_000.0;

// === RANK WALK ===

/// Weight ceiling for ranks at or below the user's rank
const AT_OR_BELOW_WEIGHT: i32 = 10;

/// Weight ceiling for ranks above the user's rank
const ABOVE_WEIGHT: i32 = 5;

/// Everything the controller needs to know about the world for one roll
#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    pub channel: &'a ChannelInfo,
    /// A live encounter (or one awaiting extraction) already holds the channel
    pub occupied: bool,
    pub user_rank: Rank,
    pub roster_size: usize,
    /// Ranks of the other live encounters, for the expected army share
    pub live_ranks: &'a [Rank],
}

/// Weight of every rank for a user of `user_rank`
///
/// Ranks at or below the user weigh `10 - distance`, ranks above weigh
/// `5 - distance`, both floored at 1.
pub fn rank_weights(user_rank: Rank) -> Vec<u32> {
    let user_idx = user_rank.index() as i32;
    Rank::ALL
        .iter()
        .map(|rank| {
            let idx = rank.index() as i32;
            let weight = if idx <= user_idx {
                AT_OR_BELOW_WEIGHT - (user_idx - idx)
            } else {
                ABOVE_WEIGHT - (idx - user_idx)
            };
            weight.max(1) as u32
        })
        .collect()
}

/// Biased weighted walk over the rank ladder
pub fn pick_rank(user_rank: Rank, rng: &mut impl Rng) -> Rank {
    let weights = rank_weights(user_rank);
    match WeightedIndex::new(&weights) {
        Ok(dist) => Rank::from_index(dist.sample(rng)),
        Err(_) => user_rank,
    }
}

/// Population target for a rank in a biome, clamped to [2000, 150000]
pub fn target_mob_count(rank: Rank, biome: Biome) -> u64 {
    let raw = (BASE_MOB_COUNT + rank.index() as f64 * MOBS_PER_RANK) * biome.mob_multiplier();
    raw.clamp(MIN_MOB_COUNT, MAX_MOB_COUNT).round() as u64
}

/// Boss HP scaled against the army share it is expected to face
pub fn boss_max_hp(rank: Rank, biome: Biome, expected_unit_count: usize) -> f64 {
    boss_base_hp(rank) + expected_unit_count as f64 * biome.hp_per_unit()
}

/// Decides per activity event whether a channel opens a dungeon
#[derive(Debug, Default)]
pub struct SpawnController {
    last_spawn: AHashMap<ChannelKey, Millis>,
}

impl SpawnController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time at which `key` may spawn again, if still cooling down
    pub fn cooldown_until(&self, key: &ChannelKey, config: &DungeonConfig) -> Option<Millis> {
        self.last_spawn
            .get(key)
            .map(|at| at + config.dungeon_duration_ms)
    }

    /// Remember a spawn (used when restoring persisted encounters)
    pub fn record_spawn(&mut self, key: ChannelKey, at: Millis) {
        let entry = self.last_spawn.entry(key).or_insert(at);
        *entry = (*entry).max(at);
    }

    /// Roll for a new encounter in `request.channel`
    ///
    /// On success the returned encounter already holds its initial burst of
    /// mobs. Persisting it and starting its schedulers is up to the caller.
    pub fn try_spawn(
        &mut self,
        request: &SpawnRequest<'_>,
        config: &DungeonConfig,
        now: Millis,
        rng: &mut impl Rng,
    ) -> Option<Encounter> {
        let key = request.channel.key();

        if request.occupied {
            return None;
        }

        if let Some(ready_at) = self.cooldown_until(&key, config) {
            if now < ready_at {
                return None;
            }
        }

        if !rng.gen_bool(config.spawn_chance.clamp(0.0, 1.0)) {
            return None;
        }

        let rank = pick_rank(request.user_rank, rng);
        let biome = Biome::random(rng);
        let target = target_mob_count(rank, biome);
        let expected = expected_share(request.roster_size, rank, request.live_ranks);

        let beast = biome.pick_beast(rank, rng);
        let boss_name = format!("{} {}", beast.name(), beast.family().boss_title());
        let max_hp = boss_max_hp(rank, biome, expected);
        let attack_cooldown_ms = boss_attack_cooldown(rank);

        let mut encounter = Encounter {
            id: EncounterId::new(),
            channel: request.channel.clone(),
            rank,
            biome,
            kind: biome.terrain(),
            name: format!("{} of the {}", biome.name(), boss_name),
            start_time: now,
            expires_at: now + config.dungeon_duration_ms,
            state: EncounterState::Active,
            completed: false,
            failed: false,
            participation: Participation::Undecided,
            boss: Boss {
                id: BossId::new(),
                name: boss_name,
                beast,
                rank,
                stats: boss_stats(rank),
                hp: max_hp,
                max_hp,
                attack_cooldown_ms,
                next_attack_at: now + attack_cooldown_ms,
                expected_unit_count: expected,
            },
            mobs: MobPopulation::new(target, now),
            shadow_attacks: AHashMap::new(),
            shadow_contributions: AHashMap::new(),
            shadow_hp: AHashMap::new(),
            revives: 0,
            failed_revives: 0,
            user_damage: 0.0,
            user_kills: 0,
            user_damage_taken: 0.0,
            extraction_deadline: None,
            dirty: true,
        };

        // The burst ignores the active cap; later ticks wait for kills to get under it
        let burst = (target as f64 * config.initial_burst_fraction).ceil() as u64;
        let spawned = spawn_mobs(&mut encounter, burst, usize::MAX, now, rng);

        self.last_spawn.insert(key.clone(), now);

        tracing::info!(
            "Dungeon opened in {}: {} [{}] boss {} ({:.0} HP vs {} expected shadows), {}/{} mobs",
            key,
            encounter.name,
            rank,
            encounter.boss.name,
            max_hp,
            expected,
            spawned,
            target
        );

        Some(encounter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn always_spawn() -> DungeonConfig {
        DungeonConfig {
            spawn_chance: 1.0,
            ..DungeonConfig::default()
        }
    }

    fn request<'a>(channel: &'a ChannelInfo, occupied: bool) -> SpawnRequest<'a> {
        SpawnRequest {
            channel,
            occupied,
            user_rank: Rank::C,
            roster_size: 40,
            live_ranks: &[],
        }
    }

    #[test]
    fn test_rank_weights_favor_user_rank() {
        let weights = rank_weights(Rank::C);
        // E, D, C at or below: 8, 9, 10
        assert_eq!(&weights[0..3], &[8, 9, 10]);
        // B, A, S above: 4, 3, 2, then floor at 1
        assert_eq!(&weights[3..6], &[4, 3, 2]);
        assert!(weights[6..].iter().all(|w| *w == 1));
    }

    #[test]
    fn test_rank_weights_floor_far_below() {
        let weights = rank_weights(Rank::ShadowMonarch);
        assert_eq!(weights[12], 10);
        assert_eq!(weights[0], 1);
    }

    #[test]
    fn test_target_mob_count_formula_and_clamp() {
        assert_eq!(target_mob_count(Rank::E, Biome::Forest), 2_000);
        // (2000 + 5*3000) * 1.2
        assert_eq!(target_mob_count(Rank::S, Biome::Caverns), 20_400);
        // below the floor gets clamped up
        assert_eq!(target_mob_count(Rank::E, Biome::Volcano), 2_000);
        assert!(target_mob_count(Rank::ShadowMonarch, Biome::Necropolis) <= 150_000);
    }

    #[test]
    fn test_boss_hp_scales_with_expected_units() {
        let base = boss_max_hp(Rank::E, Biome::Forest, 0);
        assert_eq!(base, 5_000.0);
        assert_eq!(boss_max_hp(Rank::E, Biome::Forest, 10), 10_000.0);
    }

    #[test]
    fn test_spawn_creates_encounter_with_burst() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut controller = SpawnController::new();
        let config = always_spawn();
        let channel = ChannelInfo::new("g", "c");

        let enc = controller
            .try_spawn(&request(&channel, false), &config, 1_000, &mut rng)
            .unwrap();

        let expected_burst = (enc.mobs.target_count as f64 * 0.3).ceil() as u64;
        assert_eq!(enc.mobs.total, expected_burst);
        assert!(enc.mobs.total <= enc.mobs.target_count);
        assert_eq!(enc.boss.hp, enc.boss.max_hp);
        assert_eq!(enc.start_time, 1_000);
        assert_eq!(enc.key(), channel.key());
    }

    #[test]
    fn test_monarch_burst_is_not_cut_by_active_cap() {
        let config = always_spawn();
        let mut controller = SpawnController::new();
        let mut highest = 0;

        for seed in 0..12 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let channel = ChannelInfo::new("g", format!("c{}", seed));
            let req = SpawnRequest {
                channel: &channel,
                occupied: false,
                user_rank: Rank::ShadowMonarch,
                roster_size: 40,
                live_ranks: &[],
            };
            let enc = controller.try_spawn(&req, &config, 0, &mut rng).unwrap();

            let expected = (enc.mobs.target_count as f64 * 0.3).ceil() as u64;
            assert_eq!(enc.mobs.total, expected);
            assert_eq!(enc.mobs.active.len() as u64, expected);
            highest = highest.max(enc.mobs.target_count);
        }

        // At least one roll landed far enough up the ladder to exceed the cap
        assert!(highest as f64 * 0.3 > config.max_active_mobs as f64);
    }

    #[test]
    fn test_occupied_channel_never_spawns() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut controller = SpawnController::new();
        let channel = ChannelInfo::new("g", "c");
        let result = controller.try_spawn(&request(&channel, true), &always_spawn(), 0, &mut rng);
        assert!(result.is_none());
    }

    #[test]
    fn test_cooldown_blocks_respawn() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut controller = SpawnController::new();
        let config = always_spawn();
        let channel = ChannelInfo::new("g", "c");

        assert!(controller
            .try_spawn(&request(&channel, false), &config, 0, &mut rng)
            .is_some());
        assert!(controller
            .try_spawn(&request(&channel, false), &config, 1_000, &mut rng)
            .is_none());
        assert!(controller
            .try_spawn(&request(&channel, false), &config, config.dungeon_duration_ms, &mut rng)
            .is_some());
    }

    #[test]
    fn test_zero_chance_never_spawns() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut controller = SpawnController::new();
        let config = DungeonConfig {
            spawn_chance: 0.0,
            ..DungeonConfig::default()
        };
        let channel = ChannelInfo::new("g", "c");
        for t in 0..50 {
            assert!(controller
                .try_spawn(&request(&channel, false), &config, t, &mut rng)
                .is_none());
        }
    }
}
