//! Combat math: damage formula, HP/mana scaling, rank weighting
//!
//! Pure functions. Randomness is always passed in so callers control the
//! source (seeded in tests, the engine RNG in play).

use rand::Rng;

use crate::combat::constants::*;
use crate::core::types::{Millis, Rank, Stats};

/// Outcome of a single damage roll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRoll {
    pub amount: f64,
    pub critical: bool,
}

/// Multiplier from the rank gap between attacker and defender
pub fn rank_multiplier(attacker: Rank, defender: Rank) -> f64 {
    let delta = attacker.diff(defender) as f64;
    if delta > 0.0 {
        1.0 + OUTRANK_BONUS_PER_STEP * delta
    } else {
        (1.0 + UNDERRANK_PENALTY_PER_STEP * delta).max(MIN_RANK_MULTIPLIER)
    }
}

/// Critical-hit probability in [0, 0.4]
pub fn crit_chance(agility: f64) -> f64 {
    (CRIT_PERCENT_PER_AGILITY * agility.max(0.0)).min(MAX_CRIT_PERCENT) / 100.0
}

/// Fraction of incoming damage removed by the defender's armor
pub fn defense_reduction(defender: &Stats) -> f64 {
    let defense = DEFENSE_STRENGTH_WEIGHT * defender.strength.max(0.0)
        + DEFENSE_VITALITY_WEIGHT * defender.vitality.max(0.0);
    (defense / (defense + DEFENSE_SOFT_CAP)).min(MAX_DEFENSE_REDUCTION)
}

/// Deterministic part of the damage formula with the crit decided by the caller
pub fn resolve_damage(
    attacker: &Stats,
    defender: &Stats,
    attacker_rank: Rank,
    defender_rank: Rank,
    critical: bool,
) -> f64 {
    let base = BASE_DAMAGE
        + STRENGTH_DAMAGE * attacker.strength
        + INTELLIGENCE_DAMAGE * attacker.intelligence;

    let mut damage = base * rank_multiplier(attacker_rank, defender_rank);
    if critical {
        damage *= CRIT_MULTIPLIER;
    }
    damage *= 1.0 - defense_reduction(defender);

    damage.floor().max(MIN_DAMAGE)
}

/// Full damage roll: formula plus the critical-hit roll
pub fn damage(
    attacker: &Stats,
    defender: &Stats,
    attacker_rank: Rank,
    defender_rank: Rank,
    rng: &mut impl Rng,
) -> DamageRoll {
    let critical = rng.gen_bool(crit_chance(attacker.agility));
    DamageRoll {
        amount: resolve_damage(attacker, defender, attacker_rank, defender_rank, critical),
        critical,
    }
}

/// Uniform variance factor applied by the attack schedulers
pub fn attack_variance(rng: &mut impl Rng) -> f64 {
    rng.gen_range(ATTACK_VARIANCE_MIN..=ATTACK_VARIANCE_MAX)
}

/// Max HP of a roster unit inside an encounter
pub fn unit_max_hp(vitality: f64, rank: Rank) -> f64 {
    BASE_HP + HP_PER_VITALITY * vitality.max(0.0) + HP_PER_RANK * rank.index() as f64
}

/// Max HP of the user's resource pool
pub fn user_max_hp(stats: &Stats, rank: Rank) -> f64 {
    unit_max_hp(stats.vitality, rank)
}

/// Max mana of the user's resource pool
pub fn user_max_mana(stats: &Stats, rank: Rank) -> f64 {
    BASE_MANA
        + MANA_PER_INTELLIGENCE * stats.intelligence.max(0.0)
        + MANA_PER_RANK * rank.index() as f64
}

/// Per-tick regeneration: 1% of max per 100 points of the governing stat
pub fn regen_amount(max: f64, stat: f64) -> f64 {
    max * REGEN_PERCENT_PER_100_STAT * (stat.max(0.0) / 100.0)
}

/// XP scaling by rank, 1.0 at E
pub fn xp_rank_multiplier(rank: Rank) -> f64 {
    1.0 + XP_RANK_STEP * rank.index() as f64
}

/// Number of units a boss AOE strike hits at this rank (1 at E, capped at 12)
pub fn aoe_target_count(rank: Rank) -> usize {
    (rank.index() + 1).min(MAX_AOE_TARGETS)
}

/// Boss HP before the army-size scaling, doubling each rank
pub fn boss_base_hp(rank: Rank) -> f64 {
    BOSS_BASE_HP * 2f64.powi(rank.index() as i32)
}

pub fn boss_stats(rank: Rank) -> Stats {
    Stats::uniform(BOSS_STAT_BASE + BOSS_STAT_PER_RANK * rank.index() as f64)
}

pub fn boss_attack_cooldown(rank: Rank) -> Millis {
    BOSS_ATTACK_COOLDOWN_MS
        .saturating_sub(BOSS_COOLDOWN_STEP_MS * rank.index() as Millis)
        .max(BOSS_MIN_ATTACK_COOLDOWN_MS)
}

pub fn mob_base_stat(rank: Rank) -> f64 {
    MOB_BASE_STAT + MOB_STAT_PER_RANK * rank.index() as f64
}

/// Mob stats with independent 85-115% variance per attribute
pub fn roll_mob_stats(rank: Rank, rng: &mut impl Rng) -> Stats {
    let base = mob_base_stat(rank);
    let mut roll = || base * rng.gen_range(MOB_STAT_VARIANCE_MIN..=MOB_STAT_VARIANCE_MAX);
    Stats {
        strength: roll(),
        agility: roll(),
        intelligence: roll(),
        vitality: roll(),
        perception: roll(),
    }
}

/// Mob HP from vitality with its own 70-100% band
pub fn roll_mob_hp(vitality: f64, rng: &mut impl Rng) -> f64 {
    let variance = rng.gen_range(MOB_HP_VARIANCE_MIN..=MOB_HP_VARIANCE_MAX);
    (BASE_HP + MOB_HP_PER_VITALITY * vitality.max(0.0)) * variance
}

pub fn roll_mob_cooldown(rng: &mut impl Rng) -> Millis {
    rng.gen_range(MOB_ATTACK_COOLDOWN_MIN_MS..=MOB_ATTACK_COOLDOWN_MAX_MS)
}
