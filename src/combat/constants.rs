//! Combat system constants - all tunable values in one place

use crate::core::types::Millis;

// Damage formula
pub const BASE_DAMAGE: f64 = 15.0;
pub const STRENGTH_DAMAGE: f64 = 3.0;
pub const INTELLIGENCE_DAMAGE: f64 = 2.0;
pub const MIN_DAMAGE: f64 = 1.0;

// Rank difference
pub const OUTRANK_BONUS_PER_STEP: f64 = 0.3;
pub const UNDERRANK_PENALTY_PER_STEP: f64 = 0.2;
pub const MIN_RANK_MULTIPLIER: f64 = 0.4;

// Critical hits (chance in percent per agility point)
pub const CRIT_PERCENT_PER_AGILITY: f64 = 0.3;
pub const MAX_CRIT_PERCENT: f64 = 40.0;
pub const CRIT_MULTIPLIER: f64 = 2.5;

// Defense
pub const DEFENSE_STRENGTH_WEIGHT: f64 = 0.25;
pub const DEFENSE_VITALITY_WEIGHT: f64 = 0.15;
pub const DEFENSE_SOFT_CAP: f64 = 100.0;
pub const MAX_DEFENSE_REDUCTION: f64 = 0.7;

// Variance applied on top of the formula by the schedulers
pub const ATTACK_VARIANCE_MIN: f64 = 0.8;
pub const ATTACK_VARIANCE_MAX: f64 = 1.2;

// Hit points and mana
pub const BASE_HP: f64 = 100.0;
pub const HP_PER_VITALITY: f64 = 10.0;
pub const HP_PER_RANK: f64 = 50.0;
pub const BASE_MANA: f64 = 100.0;
pub const MANA_PER_INTELLIGENCE: f64 = 10.0;
pub const MANA_PER_RANK: f64 = 50.0;

// Regeneration: 1% of max per 100 points of the governing stat
pub const REGEN_PERCENT_PER_100_STAT: f64 = 0.01;

// Mobs
pub const MOB_BASE_STAT: f64 = 10.0;
pub const MOB_STAT_PER_RANK: f64 = 15.0;
pub const MOB_STAT_VARIANCE_MIN: f64 = 0.85;
pub const MOB_STAT_VARIANCE_MAX: f64 = 1.15;
pub const MOB_HP_PER_VITALITY: f64 = 8.0;
pub const MOB_HP_VARIANCE_MIN: f64 = 0.7;
pub const MOB_HP_VARIANCE_MAX: f64 = 1.0;
pub const MOB_ATTACK_COOLDOWN_MIN_MS: Millis = 2_000;
pub const MOB_ATTACK_COOLDOWN_MAX_MS: Millis = 4_000;

// Bosses
pub const BOSS_BASE_HP: f64 = 5_000.0;
pub const BOSS_STAT_BASE: f64 = 50.0;
pub const BOSS_STAT_PER_RANK: f64 = 40.0;
pub const BOSS_ATTACK_COOLDOWN_MS: Millis = 3_000;
pub const BOSS_COOLDOWN_STEP_MS: Millis = 100;
pub const BOSS_MIN_ATTACK_COOLDOWN_MS: Millis = 1_500;
pub const MAX_AOE_TARGETS: usize = 12;

// Experience
pub const XP_RANK_STEP: f64 = 0.5;
