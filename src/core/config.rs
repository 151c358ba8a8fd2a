//! Dungeon configuration with documented constants
//!
//! Every tunable of the simulation lives here. Values are read once at
//! startup (from TOML or defaults) and handed to the engine by value.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{DungeonError, Result};
use crate::core::types::Millis;

/// Configuration for the dungeon simulation
///
/// These values have been tuned so that a mid-rank encounter resolves in a
/// few minutes with a modest army. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonConfig {
    // === SPAWNING ===
    /// Probability that one activity event in a quiet channel opens a dungeon
    pub spawn_chance: f64,

    /// Lifetime of an encounter, and the per-channel cooldown between spawns
    pub dungeon_duration_ms: Millis,

    /// Fraction of the target population spawned synchronously at creation
    pub initial_burst_fraction: f64,

    // === MOB POPULATION ===
    /// Interval of the mob spawn tick
    pub mob_spawn_interval_ms: Millis,

    /// Mobs spawned per tick during the bulk-fill phase
    pub mob_spawn_batch: u32,

    /// Mobs spawned per tick during the replenishment phase
    pub mob_spawn_trickle: u32,

    /// Fill ratio at which spawning switches from bulk to trickle
    pub replenish_threshold: f64,

    /// Upper bound on simultaneously alive mobs in one encounter
    ///
    /// Periodic spawning pauses at the cap and resumes as mobs die. The
    /// initial burst is exempt, and the population target still counts every
    /// mob ever spawned.
    pub max_active_mobs: usize,

    /// Interval of the capacity monitor
    pub capacity_monitor_interval_ms: Millis,

    /// Time without growth after which the monitor forces a spawn tick
    pub stall_window_ms: Millis,

    // === COMBAT ===
    pub shadow_attack_interval_ms: Millis,
    pub boss_attack_interval_ms: Millis,
    pub mob_attack_interval_ms: Millis,
    pub regen_interval_ms: Millis,

    /// Probability a shadow picks a mob over the boss when both exist
    pub mob_target_bias: f64,

    /// Damage multiplier when the boss strikes the user directly
    pub boss_user_damage_factor: f64,

    /// Damage multiplier when a mob strikes the user directly
    pub mob_user_damage_factor: f64,

    // === ARMY ===
    /// Lifetime of the cached army split
    pub allocation_ttl_ms: Millis,

    /// Consecutive failed revives between two low-mana warnings
    pub revive_warning_every: u32,

    // === EXTRACTION ===
    /// How long a slain boss stays available for extraction
    pub extraction_grace_ms: Millis,

    /// Interval of the sweep that purges expired extraction windows
    pub extraction_sweep_interval_ms: Millis,

    // === EXPERIENCE ===
    pub base_mob_xp: f64,
    pub base_boss_xp: f64,

    /// User XP for a boss kill before rank scaling
    pub user_boss_xp: f64,

    /// Share of user XP granted when only the army fought
    pub watcher_xp_share: f64,

    // === INTEGRATION ===
    /// Backoff between attempts to resolve a missing collaborator
    pub collaborator_retry_ms: Millis,

    /// Attempts before a collaborator is given up until restart
    pub collaborator_max_attempts: u32,

    /// Interval of the snapshot sweep that persists dirty encounters
    pub persist_interval_ms: Millis,

    /// Seed for the simulation RNG (random when absent)
    pub rng_seed: Option<u64>,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self {
            spawn_chance: 0.1,
            dungeon_duration_ms: 10 * 60 * 1000,
            initial_burst_fraction: 0.3,

            mob_spawn_interval_ms: 3_000,
            mob_spawn_batch: 500,
            mob_spawn_trickle: 25,
            replenish_threshold: 0.9,
            max_active_mobs: 5_000,
            capacity_monitor_interval_ms: 5_000,
            stall_window_ms: 10_000,

            shadow_attack_interval_ms: 2_000,
            boss_attack_interval_ms: 1_000,
            mob_attack_interval_ms: 1_000,
            regen_interval_ms: 1_000,
            mob_target_bias: 0.8,
            boss_user_damage_factor: 0.5,
            mob_user_damage_factor: 0.4,

            allocation_ttl_ms: 60_000,
            revive_warning_every: 5,

            extraction_grace_ms: 5 * 60 * 1000,
            extraction_sweep_interval_ms: 10_000,

            base_mob_xp: 10.0,
            base_boss_xp: 500.0,
            user_boss_xp: 100.0,
            watcher_xp_share: 0.25,

            collaborator_retry_ms: 2_000,
            collaborator_max_attempts: 30,
            persist_interval_ms: 5_000,
            rng_seed: None,
        }
    }
}

impl DungeonConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DungeonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Fix the simulation seed, drawing a random one if none is set
    ///
    /// Returns the seed the engine will use, so a logged value reproduces
    /// the run.
    pub fn pin_seed(&mut self) -> u64 {
        *self.rng_seed.get_or_insert_with(rand::random)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.spawn_chance) {
            return Err(DungeonError::Config(format!(
                "spawn_chance ({}) must be within [0, 1]",
                self.spawn_chance
            )));
        }

        if !(0.0..=1.0).contains(&self.initial_burst_fraction) {
            return Err(DungeonError::Config(format!(
                "initial_burst_fraction ({}) must be within [0, 1]",
                self.initial_burst_fraction
            )));
        }

        if !(0.0..=1.0).contains(&self.replenish_threshold) {
            return Err(DungeonError::Config(format!(
                "replenish_threshold ({}) must be within [0, 1]",
                self.replenish_threshold
            )));
        }

        if self.mob_spawn_trickle > self.mob_spawn_batch {
            return Err(DungeonError::Config(format!(
                "mob_spawn_trickle ({}) should be <= mob_spawn_batch ({})",
                self.mob_spawn_trickle, self.mob_spawn_batch
            )));
        }

        let intervals = [
            ("mob_spawn_interval_ms", self.mob_spawn_interval_ms),
            ("capacity_monitor_interval_ms", self.capacity_monitor_interval_ms),
            ("shadow_attack_interval_ms", self.shadow_attack_interval_ms),
            ("boss_attack_interval_ms", self.boss_attack_interval_ms),
            ("mob_attack_interval_ms", self.mob_attack_interval_ms),
            ("regen_interval_ms", self.regen_interval_ms),
            ("extraction_sweep_interval_ms", self.extraction_sweep_interval_ms),
            ("collaborator_retry_ms", self.collaborator_retry_ms),
            ("persist_interval_ms", self.persist_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(DungeonError::Config(format!("{} must be positive", name)));
            }
        }

        if self.revive_warning_every == 0 {
            return Err(DungeonError::Config(
                "revive_warning_every must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DungeonConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DungeonConfig::from_toml_str(
            r#"
            spawn_chance = 0.5
            mob_spawn_batch = 200
            rng_seed = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.spawn_chance, 0.5);
        assert_eq!(config.mob_spawn_batch, 200);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.stall_window_ms, 10_000);
    }

    #[test]
    fn test_pin_seed_keeps_explicit_seed() {
        let mut config = DungeonConfig {
            rng_seed: Some(42),
            ..DungeonConfig::default()
        };
        assert_eq!(config.pin_seed(), 42);
        assert_eq!(config.rng_seed, Some(42));
    }

    #[test]
    fn test_pin_seed_records_drawn_seed() {
        let mut config = DungeonConfig::default();
        assert_eq!(config.rng_seed, None);

        let seed = config.pin_seed();
        assert_eq!(config.rng_seed, Some(seed));
        assert_eq!(config.pin_seed(), seed);
    }

    #[test]
    fn test_invalid_spawn_chance_rejected() {
        let result = DungeonConfig::from_toml_str("spawn_chance = 1.5");
        assert!(matches!(result, Err(DungeonError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = DungeonConfig {
            boss_attack_interval_ms: 0,
            ..DungeonConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
