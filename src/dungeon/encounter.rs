//! Encounter aggregate: one dungeon per channel
//!
//! The serde form of [`Encounter`] is the persisted record. Transient fields
//! are skipped so a snapshot never carries scheduling state.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::combat::Behavior;
use crate::core::types::{
    BossId, ChannelInfo, ChannelKey, EncounterId, Millis, MobId, Rank, Stats, UnitId,
};
use crate::dungeon::biome::{BeastKind, Biome, Terrain};

/// How an encounter ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The boss was killed
    BossSlain,
    /// The whole population was spawned and killed before expiry
    Cleared,
    /// Expired with monsters left
    TimedOut,
    /// The participating user fell with no shadows standing
    Defeated,
}

impl Outcome {
    pub fn is_victory(self) -> bool {
        matches!(self, Outcome::BossSlain | Outcome::Cleared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterState {
    Active,
    Finished(Outcome),
}

/// Whether the user fights in an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Participation {
    #[default]
    Undecided,
    Participating,
    Watching,
}

/// Result of applying damage to something with HP
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// HP actually removed (never more than the HP that was left)
    pub dealt: f64,
    /// True only on the hit that took HP from positive to zero
    pub killed: bool,
}

fn apply_hit(hp: &mut f64, amount: f64) -> HitResult {
    if *hp <= 0.0 {
        return HitResult {
            dealt: 0.0,
            killed: false,
        };
    }
    let dealt = amount.max(0.0).min(*hp);
    *hp -= dealt;
    if *hp < 1e-9 {
        *hp = 0.0;
    }
    HitResult {
        dealt,
        killed: *hp == 0.0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boss {
    pub id: BossId,
    pub name: String,
    pub beast: BeastKind,
    pub rank: Rank,
    pub stats: Stats,
    pub hp: f64,
    pub max_hp: f64,
    pub attack_cooldown_ms: Millis,
    pub next_attack_at: Millis,
    /// Army share this boss was scaled against at creation
    pub expected_unit_count: usize,
}

impl Boss {
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Apply damage, keeping `hp` inside `[0, max_hp]`
    pub fn apply_damage(&mut self, amount: f64) -> HitResult {
        let result = apply_hit(&mut self.hp, amount);
        self.hp = self.hp.clamp(0.0, self.max_hp);
        result
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mob {
    pub id: MobId,
    pub rank: Rank,
    pub beast: BeastKind,
    pub stats: Stats,
    pub hp: f64,
    pub max_hp: f64,
    pub attack_cooldown_ms: Millis,
    pub next_attack_at: Millis,
}

impl Mob {
    pub fn apply_damage(&mut self, amount: f64) -> HitResult {
        apply_hit(&mut self.hp, amount)
    }
}

/// Monster population of an encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobPopulation {
    /// Mobs ever spawned
    pub total: u64,
    /// Mobs currently alive
    pub remaining: u64,
    pub killed: u64,
    pub target_count: u64,
    #[serde(rename = "activeMobs")]
    pub active: Vec<Mob>,
    pub next_id: u64,
    pub last_growth_at: Millis,
}

impl MobPopulation {
    pub fn new(target_count: u64, now: Millis) -> Self {
        Self {
            total: 0,
            remaining: 0,
            killed: 0,
            target_count,
            active: Vec::new(),
            next_id: 0,
            last_growth_at: now,
        }
    }

    pub fn next_mob_id(&mut self) -> MobId {
        let id = MobId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Mobs still allowed before the target is reached
    pub fn capacity_left(&self) -> u64 {
        self.target_count.saturating_sub(self.total)
    }

    pub fn is_filled(&self) -> bool {
        self.total >= self.target_count
    }

    /// Every mob spawned and killed
    pub fn is_cleared(&self) -> bool {
        self.is_filled() && self.active.is_empty()
    }

    pub fn push(&mut self, mob: Mob) {
        debug_assert!(self.total < self.target_count);
        self.active.push(mob);
        self.total += 1;
        self.remaining = self.active.len() as u64;
    }

    /// Remove a dead mob from the active set
    pub fn remove(&mut self, index: usize) -> Mob {
        let mob = self.active.swap_remove(index);
        self.killed += 1;
        self.remaining = self.active.len() as u64;
        mob
    }
}

/// Attack timing of one shadow in one encounter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackState {
    pub behavior: Behavior,
    pub next_attack_at: Millis,
    pub attacks: u64,
}

/// XP-relevant tallies of one shadow in one encounter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub mob_kills: u64,
    pub boss_damage: f64,
}

/// HP of one shadow in one encounter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowHealth {
    pub hp: f64,
    pub max_hp: f64,
    pub dead: bool,
    pub revives: u32,
}

impl ShadowHealth {
    pub fn new(max_hp: f64) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            dead: false,
            revives: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.dead && self.hp > 0.0
    }

    pub fn apply_damage(&mut self, amount: f64) -> HitResult {
        apply_hit(&mut self.hp, amount)
    }
}

/// One dungeon instance scoped to a single channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: EncounterId,
    #[serde(flatten)]
    pub channel: ChannelInfo,
    pub rank: Rank,
    pub biome: Biome,
    #[serde(rename = "type")]
    pub kind: Terrain,
    pub name: String,
    pub start_time: Millis,
    pub expires_at: Millis,
    pub state: EncounterState,
    pub completed: bool,
    pub failed: bool,
    pub participation: Participation,
    pub boss: Boss,
    pub mobs: MobPopulation,
    pub shadow_attacks: AHashMap<UnitId, AttackState>,
    pub shadow_contributions: AHashMap<UnitId, Contribution>,
    pub shadow_hp: AHashMap<UnitId, ShadowHealth>,
    pub revives: u32,
    pub failed_revives: u32,
    pub user_damage: f64,
    pub user_kills: u64,
    /// Fallback damage the participating user absorbed
    #[serde(default)]
    pub user_damage_taken: f64,
    /// Boss extraction closes at this time; set only when retained
    #[serde(default)]
    pub extraction_deadline: Option<Millis>,
    #[serde(skip)]
    pub dirty: bool,
}

impl Encounter {
    pub fn key(&self) -> ChannelKey {
        self.channel.key()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, EncounterState::Finished(_))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            EncounterState::Active => None,
            EncounterState::Finished(outcome) => Some(outcome),
        }
    }

    /// Move to a terminal state. Returns false if already terminal.
    pub fn finish(&mut self, outcome: Outcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = EncounterState::Finished(outcome);
        self.completed = outcome.is_victory();
        self.failed = !outcome.is_victory();
        self.dirty = true;
        true
    }

    pub fn user_participating(&self) -> bool {
        self.participation == Participation::Participating
    }

    pub fn is_shadow_dead(&self, unit: &UnitId) -> bool {
        self.shadow_hp.get(unit).map_or(false, |h| h.dead)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A minimal active encounter for tests
    pub fn encounter(rank: Rank, boss_hp: f64, target: u64) -> Encounter {
        Encounter {
            id: EncounterId::new(),
            channel: ChannelInfo::new("guild", "channel"),
            rank,
            biome: Biome::Forest,
            kind: Biome::Forest.terrain(),
            name: "Forest of the Wolf Alpha".into(),
            start_time: 0,
            expires_at: 600_000,
            state: EncounterState::Active,
            completed: false,
            failed: false,
            participation: Participation::Undecided,
            boss: Boss {
                id: BossId::new(),
                name: "Wolf Alpha".into(),
                beast: BeastKind::Wolf,
                rank,
                stats: Stats::uniform(50.0),
                hp: boss_hp,
                max_hp: boss_hp,
                attack_cooldown_ms: 3_000,
                next_attack_at: 0,
                expected_unit_count: 0,
            },
            mobs: MobPopulation::new(target, 0),
            shadow_attacks: AHashMap::new(),
            shadow_contributions: AHashMap::new(),
            shadow_hp: AHashMap::new(),
            revives: 0,
            failed_revives: 0,
            user_damage: 0.0,
            user_kills: 0,
            user_damage_taken: 0.0,
            extraction_deadline: None,
            dirty: false,
        }
    }
}
