//! Events reported by the engine
//!
//! Returned from every engine call that advances the simulation, for the
//! host to render or log.

use crate::core::types::{ChannelKey, MobId, Rank, UnitId};
use crate::dungeon::encounter::Outcome;

/// Who landed a blow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attacker {
    Shadow(UnitId),
    User,
}

/// Experience handed out when a boss falls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XpReport {
    pub user_xp: u64,
    pub unit_xp: Vec<(UnitId, u64)>,
    pub level_ups: Vec<(UnitId, u32)>,
    pub rank_ups: Vec<(UnitId, Rank)>,
}

impl XpReport {
    pub fn total_unit_xp(&self) -> u64 {
        self.unit_xp.iter().map(|(_, xp)| xp).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DungeonEvent {
    Spawned {
        channel: ChannelKey,
        name: String,
        rank: Rank,
        boss: String,
        target_mobs: u64,
    },
    Restored {
        channel: ChannelKey,
    },
    MobsSpawned {
        channel: ChannelKey,
        count: u64,
        total: u64,
    },
    /// The population reached its target; no more spawning
    SpawningComplete {
        channel: ChannelKey,
        total: u64,
    },
    MobKilled {
        channel: ChannelKey,
        mob: MobId,
        by: Attacker,
    },
    MobExtracted {
        channel: ChannelKey,
        unit: UnitId,
        name: String,
    },
    BossHit {
        channel: ChannelKey,
        by: Attacker,
        amount: f64,
        critical: bool,
        hp_left: f64,
    },
    ShadowDown {
        channel: ChannelKey,
        unit: UnitId,
    },
    ShadowRevived {
        channel: ChannelKey,
        unit: UnitId,
        cost: f64,
    },
    UserHit {
        channel: ChannelKey,
        amount: f64,
        hp_left: f64,
    },
    Completed {
        channel: ChannelKey,
        outcome: Outcome,
        xp: Option<XpReport>,
        awaiting_extraction: bool,
    },
    BossExtracted {
        channel: ChannelKey,
        unit: UnitId,
    },
    ExtractionClosed {
        channel: ChannelKey,
    },
}

impl DungeonEvent {
    pub fn channel(&self) -> &ChannelKey {
        match self {
            DungeonEvent::Spawned { channel, .. }
            | DungeonEvent::Restored { channel }
            | DungeonEvent::MobsSpawned { channel, .. }
            | DungeonEvent::SpawningComplete { channel, .. }
            | DungeonEvent::MobKilled { channel, .. }
            | DungeonEvent::MobExtracted { channel, .. }
            | DungeonEvent::BossHit { channel, .. }
            | DungeonEvent::ShadowDown { channel, .. }
            | DungeonEvent::ShadowRevived { channel, .. }
            | DungeonEvent::UserHit { channel, .. }
            | DungeonEvent::Completed { channel, .. }
            | DungeonEvent::BossExtracted { channel, .. }
            | DungeonEvent::ExtractionClosed { channel } => channel,
        }
    }
}
