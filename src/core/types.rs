//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wall-clock time in milliseconds since the Unix epoch.
///
/// The engine never reads the clock itself; every operation receives `now`.
pub type Millis = u64;

/// Key of a chat channel, `guild:channel`. One encounter per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey(pub String);

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a channel inside the host chat application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub guild_id: String,
    pub channel_id: String,
}

impl ChannelInfo {
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }

    pub fn key(&self) -> ChannelKey {
        ChannelKey(format!("{}:{}", self.guild_id, self.channel_id))
    }
}

/// Unique identifier for encounters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterId(pub Uuid);

impl EncounterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EncounterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable boss identifier, used by the roster provider to track extraction attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BossId(pub Uuid);

impl BossId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BossId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BossId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a roster unit (owned by the external army subsystem)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mob identifier, unique within its encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MobId(pub u64);

/// The rank ladder, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    E,
    D,
    C,
    B,
    A,
    S,
    SS,
    SSS,
    #[serde(rename = "SSS+")]
    SSSPlus,
    NH,
    Monarch,
    #[serde(rename = "Monarch+")]
    MonarchPlus,
    #[serde(rename = "Shadow Monarch")]
    ShadowMonarch,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::E,
        Rank::D,
        Rank::C,
        Rank::B,
        Rank::A,
        Rank::S,
        Rank::SS,
        Rank::SSS,
        Rank::SSSPlus,
        Rank::NH,
        Rank::Monarch,
        Rank::MonarchPlus,
        Rank::ShadowMonarch,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Rank at `index`, saturating at the top of the ladder
    pub fn from_index(index: usize) -> Rank {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Move `delta` steps along the ladder, saturating at both ends
    pub fn offset(self, delta: i32) -> Rank {
        let idx = (self.index() as i64 + delta as i64).max(0) as usize;
        Self::from_index(idx)
    }

    /// Signed distance `self - other` on the ladder
    pub fn diff(self, other: Rank) -> i32 {
        self.index() as i32 - other.index() as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::E => "E",
            Rank::D => "D",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::S => "S",
            Rank::SS => "SS",
            Rank::SSS => "SSS",
            Rank::SSSPlus => "SSS+",
            Rank::NH => "NH",
            Rank::Monarch => "Monarch",
            Rank::MonarchPlus => "Monarch+",
            Rank::ShadowMonarch => "Shadow Monarch",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five base attributes shared by the user, units, bosses and mobs
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub strength: f64,
    pub agility: f64,
    pub intelligence: f64,
    pub vitality: f64,
    pub perception: f64,
}

impl Stats {
    pub fn uniform(value: f64) -> Self {
        Self {
            strength: value,
            agility: value,
            intelligence: value,
            vitality: value,
            perception: value,
        }
    }

    /// Sum of all attributes, used as a rough power rating
    pub fn total(&self) -> f64 {
        self.strength + self.agility + self.intelligence + self.vitality + self.perception
    }
}
