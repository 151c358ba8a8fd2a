//! Biomes and beasts
//!
//! A biome is a spawn-table bundle: it fixes the beast families an
//! encounter may draw from, how large its population is, and how much boss
//! HP each expected shadow adds.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::Rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeastFamily {
    Insect,
    Beast,
    Humanoid,
    Undead,
    Reptile,
    Construct,
    Giant,
    Demon,
    Dragon,
}

impl BeastFamily {
    /// Title given to a boss of this family
    pub fn boss_title(self) -> &'static str {
        match self {
            BeastFamily::Insect => "Queen",
            BeastFamily::Beast => "Alpha",
            BeastFamily::Humanoid => "Warlord",
            BeastFamily::Undead => "Lord",
            BeastFamily::Reptile => "Chieftain",
            BeastFamily::Construct => "Core",
            BeastFamily::Giant => "King",
            BeastFamily::Demon => "Archfiend",
            BeastFamily::Dragon => "Sovereign",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeastKind {
    Ant,
    Spider,
    Centipede,
    Wolf,
    Bear,
    Tiger,
    Goblin,
    Orc,
    HighOrc,
    Lizardman,
    Naga,
    Ghoul,
    Lich,
    Golem,
    Ogre,
    Titan,
    Demon,
    DemonKing,
    Wyvern,
    Dragon,
}

impl BeastKind {
    pub const ALL: [BeastKind; 20] = [
        BeastKind::Ant,
        BeastKind::Spider,
        BeastKind::Centipede,
        BeastKind::Wolf,
        BeastKind::Bear,
        BeastKind::Tiger,
        BeastKind::Goblin,
        BeastKind::Orc,
        BeastKind::HighOrc,
        BeastKind::Lizardman,
        BeastKind::Naga,
        BeastKind::Ghoul,
        BeastKind::Lich,
        BeastKind::Golem,
        BeastKind::Ogre,
        BeastKind::Titan,
        BeastKind::Demon,
        BeastKind::DemonKing,
        BeastKind::Wyvern,
        BeastKind::Dragon,
    ];

    pub fn family(self) -> BeastFamily {
        use BeastKind::*;
        match self {
            Ant | Spider | Centipede => BeastFamily::Insect,
            Wolf | Bear | Tiger => BeastFamily::Beast,
            Goblin | Orc | HighOrc => BeastFamily::Humanoid,
            Lizardman | Naga => BeastFamily::Reptile,
            Ghoul | Lich => BeastFamily::Undead,
            Golem => BeastFamily::Construct,
            Ogre | Titan => BeastFamily::Giant,
            Demon | DemonKing => BeastFamily::Demon,
            Wyvern | Dragon => BeastFamily::Dragon,
        }
    }

    /// Lowest encounter rank at which this beast may appear
    pub fn min_rank(self) -> Rank {
        use BeastKind::*;
        match self {
            Ant | Spider | Wolf | Goblin | Lizardman => Rank::E,
            Centipede | Bear | Ghoul => Rank::D,
            Tiger | Orc | Naga | Ogre => Rank::C,
            Golem | Demon => Rank::B,
            HighOrc | Lich | Wyvern => Rank::A,
            Titan | DemonKing | Dragon => Rank::S,
        }
    }

    pub fn name(self) -> &'static str {
        use BeastKind::*;
        match self {
            Ant => "Ant",
            Spider => "Spider",
            Centipede => "Centipede",
            Wolf => "Wolf",
            Bear => "Bear",
            Tiger => "Tiger",
            Goblin => "Goblin",
            Orc => "Orc",
            HighOrc => "High Orc",
            Lizardman => "Lizardman",
            Naga => "Naga",
            Ghoul => "Ghoul",
            Lich => "Lich",
            Golem => "Golem",
            Ogre => "Ogre",
            Titan => "Titan",
            Demon => "Demon",
            DemonKing => "Demon King",
            Wyvern => "Wyvern",
            Dragon => "Dragon",
        }
    }
}

/// Coarse terrain category, stored as the encounter's queryable type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Wilderness,
    Subterranean,
    Highland,
    Wetland,
    Volcanic,
    Ruins,
    Frozen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    Forest,
    Caverns,
    Mountains,
    Swamp,
    Volcano,
    Necropolis,
    Tundra,
}

impl Biome {
    pub const ALL: [Biome; 7] = [
        Biome::Forest,
        Biome::Caverns,
        Biome::Mountains,
        Biome::Swamp,
        Biome::Volcano,
        Biome::Necropolis,
        Biome::Tundra,
    ];

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn name(self) -> &'static str {
        match self {
            Biome::Forest => "Forest",
            Biome::Caverns => "Caverns",
            Biome::Mountains => "Mountains",
            Biome::Swamp => "Swamp",
            Biome::Volcano => "Volcano",
            Biome::Necropolis => "Necropolis",
            Biome::Tundra => "Tundra",
        }
    }

    pub fn terrain(self) -> Terrain {
        match self {
            Biome::Forest => Terrain::Wilderness,
            Biome::Caverns => Terrain::Subterranean,
            Biome::Mountains => Terrain::Highland,
            Biome::Swamp => Terrain::Wetland,
            Biome::Volcano => Terrain::Volcanic,
            Biome::Necropolis => Terrain::Ruins,
            Biome::Tundra => Terrain::Frozen,
        }
    }

    /// Beast families allowed in this biome
    pub fn families(self) -> &'static [BeastFamily] {
        use BeastFamily::*;
        match self {
            Biome::Forest => &[Insect, Beast, Humanoid],
            Biome::Caverns => &[Insect, Undead, Reptile],
            Biome::Mountains => &[Beast, Giant, Construct, Dragon],
            Biome::Swamp => &[Reptile, Insect, Undead],
            Biome::Volcano => &[Demon, Dragon, Construct],
            Biome::Necropolis => &[Undead, Demon, Humanoid],
            Biome::Tundra => &[Beast, Giant, Humanoid],
        }
    }

    /// Population multiplier applied to the rank's base mob count
    pub fn mob_multiplier(self) -> f64 {
        match self {
            Biome::Forest => 1.0,
            Biome::Caverns => 1.2,
            Biome::Mountains => 0.8,
            Biome::Swamp => 1.1,
            Biome::Volcano => 0.7,
            Biome::Necropolis => 1.3,
            Biome::Tundra => 0.9,
        }
    }

    /// Boss HP added per expected shadow
    pub fn hp_per_unit(self) -> f64 {
        match self {
            Biome::Forest => 500.0,
            Biome::Caverns => 600.0,
            Biome::Mountains => 900.0,
            Biome::Swamp => 550.0,
            Biome::Volcano => 1_200.0,
            Biome::Necropolis => 700.0,
            Biome::Tundra => 800.0,
        }
    }

    /// Beasts of this biome allowed at `rank`
    ///
    /// Falls back to the whole whitelist when rank gating leaves nothing.
    pub fn beasts_for(self, rank: Rank) -> Vec<BeastKind> {
        let families = self.families();
        let whitelist: Vec<BeastKind> = BeastKind::ALL
            .iter()
            .copied()
            .filter(|b| families.contains(&b.family()))
            .collect();

        let gated: Vec<BeastKind> = whitelist
            .iter()
            .copied()
            .filter(|b| b.min_rank() <= rank)
            .collect();

        if gated.is_empty() {
            whitelist
        } else {
            gated
        }
    }

    /// Pick a beast for `rank`; every biome has at least one beast
    pub fn pick_beast(self, rank: Rank, rng: &mut impl Rng) -> BeastKind {
        self.beasts_for(rank)
            .choose(rng)
            .copied()
            .unwrap_or(BeastKind::Goblin)
    }
}
