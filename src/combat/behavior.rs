//! Shadow behavior profiles
//!
//! Each unit gets one profile per encounter. The profile fixes the cooldown
//! band and damage multiplier, so attacks arrive as a staggered stream
//! rather than in lockstep.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    Aggressive,
    Balanced,
    Tactical,
}

impl Behavior {
    pub const ALL: [Behavior; 3] = [Behavior::Aggressive, Behavior::Balanced, Behavior::Tactical];

    /// Uniformly pick a profile
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Inclusive cooldown band in milliseconds
    pub fn cooldown_range(self) -> (Millis, Millis) {
        match self {
            Behavior::Aggressive => (800, 1_500),
            Behavior::Balanced => (1_500, 2_500),
            Behavior::Tactical => (2_000, 3_500),
        }
    }

    pub fn damage_multiplier(self) -> f64 {
        match self {
            Behavior::Aggressive => 1.3,
            Behavior::Balanced => 1.0,
            Behavior::Tactical => 0.85,
        }
    }

    /// Draw the next cooldown from this profile's band
    pub fn roll_cooldown(self, rng: &mut impl Rng) -> Millis {
        let (min, max) = self.cooldown_range();
        rng.gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_cooldowns_stay_in_band() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for behavior in Behavior::ALL {
            let (min, max) = behavior.cooldown_range();
            for _ in 0..100 {
                let cd = behavior.roll_cooldown(&mut rng);
                assert!(cd >= min && cd <= max);
            }
        }
    }

    #[test]
    fn test_aggressive_hits_harder_than_tactical() {
        assert!(Behavior::Aggressive.damage_multiplier() > Behavior::Balanced.damage_multiplier());
        assert!(Behavior::Balanced.damage_multiplier() > Behavior::Tactical.damage_multiplier());
    }

    #[test]
    fn test_random_covers_all_profiles() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut seen = [false; 3];
        for _ in 0..100 {
            match Behavior::random(&mut rng) {
                Behavior::Aggressive => seen[0] = true,
                Behavior::Balanced => seen[1] = true,
                Behavior::Tactical => seen[2] = true,
            }
        }
        assert!(seen.iter().all(|s| *s));
    }
}
