//! Mana-gated auto-resurrection

use crate::core::types::Rank;
use crate::host::{ResourcePool, ResourcePoolProvider};

/// Mana cost of reviving a unit of `rank`
///
/// Doubles every two ranks starting from 24 at E.
pub fn revive_cost(rank: Rank) -> f64 {
    match rank {
        Rank::E => 24.0,
        Rank::D => 34.0,
        Rank::C => 48.0,
        Rank::B => 68.0,
        Rank::A => 96.0,
        Rank::S => 136.0,
        Rank::SS => 192.0,
        Rank::SSS => 272.0,
        Rank::SSSPlus => 384.0,
        Rank::NH => 544.0,
        Rank::Monarch => 768.0,
        Rank::MonarchPlus => 1088.0,
        Rank::ShadowMonarch => 1536.0,
    }
}

/// Result of one revive attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviveAttempt {
    pub revived: bool,
    pub cost: f64,
    /// Set when this failure completes a run of consecutive failures
    pub low_mana_warning: bool,
}

/// Tracks revive spending and throttles low-mana warnings
#[derive(Debug, Clone)]
pub struct ResurrectionEconomy {
    warn_every: u32,
    consecutive_failures: u32,
    pub total_revives: u64,
    pub total_failures: u64,
    pub mana_spent: f64,
}

impl ResurrectionEconomy {
    pub fn new(warn_every: u32) -> Self {
        Self {
            warn_every: warn_every.max(1),
            consecutive_failures: 0,
            total_revives: 0,
            total_failures: 0,
            mana_spent: 0.0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Pay for a revive out of the freshest pool values
    ///
    /// On failure the pool is not written. The caller restores the unit's HP
    /// when `revived` is set.
    pub fn attempt_revive(
        &mut self,
        rank: Rank,
        pool: &mut dyn ResourcePoolProvider,
    ) -> ReviveAttempt {
        let cost = revive_cost(rank);
        let current = pool.pool();
        let mana = if current.mana.is_finite() { current.mana } else { 0.0 };

        if mana < cost {
            self.consecutive_failures += 1;
            self.total_failures += 1;
            let low_mana_warning = self.consecutive_failures % self.warn_every == 0;
            tracing::debug!(
                "Revive of {} unit failed: {:.0} mana, {:.0} needed",
                rank,
                mana,
                cost
            );
            return ReviveAttempt {
                revived: false,
                cost,
                low_mana_warning,
            };
        }

        pool.set_pool(ResourcePool {
            mana: mana - cost,
            ..current
        });
        pool.notify_changed();

        self.consecutive_failures = 0;
        self.total_revives += 1;
        self.mana_spent += cost;

        ReviveAttempt {
            revived: true,
            cost,
            low_mana_warning: false,
        }
    }
}
