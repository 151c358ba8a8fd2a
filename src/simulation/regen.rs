//! HP and mana regeneration for the user's resource pool

use crate::combat::math::{regen_amount, user_max_hp, user_max_mana};
use crate::host::{ResourcePool, ResourcePoolProvider, UserSnapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenTick {
    pub changed: bool,
    /// Corrupted values were reset
    pub repaired: bool,
}

fn corrupted_max(value: f64) -> bool {
    !value.is_finite() || value <= 0.0
}

fn corrupted_current(value: f64) -> bool {
    !value.is_finite() || value < 0.0
}

/// Replace unusable values with safe defaults derived from the user's stats
pub fn repair(pool: &mut ResourcePool, user: &UserSnapshot) -> bool {
    let mut repaired = false;

    if corrupted_max(pool.max_hp) {
        pool.max_hp = user_max_hp(&user.stats, user.rank);
        repaired = true;
    }
    if corrupted_current(pool.hp) {
        pool.hp = pool.max_hp;
        repaired = true;
    }
    if corrupted_max(pool.max_mana) {
        pool.max_mana = user_max_mana(&user.stats, user.rank);
        repaired = true;
    }
    if corrupted_current(pool.mana) {
        pool.mana = pool.max_mana;
        repaired = true;
    }
    repaired
}

fn step(current: f64, max: f64, amount: f64) -> f64 {
    if current >= max {
        current
    } else {
        (current + amount).min(max)
    }
}

/// One regeneration tick: vitality drives HP, intelligence drives mana
pub fn regenerate(provider: &mut dyn ResourcePoolProvider, user: &UserSnapshot) -> RegenTick {
    let before = provider.pool();
    let mut pool = before;

    let repaired = repair(&mut pool, user);
    if repaired {
        tracing::warn!("Resource pool held corrupted values {:?}, reset to defaults", before);
    }

    pool.hp = step(pool.hp, pool.max_hp, regen_amount(pool.max_hp, user.stats.vitality));
    pool.mana = step(
        pool.mana,
        pool.max_mana,
        regen_amount(pool.max_mana, user.stats.intelligence),
    );

    let changed = repaired || pool != before;
    if changed {
        provider.set_pool(pool);
        provider.notify_changed();
    }
    RegenTick { changed, repaired }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Rank, Stats};
    use crate::host::memory::SharedPool;

    fn user() -> UserSnapshot {
        UserSnapshot {
            rank: Rank::E,
            level: 1,
            stats: Stats::uniform(100.0),
        }
    }

    fn shared(hp: f64, max_hp: f64, mana: f64, max_mana: f64) -> SharedPool {
        SharedPool::new(ResourcePool {
            hp,
            max_hp,
            mana,
            max_mana,
        })
    }

    #[test]
    fn test_one_percent_per_hundred_points() {
        let mut pool = shared(500.0, 1_000.0, 0.0, 200.0);
        let tick = regenerate(&mut pool, &user());

        assert!(tick.changed);
        assert_eq!(pool.get().hp, 510.0);
        assert_eq!(pool.get().mana, 2.0);
    }

    #[test]
    fn test_no_effect_at_max() {
        let mut pool = shared(1_000.0, 1_000.0, 200.0, 200.0);
        let tick = regenerate(&mut pool, &user());

        assert!(!tick.changed);
        assert_eq!(pool.changes(), 0);
    }

    #[test]
    fn test_clamps_to_max() {
        let mut pool = shared(999.5, 1_000.0, 199.9, 200.0);
        regenerate(&mut pool, &user());
        assert_eq!(pool.get().hp, 1_000.0);
        assert_eq!(pool.get().mana, 200.0);
    }

    #[test]
    fn test_corrupted_values_are_repaired() {
        let mut pool = shared(f64::NAN, -5.0, f64::INFINITY, 200.0);
        let tick = regenerate(&mut pool, &user());

        assert!(tick.repaired);
        let values = pool.get();
        assert_eq!(values.max_hp, user_max_hp(&user().stats, Rank::E));
        assert_eq!(values.hp, values.max_hp);
        assert_eq!(values.mana, 200.0);
        assert_eq!(pool.changes(), 1);
    }
}
