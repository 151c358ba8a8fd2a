//! Army allocation across live encounters
//!
//! The roster is split once and cached; combat ticks only read the cached
//! slice for their encounter. The split is recomputed when the TTL runs out
//! or when an encounter is created or completed.

use ahash::{AHashMap, AHashSet};

use crate::core::types::{ChannelKey, Millis, Rank, UnitId};
use crate::host::Unit;

/// Units within this many ranks of the encounter are preferred
const PREFERRED_RANK_SPREAD: i32 = 2;

/// Allocation weight of an encounter
pub fn encounter_weight(rank: Rank) -> usize {
    rank.index() + 1
}

/// Army share a new encounter of `rank` would get next to `others`
pub fn expected_share(roster_size: usize, rank: Rank, others: &[Rank]) -> usize {
    let weight = encounter_weight(rank);
    let total: usize = weight + others.iter().map(|r| encounter_weight(*r)).sum::<usize>();
    roster_size * weight / total
}

/// Split `roster` across `live` encounters, weighted by rank
///
/// Allocations are disjoint, so their sum never exceeds the roster size.
/// Heavier encounters pick first; each gets at least one unit while any
/// remain.
pub fn split_roster(
    roster: &[Unit],
    live: &[(ChannelKey, Rank)],
) -> AHashMap<ChannelKey, Vec<Unit>> {
    let mut split: AHashMap<ChannelKey, Vec<Unit>> = AHashMap::new();
    if live.is_empty() {
        return split;
    }

    let n = roster.len();
    let total_weight: usize = live.iter().map(|(_, r)| encounter_weight(*r)).sum();

    let mut order: Vec<&(ChannelKey, Rank)> = live.iter().collect();
    order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut taken: AHashSet<UnitId> = AHashSet::new();

    for (key, rank) in order {
        let remaining = n - taken.len();
        let share = n * encounter_weight(*rank) / total_weight;
        let count = share.max(1).min(remaining);

        let mut chosen: Vec<Unit> = roster
            .iter()
            .filter(|u| !taken.contains(&u.id) && u.rank.diff(*rank).abs() <= PREFERRED_RANK_SPREAD)
            .take(count)
            .cloned()
            .collect();

        if chosen.len() < count {
            let picked: AHashSet<UnitId> = chosen.iter().map(|u| u.id).collect();
            let fill = count - chosen.len();
            chosen.extend(
                roster
                    .iter()
                    .filter(|u| !taken.contains(&u.id) && !picked.contains(&u.id))
                    .take(fill)
                    .cloned(),
            );
        }

        taken.extend(chosen.iter().map(|u| u.id));
        split.insert(key.clone(), chosen);
    }

    split
}

#[derive(Debug, Clone)]
struct CachedSplit {
    computed_at: Millis,
    units: AHashMap<ChannelKey, Vec<Unit>>,
}

/// Cached weighted split of the roster
#[derive(Debug)]
pub struct ArmyAllocator {
    ttl_ms: Millis,
    cache: Option<CachedSplit>,
}

impl ArmyAllocator {
    pub fn new(ttl_ms: Millis) -> Self {
        Self { ttl_ms, cache: None }
    }

    pub fn is_fresh(&self, now: Millis) -> bool {
        self.cache
            .as_ref()
            .map_or(false, |c| now.saturating_sub(c.computed_at) < self.ttl_ms)
    }

    /// Drop the cache; the next lookup recomputes
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Recompute the split now
    pub fn pre_split(&mut self, now: Millis, roster: &[Unit], live: &[(ChannelKey, Rank)]) {
        let units = split_roster(roster, live);
        tracing::debug!(
            "Army split: {} units across {} encounters",
            units.values().map(Vec::len).sum::<usize>(),
            units.len()
        );
        self.cache = Some(CachedSplit {
            computed_at: now,
            units,
        });
    }

    /// Recompute only when the cache is missing or stale
    ///
    /// `roster` is only called when a recompute is needed.
    pub fn refresh(
        &mut self,
        now: Millis,
        roster: impl FnOnce() -> Vec<Unit>,
        live: impl FnOnce() -> Vec<(ChannelKey, Rank)>,
    ) {
        if !self.is_fresh(now) {
            let roster = roster();
            let live = live();
            self.pre_split(now, &roster, &live);
        }
    }

    /// Cached slice for an encounter (empty if none)
    pub fn units_for(&self, key: &ChannelKey) -> &[Unit] {
        self.cache
            .as_ref()
            .and_then(|c| c.units.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total_allocated(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |c| c.units.values().map(Vec::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Stats;

    fn roster(count: usize, rank: Rank) -> Vec<Unit> {
        (0..count)
            .map(|i| Unit {
                id: UnitId::new(),
                name: format!("u{}", i),
                rank,
                level: 1,
                xp: 0,
                stats: Stats::uniform(10.0),
            })
            .collect()
    }

    fn key(name: &str) -> ChannelKey {
        ChannelKey(name.into())
    }

    #[test]
    fn test_weighted_split_s_and_d() {
        let units = roster(80, Rank::B);
        let live = vec![(key("s"), Rank::S), (key("d"), Rank::D)];
        let split = split_roster(&units, &live);

        assert_eq!(split[&key("s")].len(), 60);
        assert_eq!(split[&key("d")].len(), 20);
    }

    #[test]
    fn test_split_is_disjoint_and_conserved() {
        let units = roster(7, Rank::C);
        let live: Vec<_> = (0..10).map(|i| (key(&format!("c{}", i)), Rank::E)).collect();
        let split = split_roster(&units, &live);

        let total: usize = split.values().map(Vec::len).sum();
        assert!(total <= 7);

        let mut seen = AHashSet::new();
        for unit in split.values().flatten() {
            assert!(seen.insert(unit.id), "unit allocated twice");
        }
    }

    #[test]
    fn test_minimum_one_unit_each_when_possible() {
        let units = roster(3, Rank::C);
        let live = vec![
            (key("a"), Rank::ShadowMonarch),
            (key("b"), Rank::E),
            (key("c"), Rank::E),
        ];
        let split = split_roster(&units, &live);
        assert!(split.values().all(|v| v.len() == 1));
    }

    #[test]
    fn test_prefers_units_near_encounter_rank() {
        let mut units = roster(10, Rank::E);
        units.extend(roster(10, Rank::S));
        let live = vec![(key("s"), Rank::S), (key("e"), Rank::E)];
        let split = split_roster(&units, &live);

        // S weight 6, E weight 1: 20*6/7 = 17, 20/7 = 2
        let s_units = &split[&key("s")];
        assert_eq!(s_units.len(), 17);
        assert_eq!(s_units.iter().filter(|u| u.rank == Rank::S).count(), 10);
        assert!(split[&key("e")].iter().all(|u| u.rank == Rank::E));
    }

    #[test]
    fn test_empty_roster_allocates_nothing() {
        let split = split_roster(&[], &[(key("a"), Rank::A)]);
        assert!(split[&key("a")].is_empty());
    }

    #[test]
    fn test_expected_share() {
        assert_eq!(expected_share(80, Rank::S, &[Rank::D]), 60);
        assert_eq!(expected_share(80, Rank::D, &[Rank::S]), 20);
        assert_eq!(expected_share(80, Rank::E, &[]), 80);
        assert_eq!(expected_share(0, Rank::E, &[]), 0);
    }

    #[test]
    fn test_cache_respects_ttl_and_invalidation() {
        let units = roster(10, Rank::C);
        let live = vec![(key("a"), Rank::C)];
        let mut allocator = ArmyAllocator::new(60_000);

        let calls = std::cell::Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            units.clone()
        };

        allocator.refresh(0, fetch, || live.clone());
        allocator.refresh(30_000, fetch, || live.clone());
        assert_eq!(calls.get(), 1);
        assert_eq!(allocator.units_for(&key("a")).len(), 10);
        assert_eq!(allocator.total_allocated(), 10);

        allocator.refresh(60_000, fetch, || live.clone());
        assert_eq!(calls.get(), 2);

        allocator.invalidate();
        assert!(!allocator.is_fresh(60_001));
        assert!(allocator.units_for(&key("a")).is_empty());
        assert_eq!(allocator.total_allocated(), 0);
    }
}
