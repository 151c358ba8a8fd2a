//! Experience distribution when an encounter ends
//!
//! Only a boss kill pays out. Level-ups and rank-ups are read off the
//! roster by comparing it before and after the grant, since leveling is
//! owned by the army subsystem.

use ahash::AHashMap;

use crate::combat::math::xp_rank_multiplier;
use crate::core::config::DungeonConfig;
use crate::core::types::UnitId;
use crate::dungeon::encounter::{Contribution, Encounter};
use crate::host::{Host, Unit};
use crate::simulation::events::XpReport;

/// User XP for a boss kill: full when participating, a share otherwise
pub fn user_xp(encounter: &Encounter, config: &DungeonConfig) -> u64 {
    let base = config.user_boss_xp * xp_rank_multiplier(encounter.rank);
    let share = if encounter.user_participating() {
        1.0
    } else {
        config.watcher_xp_share
    };
    (base * share).round() as u64
}

/// XP earned by one unit from its contribution ledger
pub fn unit_xp(
    contribution: &Contribution,
    encounter: &Encounter,
    unit: &Unit,
    config: &DungeonConfig,
) -> u64 {
    let boss_share = if encounter.boss.max_hp > 0.0 {
        contribution.boss_damage / encounter.boss.max_hp
    } else {
        0.0
    };
    let raw = contribution.mob_kills as f64 * config.base_mob_xp + boss_share * config.base_boss_xp;
    (raw * xp_rank_multiplier(encounter.rank) * xp_rank_multiplier(unit.rank)).round() as u64
}

fn diff_roster(before: &[Unit], after: &[Unit], report: &mut XpReport) {
    let previous: AHashMap<UnitId, &Unit> = before.iter().map(|u| (u.id, u)).collect();
    for unit in after {
        let Some(old) = previous.get(&unit.id) else {
            continue;
        };
        if unit.level > old.level {
            report.level_ups.push((unit.id, unit.level));
        }
        if unit.rank > old.rank {
            report.rank_ups.push((unit.id, unit.rank));
        }
    }
}

/// Grant boss-kill XP to the user and to every contributing unit
pub fn distribute_xp(encounter: &Encounter, host: &mut Host, config: &DungeonConfig) -> XpReport {
    let mut report = XpReport::default();

    let xp = user_xp(encounter, config);
    if let Some(user) = host.user.get_mut() {
        let reason = format!("Defeated {} ({})", encounter.boss.name, encounter.rank);
        user.grant_xp(xp, &reason);
        report.user_xp = xp;
    }

    let before = host.roster_units();
    let Some(roster) = host.roster.get_mut() else {
        tracing::warn!("Roster unavailable, skipping shadow XP for {}", encounter.key());
        return report;
    };

    let mut ids: Vec<&UnitId> = encounter.shadow_contributions.keys().collect();
    ids.sort();
    let reason = format!("Dungeon cleared: {}", encounter.name);
    for id in ids {
        let Some(unit) = before.iter().find(|u| &u.id == id) else {
            continue;
        };
        let amount = unit_xp(&encounter.shadow_contributions[id], encounter, unit, config);
        if amount == 0 {
            continue;
        }
        roster.grant_xp(amount, &reason, &[*id]);
        report.unit_xp.push((*id, amount));
    }

    let after = roster.all_units();
    diff_roster(&before, &after, &mut report);

    tracing::info!(
        "XP for {}: user {}, {} shadows {} total, {} level-ups, {} rank-ups",
        encounter.key(),
        report.user_xp,
        report.unit_xp.len(),
        report.total_unit_xp(),
        report.level_ups.len(),
        report.rank_ups.len()
    );
    report
}
